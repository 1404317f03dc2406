use super::repository::RepositoryContent;

const CODE_CHECKLIST: &str = "\
Documentation should include:
1. A short description of what the code does
2. The key functions, classes or components and their roles
3. Inputs and return values, where applicable
4. Notable libraries, frameworks or language features used
5. Usage examples
6. Caveats or considerations for users and maintainers
";

const REPOSITORY_CHECKLIST: &str = "\
Documentation should include:
1. A short description of the repository's purpose and main functionality
2. The key modules or components and their roles
3. The main technologies, frameworks or libraries used
4. Installation and setup steps, if the README describes them
5. Usage examples or API endpoints, if it is a library or service
6. Caveats or considerations for users and maintainers
";

pub fn code_prompt(code: &str, title: Option<&str>, language: Option<&str>) -> String {
    format!(
        "Write comprehensive documentation for the following code snippet.\n\n\
         Name/Title: {}\n\
         Language: {}\n\
         Code:\n{}\n\n{}",
        title.unwrap_or("N/A"),
        language.unwrap_or("N/A"),
        if code.is_empty() { "No code provided" } else { code },
        CODE_CHECKLIST,
    )
}

pub fn repository_prompt(url: &str, content: &RepositoryContent) -> String {
    format!(
        "Write comprehensive documentation for the following GitHub repository.\n\n\
         Repository URL: {}\n\n\
         README Content:\n{}\n\n\
         File Structure:\n{}\n\n{}",
        url,
        content.readme,
        content.files.join(", "),
        REPOSITORY_CHECKLIST,
    )
}
