use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PROMPT_ECHO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^.*?Documentation should include:").unwrap());
static FORMAT_INSTRUCTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Please format the documentation in .*?\.").unwrap());
static SETEXT_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(.+)\n={3,}[ \t]*$").unwrap());
static SETEXT_H2: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(.+)\n-{3,}[ \t]*$").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Clean raw model output into presentable markdown.
pub fn post_process(raw: &str) -> String {
    let doc = PROMPT_ECHO.replace(raw, "");
    let doc = FORMAT_INSTRUCTIONS.replace_all(doc.trim(), "");

    let doc = SETEXT_H1.replace_all(doc.trim(), |caps: &Captures| setext(caps, "#"));
    let doc = SETEXT_H2.replace_all(&doc, |caps: &Captures| setext(caps, "##"));

    let doc = space_code_fences(&doc);
    let doc = BLANK_RUNS.replace_all(&doc, "\n\n");

    doc.trim().to_string()
}

fn setext(caps: &Captures, marker: &str) -> String {
    let title = &caps[1];
    if title.starts_with('#') {
        caps[0].to_string()
    } else {
        format!("{marker} {}", title.trim())
    }
}

/// Put a blank line before every opening fence and after every closing one.
fn space_code_fences(doc: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut blank_after = false;

    for line in doc.lines() {
        if blank_after && !line.trim().is_empty() {
            out.push("");
        }
        blank_after = false;

        if line.trim_start().starts_with("```") {
            if in_fence {
                blank_after = true;
            } else if out.last().is_some_and(|prev| !prev.trim().is_empty()) {
                out.push("");
            }
            in_fence = !in_fence;
        }
        out.push(line);
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_echoed_prompt() {
        let raw = "Write documentation...\nDocumentation should include:\n1. stuff\n\n# Overview\nIt works.";
        let doc = post_process(raw);
        assert!(doc.starts_with("1. stuff"));
        assert!(!doc.contains("Documentation should include"));
    }

    #[test]
    fn strips_formatting_instructions() {
        let doc = post_process("Please format the documentation in Markdown.\n# Title");
        assert_eq!(doc, "# Title");
    }

    #[test]
    fn converts_setext_headers() {
        let doc = post_process("Overview\n========\nBody\n\nUsage\n-----\nMore");
        assert_eq!(doc, "# Overview\nBody\n\n## Usage\nMore");
    }

    #[test]
    fn spaces_code_fences() {
        let doc = post_process("Example:\n```rust\nfn main() {}\n```\nDone.");
        assert_eq!(doc, "Example:\n\n```rust\nfn main() {}\n```\n\nDone.");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(post_process("  # Title\n\nSome text.  "), "# Title\n\nSome text.");
    }
}
