use std::time::Duration;

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::services::gatherers::USER_AGENT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryContent {
    pub readme: String,
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReadmeResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    path: String,
}

/// Split `https://github.com/<owner>/<repo>` into its owner and repository.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let parts: Vec<&str> = trimmed.split('/').collect();

    if parts.len() < 5 || !parts.contains(&"github.com") {
        return None;
    }

    let repo = parts[parts.len() - 1];
    let owner = parts[parts.len() - 2];
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Reads a repository's README and top-level listing through the GitHub REST API.
#[derive(Clone)]
pub struct RepositoryFetcher {
    client: reqwest::Client,
    api_base: String,
}

impl RepositoryFetcher {
    pub fn new(api_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch(&self, repo_url: &str) -> anyhow::Result<RepositoryContent> {
        if repo_url.trim().is_empty() {
            bail!("Repository URL is empty");
        }
        let Some((owner, repo)) = parse_repo_url(repo_url) else {
            bail!("Invalid GitHub repository URL: {repo_url}");
        };
        tracing::info!("Fetching content for repository: {owner}/{repo}");

        let readme_url = format!("{}/repos/{owner}/{repo}/readme", self.api_base);
        let response = self
            .client
            .get(&readme_url)
            .send()
            .await
            .with_context(|| format!("requesting README of {owner}/{repo}"))?;

        let readme = if response.status().is_success() {
            let body: ReadmeResponse = response.json().await.context("decoding README response")?;
            // GitHub wraps the base64 payload at 60 columns.
            let encoded: String = body.content.split_whitespace().collect();
            let bytes = STANDARD.decode(encoded).context("decoding README content")?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            tracing::warn!(
                "Failed to fetch README for {owner}/{repo}. Status code: {}",
                response.status().as_u16()
            );
            format!("README not found. Status code: {}", response.status().as_u16())
        };

        let contents_url = format!("{}/repos/{owner}/{repo}/contents", self.api_base);
        let response = self
            .client
            .get(&contents_url)
            .send()
            .await
            .with_context(|| format!("requesting contents of {owner}/{repo}"))?;

        let files = if response.status().is_success() {
            let entries: Vec<ContentEntry> =
                response.json().await.context("decoding contents response")?;
            entries.into_iter().map(|entry| entry.path).collect()
        } else {
            tracing::warn!(
                "Failed to fetch file structure for {owner}/{repo}. Status code: {}",
                response.status().as_u16()
            );
            Vec::new()
        };

        Ok(RepositoryContent { readme, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repository_urls() {
        assert_eq!(
            parse_repo_url("https://github.com/tokio-rs/axum"),
            Some(("tokio-rs".to_string(), "axum".to_string()))
        );
        assert_eq!(
            parse_repo_url("https://github.com/tokio-rs/axum.git/"),
            Some(("tokio-rs".to_string(), "axum".to_string()))
        );
        assert_eq!(parse_repo_url("https://gitlab.com/a/b"), None);
        assert_eq!(parse_repo_url("github.com/a"), None);
    }

    #[tokio::test]
    async fn fetches_readme_and_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/octo/demo/readme")
            .with_status(200)
            .with_body(format!(r#"{{"content": "{}\n"}}"#, STANDARD.encode("# Demo\nHello")))
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/demo/contents")
            .with_status(200)
            .with_body(r#"[{"path": "README.md"}, {"path": "src"}]"#)
            .create_async()
            .await;

        let content = RepositoryFetcher::new(server.url())
            .fetch("https://github.com/octo/demo")
            .await
            .unwrap();

        assert_eq!(content.readme, "# Demo\nHello");
        assert_eq!(content.files, vec!["README.md", "src"]);
    }

    #[tokio::test]
    async fn missing_readme_becomes_placeholder() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/octo/empty/readme")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/octo/empty/contents")
            .with_status(404)
            .create_async()
            .await;

        let content = RepositoryFetcher::new(server.url())
            .fetch("https://github.com/octo/empty")
            .await
            .unwrap();

        assert_eq!(content.readme, "README not found. Status code: 404");
        assert!(content.files.is_empty());
    }

    #[tokio::test]
    async fn invalid_url_is_an_error() {
        let fetcher = RepositoryFetcher::new("http://127.0.0.1:1");
        assert!(fetcher.fetch("").await.is_err());
        assert!(fetcher.fetch("https://example.com/x").await.is_err());
    }
}
