//! Clients that pull candidate snippets from GitHub and StackOverflow.
//!
//! A gatherer never fails: network errors, bad statuses and unexpected payloads
//! are logged and reported as an empty result.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

pub const USER_AGENT: &str = concat!("codebase-server/", env!("CARGO_PKG_VERSION"));

/// Provider-neutral shape of one gathered item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatheredItem {
    pub source: String,
    pub title: String,
    pub url: String,
    pub language: String,
    pub code: String,
    pub stars: i64,
}

#[async_trait]
pub trait Gatherer: Send + Sync {
    fn source(&self) -> &'static str;

    async fn gather(&self) -> Vec<GatheredItem>;
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope<T> {
    items: Vec<T>,
}

async fn fetch_items<T>(client: &reqwest::Client, url: &str, source: &str) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
{
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(source, error = %e, "Error fetching data");
            return Vec::new();
        }
    };

    let response = match response.error_for_status() {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(source, error = %e, "Error fetching data");
            return Vec::new();
        }
    };

    match response.json::<ItemsEnvelope<T>>().await {
        Ok(envelope) => envelope.items,
        Err(e) => {
            tracing::error!(source, error = %e, "Unexpected response payload");
            Vec::new()
        }
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    name: String,
    html_url: String,
    language: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    stargazers_count: i64,
}

pub struct GitHubGatherer {
    client: reqwest::Client,
    url: String,
}

impl GitHubGatherer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Gatherer for GitHubGatherer {
    fn source(&self) -> &'static str {
        "GitHub"
    }

    async fn gather(&self) -> Vec<GatheredItem> {
        let items: Vec<GitHubRepository> = fetch_items(&self.client, &self.url, self.source()).await;

        let gathered: Vec<_> = items
            .into_iter()
            .map(|repo| GatheredItem {
                source: self.source().to_string(),
                title: repo.name,
                url: repo.html_url,
                language: repo.language.unwrap_or_else(|| "Unknown".to_string()),
                code: repo.content.unwrap_or_default(),
                stars: repo.stargazers_count,
            })
            .collect();

        tracing::info!("Successfully gathered {} items from GitHub", gathered.len());
        gathered
    }
}

#[derive(Debug, Deserialize)]
struct StackOverflowQuestion {
    title: String,
    link: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    score: i64,
}

pub struct StackOverflowGatherer {
    client: reqwest::Client,
    url: String,
}

impl StackOverflowGatherer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Gatherer for StackOverflowGatherer {
    fn source(&self) -> &'static str {
        "StackOverflow"
    }

    async fn gather(&self) -> Vec<GatheredItem> {
        let items: Vec<StackOverflowQuestion> =
            fetch_items(&self.client, &self.url, self.source()).await;

        let gathered: Vec<_> = items
            .into_iter()
            .map(|question| GatheredItem {
                source: self.source().to_string(),
                title: question.title,
                url: question.link,
                // The first tag is usually the language.
                language: question
                    .tags
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| "Unknown".to_string()),
                code: question.body.unwrap_or_default(),
                stars: question.score,
            })
            .collect();

        tracing::info!(
            "Successfully gathered {} items from StackOverflow",
            gathered.len()
        );
        gathered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn github_items_are_mapped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"total_count": 2, "items": [
                    {"name": "axum", "html_url": "https://github.com/tokio-rs/axum", "language": "Rust", "stargazers_count": 18000},
                    {"name": "dotfiles", "html_url": "https://github.com/me/dotfiles", "language": null}
                ]}"#,
            )
            .create_async()
            .await;

        let gatherer = GitHubGatherer::new(format!("{}/search", server.url()));
        let items = gatherer.gather().await;

        mock.assert_async().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source, "GitHub");
        assert_eq!(items[0].title, "axum");
        assert_eq!(items[0].stars, 18000);
        assert_eq!(items[1].language, "Unknown");
        assert_eq!(items[1].stars, 0);
    }

    #[tokio::test]
    async fn stackoverflow_items_are_mapped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/questions")
            .with_status(200)
            .with_body(
                r#"{"items": [
                    {"title": "How do I borrow?", "link": "https://stackoverflow.com/q/1", "tags": ["rust", "borrow-checker"], "score": 42, "body": "<p>help</p>"},
                    {"title": "Untagged", "link": "https://stackoverflow.com/q/2"}
                ]}"#,
            )
            .create_async()
            .await;

        let items = StackOverflowGatherer::new(format!("{}/questions", server.url()))
            .gather()
            .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].language, "rust");
        assert_eq!(items[0].code, "<p>help</p>");
        assert_eq!(items[0].stars, 42);
        assert_eq!(items[1].language, "Unknown");
    }

    #[tokio::test]
    async fn failures_yield_empty_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/broken")
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("GET", "/garbage")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let broken = GitHubGatherer::new(format!("{}/broken", server.url()));
        assert!(broken.gather().await.is_empty());

        let garbage = StackOverflowGatherer::new(format!("{}/garbage", server.url()));
        assert!(garbage.gather().await.is_empty());

        let unreachable = GitHubGatherer::new("http://127.0.0.1:1/nothing");
        assert!(unreachable.gather().await.is_empty());
    }
}
