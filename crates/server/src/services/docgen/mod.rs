//! Documentation generation through a generative model.
//!
//! [`DocumentationClient::generate`] never returns an error: every failure is
//! folded into [`Generated::Failed`] with the text that would be shown to a
//! user.
//!
//! # Retry strategy
//!
//! The model is called at most [`MAX_ATTEMPTS`] times. After a failed attempt
//! `i` (zero based) the client sleeps `base_delay * 2^i` before trying again,
//! which gives 1s, 2s, 4s and 8s with the default one second base. An empty
//! model response is not retried.

pub mod model;
pub mod postprocess;
pub mod prompt;
pub mod repository;

use std::{sync::Arc, time::Duration};

use crate::db::models::CodeSnippet;

use self::{model::GenerativeModel, repository::RepositoryFetcher};

pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentationRequest {
    Code {
        code: String,
        title: Option<String>,
        language: Option<String>,
    },
    Repository {
        url: String,
    },
}

impl DocumentationRequest {
    /// The request that documents a stored snippet, or `None` for a repository
    /// snippet without a URL.
    pub fn for_snippet(snippet: &CodeSnippet) -> Option<Self> {
        if snippet.is_repo {
            let url = snippet
                .code
                .as_deref()
                .filter(|code| !code.trim().is_empty())
                .or(snippet.url.as_deref())
                .filter(|url| !url.trim().is_empty())?;
            Some(Self::Repository {
                url: url.to_string(),
            })
        } else {
            Some(Self::Code {
                code: snippet.code.clone().unwrap_or_default(),
                title: snippet.name_or_title.clone(),
                language: snippet.language.clone(),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    Documentation(String),
    Failed(String),
}

impl Generated {
    pub fn text(&self) -> &str {
        match self {
            Generated::Documentation(text) | Generated::Failed(text) => text,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Generated::Documentation(_))
    }
}

#[derive(Clone)]
pub struct DocumentationClient {
    model: Arc<dyn GenerativeModel>,
    repositories: RepositoryFetcher,
    base_delay: Duration,
}

impl DocumentationClient {
    pub fn new(model: Arc<dyn GenerativeModel>, repositories: RepositoryFetcher) -> Self {
        Self {
            model,
            repositories,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub async fn generate(&self, request: &DocumentationRequest) -> Generated {
        let prompt = match request {
            DocumentationRequest::Code {
                code,
                title,
                language,
            } => prompt::code_prompt(code, title.as_deref(), language.as_deref()),
            DocumentationRequest::Repository { url } => match self.repositories.fetch(url).await {
                Ok(content) => prompt::repository_prompt(url, &content),
                Err(e) => {
                    tracing::error!(error = %e, "Error fetching repository content");
                    return Generated::Failed(format!(
                        "Error: Failed to fetch repository content: {e}"
                    ));
                }
            },
        };

        self.generate_from_prompt(&prompt).await
    }

    async fn generate_from_prompt(&self, prompt: &str) -> Generated {
        let mut attempt = 0;
        loop {
            match self.model.generate(prompt).await {
                Ok(text) if text.trim().is_empty() => {
                    tracing::error!("Empty response from generative model");
                    return Generated::Failed("Error: Empty response from AI model.".to_string());
                }
                Ok(text) => return Generated::Documentation(postprocess::post_process(&text)),
                Err(e) if attempt + 1 < MAX_ATTEMPTS => {
                    let wait = self.base_delay * 2u32.pow(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Generative model error. Retrying in {:?}",
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Max retries exceeded for generative model");
                    return Generated::Failed(format!(
                        "Error: Failed to generate documentation. {e}"
                    ));
                }
            }
        }
    }
}
