use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: String,
    pub key: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CodeSnippet {
    pub id: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub url: Option<String>,
    pub name_or_title: Option<String>,
    pub language: Option<String>,
    /// Source code, or the repository URL when `is_repo` is set.
    pub code: Option<String>,
    pub stars: i64,
    pub source: Option<String>,
    pub is_user_submitted: bool,
    pub has_documentation: bool,
    pub is_repo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Documentation {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub snippet_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Correction {
    pub id: String,
    pub content: String,
    pub documentation_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
