//! Queries over snippets, projects, documentation and corrections.
//!
//! `attach_documentation` is the only code that writes documentation rows; it
//! also flips `code_snippets.has_documentation`, so the flag and the row are
//! always changed in the same transaction.

use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{
    models::{CodeSnippet, Correction, Documentation, Project},
    retry_on_lock,
};

const SNIPPET_COLUMNS: &str = "id, user_id, project_id, url, name_or_title, language, code, \
     stars, source, is_user_submitted, has_documentation, is_repo, created_at, updated_at";

const DOCUMENTATION_COLUMNS: &str =
    "id, content, user_id, project_id, snippet_id, created_at, updated_at";

/// Fields of a snippet row that callers choose; ids, flags owned by
/// `attach_documentation` and timestamps are filled in here.
#[derive(Debug, Clone, Default)]
pub struct NewSnippet {
    pub user_id: String,
    pub project_id: Option<String>,
    pub url: Option<String>,
    pub name_or_title: Option<String>,
    pub language: Option<String>,
    pub code: Option<String>,
    pub stars: i64,
    pub source: Option<String>,
    pub is_user_submitted: bool,
    pub is_repo: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub const MAX_PER_PAGE: i64 = 100;

    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(10).clamp(1, Self::MAX_PER_PAGE),
        }
    }

    fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub pages: i64,
    pub page: i64,
}

impl<T> Page<T> {
    fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            pages: (total + request.per_page - 1) / request.per_page,
            page: request.page,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SearchFilters {
    pub query: String,
    pub source: Option<String>,
    pub language: Option<String>,
    pub min_stars: Option<i64>,
}

pub async fn find_snippet(pool: &SqlitePool, id: &str) -> Result<Option<CodeSnippet>, sqlx::Error> {
    sqlx::query_as::<_, CodeSnippet>(&format!(
        "SELECT {SNIPPET_COLUMNS} FROM code_snippets WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_snippet(
    conn: &mut SqliteConnection,
    new: NewSnippet,
) -> Result<CodeSnippet, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, CodeSnippet>(&format!(
        "INSERT INTO code_snippets ({SNIPPET_COLUMNS}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?) \
         RETURNING {SNIPPET_COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(&new.user_id)
    .bind(&new.project_id)
    .bind(&new.url)
    .bind(&new.name_or_title)
    .bind(&new.language)
    .bind(&new.code)
    .bind(new.stars)
    .bind(&new.source)
    .bind(new.is_user_submitted)
    .bind(new.is_repo)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

/// Store gathered snippets whose URL is not already known, in one transaction.
/// Returns how many rows were inserted.
pub async fn store_gathered(pool: &SqlitePool, snippets: &[NewSnippet]) -> Result<usize, sqlx::Error> {
    retry_on_lock(move || async move {
        let mut tx = pool.begin().await?;
        let mut inserted = 0;

        for snippet in snippets {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM code_snippets WHERE url = ?",
            )
            .bind(&snippet.url)
            .fetch_one(&mut *tx)
            .await?;

            if exists == 0 {
                insert_snippet(&mut tx, snippet.clone()).await?;
                inserted += 1;
            }
        }

        tx.commit().await?;
        Ok::<_, sqlx::Error>(inserted)
    })
    .await
}

pub async fn find_or_create_project(
    conn: &mut SqliteConnection,
    user_id: &str,
    name: &str,
) -> Result<Project, sqlx::Error> {
    let existing = sqlx::query_as::<_, Project>(
        "SELECT id, name, user_id, created_at FROM projects WHERE user_id = ? AND name = ?",
    )
    .bind(user_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(project) = existing {
        return Ok(project);
    }

    sqlx::query_as::<_, Project>(
        "INSERT INTO projects (id, name, user_id, created_at) VALUES (?, ?, ?, ?) \
         RETURNING id, name, user_id, created_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(user_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

/// Create or overwrite the documentation of `snippet` and mark the snippet as
/// documented. Must run inside the caller's transaction.
pub async fn attach_documentation(
    conn: &mut SqliteConnection,
    snippet: &CodeSnippet,
    content: &str,
) -> Result<Documentation, sqlx::Error> {
    let now = Utc::now();

    let documentation = sqlx::query_as::<_, Documentation>(&format!(
        "INSERT INTO documentation ({DOCUMENTATION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(snippet_id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at \
         RETURNING {DOCUMENTATION_COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(content)
    .bind(&snippet.user_id)
    .bind(&snippet.project_id)
    .bind(&snippet.id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE code_snippets SET has_documentation = 1, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(&snippet.id)
        .execute(&mut *conn)
        .await?;

    Ok(documentation)
}

/// `attach_documentation` in a transaction of its own.
pub async fn document_snippet(
    pool: &SqlitePool,
    snippet: &CodeSnippet,
    content: &str,
) -> Result<Documentation, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let documentation = attach_documentation(&mut tx, snippet, content).await?;
    tx.commit().await?;
    Ok(documentation)
}

pub async fn documentation_for_snippet(
    pool: &SqlitePool,
    snippet_id: &str,
) -> Result<Option<Documentation>, sqlx::Error> {
    sqlx::query_as::<_, Documentation>(&format!(
        "SELECT {DOCUMENTATION_COLUMNS} FROM documentation WHERE snippet_id = ?"
    ))
    .bind(snippet_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_documentation(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<Documentation>, sqlx::Error> {
    sqlx::query_as::<_, Documentation>(&format!(
        "SELECT {DOCUMENTATION_COLUMNS} FROM documentation WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn undocumented_snippets(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<CodeSnippet>, sqlx::Error> {
    sqlx::query_as::<_, CodeSnippet>(&format!(
        "SELECT {SNIPPET_COLUMNS} FROM code_snippets \
         WHERE user_id = ? AND has_documentation = 0 \
         ORDER BY created_at ASC, id ASC LIMIT ?"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Snippets of one user, either gathered (`submitted == false`) or submitted
/// through `/submit`.
pub async fn list_snippets(
    pool: &SqlitePool,
    user_id: &str,
    submitted: bool,
    request: PageRequest,
) -> Result<Page<CodeSnippet>, sqlx::Error> {
    let total = count_snippets(pool, user_id, submitted, None).await?;

    let items = sqlx::query_as::<_, CodeSnippet>(&format!(
        "SELECT {SNIPPET_COLUMNS} FROM code_snippets \
         WHERE user_id = ? AND is_user_submitted = ? \
         ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?"
    ))
    .bind(user_id)
    .bind(submitted)
    .bind(request.per_page)
    .bind(request.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(items, total, request))
}

pub async fn count_snippets(
    pool: &SqlitePool,
    user_id: &str,
    submitted: bool,
    documented: Option<bool>,
) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM code_snippets WHERE user_id = ",
    );
    builder.push_bind(user_id);
    builder.push(" AND is_user_submitted = ");
    builder.push_bind(submitted);
    if let Some(documented) = documented {
        builder.push(" AND has_documentation = ");
        builder.push_bind(documented);
    }

    let (count,) = builder.build_query_as::<(i64,)>().fetch_one(pool).await?;
    Ok(count)
}

fn push_search_filters<'a>(
    builder: &mut QueryBuilder<'a, Sqlite>,
    user_id: &'a str,
    filters: &'a SearchFilters,
) {
    builder.push(" WHERE user_id = ");
    builder.push_bind(user_id);
    // SQLite LIKE is case-insensitive for ASCII.
    builder.push(" AND COALESCE(name_or_title, '') LIKE ");
    builder.push_bind(format!("%{}%", filters.query));
    if let Some(source) = &filters.source {
        builder.push(" AND source = ");
        builder.push_bind(source.as_str());
    }
    if let Some(language) = &filters.language {
        builder.push(" AND language = ");
        builder.push_bind(language.as_str());
    }
    if let Some(min_stars) = filters.min_stars {
        builder.push(" AND stars >= ");
        builder.push_bind(min_stars);
    }
}

pub async fn search_snippets(
    pool: &SqlitePool,
    user_id: &str,
    filters: &SearchFilters,
    request: PageRequest,
) -> Result<Page<CodeSnippet>, sqlx::Error> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM code_snippets");
    push_search_filters(&mut count, user_id, filters);
    let (total,) = count.build_query_as::<(i64,)>().fetch_one(pool).await?;

    let mut select =
        QueryBuilder::<Sqlite>::new(format!("SELECT {SNIPPET_COLUMNS} FROM code_snippets"));
    push_search_filters(&mut select, user_id, filters);
    select.push(" ORDER BY stars DESC, created_at DESC LIMIT ");
    select.push_bind(request.per_page);
    select.push(" OFFSET ");
    select.push_bind(request.offset());
    let items = select.build_query_as::<CodeSnippet>().fetch_all(pool).await?;

    Ok(Page::new(items, total, request))
}

pub async fn insert_correction(
    pool: &SqlitePool,
    documentation_id: &str,
    user_id: &str,
    content: &str,
) -> Result<Correction, sqlx::Error> {
    sqlx::query_as::<_, Correction>(
        "INSERT INTO corrections (id, content, documentation_id, user_id, created_at) \
         VALUES (?, ?, ?, ?, ?) \
         RETURNING id, content, documentation_id, user_id, created_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(content)
    .bind(documentation_id)
    .bind(user_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}
