use axum::{
    extract::{rejection::JsonRejection, Query, State},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db::snippets::{self, NewSnippet, PageRequest, SearchFilters},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::{
        cleaning,
        docgen::{DocumentationRequest, Generated},
        gatherers::GatheredItem,
        rate_limit::{enforce, HOUR, MINUTE},
    },
    AppState,
};

pub fn session_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/data", get(gathered_snippets))
        .route("/user-snippets", get(submitted_snippets))
        .route("/dashboard", get(dashboard))
        .route(
            "/search",
            get(search).layer(from_fn_with_state(
                state.limiter.quota("search", 30, MINUTE),
                enforce,
            )),
        )
        .route(
            "/submit",
            post(submit).layer(from_fn_with_state(
                state.limiter.quota("submit", 10, MINUTE),
                enforce,
            )),
        )
}

pub fn api_key_router(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/gather",
        post(gather).layer(from_fn_with_state(
            state.limiter.quota("gather", 5, HOUR),
            enforce,
        )),
    )
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub source: Option<String>,
    pub language: Option<String>,
    pub min_stars: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub code: Option<String>,
    #[serde(rename = "repoUrl")]
    pub repo_url: Option<String>,
    #[serde(rename = "projectName")]
    pub project_name: Option<String>,
}

/// Gathered GitHub items are repositories; their URL doubles as the code so
/// that documentation is generated from the repository contents.
fn to_new_snippet(user_id: &str, item: GatheredItem) -> NewSnippet {
    let is_repo = item.url.contains("github.com");
    let code = if is_repo { item.url.clone() } else { item.code };

    NewSnippet {
        user_id: user_id.to_string(),
        project_id: None,
        url: Some(item.url),
        name_or_title: Some(item.title),
        language: Some(item.language),
        code: Some(code),
        stars: item.stars,
        source: Some(item.source),
        is_user_submitted: false,
        is_repo,
    }
}

async fn gather(State(state): State<AppState>, user: AuthUser) -> Result<Json<Value>> {
    let mut gathered = Vec::new();
    for gatherer in state.gatherers.iter() {
        let items = gatherer.gather().await;
        tracing::debug!(source = gatherer.source(), count = items.len(), "Gathered items");
        gathered.extend(items);
    }

    let new_snippets: Vec<NewSnippet> = cleaning::clean(gathered)
        .into_iter()
        .map(|item| to_new_snippet(&user.id, item))
        .collect();

    let count = snippets::store_gathered(&state.db.pool, &new_snippets).await?;

    tracing::info!(
        user_id = %user.id,
        "Successfully gathered and stored {} new code snippets",
        count
    );

    Ok(Json(json!({
        "message": format!("Successfully gathered {count} new items"),
        "count": count,
    })))
}

async fn gathered_snippets(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>> {
    let page = snippets::list_snippets(&state.db.pool, &user.id, false, query.request()).await?;
    tracing::info!(user_id = %user.id, "Retrieved {} gathered code snippets", page.total);
    Ok(Json(json!({ "snippets": page })))
}

async fn submitted_snippets(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>> {
    let page = snippets::list_snippets(&state.db.pool, &user.id, true, query.request()).await?;
    tracing::info!(user_id = %user.id, "Retrieved {} user-submitted code snippets", page.total);
    Ok(Json(json!({ "snippets": page })))
}

async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>> {
    let pool = &state.db.pool;
    let total_snippets = snippets::count_snippets(pool, &user.id, true, None).await?;
    let documented_snippets = snippets::count_snippets(pool, &user.id, true, Some(true)).await?;
    let page = snippets::list_snippets(pool, &user.id, true, query.request()).await?;

    Ok(Json(json!({
        "total_snippets": total_snippets,
        "documented_snippets": documented_snippets,
        "snippets": page,
    })))
}

async fn search(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>> {
    let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
    let filters = SearchFilters {
        query: query.q,
        source: non_empty(query.source),
        language: non_empty(query.language),
        min_stars: query.min_stars,
    };
    let request = PageRequest::new(query.page, query.per_page);

    let page = snippets::search_snippets(&state.db.pool, &user.id, &filters, request).await?;
    Ok(Json(json!(page)))
}

async fn submit(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = payload?;
    let project_name = body
        .project_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Project name is required.".to_string()))?;

    let (request, content, is_repo) = match (body.code, body.repo_url) {
        (Some(code), _) if !code.is_empty() => (
            DocumentationRequest::Code {
                code: code.clone(),
                title: None,
                language: None,
            },
            code,
            false,
        ),
        (_, Some(url)) if !url.is_empty() => (
            DocumentationRequest::Repository { url: url.clone() },
            url,
            true,
        ),
        _ => {
            return Err(AppError::Validation(
                "No code or repository URL provided.".to_string(),
            ))
        }
    };

    let documentation = match state.docs.generate(&request).await {
        Generated::Documentation(text) => text,
        Generated::Failed(message) => return Err(AppError::Upstream(message)),
    };

    let mut tx = state.db.pool.begin().await?;
    let project = snippets::find_or_create_project(&mut tx, &user.id, &project_name).await?;
    let snippet = snippets::insert_snippet(
        &mut tx,
        NewSnippet {
            user_id: user.id.clone(),
            project_id: Some(project.id),
            name_or_title: Some(project_name),
            code: Some(content),
            is_user_submitted: true,
            is_repo,
            ..Default::default()
        },
    )
    .await?;
    let doc = snippets::attach_documentation(&mut tx, &snippet, &documentation).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, snippet_id = %snippet.id, "Submission documented");

    Ok(Json(json!({
        "documentation_id": doc.id,
        "documentation": documentation,
    })))
}
