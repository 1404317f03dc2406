use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db::{models::CodeSnippet, snippets},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::{
        docgen::{DocumentationRequest, Generated},
        rate_limit::{enforce, HOUR},
    },
    AppState,
};

const DEFAULT_BATCH: i64 = 5;
const MAX_BATCH: i64 = 50;

pub fn session_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/documentation/:id", get(get_documentation))
        .route("/documentation/generate/:id", post(generate_for_snippet))
        .route(
            "/submit-correction",
            post(submit_correction).layer(from_fn_with_state(
                state.limiter.quota("submit-correction", 20, HOUR),
                enforce,
            )),
        )
}

pub fn api_key_router(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/documentation",
        get(enqueue_batch).layer(from_fn_with_state(
            state.limiter.quota("documentation", 20, HOUR),
            enforce,
        )),
    )
}

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub documentation_id: Option<String>,
    pub correction: Option<String>,
}

/// Queue documentation tasks for the caller's undocumented snippets.
async fn enqueue_batch(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BatchQuery>,
) -> Result<(StatusCode, Json<Value>)> {
    let limit = query.limit.unwrap_or(DEFAULT_BATCH).clamp(1, MAX_BATCH);
    let pending = snippets::undocumented_snippets(&state.db.pool, &user.id, limit).await?;

    let mut task_ids = Vec::with_capacity(pending.len());
    for snippet in &pending {
        let handle = state.tasks.enqueue(&snippet.id, &user.id).await?;
        task_ids.push(handle.id);
    }

    tracing::info!(
        user_id = %user.id,
        "Started documentation generation for {} code snippets",
        pending.len()
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": format!("Documentation generation started for {} snippets", pending.len()),
            "task_ids": task_ids,
        })),
    ))
}

async fn owned_snippet(state: &AppState, user: &AuthUser, id: &str) -> Result<CodeSnippet> {
    let snippet = snippets::find_snippet(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Snippet not found".to_string()))?;

    if snippet.user_id != user.id {
        return Err(AppError::Forbidden("Unauthorized access".to_string()));
    }

    Ok(snippet)
}

async fn get_documentation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let snippet = owned_snippet(&state, &user, &id).await?;

    let documentation = snippets::documentation_for_snippet(&state.db.pool, &snippet.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Documentation not found".to_string()))?;

    Ok(Json(json!({ "documentation": documentation.content })))
}

async fn generate_for_snippet(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let snippet = owned_snippet(&state, &user, &id).await?;

    let request = DocumentationRequest::for_snippet(&snippet)
        .ok_or_else(|| AppError::Validation("Repository URL is missing".to_string()))?;

    let content = match state.docs.generate(&request).await {
        Generated::Documentation(text) => text,
        Generated::Failed(message) => return Err(AppError::Upstream(message)),
    };

    snippets::document_snippet(&state.db.pool, &snippet, &content).await?;

    tracing::info!(user_id = %user.id, snippet_id = %snippet.id, "Documentation generated");

    Ok(Json(json!({
        "message": "Documentation generated successfully",
        "documentation": content,
    })))
}

async fn submit_correction(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CorrectionRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = payload?;
    let documentation_id = body
        .documentation_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("documentation_id is required".to_string()))?;
    let content = body
        .correction
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::Validation("correction is required".to_string()))?;

    let documentation = snippets::find_documentation(&state.db.pool, &documentation_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Documentation not found".to_string()))?;

    let correction =
        snippets::insert_correction(&state.db.pool, &documentation.id, &user.id, &content).await?;

    Ok(Json(json!({
        "message": "Correction submitted successfully.",
        "correction_id": correction.id,
    })))
}
