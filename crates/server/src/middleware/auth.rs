use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::{
    error::AppError,
    services::tokens::TokenKind,
    AppState,
};

/// How a group of routes identifies its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// `Authorization: Bearer <access token>`.
    Session,
    /// `X-API-Key: <key>`.
    ApiKey,
}

#[derive(Clone)]
pub struct AuthGate {
    state: AppState,
    requirement: Requirement,
}

impl AuthGate {
    pub fn new(state: AppState, requirement: Requirement) -> Self {
        Self { state, requirement }
    }
}

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
}

pub async fn authenticate(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = match gate.requirement {
        Requirement::Session => {
            let token = request
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| AppError::Unauthorized("Access token is missing.".to_string()))?;
            resolve_session(&gate.state, token)?
        }
        Requirement::ApiKey => {
            let key = request
                .headers()
                .get("X-API-Key")
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| AppError::Unauthorized("API Key is missing".to_string()))?;
            resolve_api_key(&gate.state, key).await?
        }
    };

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn resolve_session(state: &AppState, header: &str) -> Result<AuthUser, AppError> {
    let token = header
        .split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header format.".to_string()))?;

    let id = state
        .tokens
        .verify(token, TokenKind::Access)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token.".to_string()))?;

    Ok(AuthUser { id })
}

/// Look the key up and stamp `last_used` in the same statement.
async fn resolve_api_key(state: &AppState, key: &str) -> Result<AuthUser, AppError> {
    let owner = sqlx::query_scalar::<_, String>(
        "UPDATE api_keys SET last_used = ? WHERE key = ? RETURNING user_id",
    )
    .bind(Utc::now())
    .bind(key)
    .fetch_optional(&state.db.pool)
    .await?;

    match owner {
        Some(id) => Ok(AuthUser { id }),
        None => Err(AppError::Forbidden("Invalid API Key".to_string())),
    }
}

// Extractor for getting the authenticated user from request extensions
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
