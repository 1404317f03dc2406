use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    db::models::User,
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::{
        credentials::{generate_api_key, hash_password, verify_password},
        rate_limit::{enforce, DAY, MINUTE},
        tokens::TokenKind,
    },
    AppState,
};

/// Account routes that need no authentication.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/signup",
            post(signup).layer(from_fn_with_state(
                state.limiter.quota("signup", 5, MINUTE),
                enforce,
            )),
        )
        .route("/verify/:id", get(verify))
        .route(
            "/login",
            post(login).layer(from_fn_with_state(
                state.limiter.quota("login", 10, MINUTE),
                enforce,
            )),
        )
        .route("/refresh", post(refresh))
}

/// Account routes behind a session token.
pub fn session_router(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/generate_key",
        post(generate_key).layer(from_fn_with_state(
            state.limiter.quota("generate_key", 3, DAY),
            enforce,
        )),
    )
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
    pub message: String,
}

async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(body) = payload?;
    if body.email.is_empty() || !body.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if body.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&body.email)
        .fetch_one(&state.db.pool)
        .await?;

    if existing > 0 {
        return Err(AppError::Validation("Email already registered".to_string()));
    }

    let password_hash = hash_password(&body.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?) \
         RETURNING id, name, email, password_hash, role, is_verified, created_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(body.name.trim())
    .bind(&body.email)
    .bind(&password_hash)
    .bind(Utc::now())
    .fetch_one(&state.db.pool)
    .await?;

    let link = format!(
        "{}/api/v1/verify/{}",
        state.config.public_url.trim_end_matches('/'),
        user.id
    );
    if let Err(e) = state.mailer.send_verification(&user, &link).await {
        tracing::error!(error = %e, user_id = %user.id, "Failed to send verification mail");
    }

    tracing::info!(user_id = %user.id, "User created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created. Please check your email for verification." })),
    ))
}

async fn verify(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let updated = sqlx::query("UPDATE users SET is_verified = 1 WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Validation("Verification failed.".to_string()));
    }

    Ok(Json(json!({ "message": "User verified successfully." })))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(body) = payload?;
    let invalid = || AppError::Unauthorized("Invalid credentials.".to_string());

    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, role, is_verified, created_at FROM users WHERE email = ?",
    )
    .bind(&body.email)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(invalid)?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(invalid());
    }
    if !user.is_verified {
        return Err(AppError::Unauthorized(
            "Please verify your email first.".to_string(),
        ));
    }

    let pair = state.tokens.issue_pair(&user.id)?;

    Ok(Json(LoginResponse {
        token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;

    let token = request
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Refresh token is required".to_string()))?;

    let user_id = state
        .tokens
        .verify(&token, TokenKind::Refresh)
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token.".to_string()))?;

    let pair = state.tokens.issue_pair(&user_id)?;

    Ok(Json(json!({
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
    })))
}

async fn generate_key(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<(StatusCode, Json<ApiKeyResponse>)> {
    let key = generate_api_key();

    sqlx::query("INSERT INTO api_keys (id, key, user_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(&key)
        .bind(&user.id)
        .bind(Utc::now())
        .execute(&state.db.pool)
        .await?;

    tracing::info!(user_id = %user.id, "API key generated");

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyResponse {
            api_key: key,
            message: "Store this API key safely. It won't be shown again.".to_string(),
        }),
    ))
}
