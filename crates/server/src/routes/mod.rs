pub mod auth;
pub mod documentation;
pub mod snippets;
pub mod tasks;

use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::{
    middleware::auth::{authenticate, AuthGate, Requirement},
    AppState,
};

/// Everything served under `/api/v1`.
pub fn router(state: &AppState) -> Router<AppState> {
    let session = Router::new()
        .merge(auth::session_router(state))
        .merge(snippets::session_router(state))
        .merge(documentation::session_router(state))
        .merge(tasks::router())
        .route_layer(from_fn_with_state(
            AuthGate::new(state.clone(), Requirement::Session),
            authenticate,
        ));

    let api_key = Router::new()
        .merge(snippets::api_key_router(state))
        .merge(documentation::api_key_router(state))
        .route_layer(from_fn_with_state(
            AuthGate::new(state.clone(), Requirement::ApiKey),
            authenticate,
        ));

    Router::new()
        .route("/", get(index))
        .merge(auth::router(state))
        .merge(session)
        .merge(api_key)
}

async fn index() -> Json<Value> {
    let endpoints = [
        ("/signup", "POST", "Create a new user account"),
        ("/verify/:id", "GET", "Verify a user's email address"),
        ("/login", "POST", "Authenticate and receive access token"),
        ("/refresh", "POST", "Refresh access token"),
        ("/generate_key", "POST", "Generate a new API key"),
        ("/gather", "POST", "Gather code snippets from various sources"),
        ("/data", "GET", "Retrieve gathered code snippets"),
        ("/user-snippets", "GET", "Retrieve submitted code snippets"),
        ("/dashboard", "GET", "Snippet counts and submitted snippets"),
        ("/documentation", "GET", "Generate documentation for code snippets"),
        ("/documentation/:id", "GET", "Retrieve documentation for a specific snippet"),
        ("/documentation/generate/:id", "POST", "Regenerate documentation for a snippet"),
        ("/search", "GET", "Search for code snippets"),
        ("/submit", "POST", "Submit code or repository for documentation"),
        ("/submit-correction", "POST", "Submit a correction for existing documentation"),
        ("/tasks/:id", "GET", "Status of a documentation task"),
    ];

    Json(json!({
        "message": "Welcome to the CodeBase API",
        "version": "1.0",
        "endpoints": endpoints
            .iter()
            .map(|(path, method, description)| {
                json!({ "path": path, "method": method, "description": description })
            })
            .collect::<Vec<_>>(),
    }))
}
