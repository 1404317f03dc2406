use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::tasks::TaskRecord,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/tasks/:id", get(task_status))
}

/// Tasks are only visible to the user who queued them.
async fn task_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskRecord>> {
    state
        .tasks
        .status(id)
        .await
        .filter(|record| record.owner_id == user.id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}
