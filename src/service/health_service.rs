use crate::common::app_error::AppError;
use crate::common::app_state::AppState;
use crate::handle_response;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::Response;
use std::convert::Infallible;

pub async fn health(State(state): State<AppState>) -> Result<Response, Infallible> {
    handle_response!(health_with_error(state).await, "ok")
}
async fn health_with_error(state: AppState) -> Result<serde_json::Value, AppError> {
    sqlx::query("SELECT 1").execute(&state.db_pool).await?;
    Ok(json!({
        "database": "up",
        "running_tasks": state.executor.running_count(),
    }))
}
