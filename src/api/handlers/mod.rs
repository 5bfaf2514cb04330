use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::middleware::CurrentUser;
use crate::db::Database;
use crate::engine::GoalEngine;
use crate::error::{ErrorKind, GoalError};
use crate::models::*;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Map a typed error to a status code by its kind.
///
/// Storage failures are logged in full server-side; clients only see a
/// generic message.
fn error_response(e: GoalError) -> (StatusCode, String) {
    let status = match e.kind() {
        ErrorKind::Validation | ErrorKind::Rejected => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Storage => return internal_error(e),
    };

    tracing::warn!("Request rejected: {}", e);
    (status, e.to_string())
}

/// Log an internal error and return a sanitized response.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Articles
// ============================================================

pub async fn list_articles(State(db): State<Database>) -> ApiResult<Json<Vec<Article>>> {
    db.get_all_articles().map(Json).map_err(internal_error)
}

pub async fn get_article(
    State(db): State<Database>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Article>> {
    db.get_article(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Article not found".to_string()))
}

pub async fn create_article(
    State(db): State<Database>,
    Json(input): Json<CreateArticleInput>,
) -> ApiResult<(StatusCode, Json<Article>)> {
    db.create_article(input)
        .map(|a| (StatusCode::CREATED, Json(a)))
        .map_err(error_response)
}

// ============================================================
// Goals
// ============================================================

pub async fn list_goals(
    State(goals): State<GoalEngine>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<Goal>>> {
    goals.get_user_goals(user_id).map(Json).map_err(error_response)
}

pub async fn create_goal(
    State(goals): State<GoalEngine>,
    CurrentUser(user_id): CurrentUser,
    Json(input): Json<CreateGoalInput>,
) -> ApiResult<(StatusCode, Json<Goal>)> {
    goals
        .create_goal(user_id, input)
        .map(|g| (StatusCode::CREATED, Json(g)))
        .map_err(error_response)
}

pub async fn get_goal(
    State(goals): State<GoalEngine>,
    CurrentUser(user_id): CurrentUser,
    Path(goal_id): Path<i64>,
) -> ApiResult<Json<Goal>> {
    goals
        .get_goal_by_id(user_id, goal_id)
        .map(Json)
        .map_err(error_response)
}

pub async fn get_goal_progress(
    State(goals): State<GoalEngine>,
    CurrentUser(user_id): CurrentUser,
    Path(goal_id): Path<i64>,
) -> ApiResult<Json<GoalWithProgress>> {
    goals
        .get_goal_progress(user_id, goal_id)
        .map(Json)
        .map_err(error_response)
}

pub async fn update_goal(
    State(goals): State<GoalEngine>,
    CurrentUser(user_id): CurrentUser,
    Path(goal_id): Path<i64>,
    Json(input): Json<UpdateGoalInput>,
) -> ApiResult<Json<GoalWithProgress>> {
    goals
        .update_goal(user_id, goal_id, input)
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_goal(
    State(goals): State<GoalEngine>,
    CurrentUser(user_id): CurrentUser,
    Path(goal_id): Path<i64>,
) -> ApiResult<StatusCode> {
    goals
        .delete_goal(user_id, goal_id)
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

pub async fn complete_article(
    State(goals): State<GoalEngine>,
    CurrentUser(user_id): CurrentUser,
    Path((goal_id, article_id)): Path<(i64, i64)>,
) -> ApiResult<Json<GoalWithProgress>> {
    goals
        .complete_article_progress(goal_id, article_id, user_id)
        .map(Json)
        .map_err(error_response)
}

pub async fn reopen_article(
    State(goals): State<GoalEngine>,
    CurrentUser(user_id): CurrentUser,
    Path((goal_id, article_id)): Path<(i64, i64)>,
) -> ApiResult<Json<GoalWithProgress>> {
    goals
        .reopen_article_progress(goal_id, article_id, user_id)
        .map(Json)
        .map_err(error_response)
}
