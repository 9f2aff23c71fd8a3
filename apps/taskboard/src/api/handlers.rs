//! Request handlers.

use super::{ApiError, AppState};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskboard_core::analytics::{
    self, CourseAnalytics, DashboardStats, KanbanColumn, PerformanceReport, SystemStats,
    UserActivity,
};
use taskboard_core::{NewTask, Task, TaskFilter, TaskId, TaskPatch};

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

/// Query string of `GET /api/tasks`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub course: Option<String>,
    pub q: Option<String>,
}

impl ListParams {
    fn filter(&self) -> Result<TaskFilter, ApiError> {
        Ok(TaskFilter::from_params(
            self.user_id.as_deref(),
            self.status.as_deref(),
            self.priority.as_deref(),
            self.course.as_deref(),
            self.q.as_deref(),
        )?)
    }
}

/// Query string of the per-student views.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerParams {
    pub user_id: Option<String>,
}

/// Optional row cap for the ranked analytics views.
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

/// Query string of `GET /api/analytics/performance`.
#[derive(Debug, Default, Deserialize)]
pub struct PerformanceParams {
    pub weeks: Option<usize>,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    tracing::debug!(error = %rejection, "rejected request body");
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge(rejection.body_text());
    }
    ApiError::BadRequest(rejection.body_text())
}

fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

fn parse_id(raw: &str) -> Result<TaskId, ApiError> {
    Ok(raw.parse::<TaskId>()?)
}

async fn owned_tasks(state: &AppState, user_id: Option<&str>) -> Result<Vec<Task>, ApiError> {
    let filter = TaskFilter::from_params(user_id, None, None, None, None)?;
    state.read(move |store| store.list(&filter)).await
}

// =============================================================================
// LIVENESS
// =============================================================================

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Backend running. Use /health or /api/*",
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn api_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}

// =============================================================================
// TASKS
// =============================================================================

/// `GET /api/tasks`
pub async fn list_tasks(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let Query(params) = params.map_err(bad_query)?;
    let filter = params.filter()?;
    let tasks = state.read(move |store| store.list(&filter)).await?;
    Ok(Json(tasks))
}

/// `POST /api/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Json(body) = body.map_err(bad_json)?;
    let draft = body.validate()?;

    let now = Utc::now();
    let task = state.write(move |store| store.insert(draft, now)).await?;
    tracing::info!(id = %task.id, title = %task.title, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /api/tasks/{id}`
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id)?;
    state
        .read(move |store| store.get(id))
        .await?
        .map(Json)
        .ok_or_else(ApiError::task_not_found)
}

/// `PUT /api/tasks/{id}`
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = body.map_err(bad_json)?;
    let changes = body.validate()?;

    let now = Utc::now();
    let task = state
        .write(move |store| store.update(id, &changes, now))
        .await?
        .ok_or_else(ApiError::task_not_found)?;
    tracing::info!(id = %task.id, status = %task.status, "task updated");
    Ok(Json(task))
}

/// `DELETE /api/tasks/{id}`
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.write(move |store| store.delete(id)).await? {
        tracing::info!(%id, "task deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::task_not_found())
    }
}

/// `GET /api/tasks/stats`
pub async fn task_stats(
    State(state): State<AppState>,
    params: Result<Query<OwnerParams>, QueryRejection>,
) -> Result<Json<DashboardStats>, ApiError> {
    let Query(params) = params.map_err(bad_query)?;
    let tasks = owned_tasks(&state, params.user_id.as_deref()).await?;
    Ok(Json(analytics::dashboard_stats(&tasks, Utc::now())))
}

/// `GET /api/tasks/kanban`
pub async fn task_kanban(
    State(state): State<AppState>,
    params: Result<Query<OwnerParams>, QueryRejection>,
) -> Result<Json<Vec<KanbanColumn>>, ApiError> {
    let Query(params) = params.map_err(bad_query)?;
    let tasks = owned_tasks(&state, params.user_id.as_deref()).await?;
    Ok(Json(analytics::kanban(&tasks)))
}

// =============================================================================
// ANALYTICS
// =============================================================================

/// `GET /api/analytics/system`
pub async fn system_analytics(
    State(state): State<AppState>,
) -> Result<Json<SystemStats>, ApiError> {
    let tasks = state.read(|store| store.all()).await?;
    Ok(Json(analytics::system_stats(&tasks, Utc::now())))
}

/// `GET /api/analytics/courses`
pub async fn course_analytics(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<CourseAnalytics>>, ApiError> {
    let Query(params) = params.map_err(bad_query)?;
    let tasks = state.read(|store| store.all()).await?;
    let rows = analytics::course_analytics(&tasks);
    let rows = match params.limit {
        Some(limit) => analytics::top_courses(&rows, limit),
        None => rows,
    };
    Ok(Json(rows))
}

/// `GET /api/analytics/users`
pub async fn user_analytics(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<UserActivity>>, ApiError> {
    let Query(params) = params.map_err(bad_query)?;
    let tasks = state.read(|store| store.all()).await?;
    let mut rows = analytics::user_activity(&tasks);
    if let Some(limit) = params.limit {
        rows.truncate(limit);
    }
    Ok(Json(rows))
}

/// `GET /api/analytics/grading`
pub async fn grading_queue(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state.read(|store| store.all()).await?;
    let waiting = analytics::pending_grading(&tasks).into_iter().cloned().collect();
    Ok(Json(waiting))
}

/// `GET /api/analytics/performance`
pub async fn performance_analytics(
    State(state): State<AppState>,
    params: Result<Query<PerformanceParams>, QueryRejection>,
) -> Result<Json<PerformanceReport>, ApiError> {
    let Query(params) = params.map_err(bad_query)?;
    let weeks = params
        .weeks
        .unwrap_or(analytics::DEFAULT_PERFORMANCE_PERIODS);
    let tasks = state.read(|store| store.all()).await?;
    Ok(Json(analytics::weekly_performance(&tasks, Utc::now(), weeks)))
}
