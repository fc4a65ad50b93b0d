/// Workflow management REST API endpoints
///
/// Listing and reading need any signed-in user; creating and updating need
/// MANAGER; deleting needs ADMIN.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};

use crate::{
    api::{
        extract::{AdminRole, Authorized, CurrentUser, JsonBody, ManagerRole},
        AppState,
    },
    error::{AppError, AppResult},
    workflow::types::{
        BulkDeleteInput, CreateWorkflowInput, ListQuery, UpdateWorkflowInput, Workflow,
        WorkflowPage,
    },
};

pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/workflows",
            get(list_workflows).post(create_workflow).delete(bulk_delete_workflows),
        )
        .route(
            "/api/workflows/{id}",
            get(get_workflow).patch(update_workflow).delete(delete_workflow),
        )
}

/// GET /api/workflows?page&limit&search
async fn list_workflows(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<WorkflowPage>> {
    let Query(query) = query.map_err(|e| AppError::invalid("query", e.body_text()))?;
    Ok(Json(state.workflows.list(&query).await?))
}

/// POST /api/workflows
async fn create_workflow(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<ManagerRole>,
    JsonBody(input): JsonBody<CreateWorkflowInput>,
) -> AppResult<impl IntoResponse> {
    let workflow = state.workflows.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /api/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Workflow>> {
    Ok(Json(state.workflows.get(&id).await?))
}

/// PATCH /api/workflows/{id}
///
/// When `phases` is present it replaces the workflow's phase list; tasks of
/// every listed existing phase are recreated.
async fn update_workflow(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<ManagerRole>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateWorkflowInput>,
) -> AppResult<Json<Workflow>> {
    Ok(Json(state.workflows.update(&caller, &id, input).await?))
}

/// DELETE /api/workflows/{id}
async fn delete_workflow(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AdminRole>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    state.workflows.delete(&caller, &id).await?;
    Ok(Json(json!({ "message": "Workflow deleted successfully" })))
}

/// DELETE /api/workflows with body { "ids": [...] }
async fn bulk_delete_workflows(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AdminRole>,
    JsonBody(input): JsonBody<BulkDeleteInput>,
) -> AppResult<StatusCode> {
    state.workflows.bulk_delete(&caller, &input.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}
