use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use std::sync::Arc;

use crate::db::entities::edit_request;
use crate::db::memory_service::edit_request_service;
use crate::navigation::Permission;
use crate::web::{AppState, ensure_permission, error::AppError, models::AuthenticatedUser};

pub fn create_edit_request_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_pending))
        .route("/{id}", get(get_request))
        .route("/{id}/approve", post(approve))
        .route("/{id}/reject", post(reject))
}

async fn list_pending(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<edit_request::Model>>, AppError> {
    ensure_permission(&auth_user.actor(), Permission::ReviewEditRequests)?;
    let pending = edit_request_service::list_pending(&app_state.backend.pool).await?;
    Ok(Json(pending))
}

async fn get_request(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<edit_request::Model>, AppError> {
    let request = edit_request_service::get_edit_request(&app_state.backend.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Edit request {id} not found")))?;
    // Requesters may follow their own request; reviewers see all.
    if request.requester_id != auth_user.id {
        ensure_permission(&auth_user.actor(), Permission::ReviewEditRequests)?;
    }
    Ok(Json(request))
}

async fn review(
    app_state: &AppState,
    auth_user: &AuthenticatedUser,
    id: &str,
    approve: bool,
) -> Result<Json<edit_request::Model>, AppError> {
    ensure_permission(&auth_user.actor(), Permission::ReviewEditRequests)?;
    let reviewed =
        edit_request_service::review(&app_state.backend.pool, id, &auth_user.id, approve).await?;
    Ok(Json(reviewed))
}

async fn approve(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<edit_request::Model>, AppError> {
    review(&app_state, &auth_user, &id, true).await
}

async fn reject(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<edit_request::Model>, AppError> {
    review(&app_state, &auth_user, &id, false).await
}
