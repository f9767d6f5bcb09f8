use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::{enums::UserRole, memory_service::user_service};
use crate::navigation::Permission;
use crate::web::{
    AppState, ensure_permission,
    error::AppError,
    models::{AuthenticatedUser, Locale},
};
use crate::workflows::user_management::{Denial, MutationOutcome, UserManagement, UserRow};

pub fn create_user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", axum::routing::delete(delete_user))
        .route("/{id}/status", put(toggle_status))
        .route("/{id}/role", put(update_role))
        .route("/{id}/password", put(update_password))
}

fn outcome_to_result(outcome: MutationOutcome, locale: &Locale) -> Result<(), AppError> {
    match outcome {
        MutationOutcome::Applied => Ok(()),
        MutationOutcome::Denied(denial @ (Denial::EmptyPassword | Denial::NotEditing)) => {
            Err(AppError::InvalidInput(denial.to_string()))
        }
        MutationOutcome::Denied(denial) => Err(AppError::Forbidden(denial.to_string())),
        MutationOutcome::Invalid(errors) => Err(AppError::Validation(errors.localized(locale.as_str()))),
    }
}

async fn row_for(
    app_state: &AppState,
    management: &UserManagement,
    user_id: &str,
) -> Result<Json<UserRow>, AppError> {
    let user = user_service::get_user_by_id(&app_state.backend.pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
    management
        .rows(std::slice::from_ref(&user))
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::InternalServerError("Empty user row".to_string()))
}

async fn list_users(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<UserRow>>, AppError> {
    let actor = auth_user.actor();
    ensure_permission(&actor, Permission::ViewUsers)?;
    let users = user_service::list_users(&app_state.backend.pool).await?;
    Ok(Json(UserManagement::new(actor).rows(&users)))
}

async fn toggle_status(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path(id): Path<String>,
) -> Result<Json<UserRow>, AppError> {
    let management = UserManagement::new(auth_user.actor());
    let outcome = management.toggle_status(&app_state.backend, &id).await?;
    outcome_to_result(outcome, &locale)?;
    row_for(&app_state, &management, &id).await
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

async fn update_role(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<UserRow>, AppError> {
    let management = UserManagement::new(auth_user.actor());
    let outcome = management
        .update_role(&app_state.backend, &id, payload.role)
        .await?;
    outcome_to_result(outcome, &locale)?;
    row_for(&app_state, &management, &id).await
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

async fn update_password(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<UserRow>, AppError> {
    let mut management = UserManagement::new(auth_user.actor());
    let outcome = management
        .update_password(&app_state.backend, &id, &payload.password)
        .await?;
    outcome_to_result(outcome, &locale)?;
    row_for(&app_state, &management, &id).await
}

async fn delete_user(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let management = UserManagement::new(auth_user.actor());
    let outcome = management.delete_user(&app_state.backend, &id).await?;
    outcome_to_result(outcome, &locale)?;
    let dropped = app_state.drafts.remove_owned_by(&id);
    if dropped > 0 {
        info!(user_id = %id, dropped, "Dropped drafts of deleted user.");
    }
    Ok(StatusCode::NO_CONTENT)
}
