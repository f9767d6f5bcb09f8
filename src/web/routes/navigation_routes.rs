use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::enums::{self, UserRole};
use crate::navigation::{Destination, Shell, ShellView};
use crate::services::inspection_service::{self, DashboardStats};
use crate::web::{
    AppState,
    error::AppError,
    models::{AuthenticatedUser, Locale},
};

pub fn create_navigation_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/navigation", get(navigation))
        .route("/api/dashboard", get(dashboard))
}

#[derive(Debug, Deserialize)]
pub struct NavigationQuery {
    pub active: Option<Destination>,
}

async fn navigation(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Extension(locale): Extension<Locale>,
    Query(query): Query<NavigationQuery>,
) -> Result<Json<ShellView>, AppError> {
    let mut shell = Shell::new(auth_user.actor());
    if let Some(destination) = query.active {
        if !shell.set_active(destination) {
            return Err(AppError::Forbidden(format!(
                "Role {} may not open this page",
                auth_user.role
            )));
        }
    }
    Ok(Json(shell.view(locale.as_str())))
}

async fn dashboard(
    State(app_state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = inspection_service::dashboard_stats(&app_state.backend, &auth_user.actor()).await?;
    Ok(Json(stats))
}

#[derive(Serialize)]
pub struct RoleOption {
    value: UserRole,
    label: String,
}

#[derive(Serialize)]
pub struct Catalog {
    brands: &'static [&'static str],
    colors: &'static [&'static str],
    registrable_roles: Vec<RoleOption>,
}

/// Public: the registration form needs the role options before login.
pub async fn catalog(Extension(locale): Extension<Locale>) -> Json<Catalog> {
    let registrable_roles = UserRole::ALL
        .into_iter()
        .filter(UserRole::is_self_registrable)
        .map(|role| RoleOption {
            value: role,
            label: role.label(locale.as_str()),
        })
        .collect();

    Json(Catalog {
        brands: enums::CAR_BRANDS,
        colors: enums::CAR_COLORS,
        registrable_roles,
    })
}
