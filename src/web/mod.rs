use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, State},
    http::Method,
    middleware as axum_middleware,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::db::memory_service::MemoryPool;
use crate::navigation::Permission;
use crate::server::config::ServerConfig;
use crate::services::{StoreBackend, auth_service, summary_service::SummaryService};
use crate::web::{
    error::AppError,
    middleware::{auth, i18n},
    models::{LoginRequest, LoginResponse, RegisterRequest, UserResponse, Locale},
    routes::*,
};
use crate::workflows::{
    Actor,
    auth_form::{AuthForm, AuthFormData, AuthMode, AuthOutcome},
};

pub mod drafts;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

pub use drafts::DraftStore;

#[derive(Clone)]
pub struct AppState {
    pub backend: StoreBackend,
    pub drafts: DraftStore,
    pub summary: SummaryService,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>, pool: MemoryPool, summary: SummaryService) -> Self {
        Self {
            backend: StoreBackend::new(pool, config.bcrypt_cost),
            drafts: DraftStore::new(config.max_drafts_per_user),
            summary,
            config,
        }
    }
}

pub(crate) fn ensure_permission(actor: &Actor, permission: Permission) -> Result<(), AppError> {
    if actor.can(permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role {} may not perform this action",
            actor.role
        )))
    }
}

#[derive(Serialize)]
struct RegisterResponse {
    user: UserResponse,
    /// The form the client should show next.
    mode: AuthMode,
}

async fn register_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(locale): Extension<Locale>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let mut form = AuthForm::with_data(
        AuthMode::Register,
        AuthFormData {
            username: payload.username,
            password: payload.password,
            role: payload.role.unwrap_or_default(),
            national_id: payload.national_id.unwrap_or_default(),
        },
    );

    match form.submit(&app_state.backend).await? {
        AuthOutcome::Registered(user) => Ok(Json(RegisterResponse {
            user: UserResponse::from(&user),
            mode: form.mode(),
        })),
        AuthOutcome::Invalid(errors) => Err(AppError::Validation(errors.localized(locale.as_str()))),
        AuthOutcome::LoggedIn(_) => Err(AppError::InternalServerError(
            "Registration form produced a login".to_string(),
        )),
    }
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(locale): Extension<Locale>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let mut form = AuthForm::with_data(
        AuthMode::Login,
        AuthFormData {
            username: payload.username,
            password: payload.password,
            ..Default::default()
        },
    );

    let user = match form.submit(&app_state.backend).await? {
        AuthOutcome::LoggedIn(user) => user,
        AuthOutcome::Invalid(errors) => {
            return Err(AppError::Validation(errors.localized(locale.as_str())));
        }
        AuthOutcome::Registered(_) => {
            return Err(AppError::InternalServerError(
                "Login form produced a registration".to_string(),
            ));
        }
    };

    let login_response = auth_service::create_jwt_for_user(
        &user,
        &app_state.config.jwt_secret,
        app_state.config.token_ttl_hours,
    )?;
    info!(user_id = %user.id, role = %user.role, "User logged in.");

    let auth_cookie = Cookie::build(("token", login_response.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    Ok((jar.add(auth_cookie), Json(login_response)))
}

async fn logout_handler(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.remove(Cookie::build("token").path("/"));
    (jar, Json(serde_json::json!({ "ok": true })))
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: AppState) -> Router {
    let app_state = Arc::new(app_state);
    let max_upload_bytes = app_state.config.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/auth/me", get(auth_service::me))
        .merge(navigation_routes::create_navigation_router())
        .nest("/api/cars", car_routes::create_car_router())
        .nest(
            "/api/drafts",
            draft_routes::create_draft_router()
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .nest("/api/edit-requests", edit_request_routes::create_edit_request_router())
        .nest("/api/users", user_routes::create_user_router())
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth));

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/catalog", get(navigation_routes::catalog))
        .merge(protected)
        .with_state(app_state.clone())
        .layer(axum_middleware::from_fn_with_state(app_state, i18n::i18n_middleware))
        .layer(cors)
}
