use async_trait::async_trait;
use axum::Extension;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::task;
use tracing::{info, warn};

use super::StoreBackend;
use crate::db::entities::user;
use crate::db::memory_service::user_service::{self, NewUser};
use crate::web::error::AppError;
use crate::web::models::{AuthenticatedUser, Claims, LoginResponse, UserResponse};
use crate::workflows::auth_form::{AuthBackend, Registration};

pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_string();
    task::spawn_blocking(move || hash(password, cost))
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .map_err(|e| AppError::PasswordHashingError(e.to_string()))
}

async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))
}

pub async fn login_user(
    backend: &StoreBackend,
    username: &str,
    password: &str,
) -> Result<user::Model, AppError> {
    let user = user_service::get_user_by_username(&backend.pool, username)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash).await? {
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_active {
        warn!(user_id = %user.id, "Login attempt on a disabled account.");
        return Err(AppError::AccountDisabled);
    }

    Ok(user)
}

pub async fn register_user(
    backend: &StoreBackend,
    registration: Registration,
) -> Result<user::Model, AppError> {
    let password_hash = hash_password(&registration.password, backend.bcrypt_cost).await?;
    let user = user_service::create_user(
        &backend.pool,
        NewUser {
            username: registration.username,
            password_hash,
            role: registration.role,
            national_id: registration.national_id,
        },
    )
    .await?;
    info!(user_id = %user.id, username = %user.username, role = %user.role, "User registered.");
    Ok(user)
}

pub fn create_jwt_for_user(
    user: &user::Model,
    jwt_secret: &str,
    ttl_hours: i64,
) -> Result<LoginResponse, AppError> {
    let expiration = Duration::try_hours(ttl_hours)
        .filter(|ttl| *ttl > Duration::zero())
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AppError::TokenCreationError(format!("Invalid token lifetime: {ttl_hours}h")))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id.clone(),
        exp: expiration,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::TokenCreationError(e.to_string()))?;

    Ok(LoginResponse {
        token,
        user: UserResponse::from(user),
    })
}

pub async fn me(
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<axum::Json<UserResponse>, AppError> {
    Ok(axum::Json(UserResponse {
        id: user.id,
        username: user.username,
        role: user.role,
    }))
}

#[async_trait]
impl AuthBackend for StoreBackend {
    async fn login(&self, username: &str, password: &str) -> Result<user::Model, AppError> {
        login_user(self, username, password).await
    }

    async fn register(&self, registration: Registration) -> Result<user::Model, AppError> {
        register_user(self, registration).await
    }
}
