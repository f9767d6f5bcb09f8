use serde::{Deserialize, Serialize};

use crate::db::{entities::user, enums::UserRole};
use crate::workflows::Actor;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub national_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: UserRole,
}

impl From<&user::Model> for UserResponse {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub user_id: String,
    pub exp: usize,
}

/// Struct to hold authenticated user details, to be passed as a request extension.
/// The role is read from the store on every request, not from the token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub username: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Negotiated message locale, inserted by the i18n middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
