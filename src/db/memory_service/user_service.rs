use chrono::Utc;
use dashmap::mapref::entry::Entry;
use tracing::info;

use super::{MemoryStore, new_id};
use crate::db::{entities::user, enums::UserRole};
use crate::web::error::AppError;

pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
    pub national_id: Option<String>,
}

pub async fn get_user_by_username(
    store: &MemoryStore,
    username: &str,
) -> Result<Option<user::Model>, AppError> {
    let Some(id) = store.usernames.get(username).map(|id| id.value().clone()) else {
        return Ok(None);
    };
    get_user_by_id(store, &id).await
}

pub async fn get_user_by_id(
    store: &MemoryStore,
    user_id: &str,
) -> Result<Option<user::Model>, AppError> {
    Ok(store.users.get(user_id).map(|u| u.value().clone()))
}

pub async fn list_users(store: &MemoryStore) -> Result<Vec<user::Model>, AppError> {
    let mut users: Vec<user::Model> = store.users.iter().map(|u| u.value().clone()).collect();
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.username.cmp(&b.username)));
    Ok(users)
}

pub async fn count_users(store: &MemoryStore) -> Result<usize, AppError> {
    Ok(store.users.len())
}

pub async fn create_user(store: &MemoryStore, new_user: NewUser) -> Result<user::Model, AppError> {
    let id = new_id();
    // The username index entry is the uniqueness lock.
    match store.usernames.entry(new_user.username.clone()) {
        Entry::Occupied(_) => {
            return Err(AppError::UserAlreadyExists(new_user.username));
        }
        Entry::Vacant(slot) => {
            slot.insert(id.clone());
        }
    }

    let now = Utc::now();
    let user_model = user::Model {
        id: id.clone(),
        username: new_user.username,
        password_hash: new_user.password_hash,
        role: new_user.role,
        national_id: new_user.national_id,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    store.users.insert(id, user_model.clone());
    Ok(user_model)
}

fn modify_user<F>(store: &MemoryStore, user_id: &str, f: F) -> Result<user::Model, AppError>
where
    F: FnOnce(&mut user::Model),
{
    let mut entry = store
        .users
        .get_mut(user_id)
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
    f(entry.value_mut());
    entry.updated_at = Utc::now();
    Ok(entry.value().clone())
}

pub async fn toggle_status(store: &MemoryStore, user_id: &str) -> Result<user::Model, AppError> {
    modify_user(store, user_id, |u| u.is_active = !u.is_active)
}

pub async fn update_role(
    store: &MemoryStore,
    user_id: &str,
    role: UserRole,
) -> Result<user::Model, AppError> {
    modify_user(store, user_id, |u| u.role = role)
}

pub async fn update_password(
    store: &MemoryStore,
    user_id: &str,
    password_hash: String,
) -> Result<user::Model, AppError> {
    modify_user(store, user_id, |u| u.password_hash = password_hash)
}

pub async fn delete_user(store: &MemoryStore, user_id: &str) -> Result<(), AppError> {
    let (_, removed) = store
        .users
        .remove(user_id)
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
    store.usernames.remove(&removed.username);
    info!(user_id = %removed.id, username = %removed.username, "User deleted.");
    Ok(())
}

/// Creates the bootstrap administrator if no account with that username
/// exists yet. Returns whether an account was created.
pub async fn ensure_admin(
    store: &MemoryStore,
    username: &str,
    password_hash: String,
) -> Result<bool, AppError> {
    if get_user_by_username(store, username).await?.is_some() {
        return Ok(false);
    }
    create_user(
        store,
        NewUser {
            username: username.to_string(),
            password_hash,
            role: UserRole::Admin,
            national_id: None,
        },
    )
    .await?;
    Ok(true)
}
