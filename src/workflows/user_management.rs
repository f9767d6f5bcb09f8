use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use super::Actor;
use crate::db::{entities::user, enums::UserRole};
use crate::navigation::Permission;
use crate::validation::{self, Field, FieldErrors};
use crate::web::error::AppError;

/// Persistence callbacks for account administration.
#[async_trait]
pub trait UserAdminBackend: Send + Sync {
    async fn toggle_status(&self, user_id: &str) -> Result<user::Model, AppError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), AppError>;

    async fn update_role(&self, user_id: &str, role: UserRole) -> Result<user::Model, AppError>;

    /// Receives the new plaintext password; hashing is the backend's job.
    async fn update_password(
        &self,
        user_id: &str,
        new_password: &str,
    ) -> Result<user::Model, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    OwnAccount,
    InsufficientRole,
    EmptyPassword,
    NotEditing,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Denial::OwnAccount => "this action is not allowed on your own account",
            Denial::InsufficientRole => "your role does not permit this action",
            Denial::EmptyPassword => "the new password is empty",
            Denial::NotEditing => "no password edit is in progress",
        };
        f.write_str(text)
    }
}

#[derive(Debug)]
pub enum MutationOutcome {
    Applied,
    Denied(Denial),
    Invalid(FieldErrors),
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub role: UserRole,
    pub national_id: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub is_self: bool,
    pub can_toggle_status: bool,
    pub can_change_role: bool,
    pub can_delete: bool,
    pub can_reset_password: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PasswordEdit {
    user_id: String,
    draft: String,
}

/// Account administration on behalf of `actor`. Every operation is checked
/// against the actor's capabilities and refuses to target the actor's own
/// account, except password resets.
#[derive(Debug)]
pub struct UserManagement {
    actor: Actor,
    password_edit: Option<PasswordEdit>,
}

impl UserManagement {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            password_edit: None,
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    fn guard(&self, target_id: &str, permission: Permission) -> Option<Denial> {
        if target_id == self.actor.id {
            Some(Denial::OwnAccount)
        } else if !self.actor.can(permission) {
            Some(Denial::InsufficientRole)
        } else {
            None
        }
    }

    pub fn rows(&self, users: &[user::Model]) -> Vec<UserRow> {
        users
            .iter()
            .map(|u| UserRow {
                id: u.id.clone(),
                username: u.username.clone(),
                role: u.role,
                national_id: u.national_id.clone(),
                is_active: u.is_active,
                created_at: u.created_at,
                is_self: u.id == self.actor.id,
                can_toggle_status: self.guard(&u.id, Permission::ToggleUserStatus).is_none(),
                can_change_role: self.guard(&u.id, Permission::UpdateUserRole).is_none(),
                can_delete: self.guard(&u.id, Permission::DeleteUser).is_none(),
                can_reset_password: self.actor.can(Permission::UpdateUserPassword),
            })
            .collect()
    }

    pub async fn toggle_status<B>(&self, backend: &B, user_id: &str) -> Result<MutationOutcome, AppError>
    where
        B: UserAdminBackend + ?Sized,
    {
        if let Some(denial) = self.guard(user_id, Permission::ToggleUserStatus) {
            return Ok(MutationOutcome::Denied(denial));
        }
        backend.toggle_status(user_id).await?;
        Ok(MutationOutcome::Applied)
    }

    pub async fn delete_user<B>(&self, backend: &B, user_id: &str) -> Result<MutationOutcome, AppError>
    where
        B: UserAdminBackend + ?Sized,
    {
        if let Some(denial) = self.guard(user_id, Permission::DeleteUser) {
            return Ok(MutationOutcome::Denied(denial));
        }
        backend.delete_user(user_id).await?;
        Ok(MutationOutcome::Applied)
    }

    pub async fn update_role<B>(
        &self,
        backend: &B,
        user_id: &str,
        role: UserRole,
    ) -> Result<MutationOutcome, AppError>
    where
        B: UserAdminBackend + ?Sized,
    {
        if let Some(denial) = self.guard(user_id, Permission::UpdateUserRole) {
            return Ok(MutationOutcome::Denied(denial));
        }
        backend.update_role(user_id, role).await?;
        Ok(MutationOutcome::Applied)
    }

    pub fn editing_password_for(&self) -> Option<&str> {
        self.password_edit.as_ref().map(|e| e.user_id.as_str())
    }

    pub fn begin_password_edit(&mut self, user_id: &str) -> Result<(), Denial> {
        if !self.actor.can(Permission::UpdateUserPassword) {
            return Err(Denial::InsufficientRole);
        }
        self.password_edit = Some(PasswordEdit {
            user_id: user_id.to_string(),
            draft: String::new(),
        });
        Ok(())
    }

    pub fn set_password_draft(&mut self, value: impl Into<String>) {
        if let Some(edit) = self.password_edit.as_mut() {
            edit.draft = value.into();
        }
    }

    pub fn cancel_password_edit(&mut self) {
        self.password_edit = None;
    }

    /// Saves the draft and leaves edit mode. A blank draft is a no-op
    /// and keeps edit mode open.
    pub async fn save_password<B>(&mut self, backend: &B) -> Result<MutationOutcome, AppError>
    where
        B: UserAdminBackend + ?Sized,
    {
        let Some(edit) = self.password_edit.as_ref() else {
            return Ok(MutationOutcome::Denied(Denial::NotEditing));
        };
        if edit.draft.trim().is_empty() {
            return Ok(MutationOutcome::Denied(Denial::EmptyPassword));
        }
        let new_password = match validation::check_credential(&edit.draft) {
            Ok(trimmed) => trimmed.to_string(),
            Err(error) => {
                let mut errors = FieldErrors::new();
                errors.insert(Field::Password, error);
                return Ok(MutationOutcome::Invalid(errors));
            }
        };

        backend.update_password(&edit.user_id, &new_password).await?;
        self.password_edit = None;
        Ok(MutationOutcome::Applied)
    }

    pub async fn update_password<B>(
        &mut self,
        backend: &B,
        user_id: &str,
        new_password: &str,
    ) -> Result<MutationOutcome, AppError>
    where
        B: UserAdminBackend + ?Sized,
    {
        if let Err(denial) = self.begin_password_edit(user_id) {
            return Ok(MutationOutcome::Denied(denial));
        }
        self.set_password_draft(new_password);
        let outcome = self.save_password(backend).await?;
        self.cancel_password_edit();
        Ok(outcome)
    }
}
