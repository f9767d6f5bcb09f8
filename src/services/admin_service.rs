use async_trait::async_trait;
use tracing::info;

use super::{StoreBackend, auth_service};
use crate::db::{entities::user, enums::UserRole, memory_service::user_service};
use crate::web::error::AppError;
use crate::workflows::user_management::UserAdminBackend;

#[async_trait]
impl UserAdminBackend for StoreBackend {
    async fn toggle_status(&self, user_id: &str) -> Result<user::Model, AppError> {
        let user = user_service::toggle_status(&self.pool, user_id).await?;
        info!(user_id = %user.id, is_active = user.is_active, "User status toggled.");
        Ok(user)
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), AppError> {
        user_service::delete_user(&self.pool, user_id).await
    }

    async fn update_role(&self, user_id: &str, role: UserRole) -> Result<user::Model, AppError> {
        let user = user_service::update_role(&self.pool, user_id, role).await?;
        info!(user_id = %user.id, role = %user.role, "User role updated.");
        Ok(user)
    }

    async fn update_password(
        &self,
        user_id: &str,
        new_password: &str,
    ) -> Result<user::Model, AppError> {
        let password_hash = auth_service::hash_password(new_password, self.bcrypt_cost).await?;
        let user = user_service::update_password(&self.pool, user_id, password_hash).await?;
        info!(user_id = %user.id, "User password reset by administrator.");
        Ok(user)
    }
}
