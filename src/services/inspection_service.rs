use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::StoreBackend;
use crate::db::{
    entities::{car_record::{self, CarDetails}, edit_request},
    memory_service::{car_service, edit_request_service, user_service},
};
use crate::navigation::Permission;
use crate::web::error::AppError;
use crate::workflows::{Actor, car_form::CarRecordBackend};

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_records: usize,
    pub pending_edit_requests: usize,
    pub my_records: usize,
    /// Only filled in for roles that may view the user list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_users: Option<usize>,
}

pub async fn dashboard_stats(
    backend: &StoreBackend,
    actor: &Actor,
) -> Result<DashboardStats, AppError> {
    Ok(DashboardStats {
        total_records: car_service::count_records(&backend.pool).await?,
        pending_edit_requests: edit_request_service::count_pending(&backend.pool).await?,
        my_records: car_service::count_records_by_inspector(&backend.pool, &actor.id).await?,
        total_users: if actor.can(Permission::ViewUsers) {
            Some(user_service::count_users(&backend.pool).await?)
        } else {
            None
        },
    })
}

#[async_trait]
impl CarRecordBackend for StoreBackend {
    async fn create_record(
        &self,
        actor: &Actor,
        details: CarDetails,
    ) -> Result<car_record::Model, AppError> {
        let record =
            car_service::create_record(&self.pool, &actor.id, &actor.username, details).await?;
        info!(record_id = %record.id, inspector = %actor.username, "Inspection record created.");
        Ok(record)
    }

    async fn request_edit(
        &self,
        actor: &Actor,
        record_id: &str,
        details: CarDetails,
    ) -> Result<edit_request::Model, AppError> {
        let request = edit_request_service::create_edit_request(
            &self.pool,
            record_id,
            &actor.id,
            &actor.username,
            details,
        )
        .await?;
        info!(request_id = %request.id, record_id = %record_id, requester = %actor.username, "Edit request submitted.");
        Ok(request)
    }
}
