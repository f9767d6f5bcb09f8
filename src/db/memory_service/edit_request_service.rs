use chrono::Utc;
use tracing::info;

use super::{MemoryStore, new_id};
use crate::db::{
    entities::{car_record::CarDetails, edit_request},
    enums::{EditRequestStatus, RecordStatus},
};
use crate::web::error::AppError;

/// Files a pending request and flags the record. The record's row guard is
/// held across both writes, so readers never see one without the other.
pub async fn create_edit_request(
    store: &MemoryStore,
    record_id: &str,
    requester_id: &str,
    requester_name: &str,
    proposed: CarDetails,
) -> Result<edit_request::Model, AppError> {
    let mut record = store
        .car_records
        .get_mut(record_id)
        .ok_or_else(|| AppError::NotFound(format!("Car record {record_id} not found")))?;

    let request = edit_request::Model {
        id: new_id(),
        record_id: record_id.to_string(),
        requester_id: requester_id.to_string(),
        requester_name: requester_name.to_string(),
        proposed,
        status: EditRequestStatus::Pending,
        created_at: Utc::now(),
        reviewed_by: None,
        reviewed_at: None,
    };
    store.edit_requests.insert(request.id.clone(), request.clone());
    record.status = RecordStatus::PendingEdit;
    Ok(request)
}

pub async fn get_edit_request(
    store: &MemoryStore,
    request_id: &str,
) -> Result<Option<edit_request::Model>, AppError> {
    Ok(store.edit_requests.get(request_id).map(|r| r.value().clone()))
}

pub async fn list_pending(store: &MemoryStore) -> Result<Vec<edit_request::Model>, AppError> {
    let mut pending: Vec<edit_request::Model> = store
        .edit_requests
        .iter()
        .filter(|r| r.status == EditRequestStatus::Pending)
        .map(|r| r.value().clone())
        .collect();
    pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(pending)
}

pub async fn count_pending(store: &MemoryStore) -> Result<usize, AppError> {
    Ok(store
        .edit_requests
        .iter()
        .filter(|r| r.status == EditRequestStatus::Pending)
        .count())
}

fn has_pending_for(store: &MemoryStore, record_id: &str) -> bool {
    store
        .edit_requests
        .iter()
        .any(|r| r.record_id == record_id && r.status == EditRequestStatus::Pending)
}

/// Closes a pending request. Approval writes the proposed details onto the
/// record. The record returns to `active` once no pending request remains.
///
/// Lock order is the record row first, then the request table.
pub async fn review(
    store: &MemoryStore,
    request_id: &str,
    reviewer_id: &str,
    approve: bool,
) -> Result<edit_request::Model, AppError> {
    let record_id = store
        .edit_requests
        .get(request_id)
        .map(|r| r.record_id.clone())
        .ok_or_else(|| AppError::NotFound(format!("Edit request {request_id} not found")))?;

    let mut record = store
        .car_records
        .get_mut(&record_id)
        .ok_or_else(|| AppError::NotFound(format!("Car record {record_id} not found")))?;

    let reviewed = {
        let mut request = store
            .edit_requests
            .get_mut(request_id)
            .ok_or_else(|| AppError::NotFound(format!("Edit request {request_id} not found")))?;
        if request.status != EditRequestStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Edit request {request_id} is already {}",
                request.status
            )));
        }
        request.status = if approve {
            EditRequestStatus::Approved
        } else {
            EditRequestStatus::Rejected
        };
        request.reviewed_by = Some(reviewer_id.to_string());
        request.reviewed_at = Some(Utc::now());
        request.value().clone()
    };

    if approve {
        record.details = reviewed.proposed.clone();
        record.updated_at = Utc::now();
    }
    if !has_pending_for(store, &record_id) {
        record.status = RecordStatus::Active;
    }
    drop(record);

    info!(
        request_id = %reviewed.id,
        record_id = %reviewed.record_id,
        status = %reviewed.status,
        "Edit request reviewed."
    );
    Ok(reviewed)
}
