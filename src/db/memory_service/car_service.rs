use chrono::Utc;

use super::{MemoryStore, new_id};
use crate::db::{
    entities::car_record::{self, CarDetails},
    enums::RecordStatus,
};
use crate::web::error::AppError;

#[derive(Debug, Default, Clone)]
pub struct SearchFilter {
    /// Matched case-insensitively against chassis number, brand, type, model
    /// and inspector name.
    pub query: Option<String>,
    pub brand: Option<String>,
}

pub async fn create_record(
    store: &MemoryStore,
    inspector_id: &str,
    inspector_name: &str,
    details: CarDetails,
) -> Result<car_record::Model, AppError> {
    let now = Utc::now();
    let record = car_record::Model {
        id: new_id(),
        details,
        inspection_date: now,
        inspector_id: inspector_id.to_string(),
        inspector_name: inspector_name.to_string(),
        status: RecordStatus::Active,
        updated_at: now,
    };
    store.car_records.insert(record.id.clone(), record.clone());
    Ok(record)
}

pub async fn get_record(
    store: &MemoryStore,
    record_id: &str,
) -> Result<Option<car_record::Model>, AppError> {
    Ok(store.car_records.get(record_id).map(|r| r.value().clone()))
}

pub async fn search_records(
    store: &MemoryStore,
    filter: &SearchFilter,
) -> Result<Vec<car_record::Model>, AppError> {
    let needle = filter
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    let mut records: Vec<car_record::Model> = store
        .car_records
        .iter()
        .filter(|r| {
            filter
                .brand
                .as_deref()
                .is_none_or(|brand| r.details.brand == brand)
        })
        .filter(|r| match &needle {
            None => true,
            Some(needle) => [
                r.details.chassis_number.as_str(),
                r.details.brand.as_str(),
                r.details.car_type.as_str(),
                r.details.model.as_str(),
                r.inspector_name.as_str(),
            ]
            .iter()
            .any(|hay| hay.to_lowercase().contains(needle.as_str())),
        })
        .map(|r| r.value().clone())
        .collect();

    records.sort_by(|a, b| b.inspection_date.cmp(&a.inspection_date));
    Ok(records)
}

pub async fn count_records(store: &MemoryStore) -> Result<usize, AppError> {
    Ok(store.car_records.len())
}

pub async fn count_records_by_inspector(
    store: &MemoryStore,
    inspector_id: &str,
) -> Result<usize, AppError> {
    Ok(store
        .car_records
        .iter()
        .filter(|r| r.inspector_id == inspector_id)
        .count())
}
