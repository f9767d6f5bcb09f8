pub mod car_service;
pub mod edit_request_service;
pub mod user_service;

use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

use crate::db::entities::{car_record, edit_request, user};

pub type MemoryPool = Arc<MemoryStore>;

/// Process-local store standing in for the persistence backend. Each table
/// is a concurrent map keyed by the row id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub(crate) users: DashMap<String, user::Model>,
    /// username -> user id
    pub(crate) usernames: DashMap<String, String>,
    pub(crate) car_records: DashMap<String, car_record::Model>,
    pub(crate) edit_requests: DashMap<String, edit_request::Model>,
}

impl MemoryStore {
    pub fn new_pool() -> MemoryPool {
        info!("Initializing in-memory inspection store.");
        Arc::new(MemoryStore::default())
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
