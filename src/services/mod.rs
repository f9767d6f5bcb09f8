pub mod admin_service;
pub mod auth_service;
pub mod inspection_service;
pub mod summary_service;

use crate::db::memory_service::MemoryPool;

/// The store plus the settings the persistence callbacks need. Implements
/// every workflow backend trait.
#[derive(Clone, Debug)]
pub struct StoreBackend {
    pub pool: MemoryPool,
    pub bcrypt_cost: u32,
}

impl StoreBackend {
    pub fn new(pool: MemoryPool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }
}

/// bcrypt's lowest accepted cost, keeps hashing fast in tests.
#[cfg(test)]
pub(crate) const TEST_BCRYPT_COST: u32 = 4;
