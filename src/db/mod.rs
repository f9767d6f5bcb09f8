pub mod entities;
pub mod enums;
pub mod memory_service;
