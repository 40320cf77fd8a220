//! PostgreSQL adapters

mod memory_repository;

pub use memory_repository::PgMemoryRepository;
