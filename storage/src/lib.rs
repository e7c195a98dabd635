pub mod memory_storage;
pub mod portal_storage;
pub mod postgres_storage;
pub mod redis_cache;

pub use memory_storage::InMemoryStorage;
pub use portal_storage::{ClaimFilter, PortalStorage, Session, StorageConfig, StorageKind};
pub use postgres_storage::PostgresStorage;
pub use redis_cache::RedisCache;
