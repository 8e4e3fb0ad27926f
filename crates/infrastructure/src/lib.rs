pub mod database;
pub mod factory;
pub mod in_memory_queue;
pub mod memory_backend;
pub mod memory_store;
pub mod redis_queue;

pub use database::{connect_sqlite, SqliteBackend, SqliteStore};
pub use factory::DriverFactory;
pub use in_memory_queue::InMemoryQueue;
pub use memory_backend::MemoryBackend;
pub use memory_store::MemoryStore;
pub use redis_queue::RedisQueue;
