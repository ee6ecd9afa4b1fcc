// Database layer module

pub mod memory;
pub mod pool;
pub mod repositories;
pub mod store;

pub use memory::InMemoryEventStore;
pub use pool::DbPool;
pub use repositories::EventRepository;
pub use store::EventStore;
