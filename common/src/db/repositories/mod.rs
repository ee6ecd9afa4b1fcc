// Repository layer for database operations

pub mod event;
pub mod queries;

pub use event::EventRepository;
