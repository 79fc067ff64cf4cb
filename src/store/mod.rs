//! Persistent store access.
//!
//! The engine reads and writes an external data service through the
//! [`NotificationStore`] trait. Two backends are provided:
//!
//! - `MemoryStore`: DashMap-backed, used for development and tests
//! - `PostgresStore`: sqlx over the application's PostgreSQL database
//!
//! Use `create_store()` to build the configured backend wrapped in the
//! per-call [`TimeoutStore`].

mod backend;
mod factory;
mod memory_backend;
mod models;
mod postgres_backend;
mod timeout;

pub use backend::{NotificationStore, ScheduleUpdate, StoreError};
pub use factory::{create_store, wrap_with_timeout};
pub use memory_backend::MemoryStore;
pub use models::{
    ChatRecord, MessageRecord, SessionRecord, UserProfile, SESSION_STATUS_SCHEDULED,
};
pub use postgres_backend::PostgresStore;
pub use timeout::TimeoutStore;
