// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules at the crate root
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::postgres;

// Engine
pub mod clock;
pub mod notification;
pub mod reminder;
pub mod store;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod metrics;
pub mod tasks;
pub mod telemetry;
