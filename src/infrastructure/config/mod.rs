mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, EngineConfig, OtelConfig, ServerConfig, Settings, StoreConfig,
};
