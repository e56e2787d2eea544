//! Valence Library Request Broker
//!
//! Brokers library-material requests: parses a bibliographic record into a
//! holdings/items graph, resolves physical availability across several
//! authoritative systems, and dispatches ~20 interchangeable request services
//! behind one uniform request lifecycle.

use std::sync::Arc;

pub mod api;
pub mod backends;
pub mod config;
pub mod error;
pub mod marc;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::config::AppConfig;
    use config::{Config, File, FileFormat};
    use std::sync::Arc;

    /// The shipped default configuration, for tests that need a full config.
    pub fn test_config() -> Arc<AppConfig> {
        let config = Config::builder()
            .add_source(File::from_str(
                include_str!("../config/default.toml"),
                FileFormat::Toml,
            ))
            .build()
            .expect("default configuration parses");
        Arc::new(
            config
                .try_deserialize()
                .expect("default configuration deserializes"),
        )
    }
}
