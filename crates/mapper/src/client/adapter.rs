//! Driver selection from configuration.

use std::sync::Arc;

use tracing::info;

use mongomap_core::{MapperError, MapperResult};

use super::in_memory::InMemoryClient;
use super::r#trait::DatabaseClient;
use crate::config::MongoConfig;

/// Supported backend drivers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Driver {
    MongoDb,
    Memory,
}

impl Driver {
    /// Parse a driver name (case-insensitive).
    pub fn from_name(name: &str) -> MapperResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            other => Err(MapperError::configuration(format!(
                "unknown driver {other:?} (expected \"mongodb\" or \"memory\")"
            ))),
        }
    }

    /// Whether this build can connect with the driver.
    pub fn is_available(self) -> bool {
        match self {
            Self::MongoDb => cfg!(feature = "mongodb"),
            Self::Memory => true,
        }
    }
}

/// Entry point that turns configuration into a connected client.
pub struct Adapter;

impl Adapter {
    /// Select the configured driver, check it is available, and connect.
    pub fn from_config(config: &MongoConfig) -> MapperResult<Arc<dyn DatabaseClient>> {
        let driver = Driver::from_name(&config.driver)?;
        if !driver.is_available() {
            return Err(MapperError::connection(format!(
                "the {driver:?} driver is required by this configuration but is not compiled in \
                 (enable the `mongodb` feature)"
            )));
        }

        info!(?driver, database = %config.database, "connecting");
        match driver {
            Driver::Memory => Ok(Arc::new(InMemoryClient::connect(config)?)),
            Driver::MongoDb => connect_mongodb(config),
        }
    }
}

#[cfg(feature = "mongodb")]
fn connect_mongodb(config: &MongoConfig) -> MapperResult<Arc<dyn DatabaseClient>> {
    Ok(Arc::new(super::mongo::MongoClient::connect(config)?))
}

#[cfg(not(feature = "mongodb"))]
fn connect_mongodb(_config: &MongoConfig) -> MapperResult<Arc<dyn DatabaseClient>> {
    Err(MapperError::connection("the mongodb driver is not compiled in"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_names_are_case_insensitive() {
        assert_eq!(Driver::from_name("MongoDB").unwrap(), Driver::MongoDb);
        assert_eq!(Driver::from_name(" memory ").unwrap(), Driver::Memory);
    }

    #[test]
    fn unknown_driver_is_a_configuration_error() {
        let config = MongoConfig::new("app").with_driver("mysql");
        assert!(matches!(
            Adapter::from_config(&config),
            Err(MapperError::Configuration(_))
        ));
    }

    #[test]
    fn memory_driver_connects() {
        let config = MongoConfig::new("app").with_driver("memory");
        let client = Adapter::from_config(&config).unwrap();
        assert!(client.is_connected());
        assert!(client.collection("app", "users").is_ok());
    }

    #[test]
    fn bad_auth_block_fails_before_connecting() {
        let mut config = MongoConfig::new("app").with_driver("memory");
        config.auth.require_authentication = true;
        assert!(matches!(
            Adapter::from_config(&config),
            Err(MapperError::Configuration(_))
        ));
    }

    #[cfg(not(feature = "mongodb"))]
    #[test]
    fn mongodb_driver_requires_the_feature() {
        let config = MongoConfig::new("app");
        assert!(matches!(
            Adapter::from_config(&config),
            Err(MapperError::Connection(_))
        ));
    }
}
