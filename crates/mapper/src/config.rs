//! Connection configuration consumed by the database clients.
//!
//! The mapper core never reads configuration; clients validate it once, at
//! connect time, so a bad authentication block fails at startup rather than
//! on the first query.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use mongomap_core::{MapperError, MapperResult};

pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DRIVER: &str = "mongodb";

const ENV_PREFIX: &str = "MONGOMAP_";

/// Authentication block.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    pub require_authentication: bool,
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("require_authentication", &self.require_authentication)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Backend connection settings.
///
/// JSON keys follow the module configuration layout:
///
/// ```json
/// { "mongo": { "database": "app", "hostname": "db", "port": 27017,
///              "auth": { "requireAuthentication": true, "username": "app", "password": "..." } } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MongoConfig {
    /// Backend driver name (`"mongodb"` or `"memory"`).
    pub driver: String,
    pub database: String,
    pub hostname: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    pub auth: AuthConfig,
    /// Connect and server-selection timeout in milliseconds; driver default when unset.
    pub timeout_ms: Option<u64>,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            database: String::new(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_PORT,
            auth: AuthConfig::default(),
            timeout_ms: None,
        }
    }
}

impl MongoConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    pub fn with_host(mut self, hostname: impl Into<String>, port: u16) -> Self {
        self.hostname = hostname.into();
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthConfig {
            require_authentication: true,
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Parse JSON, either the bare settings object or one nested under `"mongo"`.
    pub fn from_json_str(json: &str) -> MapperResult<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| MapperError::configuration(format!("invalid config JSON: {e}")))?;

        if let Some(inner) = value.get_mut("mongo") {
            value = inner.take();
        }

        serde_json::from_value(value)
            .map_err(|e| MapperError::configuration(format!("invalid mongo config: {e}")))
    }

    /// Read `MONGOMAP_*` environment variables over the defaults.
    pub fn from_env() -> MapperResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup (`MONGOMAP_DATABASE`, `MONGOMAP_HOSTNAME`,
    /// `MONGOMAP_PORT`, `MONGOMAP_DRIVER`, `MONGOMAP_REQUIRE_AUTH`,
    /// `MONGOMAP_USERNAME`, `MONGOMAP_PASSWORD`, `MONGOMAP_TIMEOUT_MS`).
    /// Unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> MapperResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(driver) = get("DRIVER") {
            config.driver = driver;
        }
        if let Some(database) = get("DATABASE") {
            config.database = database;
        }
        if let Some(hostname) = get("HOSTNAME") {
            config.hostname = hostname;
        }
        if let Some(port) = get("PORT") {
            config.port = parse_port(&port)?;
        }
        if let Some(flag) = get("REQUIRE_AUTH") {
            config.auth.require_authentication = parse_flag(&flag)?;
        }
        if let Some(username) = get("USERNAME") {
            config.auth.username = username;
        }
        if let Some(password) = get("PASSWORD") {
            config.auth.password = password;
        }
        if let Some(timeout) = get("TIMEOUT_MS") {
            let timeout = timeout.trim();
            config.timeout_ms = Some(timeout.parse().map_err(|_| {
                MapperError::configuration(format!("invalid timeout: {timeout:?}"))
            })?);
        }

        Ok(config)
    }

    /// Startup-time checks shared by every client.
    pub fn validate(&self) -> MapperResult<()> {
        if self.auth.require_authentication && self.auth.username.trim().is_empty() {
            return Err(MapperError::configuration(
                "authentication is required, but the username is empty",
            ));
        }
        if self.hostname.trim().is_empty() {
            return Err(MapperError::configuration("hostname is empty"));
        }
        if self.port == 0 {
            return Err(MapperError::configuration("port must be non-zero"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// `mongodb://<hostname>:<port>`; credentials are passed separately.
    pub fn connection_string(&self) -> String {
        format!("mongodb://{}:{}", self.hostname, self.port)
    }
}

fn parse_port(raw: &str) -> MapperResult<u16> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_PORT);
    }
    raw.parse()
        .map_err(|_| MapperError::configuration(format!("invalid port: {raw:?}")))
}

fn parse_flag(raw: &str) -> MapperResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(MapperError::configuration(format!("invalid boolean: {other:?}"))),
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => parse_port(&text).map_err(serde::de::Error::custom),
    }
}
