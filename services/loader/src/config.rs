use anyhow::{Context, Result};
use std::fmt;

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_SCHEMA: &str = "public";

/// Warehouse connection parameters, read once per run and handed to the loader.
#[derive(Clone)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schema: String,
    /// Informational only: reported as the session `application_name`.
    pub warehouse: Option<String>,
    pub role: Option<String>,
}

impl WarehouseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).with_context(|| format!("{} env var missing", key));

        let account = require("WAREHOUSE_ACCOUNT")?;
        let (host, port) = split_account(&account)?;

        Ok(Self {
            host,
            port,
            user: require("WAREHOUSE_USER")?,
            password: require("WAREHOUSE_PASSWORD")?,
            database: require("WAREHOUSE_DATABASE")?,
            schema: get("WAREHOUSE_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            warehouse: get("WAREHOUSE_NAME"),
            role: get("WAREHOUSE_ROLE"),
        })
    }
}

/// `host` or `host:port`.
fn split_account(account: &str) -> Result<(String, u16)> {
    match account.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .with_context(|| format!("Invalid port in WAREHOUSE_ACCOUNT: {}", account))?;
            Ok((host.to_string(), port))
        }
        None => Ok((account.to_string(), DEFAULT_PORT)),
    }
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .finish()
    }
}
