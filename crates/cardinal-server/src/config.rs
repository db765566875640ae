//! The process-wide configuration surface, assembled once from environment
//! variables at startup (§6a). No flag parsing, no file layering.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CARDINAL_NAMESPACE is required (set ENABLE_DEBUG=true to fall back to a default namespace)")]
    MissingNamespace,
    #[error("{0} is not a valid value for {1}")]
    InvalidValue(String, &'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub namespace: String,
    pub store_path: PathBuf,
    pub redis_addr: Option<String>,
    pub redis_password_set: bool,
    pub debug: bool,
    pub enable_allowlist: bool,
    pub receipt_history_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let debug = parse_bool_env("ENABLE_DEBUG")?;

        let http_port = match std::env::var("CARDINAL_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue(raw, "CARDINAL_PORT"))?,
            Err(_) => 4040,
        };

        let namespace = match std::env::var("CARDINAL_NAMESPACE") {
            Ok(ns) if !ns.is_empty() => ns,
            _ if debug => "defaultnamespace".to_string(),
            _ => return Err(ConfigError::MissingNamespace),
        };

        let store_path = std::env::var("CARDINAL_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./cardinal.redb"));

        let redis_addr = std::env::var("REDIS_ADDR").ok();
        let redis_password_set = std::env::var("REDIS_PASSWORD").is_ok();

        let enable_allowlist = parse_bool_env("ENABLE_ALLOWLIST")?;

        let receipt_history_size = match std::env::var("CARDINAL_RECEIPT_HISTORY_SIZE") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue(raw, "CARDINAL_RECEIPT_HISTORY_SIZE"))?,
            Err(_) => cardinal_receipts::DEFAULT_CAPACITY,
        };

        Ok(Self {
            http_port,
            namespace,
            store_path,
            redis_addr,
            redis_password_set,
            debug,
            enable_allowlist,
            receipt_history_size,
        })
    }
}

fn parse_bool_env(name: &'static str) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue(raw, name)),
        },
        Err(_) => Ok(false),
    }
}
