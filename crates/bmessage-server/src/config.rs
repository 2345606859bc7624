//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with zero configuration
//! for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use bmessage_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT, MAX_UPLOAD_SIZE};

/// Value of `DATABASE_PATH` that selects a throwaway in-memory database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// SQLite database file, or `:memory:`.
    /// Env: `DATABASE_PATH`
    /// Default: `./bmessage.db`
    pub database_path: PathBuf,

    /// Directory holding uploaded attachments and avatars.
    /// Env: `UPLOAD_PATH`
    /// Default: `./uploads`
    pub upload_path: PathBuf,

    /// Per-file upload limit in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 50 MiB
    pub max_upload_size: usize,

    /// Ed25519 public key of the session issuer (hex-encoded, 64 chars).
    /// Env: `SESSION_PUBKEY`
    /// Default: all-zeros, which no token verifies against.
    pub session_pubkey: [u8; 32],

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./bmessage.db"),
            upload_path: PathBuf::from("./uploads"),
            max_upload_size: MAX_UPLOAD_SIZE,
            session_pubkey: [0u8; 32],
            instance_name: APP_NAME.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = var("UPLOAD_PATH") {
            config.upload_path = PathBuf::from(path);
        }

        if let Some(val) = var("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(hex_key) = var("SESSION_PUBKEY") {
            match parse_hex_pubkey(&hex_key) {
                Ok(key) => config.session_pubkey = key,
                Err(e) => tracing::warn!(error = %e, "Invalid SESSION_PUBKEY, using default"),
            }
        }

        if let Some(name) = var("INSTANCE_NAME") {
            if !name.trim().is_empty() {
                config.instance_name = name;
            }
        }

        config
    }

    pub fn database_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }

    /// `true` until a real issuer key is configured.
    pub fn session_key_missing(&self) -> bool {
        self.session_pubkey == [0u8; 32]
    }
}

/// Parse a 64-character hex string into a 32-byte array.
fn parse_hex_pubkey(value: &str) -> Result<[u8; 32], String> {
    let value = value.trim();
    if value.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", value.len()));
    }
    let bytes = hex::decode(value).map_err(|e| e.to_string())?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, SocketAddr::from(([0, 0, 0, 0], 3000)));
        assert_eq!(config.max_upload_size, 50 * 1024 * 1024);
        assert!(config.session_key_missing());
        assert!(!config.database_in_memory());
    }

    #[test]
    fn test_overrides() {
        let key = "ab".repeat(32);
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", ":memory:"),
            ("MAX_UPLOAD_SIZE", "1024"),
            ("SESSION_PUBKEY", key.as_str()),
            ("INSTANCE_NAME", "Home"),
        ]);
        assert_eq!(config.http_addr, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert!(config.database_in_memory());
        assert_eq!(config.max_upload_size, 1024);
        assert_eq!(config.session_pubkey, [0xab; 32]);
        assert_eq!(config.instance_name, "Home");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("HTTP_ADDR", "not an address"),
            ("MAX_UPLOAD_SIZE", "lots"),
            ("SESSION_PUBKEY", "abcd"),
        ]);
        let defaults = ServerConfig::default();
        assert_eq!(config.http_addr, defaults.http_addr);
        assert_eq!(config.max_upload_size, defaults.max_upload_size);
        assert!(config.session_key_missing());
    }

    #[test]
    fn test_parse_hex_pubkey_rejects_non_hex() {
        assert!(parse_hex_pubkey(&"zz".repeat(32)).is_err());
    }
}
