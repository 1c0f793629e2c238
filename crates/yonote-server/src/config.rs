//! Server configuration for `yonote`.
//!
//! Loads configuration from environment variables with development
//! defaults. Every setting can be overridden via a `YONOTE_*` variable.
//! Settings that fall back to an insecure default are collected in
//! [`ServerConfig::warnings`] and logged once tracing is up.

use std::net::SocketAddr;

use yonote_core::crypto::{DEV_PASSPHRASE, DEV_SALT};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Passphrase the content key is derived from.
    pub encryption_key: String,
    /// Salt for the content key derivation.
    pub encryption_salt: String,
    /// HMAC secret for the session auth cookie.
    pub session_secret: String,
    /// `pbkdf2$...` hash enabling the admin API.
    pub admin_password_hash: Option<String>,
    /// Mark cookies `Secure`. Turn off only for plain-HTTP development.
    pub cookie_secure: bool,
    /// Take the client address from `CF-Connecting-IP` / `X-Forwarded-For`.
    pub trust_proxy: bool,
    /// Seconds between cleanup runs.
    pub cleanup_interval_secs: u64,
    /// Free-form deployment name reported by `/api/health`.
    pub environment: String,
    /// Insecure fallbacks that were applied while loading.
    pub warnings: Vec<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("storage_backend", &self.storage_backend)
            .field("log_level", &self.log_level)
            .field("encryption_key", &"[REDACTED]")
            .field("encryption_salt", &"[REDACTED]")
            .field("session_secret", &"[REDACTED]")
            .field("admin_enabled", &self.admin_password_hash.is_some())
            .field("cookie_secure", &self.cookie_secure)
            .field("trust_proxy", &self.trust_proxy)
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

/// Supported storage backend types.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// `RocksDB` persistent storage.
    RocksDb { path: String },
    /// Redb persistent storage.
    Redb { path: String },
    /// PostgreSQL persistent storage.
    Postgres { url: String },
}

impl std::fmt::Debug for StorageBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::RocksDb { path } => f.debug_struct("RocksDb").field("path", path).finish(),
            Self::Redb { path } => f.debug_struct("Redb").field("path", path).finish(),
            Self::Postgres { .. } => f.debug_struct("Postgres").field("url", &"[REDACTED]").finish(),
        }
    }
}

fn flag(value: Option<String>, default: bool) -> bool {
    value.map_or(default, |v| {
        matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on, binds to `0.0.0.0`
    /// - `YONOTE_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:5005`)
    /// - `YONOTE_STORAGE`: `memory`, `rocksdb`, `redb`, or `postgres` (default: `memory`)
    /// - `YONOTE_STORAGE_PATH`: path for persistent backends (default: `./data`)
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `YONOTE_ENCRYPTION_KEY` / `YONOTE_ENCRYPTION_SALT`: content key inputs
    /// - `YONOTE_SESSION_SECRET`: cookie HMAC secret (default: the encryption key)
    /// - `YONOTE_ADMIN_PASSWORD_HASH`: enables `/admin` (default: disabled)
    /// - `YONOTE_COOKIE_SECURE`: `Secure` cookie flag (default: `true`)
    /// - `YONOTE_TRUST_PROXY`: honor forwarding headers (default: `false`)
    /// - `YONOTE_CLEANUP_INTERVAL`: seconds between cleanup runs (default: `3600`)
    /// - `YONOTE_ENVIRONMENT`: deployment name (default: `production`)
    /// - `YONOTE_LOG_LEVEL`: log filter (default: `info`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut warnings = Vec::new();

        // Priority: YONOTE_BIND_ADDR > PORT > default 127.0.0.1:5005
        let default_addr = SocketAddr::from(([127, 0, 0, 1], 5005));
        let bind_addr = if let Some(addr) = get("YONOTE_BIND_ADDR") {
            addr.parse().unwrap_or_else(|_| {
                warnings.push(format!("YONOTE_BIND_ADDR '{addr}' is invalid, using {default_addr}"));
                default_addr
            })
        } else if let Some(port) = get("PORT") {
            let port: u16 = port.parse().unwrap_or(5005);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            default_addr
        };

        let storage_path = get("YONOTE_STORAGE_PATH").unwrap_or_else(|| "./data".to_owned());

        let storage_backend = match get("YONOTE_STORAGE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "rocksdb" => StorageBackendType::RocksDb { path: storage_path },
            "redb" => StorageBackendType::Redb { path: storage_path },
            "postgres" | "postgresql" => {
                let url = get("DATABASE_URL")
                    .unwrap_or_else(|| "postgres://localhost/yonote".to_owned());
                StorageBackendType::Postgres { url }
            }
            _ => StorageBackendType::Memory,
        };

        let encryption_key = get("YONOTE_ENCRYPTION_KEY")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| {
                warnings.push("YONOTE_ENCRYPTION_KEY not set, using the development key".to_owned());
                DEV_PASSPHRASE.to_owned()
            });

        let encryption_salt = get("YONOTE_ENCRYPTION_SALT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| {
                warnings.push("YONOTE_ENCRYPTION_SALT not set, using the development salt".to_owned());
                DEV_SALT.to_owned()
            });

        let session_secret = get("YONOTE_SESSION_SECRET")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| {
                warnings.push(
                    "YONOTE_SESSION_SECRET not set, signing sessions with the encryption key".to_owned(),
                );
                encryption_key.clone()
            });

        let admin_password_hash = get("YONOTE_ADMIN_PASSWORD_HASH").filter(|v| !v.is_empty());

        let cookie_secure = flag(get("YONOTE_COOKIE_SECURE"), true);
        let trust_proxy = flag(get("YONOTE_TRUST_PROXY"), false);

        let cleanup_interval_secs = get("YONOTE_CLEANUP_INTERVAL")
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(3600);

        let environment = get("YONOTE_ENVIRONMENT").unwrap_or_else(|| "production".to_owned());

        let log_level = get("YONOTE_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        Self {
            bind_addr,
            storage_backend,
            log_level,
            encryption_key,
            encryption_salt,
            session_secret,
            admin_password_hash,
            cookie_secure,
            trust_proxy,
            cleanup_interval_secs,
            environment,
            warnings,
        }
    }
}
