use std::path::PathBuf;
use std::time::Duration;

use jigsaw_core::expansion::{validate_grace_period_ms, DEFAULT_GRACE_PERIOD_MS};
use jigsaw_core::lease::{validate_lease_seconds, DEFAULT_LEASE_SECONDS};
use jigsaw_imagegen::provider::{normalize_size, SMALL_TILE};
use jigsaw_imagegen::{GeneratorKind, ProviderConfig, StorageKind};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on draining in-flight requests after a shutdown signal.
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// How long a `DONE` expansion waits before the resolver may settle it.
    pub auto_adopt_after_ms: i64,
    /// Cell lock lease length in seconds.
    pub lock_ttl_seconds: i64,
    /// Edge length of generated tiles in pixels (256 or 512).
    pub tile_size: u32,
    /// Image generation and storage backends.
    pub providers: ProviderConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `150`                   |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                    |
    /// | `AUTO_ADOPT_AFTER_MS`      | `300000`                |
    /// | `LOCK_TTL_SECONDS`         | `90`                    |
    /// | `TILE_SIZE`                | `256`                   |
    /// | `IMAGE_GEN_PROVIDER`       | `mock`                  |
    /// | `STORAGE_PROVIDER`         | `local`                 |
    /// | `PUBLIC_DIR`               | `public`                |
    /// | `OPENAI_API_KEY`           | --                      |
    /// | `MOCK_GENERATION_DELAY_MS` | `1500`                  |
    ///
    /// The request timeout default leaves room for a full DALL·E round trip
    /// inside `POST /expansions/{id}/run`.
    ///
    /// # Panics
    ///
    /// Panics on any unparseable value, an out-of-range lease, or an
    /// unknown provider name.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "150".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let jwt = JwtConfig::from_env();

        let auto_adopt_after_ms: i64 = std::env::var("AUTO_ADOPT_AFTER_MS")
            .unwrap_or_else(|_| DEFAULT_GRACE_PERIOD_MS.to_string())
            .parse()
            .expect("AUTO_ADOPT_AFTER_MS must be a valid i64");
        if let Err(msg) = validate_grace_period_ms(auto_adopt_after_ms) {
            panic!("AUTO_ADOPT_AFTER_MS: {msg}");
        }

        let lock_ttl_seconds: i64 = std::env::var("LOCK_TTL_SECONDS")
            .unwrap_or_else(|_| DEFAULT_LEASE_SECONDS.to_string())
            .parse()
            .expect("LOCK_TTL_SECONDS must be a valid i64");
        if let Err(msg) = validate_lease_seconds(lock_ttl_seconds) {
            panic!("LOCK_TTL_SECONDS: {msg}");
        }

        let tile_size: u32 = std::env::var("TILE_SIZE")
            .unwrap_or_else(|_| SMALL_TILE.to_string())
            .parse()
            .expect("TILE_SIZE must be a valid u32");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            auto_adopt_after_ms,
            lock_ttl_seconds,
            tile_size: normalize_size(tile_size),
            providers: provider_config_from_env(),
        }
    }
}

fn provider_config_from_env() -> ProviderConfig {
    let generator: GeneratorKind = std::env::var("IMAGE_GEN_PROVIDER")
        .unwrap_or_else(|_| "mock".into())
        .parse()
        .unwrap_or_else(|e| panic!("IMAGE_GEN_PROVIDER: {e}"));

    let storage: StorageKind = std::env::var("STORAGE_PROVIDER")
        .unwrap_or_else(|_| "local".into())
        .parse()
        .unwrap_or_else(|e| panic!("STORAGE_PROVIDER: {e}"));

    let public_dir = PathBuf::from(std::env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".into()));

    let mock_delay_ms: u64 = std::env::var("MOCK_GENERATION_DELAY_MS")
        .unwrap_or_else(|_| "1500".into())
        .parse()
        .expect("MOCK_GENERATION_DELAY_MS must be a valid u64");

    ProviderConfig {
        generator,
        storage,
        public_dir,
        openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
        mock_delay: Duration::from_millis(mock_delay_ms),
    }
}
