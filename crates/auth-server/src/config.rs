//! Configuration management for the auth server
//!
//! Loads configuration from environment variables with defaults matching the
//! local demo setup.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Path the prover posts proof tokens to
pub const CALLBACK_PATH: &str = "/api/callback";

/// Longest accepted session lifetime (one day)
pub const MAX_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Session storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Redis,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "redis" => Ok(StoreKind::Redis),
            other => anyhow::bail!("SESSION_STORE must be 'memory' or 'redis', got '{}'", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Public base URL used in callback links
    pub host_url: String,

    /// Verifier identifier placed in `from` of issued requests
    pub verifier_audience: String,

    /// Directory with `<circuit>/verification_key.json`
    pub keys_dir: PathBuf,

    /// IPFS gateway host for `ipfs://` schemas
    pub schema_gateway: String,

    /// JSON-RPC endpoint of the chain holding identity states
    pub rpc_url: String,

    /// Identity state contract address
    pub state_contract: String,

    pub session_store: StoreKind,

    /// Redis connection URL, used when `session_store` is `redis`
    pub redis_url: String,

    pub session_ttl_secs: u64,

    /// Interval between expired session sweeps
    pub session_sweep_secs: u64,

    /// Fixed session id reused by every sign-in; random per sign-in when unset
    pub session_id: Option<String>,

    /// Upper bound on a single callback verification
    pub verify_timeout_secs: u64,
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Invalid {}: {}", key, raw))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Config {
            api_host: var("API_HOST", "0.0.0.0"),
            api_port: parse_var(&lookup, "API_PORT", "8001")?,
            host_url: var("HOST_URL", "http://localhost:8001")
                .trim_end_matches('/')
                .to_string(),
            verifier_audience: var(
                "VERIFIER_AUDIENCE",
                "1125GJqgw6YEsKFwj63GY87MMxPL9kwDKxPUiwMLNZ",
            ),
            keys_dir: var("KEYS_DIR", "../keys").into(),
            schema_gateway: var("SCHEMA_GATEWAY", "ipfs.io"),
            rpc_url: var("RPC_URL", "https://matic-mumbai.chainstacklabs.com"),
            state_contract: var(
                "STATE_CONTRACT",
                "0x46Fd04eEa588a3EA7e9F055dd691C688c4148ab3",
            ),
            session_store: parse_var(&lookup, "SESSION_STORE", "memory")?,
            redis_url: var("REDIS_URL", "redis://localhost:6379"),
            session_ttl_secs: parse_var(&lookup, "SESSION_TTL_SECS", "300")?,
            session_sweep_secs: parse_var(&lookup, "SESSION_SWEEP_SECS", "60")?,
            session_id: lookup("SESSION_ID").filter(|id| !id.is_empty()),
            verify_timeout_secs: parse_var(&lookup, "VERIFY_TIMEOUT_SECS", "60")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }
        if !self.host_url.starts_with("http://") && !self.host_url.starts_with("https://") {
            anyhow::bail!("HOST_URL must be an http(s) URL");
        }
        if self.verifier_audience.is_empty() {
            anyhow::bail!("VERIFIER_AUDIENCE must not be empty");
        }
        if self.session_ttl_secs == 0 || self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            anyhow::bail!(
                "SESSION_TTL_SECS must be between 1 and {}",
                MAX_SESSION_TTL_SECS
            );
        }
        if self.session_sweep_secs == 0 {
            anyhow::bail!("SESSION_SWEEP_SECS must be greater than 0");
        }
        if self.verify_timeout_secs == 0 {
            anyhow::bail!("VERIFY_TIMEOUT_SECS must be greater than 0");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Base callback URI, without the session parameter
    pub fn callback_uri(&self) -> String {
        format!("{}{}", self.host_url, CALLBACK_PATH)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}
