use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = &value[1..value.len() - 1];
            }

            // Only set if not already set (env vars take precedence)
            if std::env::var(key).is_err() {
                // SAFETY: We're single-threaded at this point (called before any async runtime)
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub transport: TransportConfig,
    pub cache: CacheConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Unix socket the peripheral shim connects to.
    pub socket_path: String,
    /// Negotiated per-message payload ceiling (ATT MTU).
    pub payload_ceiling: usize,
    /// Bytes reserved for transport headers within the ceiling.
    pub header_reserve: usize,
}

impl TransportConfig {
    /// Usable chunk size for paged responses.
    pub fn chunk_size(&self) -> usize {
        self.payload_ceiling.saturating_sub(self.header_reserve).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for query results, in milliseconds.
    pub query_ttl_ms: u64,
    /// TTL for the environment health-check key, in milliseconds.
    pub health_ttl_ms: u64,
}

impl CacheConfig {
    pub fn query_ttl(&self) -> Duration {
        Duration::from_millis(self.query_ttl_ms)
    }

    pub fn health_ttl(&self) -> Duration {
        Duration::from_millis(self.health_ttl_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Seconds nmcli waits for a Wi-Fi rescan to complete.
    pub scan_wait_secs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportConfig {
                socket_path: "/run/ble-wifi-gateway.sock".to_string(),
                payload_ceiling: 23,
                header_reserve: 3,
            },
            cache: CacheConfig {
                query_ttl_ms: 10_000,
                health_ttl_ms: 3_600_000,
            },
            network: NetworkConfig { scan_wait_secs: 5 },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("GATEWAY_SOCKET_PATH") {
            config.transport.socket_path = path;
        }
        if let Ok(ceiling) = std::env::var("GATEWAY_PAYLOAD_CEILING")
            && let Ok(c) = ceiling.parse()
        {
            config.transport.payload_ceiling = c;
        }
        if let Ok(reserve) = std::env::var("GATEWAY_HEADER_RESERVE")
            && let Ok(r) = reserve.parse()
        {
            config.transport.header_reserve = r;
        }
        if let Ok(ttl) = std::env::var("GATEWAY_QUERY_TTL_MS")
            && let Ok(t) = ttl.parse()
        {
            config.cache.query_ttl_ms = t;
        }
        if let Ok(ttl) = std::env::var("GATEWAY_HEALTH_TTL_MS")
            && let Ok(t) = ttl.parse()
        {
            config.cache.health_ttl_ms = t;
        }
        if let Ok(wait) = std::env::var("GATEWAY_SCAN_WAIT_SECS")
            && let Ok(w) = wait.parse()
        {
            config.network.scan_wait_secs = w;
        }

        config
    }
}
