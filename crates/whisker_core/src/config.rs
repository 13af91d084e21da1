use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WhiskerConfig {
    pub server: ServerConfig,
    pub cat: CatConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl WhiskerConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: WhiskerConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WHISKER_HOST") {
            self.server.host = v;
        }
        if let Some(n) = parsed_env("WHISKER_TCP_PORT") {
            self.server.tcp_port = n;
        }
        if let Some(n) = parsed_env("WHISKER_UDP_PORT") {
            self.server.udp_port = n;
        }
        if let Ok(v) = std::env::var("WHISKER_DB_PATH") {
            self.store.db_path = v;
        }
        if let Some(n) = parsed_env("WHISKER_SEED") {
            self.cat.seed = Some(n);
        }
        if let Some(n) = parsed_env("WHISKER_SATIETY_PERIOD") {
            self.cat.satiety_period_secs = n;
        }
        if let Some(n) = parsed_env("WHISKER_TIME_TO_FORGET") {
            self.cat.time_to_forget_secs = n;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("LOG_DIR") {
            self.logging.dir = v;
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub tcp_port: u16,
    pub udp_port: u16,
    /// Upper bound for a single TCP read.
    pub read_chunk_bytes: usize,
    /// Per-attempt TCP read timeout. Expiry just moves on to the next connection.
    pub read_timeout_ms: u64,
    /// Period of the UDP dispatcher and the connection reaper.
    pub tick_interval_ms: u64,
    /// UDP peers silent for this long are reaped.
    pub peer_idle_secs: u64,
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn peer_idle(&self) -> Duration {
        Duration::from_secs(self.peer_idle_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            tcp_port: 8000,
            udp_port: 8001,
            read_chunk_bytes: 1024,
            read_timeout_ms: 100,
            tick_interval_ms: 1000,
            peer_idle_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatConfig {
    /// Lookback window for the satiety scale.
    pub satiety_period_secs: u64,
    /// Lookback window for everything else; older history is forgotten.
    pub time_to_forget_secs: u64,
    /// Mood recomputation period.
    pub tick_interval_ms: u64,
    /// Seed for the cat's whims. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl CatConfig {
    pub fn satiety_period(&self) -> Duration {
        Duration::from_secs(self.satiety_period_secs)
    }

    pub fn time_to_forget(&self) -> Duration {
        Duration::from_secs(self.time_to_forget_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for CatConfig {
    fn default() -> Self {
        Self {
            satiety_period_secs: 60,
            time_to_forget_secs: 300,
            tick_interval_ms: 1000,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "whisker.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
            file_prefix: "whisker".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = WhiskerConfig::default();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.tcp_port, 8000);
        assert_eq!(cfg.server.udp_port, 8001);
        assert_eq!(cfg.cat.satiety_period_secs, 60);
        assert_eq!(cfg.cat.time_to_forget_secs, 300);
        assert!(cfg.cat.seed.is_none());
        assert_eq!(cfg.cat.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[server]
tcp_port = 9000
"#;
        let cfg: WhiskerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.server.tcp_port, 9000);
        // Defaults for unspecified fields
        assert_eq!(cfg.server.udp_port, 8001);
        assert_eq!(cfg.store.db_path, "whisker.db");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[server]
host = "0.0.0.0"
tcp_port = 7000
udp_port = 7001
read_chunk_bytes = 256
read_timeout_ms = 50
tick_interval_ms = 250
peer_idle_secs = 30

[cat]
satiety_period_secs = 10
time_to_forget_secs = 20
tick_interval_ms = 500
seed = 42

[store]
db_path = "data/cat.db"

[logging]
level = "debug"
dir = "/var/log/whisker"
file_prefix = "cat"
"#;
        let cfg: WhiskerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.read_timeout(), Duration::from_millis(50));
        assert_eq!(cfg.server.peer_idle(), Duration::from_secs(30));
        assert_eq!(cfg.cat.satiety_period(), Duration::from_secs(10));
        assert_eq!(cfg.cat.time_to_forget(), Duration::from_secs(20));
        assert_eq!(cfg.cat.seed, Some(42));
        assert_eq!(cfg.store.db_path, "data/cat.db");
        assert_eq!(cfg.logging.file_prefix, "cat");
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        // Part 1: env overrides
        std::env::set_var("WHISKER_TCP_PORT", "9100");
        std::env::set_var("WHISKER_SEED", "7");
        std::env::set_var("WHISKER_UDP_PORT", "not-a-port");

        let mut cfg = WhiskerConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.server.tcp_port, 9100);
        assert_eq!(cfg.cat.seed, Some(7));
        // Unparsable values are ignored
        assert_eq!(cfg.server.udp_port, 8001);

        // Clean up env vars before testing defaults
        std::env::remove_var("WHISKER_TCP_PORT");
        std::env::remove_var("WHISKER_SEED");
        std::env::remove_var("WHISKER_UDP_PORT");

        // Part 2: nonexistent path returns defaults (no env interference)
        let cfg = WhiskerConfig::load_or_default("/nonexistent/path.toml");
        assert_eq!(cfg.server.tcp_port, 8000);
    }
}
