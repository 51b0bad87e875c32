//! Runtime configuration: built-in defaults, then `WALL_*` environment
//! variables (a `.env` file is loaded into the environment first).

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use wall_core::{StubPolicy, WallSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct WallConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub lock_timeout_ms: u64,
    pub page_size: i64,
    pub latest_count: i64,
    pub stub_show_author: bool,
    pub stub_show_timestamps: bool,
    pub log_level: String,
}

impl WallConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_env(Environment::with_prefix("WALL"))
    }

    fn from_env(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("database_url", "sqlite:rusty_wall.db")?
            .set_default("bind_addr", "127.0.0.1:8080")?
            .set_default("lock_timeout_ms", 5000)?
            .set_default("page_size", 10)?
            .set_default("latest_count", 10)?
            .set_default("stub_show_author", false)?
            .set_default("stub_show_timestamps", false)?
            .set_default("log_level", "info")?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn wall_settings(&self) -> WallSettings {
        WallSettings {
            page_size: self.page_size,
            latest_count: self.latest_count,
            stub: StubPolicy {
                show_author: self.stub_show_author,
                show_timestamps: self.stub_show_timestamps,
            },
            ..WallSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Environment::with_prefix("WALL").source(Some(source))
    }

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = WallConfig::from_env(env(&[])).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.lock_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.wall_settings().stub, StubPolicy::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = WallConfig::from_env(env(&[
            ("WALL_PAGE_SIZE", "25"),
            ("WALL_LOCK_TIMEOUT_MS", "250"),
            ("WALL_STUB_SHOW_AUTHOR", "true"),
        ]))
        .unwrap();
        let settings = cfg.wall_settings();
        assert_eq!(settings.page_size, 25);
        assert!(settings.stub.show_author);
        assert!(!settings.stub.show_timestamps);
        assert_eq!(cfg.lock_timeout(), Duration::from_millis(250));
    }
}
