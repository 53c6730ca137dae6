use crate::application::{DispatcherConfig, RefreshConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // HTTP
    pub listen_addr: String,
    pub request_timeout_ms: Option<u64>,

    // Database
    pub db_path: String,
    pub workers: usize,

    // Refresh
    pub refresh_interval_secs: u64,
    pub update_url: Option<String>,
    pub update_path: Option<String>,
    pub data_dir: String,
    pub keep_superseded: bool,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            request_timeout_ms: None,
            db_path: "GeoLite2-City.mmdb".to_string(),
            workers: 300,
            refresh_interval_secs: 86400,
            update_url: None,
            update_path: None,
            data_dir: ".".to_string(),
            keep_superseded: false,
            debug: false,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("worker pool size must be positive")]
    NoWorkers,
    #[error("refresh interval must be positive")]
    ZeroInterval,
    #[error("GEOIP_UPDATE_URL and GEOIP_UPDATE_PATH are mutually exclusive")]
    ConflictingSources,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.update_url.is_some() && self.update_path.is_some() {
            return Err(ConfigError::ConflictingSources);
        }
        Ok(())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.workers,
            timeout: self.request_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            interval: Duration::from_secs(self.refresh_interval_secs),
            data_dir: PathBuf::from(&self.data_dir),
            remove_superseded: !self.keep_superseded,
            ..Default::default()
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

pub fn load_config() -> anyhow::Result<Config> {
    let listen_addr = match std::env::var("PORT") {
        Ok(port) if !port.is_empty() => format!("0.0.0.0:{}", port),
        _ => std::env::var("GEOIP_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
    };

    let request_timeout_ms = std::env::var("GEOIP_REQUEST_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse().ok());

    let db_path = std::env::var("GEOIP_DB_PATH")
        .or_else(|_| std::env::var("MMDB_PATH"))
        .unwrap_or_else(|_| "GeoLite2-City.mmdb".to_string());

    let workers = std::env::var("GEOIP_WORKERS")
        .unwrap_or_else(|_| "300".to_string())
        .parse()
        .unwrap_or(300);

    let refresh_interval_secs = std::env::var("GEOIP_REFRESH_INTERVAL_SECS")
        .unwrap_or_else(|_| "86400".to_string())
        .parse()
        .unwrap_or(86400);

    let update_url = std::env::var("GEOIP_UPDATE_URL").ok().filter(|v| !v.is_empty());
    let update_path = std::env::var("GEOIP_UPDATE_PATH").ok().filter(|v| !v.is_empty());

    let data_dir = std::env::var("GEOIP_DATA_DIR").unwrap_or_else(|_| ".".to_string());

    let keep_superseded = env_flag("GEOIP_KEEP_SUPERSEDED");

    let debug = std::env::var("DEBUG").is_ok();

    Ok(Config {
        listen_addr,
        request_timeout_ms,
        db_path,
        workers,
        refresh_interval_secs,
        update_url,
        update_path,
        data_dir,
        keep_superseded,
        debug,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use parking_lot::{const_mutex, Mutex};

    // Tests below mutate process environment
    static ENV_LOCK: Mutex<()> = const_mutex(());

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.db_path, "GeoLite2-City.mmdb");
        assert_eq!(cfg.workers, 300);
        assert_eq!(cfg.refresh_interval_secs, 86400);
        assert!(cfg.update_url.is_none() && cfg.update_path.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let cfg = Config {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let cfg = Config {
            refresh_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn test_validate_rejects_both_sources() {
        let cfg = Config {
            update_url: Some("https://example.com/db.mmdb.gz".to_string()),
            update_path: Some("/srv/db.mmdb".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ConflictingSources));
    }

    #[test]
    fn test_dispatcher_config_conversion() {
        let cfg = Config {
            workers: 8,
            request_timeout_ms: Some(250),
            ..Default::default()
        };
        let dc = cfg.dispatcher_config();
        assert_eq!(dc.workers, 8);
        assert_eq!(dc.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_refresh_config_conversion() {
        let cfg = Config {
            refresh_interval_secs: 60,
            data_dir: "/var/lib/geoip".to_string(),
            keep_superseded: true,
            ..Default::default()
        };
        let rc = cfg.refresh_config();
        assert_eq!(rc.interval, Duration::from_secs(60));
        assert_eq!(rc.data_dir, PathBuf::from("/var/lib/geoip"));
        assert!(!rc.remove_superseded);
        assert_eq!(rc.file_prefix, "GeoLite2-City");
    }

    #[test]
    fn test_load_config_defaults() {
        let _lock = ENV_LOCK.lock();
        for var in [
            "PORT",
            "GEOIP_LISTEN_ADDR",
            "GEOIP_DB_PATH",
            "MMDB_PATH",
            "GEOIP_WORKERS",
            "GEOIP_UPDATE_URL",
        ] {
            std::env::remove_var(var);
        }

        let cfg = load_config().unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.db_path, "GeoLite2-City.mmdb");
        assert_eq!(cfg.workers, 300);
        assert!(cfg.update_url.is_none());
    }

    #[test]
    fn test_load_config_port_overrides_listen_addr() {
        let _lock = ENV_LOCK.lock();
        std::env::set_var("GEOIP_LISTEN_ADDR", "127.0.0.1:9000");
        std::env::set_var("PORT", "5000");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:5000");
        std::env::remove_var("PORT");

        let cfg = load_config().unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
        std::env::remove_var("GEOIP_LISTEN_ADDR");
    }

    #[test]
    fn test_load_config_mmdb_path_fallback() {
        let _lock = ENV_LOCK.lock();
        std::env::remove_var("GEOIP_DB_PATH");
        std::env::set_var("MMDB_PATH", "/data/legacy.mmdb");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.db_path, "/data/legacy.mmdb");

        std::env::set_var("GEOIP_DB_PATH", "/data/new.mmdb");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.db_path, "/data/new.mmdb");
        std::env::remove_var("GEOIP_DB_PATH");
        std::env::remove_var("MMDB_PATH");
    }

    #[test]
    fn test_load_config_refresh_settings() {
        let _lock = ENV_LOCK.lock();
        std::env::set_var("GEOIP_UPDATE_URL", "https://example.com/GeoLite2-City.mmdb.gz");
        std::env::set_var("GEOIP_REFRESH_INTERVAL_SECS", "3600");
        std::env::set_var("GEOIP_DATA_DIR", "/var/lib/geoip");
        std::env::set_var("GEOIP_KEEP_SUPERSEDED", "true");
        let cfg = load_config().unwrap();
        assert_eq!(
            cfg.update_url.as_deref(),
            Some("https://example.com/GeoLite2-City.mmdb.gz")
        );
        assert_eq!(cfg.refresh_interval_secs, 3600);
        assert_eq!(cfg.data_dir, "/var/lib/geoip");
        assert!(cfg.keep_superseded);
        for var in [
            "GEOIP_UPDATE_URL",
            "GEOIP_REFRESH_INTERVAL_SECS",
            "GEOIP_DATA_DIR",
            "GEOIP_KEEP_SUPERSEDED",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_load_config_parse_error_uses_default() {
        let _lock = ENV_LOCK.lock();
        std::env::set_var("GEOIP_WORKERS", "lots");
        std::env::set_var("GEOIP_REQUEST_TIMEOUT_MS", "soon");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.workers, 300);
        assert!(cfg.request_timeout_ms.is_none());
        std::env::remove_var("GEOIP_WORKERS");
        std::env::remove_var("GEOIP_REQUEST_TIMEOUT_MS");
    }
}
