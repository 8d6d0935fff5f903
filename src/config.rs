use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server settings, read from `CHAIRTIME_*` environment variables. Unset or
/// unparsable values fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub reaper_interval: Duration,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "chairtime".into(),
            max_connections: 256,
            compact_threshold: 1000,
            reaper_interval: Duration::from_secs(5),
            metrics_port: None,
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            port: parsed(&get, "CHAIRTIME_PORT").unwrap_or(d.port),
            bind: get("CHAIRTIME_BIND").unwrap_or(d.bind),
            data_dir: get("CHAIRTIME_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            password: get("CHAIRTIME_PASSWORD").unwrap_or(d.password),
            max_connections: parsed(&get, "CHAIRTIME_MAX_CONNECTIONS")
                .unwrap_or(d.max_connections),
            compact_threshold: parsed(&get, "CHAIRTIME_COMPACT_THRESHOLD")
                .unwrap_or(d.compact_threshold),
            reaper_interval: parsed(&get, "CHAIRTIME_REAPER_INTERVAL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(d.reaper_interval),
            metrics_port: parsed(&get, "CHAIRTIME_METRICS_PORT"),
            tls_cert: get("CHAIRTIME_TLS_CERT"),
            tls_key: get("CHAIRTIME_TLS_KEY"),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|s| s.trim().parse().ok())
}
