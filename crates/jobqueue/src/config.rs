use crate::telemetry::LogFormat;

/// Runtime configuration, loaded from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub worker_count: usize,
    pub poll_interval_ms: u64,
    pub stats_interval_secs: u64,
    pub migrate_on_startup: bool,
    pub log_format: LogFormat,
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://workers.db";

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            worker_count: 3,
            poll_interval_ms: 1000,
            stats_interval_secs: 30,
            migrate_on_startup: true,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let database_url = env_or_fallback("JOBQUEUE_DATABASE_URL", "DATABASE_URL")
            .unwrap_or(defaults.database_url);

        let worker_count = env_or_fallback("JOBQUEUE_WORKER_COUNT", "WORKER_COUNT")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(defaults.worker_count)
            .max(1);

        let poll_interval_ms = env_parse("JOBQUEUE_POLL_INTERVAL_MS")
            .filter(|ms| *ms > 0)
            .unwrap_or(defaults.poll_interval_ms);

        let stats_interval_secs = env_parse("JOBQUEUE_STATS_INTERVAL_SECS")
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.stats_interval_secs);

        let migrate_on_startup =
            env_bool("JOBQUEUE_MIGRATE_ON_STARTUP").unwrap_or(defaults.migrate_on_startup);

        let log_format = std::env::var("JOBQUEUE_LOG_FORMAT")
            .ok()
            .map(|v| LogFormat::parse(&v))
            .unwrap_or(defaults.log_format);

        Ok(Self {
            database_url,
            worker_count,
            poll_interval_ms,
            stats_interval_secs,
            migrate_on_startup,
            log_format,
        })
    }

    /// Replace the database with a bare file path or a full `sqlite:` URL.
    pub fn with_database(mut self, path_or_url: &str) -> Self {
        self.database_url = database_url_for(path_or_url);
        self
    }
}

pub fn database_url_for(path_or_url: &str) -> String {
    let v = path_or_url.trim();
    if v.starts_with("sqlite:") {
        v.to_string()
    } else {
        format!("sqlite://{v}")
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_parse(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| parse_bool(&v))
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_paths_become_sqlite_urls() {
        assert_eq!(database_url_for("users.db"), "sqlite://users.db");
        assert_eq!(database_url_for("/tmp/q.db"), "sqlite:///tmp/q.db");
        assert_eq!(database_url_for("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            Config::default().with_database("jobs.db").database_url,
            "sqlite://jobs.db"
        );
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["0", "false", "off", ""] {
            assert!(!parse_bool(v), "{v}");
        }
    }

    #[test]
    fn defaults_match_the_documented_policy() {
        let cfg = Config::default();
        assert_eq!(cfg.worker_count, 3);
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert_eq!(cfg.stats_interval_secs, 30);
        assert!(cfg.migrate_on_startup);
    }
}
