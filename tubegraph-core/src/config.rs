use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Runtime configuration. Values come from a TOML file when present and can
/// be overridden one by one through environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// SQLite connection string, e.g. `sqlite://tubegraph.db`.
    pub database_url: String,
    /// Pool of platform API keys; one is chosen at random per call.
    pub api_keys: Vec<String>,
    /// Maximum concurrent per-video ingestion workers.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Deadline for a single unit of work (one video's comment tree).
    #[serde(default = "default_unit_timeout_secs")]
    pub unit_timeout_secs: u64,
    /// Cap on videos listed per channel or search.
    #[serde(default = "default_max_videos")]
    pub max_videos: usize,
    /// Compute approximate betweenness centrality during feature runs.
    #[serde(default)]
    pub compute_betweenness: bool,
    /// Source samples for the betweenness approximation.
    #[serde(default = "default_betweenness_samples")]
    pub betweenness_samples: usize,
    /// Lease duration for one channel ingestion run.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    /// Directory for delimited export files.
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    pub neo4j_uri: Option<String>,
    pub neo4j_user: Option<String>,
    pub neo4j_password: Option<String>,
}

fn default_max_workers() -> usize {
    60
}

fn default_unit_timeout_secs() -> u64 {
    180
}

fn default_max_videos() -> usize {
    1000
}

fn default_betweenness_samples() -> usize {
    64
}

fn default_lease_secs() -> u64 {
    3600
}

fn default_export_dir() -> String {
    "exports".to_string()
}

impl AppConfig {
    /// Load from `path` if it exists, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut config = if Path::new(path).exists() {
            let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
                path: path.to_string(),
            })?;
            toml::from_str(&raw)?
        } else {
            Self::from_env()?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Build entirely from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("TUBEGRAPH_DATABASE_URL").map_err(|_| {
            ConfigError::MissingEnvironmentVariable {
                var_name: "TUBEGRAPH_DATABASE_URL".to_string(),
            }
        })?;
        let api_keys = env::var("TUBEGRAPH_API_KEYS")
            .map(|raw| split_keys(&raw))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            api_keys,
            max_workers: default_max_workers(),
            unit_timeout_secs: default_unit_timeout_secs(),
            max_videos: default_max_videos(),
            compute_betweenness: false,
            betweenness_samples: default_betweenness_samples(),
            lease_secs: default_lease_secs(),
            export_dir: default_export_dir(),
            neo4j_uri: env::var("TUBEGRAPH_NEO4J_URI").ok(),
            neo4j_user: env::var("TUBEGRAPH_NEO4J_USER").ok(),
            neo4j_password: env::var("TUBEGRAPH_NEO4J_PASSWORD").ok(),
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("TUBEGRAPH_DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(raw) = env::var("TUBEGRAPH_API_KEYS") {
            self.api_keys = split_keys(&raw);
        }
        if let Ok(raw) = env::var("TUBEGRAPH_MAX_WORKERS") {
            if let Ok(n) = raw.parse() {
                self.max_workers = n;
            }
        }
        if let Ok(raw) = env::var("TUBEGRAPH_COMPUTE_BETWEENNESS") {
            self.compute_betweenness = raw == "1" || raw.eq_ignore_ascii_case("true");
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "database_url".to_string(),
            });
        }
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_workers".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn unit_timeout(&self) -> Duration {
        Duration::from_secs(self.unit_timeout_secs)
    }

    pub fn lease_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_secs as i64)
    }
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            database_url = "sqlite://test.db"
            api_keys = ["key-a", "key-b"]
            max_workers = 8
            compute_betweenness = true
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.database_url, "sqlite://test.db");
        assert_eq!(config.api_keys.len(), 2);
        assert_eq!(config.max_workers, 8);
        assert!(config.compute_betweenness);
        assert_eq!(config.max_videos, 1000);
    }

    #[test]
    fn test_defaults() {
        let raw = r#"
            database_url = "sqlite://test.db"
            api_keys = []
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.max_workers, 60);
        assert_eq!(config.unit_timeout_secs, 180);
        assert!(!config.compute_betweenness);
        assert_eq!(config.export_dir, "exports");
    }

    #[test]
    fn test_split_keys() {
        let keys = split_keys("a, b,,c ");
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
