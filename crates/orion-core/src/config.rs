use crate::error::OrionResult;
use serde::Deserialize;
use std::path::PathBuf;

/// Process-wide configuration, loaded once at startup from `.env` and the
/// environment. Layering mirrors the teacher crate's `config` + `dotenvy`
/// pair: `.env` seeds defaults, real environment variables always win.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root directory for `edgar_filings/`, `metadata/`, `filings/`, `queue/`.
    #[serde(default = "default_data_dir")]
    pub orion_data_dir: PathBuf,

    #[serde(default = "default_neo4j_uri")]
    pub neo4j_uri: String,
    #[serde(default = "default_neo4j_user")]
    pub neo4j_user: String,
    #[serde(default)]
    pub neo4j_password: String,

    /// Mandatory User-Agent header for all archive HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Hard request budget against the archive host.
    #[serde(default = "default_rate_limit")]
    pub max_requests_per_second: u32,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_neo4j_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_neo4j_user() -> String {
    "neo4j".to_string()
}

fn default_user_agent() -> String {
    "Orion-Edgar-Pipeline/1.0 (contact@example.com)".to_string()
}

fn default_rate_limit() -> u32 {
    10
}

impl AppConfig {
    /// Load configuration from `.env` (if present) then the process
    /// environment, falling back to the defaults above.
    pub fn load() -> OrionResult<Self> {
        // Missing .env is not an error; real deployments set env vars directly.
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .set_default("orion_data_dir", default_data_dir().to_string_lossy().to_string())?
            .set_default("neo4j_uri", default_neo4j_uri())?
            .set_default("neo4j_user", default_neo4j_user())?
            .set_default("neo4j_password", "")?
            .set_default("user_agent", default_user_agent())?
            .set_default("max_requests_per_second", default_rate_limit() as i64)?
            .add_source(
                config::Environment::default()
                    .prefix("ORION")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            // A handful of env vars are named without the ORION_ prefix per
            // the spec's contract (NEO4J_URI, NEO4J_USER, NEO4J_PASSWORD).
            .add_source(config::Environment::default().try_parsing(true));

        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn filings_dir(&self) -> PathBuf {
        self.orion_data_dir.join("filings")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.orion_data_dir.join("metadata")
    }

    pub fn edgar_filings_dir(&self) -> PathBuf {
        self.orion_data_dir.join("edgar_filings")
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.orion_data_dir.join("queue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig {
            orion_data_dir: default_data_dir(),
            neo4j_uri: default_neo4j_uri(),
            neo4j_user: default_neo4j_user(),
            neo4j_password: String::new(),
            user_agent: default_user_agent(),
            max_requests_per_second: default_rate_limit(),
        };
        assert_eq!(cfg.max_requests_per_second, 10);
        assert_eq!(cfg.filings_dir(), PathBuf::from("./data/filings"));
        assert_eq!(cfg.queue_dir(), PathBuf::from("./data/queue"));
    }
}
