//! Server configuration.
//!
//! Built once in `main` from the process environment (after `.env` is loaded)
//! and passed down explicitly. Nothing below the binary reads environment
//! variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DATABASE_URL` | (required) | PostgreSQL connection string |
//! | `HOST` / `PORT` | `0.0.0.0` / `8080` | Listen address |
//! | `DB_MAX_CONNECTIONS` | 10 | Pool size |
//! | `REDIS_URL` | `redis://127.0.0.1:6379` | Session store |
//! | `REQUEST_TIMEOUT_SECS` | 30 | Per-request timeout |
//! | `ALLOWED_ORIGINS` | `http://localhost:3000` | Comma-separated CORS origins |
//! | `OPENAI_URL` | (unset) | Chat completions base URL; unset disables suggestions |
//! | `OPENAI_API_KEY` | (unset) | Bearer token for `OPENAI_URL` |
//! | `TAG_SUGGESTER_MODEL` | `gpt-4o-mini` | Suggestion model |
//! | `DEFAULT_GENERATE_TAG_NUM` | 3 | Tags per suggestion when unspecified |
//! | `QDRANT_URL` | (unset) | Tag graph; unset disables closest-tag lookups |
//! | `QDRANT_COLLECTION` | `tags` | Qdrant collection |
//! | `INFERER_URL` | (unset) | Triton server; required with `QDRANT_URL` |
//! | `INFERER_MODEL` | `ensemble_model` | Triton model |

use std::net::SocketAddr;
use std::time::Duration;

use archipelago_core::defaults;
use archipelago_core::{Error, Result};
use archipelago_db::PoolConfig;
use archipelago_inference::{SuggesterConfig, TagGraphConfig};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub pool: PoolConfig,
    pub redis_url: String,
    pub request_timeout: Duration,
    pub allowed_origins: Vec<String>,
    /// `None` disables tag suggestion.
    pub suggester: Option<SuggesterConfig>,
    /// `None` disables the tag graph.
    pub tag_graph: Option<TagGraphConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            get("DATABASE_URL").ok_or_else(|| Error::Config("DATABASE_URL is not set".into()))?;

        let host = get("HOST").unwrap_or_else(|| defaults::SERVER_HOST.to_string());
        let port: u16 = parse_or(get("PORT"), "PORT", defaults::SERVER_PORT)?;
        let listen_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address {}:{}: {}", host, port, e)))?;

        let max_connections = parse_or(
            get("DB_MAX_CONNECTIONS"),
            "DB_MAX_CONNECTIONS",
            defaults::DB_MAX_CONNECTIONS,
        )?;
        let pool = PoolConfig::new().max_connections(max_connections);

        let request_timeout = Duration::from_secs(parse_or(
            get("REQUEST_TIMEOUT_SECS"),
            "REQUEST_TIMEOUT_SECS",
            defaults::REQUEST_TIMEOUT_SECS,
        )?);

        let allowed_origins = get("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let suggester = match get("OPENAI_URL") {
            Some(url) => {
                let mut config = SuggesterConfig::new(url).with_default_count(parse_or(
                    get("DEFAULT_GENERATE_TAG_NUM"),
                    "DEFAULT_GENERATE_TAG_NUM",
                    defaults::SUGGESTED_TAG_COUNT,
                )?);
                if let Some(key) = get("OPENAI_API_KEY") {
                    config = config.with_api_key(key);
                }
                if let Some(model) = get("TAG_SUGGESTER_MODEL") {
                    config = config.with_model(model);
                }
                config.validate()?;
                Some(config)
            }
            None => None,
        };

        let tag_graph = match (get("QDRANT_URL"), get("INFERER_URL")) {
            (Some(qdrant), Some(inferer)) => {
                let mut config = TagGraphConfig::new(qdrant, inferer);
                if let Some(collection) = get("QDRANT_COLLECTION") {
                    config = config.with_collection(collection);
                }
                if let Some(model) = get("INFERER_MODEL") {
                    config = config.with_inferer_model(model);
                }
                config.validate()?;
                Some(config)
            }
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "QDRANT_URL and INFERER_URL must be set together".into(),
                ))
            }
        };

        Ok(Self {
            listen_addr,
            database_url,
            pool,
            redis_url: get("REDIS_URL").unwrap_or_else(|| defaults::REDIS_URL.to_string()),
            request_timeout,
            allowed_origins,
            suggester,
            tag_graph,
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value '{}'", key, v))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/archipelago")]).unwrap();
        assert_eq!(config.listen_addr.port(), defaults::SERVER_PORT);
        assert_eq!(config.pool.max_connections, defaults::DB_MAX_CONNECTIONS);
        assert_eq!(config.redis_url, defaults::REDIS_URL);
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
        assert!(config.suggester.is_none());
        assert!(config.tag_graph.is_none());
    }

    #[test]
    fn test_database_url_required() {
        assert!(matches!(config_from(&[]), Err(Error::Config(_))));
        assert!(config_from(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn test_invalid_port() {
        let err = config_from(&[("DATABASE_URL", "postgres://x"), ("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_advisory_services_enabled() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("OPENAI_URL", "http://llm:11434/v1"),
            ("TAG_SUGGESTER_MODEL", "llama3"),
            ("DEFAULT_GENERATE_TAG_NUM", "5"),
            ("QDRANT_URL", "http://qdrant:6333"),
            ("INFERER_URL", "http://triton:8000"),
            ("QDRANT_COLLECTION", "user_tags"),
        ])
        .unwrap();

        let suggester = config.suggester.unwrap();
        assert_eq!(suggester.model, "llama3");
        assert_eq!(suggester.default_count, 5);
        let graph = config.tag_graph.unwrap();
        assert_eq!(graph.collection, "user_tags");
        assert_eq!(graph.inferer_model, defaults::INFERER_MODEL);
    }

    #[test]
    fn test_tag_graph_needs_both_urls() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("QDRANT_URL", "http://qdrant:6333"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_origins_are_split_and_trimmed() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("ALLOWED_ORIGINS", "https://a.example, ,https://b.example "),
        ])
        .unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }
}
