// Config is a central place for runtime configuration.
// It loads values from environment variables (and `.env` via dotenvy)
// and gives a typed struct instead of raw strings everywhere.

use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub http_addr: String,
    pub default_days: i64,
    pub db_schema: Option<String>,
    pub pool: PoolConfig,
}

/// Connection pool tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Sends `SET jit = OFF` on every new connection.
    pub disable_jit: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            acquire_timeout: Duration::from_secs(10),
            disable_jit: true,
        }
    }
}

impl PoolConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_connections: env_parse::<u32>("BATCHBOARD_DB_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections)
                .clamp(1, 32),
            acquire_timeout: env_parse::<u64>("BATCHBOARD_DB_ACQUIRE_TIMEOUT_SECS")
                .map(|secs| Duration::from_secs(secs.clamp(1, 60)))
                .unwrap_or(defaults.acquire_timeout),
            disable_jit: env_flag("BATCHBOARD_DISABLE_JIT").unwrap_or(defaults.disable_jit),
        }
    }
}

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DAYS: i64 = 60;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let http_addr = env_or_fallback("BATCHBOARD_HTTP_ADDR", "HTTP_ADDR")
            .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());

        let default_days = env_or_fallback("BATCHBOARD_DEFAULT_DAYS", "DEFAULT_DAYS")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|d| *d >= 0)
            .unwrap_or(DEFAULT_DAYS);

        let db_schema = match env_or_fallback("BATCHBOARD_DB_SCHEMA", "DB_SCHEMA") {
            Some(raw) => Some(validate_schema(&raw)?),
            None => None,
        };

        Ok(Self {
            database_url,
            http_addr,
            default_days,
            db_schema,
            pool: PoolConfig::from_env(),
        })
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().as_deref().and_then(parse_flag)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

/// The schema name ends up in `SET search_path`, which cannot take a bind
/// parameter, so only plain identifiers are accepted.
pub fn validate_schema(raw: &str) -> anyhow::Result<String> {
    let v = raw.trim();
    let mut chars = v.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !first_ok || !rest_ok || v.len() > 63 {
        anyhow::bail!("invalid schema name {v:?}: expected a plain SQL identifier");
    }
    Ok(v.to_string())
}
