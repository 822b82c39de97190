use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use eqindex_core::constants::{DEFAULT_INITIAL_NAV, DEFAULT_TOP_N, INIT_LOOKBACK_DAYS};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub default_top_n: u32,
    pub default_initial_nav: Decimal,
    pub init_lookback_days: u32,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db_path = var("EQX_DB_PATH").unwrap_or_else(|| "./db/eqindex.db".into());
        let cache_enabled = match var("EQX_CACHE_ENABLED") {
            Some(v) => parse_bool(&v).ok_or_else(|| anyhow!("Invalid EQX_CACHE_ENABLED: {}", v))?,
            None => true,
        };
        let ttl_secs: u64 = parse_or("EQX_CACHE_TTL_SECS", var("EQX_CACHE_TTL_SECS"), 600)?;
        let default_top_n = parse_or("EQX_DEFAULT_TOP_N", var("EQX_DEFAULT_TOP_N"), DEFAULT_TOP_N)?;
        let default_initial_nav = match var("EQX_DEFAULT_INITIAL_NAV") {
            Some(v) => Decimal::from_str(&v)
                .with_context(|| format!("Invalid EQX_DEFAULT_INITIAL_NAV: {}", v))?,
            None => Decimal::from_str(DEFAULT_INITIAL_NAV)?,
        };
        let init_lookback_days = parse_or(
            "EQX_INIT_LOOKBACK_DAYS",
            var("EQX_INIT_LOOKBACK_DAYS"),
            INIT_LOOKBACK_DAYS,
        )?;
        let log_format = match var("EQX_LOG_FORMAT").as_deref() {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            db_path,
            cache_enabled,
            cache_ttl: Duration::from_secs(ttl_secs),
            default_top_n,
            default_initial_nav,
            init_lookback_days,
            log_format,
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .parse()
            .with_context(|| format!("Invalid {}: {}", key, v)),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
