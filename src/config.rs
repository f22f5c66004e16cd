use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};

pub const DEFAULT_DUNE_API_URL: &str = "https://api.dune.com";
pub const DEFAULT_QUERY_URL_BASE: &str = "https://dune.com/queries";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 300;
pub const DEFAULT_CACHE_STALE_WHILE_REVALIDATE_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct Config {
    /// Unset is allowed at startup; requests then fail with a configuration error.
    pub dune_api_key: Option<String>,
    pub dune_api_url: String,
    pub query_url_base: String,
    pub bind_addr: SocketAddr,
    pub cache_max_age_secs: u64,
    pub cache_stale_while_revalidate_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_addr = or_default("BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("BIND_ADDR is not a socket address: {}", bind_addr))?;

        Ok(Self {
            dune_api_key: lookup("DUNE_API_KEY_TOKEN").filter(|k| !k.trim().is_empty()),
            dune_api_url: or_default("DUNE_API_URL", DEFAULT_DUNE_API_URL),
            query_url_base: or_default("DUNE_QUERY_URL_BASE", DEFAULT_QUERY_URL_BASE),
            bind_addr,
            cache_max_age_secs: parse_secs(&lookup, "CACHE_MAX_AGE_SECS", DEFAULT_CACHE_MAX_AGE_SECS)?,
            cache_stale_while_revalidate_secs: parse_secs(
                &lookup,
                "CACHE_STALE_WHILE_REVALIDATE_SECS",
                DEFAULT_CACHE_STALE_WHILE_REVALIDATE_SECS,
            )?,
        })
    }

    pub fn cache_control(&self) -> String {
        format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            self.cache_max_age_secs, self.cache_stale_while_revalidate_secs
        )
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{} must be a whole number of seconds, got {:?}", key, raw)),
        None => Ok(default),
    }
}
