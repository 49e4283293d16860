use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_DOMAIN: &str = "n.254a.com";
pub const DEFAULT_ALIAS: &str = "y";
pub const DEFAULT_COOKIE_TTL_DAYS: u64 = 30;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Collector host that receives the pixel
    pub domain: String,
    /// Name under which the host page reaches the tracker
    pub alias: String,
    pub cookie_ttl_days: u64,
    /// Send unresolved data-layer values as the literal `undefined`
    #[serde(default)]
    pub transmit_undefined: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            alias: DEFAULT_ALIAS.to_string(),
            cookie_ttl_days: DEFAULT_COOKIE_TTL_DAYS,
            transmit_undefined: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let domain = std::env::var("YIELDR_DOMAIN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());

        let alias = std::env::var("YIELDR_ALIAS").unwrap_or_else(|_| DEFAULT_ALIAS.to_string());

        let cookie_ttl_days = std::env::var("YIELDR_COOKIE_TTL_DAYS")
            .unwrap_or_else(|_| DEFAULT_COOKIE_TTL_DAYS.to_string())
            .parse::<u64>()
            .context("YIELDR_COOKIE_TTL_DAYS must be a whole number of days")?;

        let transmit_undefined = std::env::var("YIELDR_TRANSMIT_UNDEFINED")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            domain,
            alias,
            cookie_ttl_days,
            transmit_undefined,
        })
    }

    pub fn cookie_ttl(&self) -> Duration {
        Duration::from_secs(self.cookie_ttl_days.saturating_mul(SECONDS_PER_DAY))
    }
}
