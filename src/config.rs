//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string; the in-memory store is used when unset
//! - `DATABASE_MAX_CONNECTIONS` - pool size (default: 10)
//! - `HOST` - bind address (default: 0.0.0.0)
//! - `PORT` - listen port (default: 8083)
//! - `NATS_URL` - event bus; events are only logged when unset
//! - `VAT_RATE` - VAT applied at checkout (default: 0.20)
//! - `STORE_CURRENCY` - currency sent to the payment provider (default: EUR)
//! - `STALE_CART_DAYS` - age after which anonymous carts are deleted (default: 90)
//! - `CART_CLEANUP_INTERVAL_SECS` - how often the cleanup runs (default: 86400)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    pub nats_url: Option<String>,
    pub pricing: PricingConfig,
    pub cart_cleanup: CartCleanupConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    pub vat_rate: Decimal,
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self { Self { vat_rate: Decimal::new(20, 2), currency: "EUR".into() } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartCleanupConfig {
    pub stale_after_days: i64,
    pub interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let vat_rate: Decimal = parse_or(&get, "VAT_RATE", Decimal::new(20, 2))?;
        if vat_rate < Decimal::ZERO || vat_rate > Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar("VAT_RATE".into(), "must be between 0 and 1".into()));
        }
        let stale_after_days: i64 = parse_or(&get, "STALE_CART_DAYS", 90)?;
        if stale_after_days <= 0 {
            return Err(ConfigError::InvalidEnvVar("STALE_CART_DAYS".into(), "must be positive".into()));
        }
        let cleanup_secs: u64 = parse_or(&get, "CART_CLEANUP_INTERVAL_SECS", 86_400)?;
        if cleanup_secs == 0 {
            return Err(ConfigError::InvalidEnvVar("CART_CLEANUP_INTERVAL_SECS".into(), "must be positive".into()));
        }
        Ok(Self {
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            host: parse_or(&get, "HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or(&get, "PORT", 8083)?,
            nats_url: get("NATS_URL"),
            pricing: PricingConfig {
                vat_rate,
                currency: get("STORE_CURRENCY").map(|c| c.to_uppercase()).unwrap_or_else(|| "EUR".into()),
            },
            cart_cleanup: CartCleanupConfig {
                stale_after_days,
                interval: Duration::from_secs(cleanup_secs),
            },
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.into(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.socket_addr().to_string(), "0.0.0.0:8083");
        assert_eq!(cfg.pricing, PricingConfig::default());
        assert_eq!(cfg.cart_cleanup.stale_after_days, 90);
        assert_eq!(cfg.cart_cleanup.interval, Duration::from_secs(86_400));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[("PORT", "9000"), ("VAT_RATE", "0.07"), ("STORE_CURRENCY", "usd"), ("DATABASE_URL", "postgres://x")]).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.pricing.vat_rate, Decimal::new(7, 2));
        assert_eq!(cfg.pricing.currency, "USD");
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://x"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("PORT", "eighty")]), Err(ConfigError::InvalidEnvVar(k, _)) if k == "PORT"));
        assert!(matches!(config(&[("VAT_RATE", "1.5")]), Err(ConfigError::InvalidEnvVar(k, _)) if k == "VAT_RATE"));
        assert!(matches!(config(&[("STALE_CART_DAYS", "0")]), Err(ConfigError::InvalidEnvVar(..))));
        assert!(matches!(config(&[("CART_CLEANUP_INTERVAL_SECS", "0")]), Err(ConfigError::InvalidEnvVar(..))));
    }
}
