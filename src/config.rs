use crate::domain::{Decimal, MarketIdx};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub price_feed_url: String,
    pub price_poll_interval: Duration,
    pub positions_debounce: Duration,
    pub positions_resync_interval: Duration,
    pub close_settle_delay: Duration,
    pub market_depth: Decimal,
    /// Raw vault rate (10^12 scale). Unset means PnL is not capped.
    pub max_pnl_rate: Option<Decimal>,
    pub default_market_idx: MarketIdx,
    pub valuation_cache_size: usize,
    pub sandbox_accounts: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            price_feed_url: "https://api.binance.com".to_string(),
            price_poll_interval: Duration::from_millis(5000),
            positions_debounce: Duration::from_millis(500),
            positions_resync_interval: Duration::from_millis(10_000),
            close_settle_delay: Duration::from_millis(5000),
            market_depth: Decimal::one(),
            max_pnl_rate: None,
            default_market_idx: MarketIdx(1),
            valuation_cache_size: 512,
            sandbox_accounts: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let port = parse_or(&env_map, "PORT", defaults.port, "must be a valid u16")?;

        let price_feed_url = env_map
            .get("PRICE_FEED_URL")
            .cloned()
            .unwrap_or(defaults.price_feed_url);

        let price_poll_interval = parse_millis(&env_map, "PRICE_POLL_INTERVAL_MS", defaults.price_poll_interval)?;
        let positions_debounce = parse_millis(&env_map, "POSITIONS_DEBOUNCE_MS", defaults.positions_debounce)?;
        let positions_resync_interval = parse_millis(
            &env_map,
            "POSITIONS_RESYNC_INTERVAL_MS",
            defaults.positions_resync_interval,
        )?;
        let close_settle_delay = parse_millis(&env_map, "CLOSE_SETTLE_DELAY_MS", defaults.close_settle_delay)?;

        if price_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "PRICE_POLL_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if positions_resync_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "POSITIONS_RESYNC_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let market_depth = match env_map.get("MARKET_DEPTH") {
            Some(raw) => match Decimal::from_str(raw.trim()) {
                Ok(depth) if depth.is_positive() => depth,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "MARKET_DEPTH".to_string(),
                        "must be a positive decimal".to_string(),
                    ))
                }
            },
            None => defaults.market_depth,
        };

        let max_pnl_rate = match env_map.get("MAX_PNL_RATE") {
            Some(raw) => {
                let rate = raw.trim().parse::<u128>().ok().and_then(Decimal::from_u128);
                match rate {
                    Some(rate) => Some(rate),
                    None => {
                        return Err(ConfigError::InvalidValue(
                            "MAX_PNL_RATE".to_string(),
                            "must be a non-negative integer".to_string(),
                        ))
                    }
                }
            }
            None => defaults.max_pnl_rate,
        };

        let default_market_idx = MarketIdx(parse_or(
            &env_map,
            "DEFAULT_MARKET_IDX",
            defaults.default_market_idx.0,
            "must be a valid u32",
        )?);
        if crate::domain::Market::from_idx(default_market_idx).is_none() {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_MARKET_IDX".to_string(),
                format!("unknown market {}", default_market_idx),
            ));
        }

        let valuation_cache_size = parse_or(
            &env_map,
            "VALUATION_CACHE_SIZE",
            defaults.valuation_cache_size,
            "must be a valid usize",
        )?;
        let sandbox_accounts = parse_or(
            &env_map,
            "SANDBOX_ACCOUNTS",
            defaults.sandbox_accounts,
            "must be a valid usize",
        )?;

        Ok(Config {
            port,
            price_feed_url,
            price_poll_interval,
            positions_debounce,
            positions_resync_interval,
            close_settle_delay,
            market_depth,
            max_pnl_rate,
            default_market_idx,
            valuation_cache_size,
            sandbox_accounts,
        })
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expectation: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), expectation.to_string())),
        None => Ok(default),
    }
}

fn parse_millis(
    env_map: &HashMap<String, String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let default_ms = default.as_millis() as u64;
    parse_or(env_map, key, default_ms, "must be a valid u64").map(Duration::from_millis)
}
