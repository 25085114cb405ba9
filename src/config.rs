use crate::domain::{Decimal, Instrument};
use crate::engine::{DebtPolicy, MarginParams};
use chrono::FixedOffset;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub quote_api_url: String,
    pub default_instrument: Instrument,
    pub initial_cash: Decimal,
    pub margin: MarginParams,
    pub debt_policy: DebtPolicy,
    pub ranking_size: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let quote_api_url = env_map
            .get("QUOTE_API_URL")
            .cloned()
            .unwrap_or_else(|| "https://query1.finance.yahoo.com".to_string());

        let default_instrument = Instrument::new(
            env_map
                .get("DEFAULT_INSTRUMENT")
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .unwrap_or("USD/JPY"),
        );

        let initial_cash = parse_decimal(&env_map, "INITIAL_CASH", "1000000")?;
        if initial_cash.is_negative() {
            return Err(invalid("INITIAL_CASH", "must not be negative"));
        }

        let margin_ratio = parse_decimal(&env_map, "MARGIN_RATIO", "0.05")?;
        if !margin_ratio.is_positive() || margin_ratio > Decimal::one() {
            return Err(invalid("MARGIN_RATIO", "must be in (0, 1]"));
        }

        let lot_unit = parse_number::<i64>(&env_map, "LOT_UNIT", "10000")?;
        if lot_unit <= 0 {
            return Err(invalid("LOT_UNIT", "must be positive"));
        }

        let default_limit = parse_decimal(&env_map, "DEBT_LIMIT", "1000000")?;
        if default_limit.is_negative() {
            return Err(invalid("DEBT_LIMIT", "must not be negative"));
        }

        let limit_overrides = parse_limit_overrides(
            env_map
                .get("DEBT_LIMIT_OVERRIDES")
                .map(|s| s.as_str())
                .unwrap_or(""),
        )?;

        let daily_rate = parse_decimal(&env_map, "DEBT_DAILY_RATE", "0.01")?;
        if daily_rate.is_negative() {
            return Err(invalid("DEBT_DAILY_RATE", "must not be negative"));
        }

        let offset_hours = parse_number::<i32>(&env_map, "CIVIL_UTC_OFFSET_HOURS", "9")?;
        let utc_offset = (-23..=23)
            .contains(&offset_hours)
            .then(|| FixedOffset::east_opt(offset_hours * 3600))
            .flatten()
            .ok_or_else(|| invalid("CIVIL_UTC_OFFSET_HOURS", "must be between -23 and 23"))?;

        let ranking_size = parse_number::<usize>(&env_map, "RANKING_SIZE", "10")?;

        Ok(Config {
            port,
            database_path,
            quote_api_url,
            default_instrument,
            initial_cash,
            margin: MarginParams::new(margin_ratio, lot_unit),
            debt_policy: DebtPolicy {
                daily_rate,
                default_limit,
                limit_overrides,
                utc_offset,
            },
            ranking_size,
        })
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), reason.to_string())
}

fn parse_decimal(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.trim()).unwrap_or(default);
    Decimal::from_str_canonical(raw).map_err(|_| invalid(key, "must be a decimal number"))
}

fn parse_number<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError> {
    let raw = env_map.get(key).map(|s| s.trim()).unwrap_or(default);
    raw.parse::<T>()
        .map_err(|_| invalid(key, &format!("must be a valid {}", std::any::type_name::<T>())))
}

/// `alice=13000000,bob=2000000` -> per-account monthly caps.
fn parse_limit_overrides(raw: &str) -> Result<HashMap<String, Decimal>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<(String, Decimal), ConfigError> {
            let (account, cap) = entry
                .rsplit_once('=')
                .ok_or_else(|| invalid("DEBT_LIMIT_OVERRIDES", "entries must be id=cap"))?;
            let cap = Decimal::from_str_canonical(cap.trim())
                .ok()
                .filter(|cap| !cap.is_negative())
                .ok_or_else(|| {
                    invalid("DEBT_LIMIT_OVERRIDES", "caps must be non-negative numbers")
                })?;
            Ok((account.trim().to_string(), cap))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.quote_api_url, "https://query1.finance.yahoo.com");
        assert_eq!(config.default_instrument, Instrument::new("USD/JPY"));
        assert_eq!(config.initial_cash, d("1000000"));
        assert_eq!(config.margin, MarginParams::default());
        assert_eq!(config.debt_policy, DebtPolicy::default());
        assert_eq!(config.ranking_size, 10);
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_margin_ratio_bounds() {
        for bad in ["0", "-0.1", "1.5", "abc"] {
            let mut env_map = setup_required_env();
            env_map.insert("MARGIN_RATIO".to_string(), bad.to_string());
            match Config::from_env_map(env_map) {
                Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MARGIN_RATIO"),
                other => panic!("Expected InvalidValue for {}, got {:?}", bad, other),
            }
        }

        let mut env_map = setup_required_env();
        env_map.insert("MARGIN_RATIO".to_string(), "0.04".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.margin.leverage(), d("25"));
    }

    #[test]
    fn test_invalid_lot_unit() {
        let mut env_map = setup_required_env();
        env_map.insert("LOT_UNIT".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "LOT_UNIT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_debt_limit_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "DEBT_LIMIT_OVERRIDES".to_string(),
            "vip@example.social=13000000, bob=2000000".to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.debt_policy.limit_overrides.get("vip@example.social"),
            Some(&d("13000000"))
        );
        assert_eq!(config.debt_policy.limit_overrides.get("bob"), Some(&d("2000000")));
    }

    #[test]
    fn test_malformed_overrides_rejected() {
        for bad in ["alice", "alice=lots", "alice=-5"] {
            let mut env_map = setup_required_env();
            env_map.insert("DEBT_LIMIT_OVERRIDES".to_string(), bad.to_string());
            match Config::from_env_map(env_map) {
                Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEBT_LIMIT_OVERRIDES"),
                other => panic!("Expected InvalidValue for {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_civil_offset() {
        let mut env_map = setup_required_env();
        env_map.insert("CIVIL_UTC_OFFSET_HOURS".to_string(), "-5".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.debt_policy.utc_offset.local_minus_utc(), -5 * 3600);

        let mut env_map = setup_required_env();
        env_map.insert("CIVIL_UTC_OFFSET_HOURS".to_string(), "24".to_string());
        assert!(matches!(
            Config::from_env_map(env_map),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }
}
