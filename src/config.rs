use log::{debug, info};
use std::env;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_SENSOR_NAME: &str = "Ruuvi 524A";
const DEFAULT_LATEST_DEVICE_NAME: &str = "RuuviTag";
const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 10;
const DEFAULT_PERSIST_INTERVAL_SECS: u64 = 60;
const DEFAULT_SCHEDULER_TICK_SECS: u64 = 1;

/// How often the buffer is drained into each sink. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub interval_latest: Duration,
    pub interval_history: Duration,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    /// Advertised name of the sensor; anything else is ignored
    pub sensor_name: String,
    /// Name of the "current state" record updated by the latest flush
    pub latest_device_name: String,
    pub flush_policy: FlushPolicy,
    pub scheduler_tick: Duration,
}

impl ServiceConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = non_empty("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let sensor_name =
            non_empty("RUUVI_SENSOR_NAME").unwrap_or_else(|| DEFAULT_SENSOR_NAME.to_string());
        let latest_device_name = non_empty("LATEST_DEVICE_NAME")
            .unwrap_or_else(|| DEFAULT_LATEST_DEVICE_NAME.to_string());

        let seconds = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match non_empty(name) {
                None => Ok(default),
                Some(value) => match value.parse::<u64>() {
                    Ok(secs) if secs > 0 => Ok(secs),
                    _ => Err(ConfigError::InvalidInterval { name, value }),
                },
            }
        };

        let latest = seconds("UPDATE_INTERVAL_SECS", DEFAULT_UPDATE_INTERVAL_SECS)?;
        let history = seconds("PERSIST_INTERVAL_SECS", DEFAULT_PERSIST_INTERVAL_SECS)?;
        let tick = seconds("SCHEDULER_TICK_SECS", DEFAULT_SCHEDULER_TICK_SECS)?;

        if latest >= history {
            return Err(ConfigError::IntervalOrder { latest, history });
        }
        if tick > latest {
            return Err(ConfigError::TickTooLong { tick, latest });
        }

        debug!("Sensor name: '{}'", sensor_name);
        debug!("Latest record name: '{}'", latest_device_name);
        info!(
            "Flush policy: update latest every {}s, persist history every {}s",
            latest, history
        );

        Ok(ServiceConfig {
            database_url,
            sensor_name,
            latest_device_name,
            flush_policy: FlushPolicy {
                interval_latest: Duration::from_secs(latest),
                interval_history: Duration::from_secs(history),
            },
            scheduler_tick: Duration::from_secs(tick),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/ruuvi")]).unwrap();

        assert_eq!(config.database_url, "postgres://localhost/ruuvi");
        assert_eq!(config.sensor_name, "Ruuvi 524A");
        assert_eq!(config.latest_device_name, "RuuviTag");
        assert_eq!(config.flush_policy.interval_latest, Duration::from_secs(10));
        assert_eq!(config.flush_policy.interval_history, Duration::from_secs(60));
        assert_eq!(config.scheduler_tick, Duration::from_secs(1));
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/ruuvi"),
            ("RUUVI_SENSOR_NAME", " Ruuvi 1234 "),
            ("LATEST_DEVICE_NAME", "Sauna"),
            ("UPDATE_INTERVAL_SECS", "5"),
            ("PERSIST_INTERVAL_SECS", "600"),
            ("SCHEDULER_TICK_SECS", "2"),
        ])
        .unwrap();

        assert_eq!(config.sensor_name, "Ruuvi 1234");
        assert_eq!(config.latest_device_name, "Sauna");
        assert_eq!(config.flush_policy.interval_latest, Duration::from_secs(5));
        assert_eq!(config.flush_policy.interval_history, Duration::from_secs(600));
        assert_eq!(config.scheduler_tick, Duration::from_secs(2));
    }

    #[test]
    fn requires_database_url() {
        assert_eq!(
            load(&[("DATABASE_URL", "  ")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn rejects_bad_intervals() {
        let err = load(&[
            ("DATABASE_URL", "postgres://db/ruuvi"),
            ("UPDATE_INTERVAL_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval { name: "UPDATE_INTERVAL_SECS", .. }));

        let err = load(&[
            ("DATABASE_URL", "postgres://db/ruuvi"),
            ("PERSIST_INTERVAL_SECS", "ten"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval { name: "PERSIST_INTERVAL_SECS", .. }));
    }

    #[test]
    fn latest_interval_must_be_shorter_than_history() {
        let err = load(&[
            ("DATABASE_URL", "postgres://db/ruuvi"),
            ("UPDATE_INTERVAL_SECS", "60"),
            ("PERSIST_INTERVAL_SECS", "60"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::IntervalOrder { latest: 60, history: 60 });
    }

    #[test]
    fn tick_cannot_exceed_latest_interval() {
        let err = load(&[
            ("DATABASE_URL", "postgres://db/ruuvi"),
            ("SCHEDULER_TICK_SECS", "30"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::TickTooLong { tick: 30, latest: 10 });
    }
}
