use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use time::Duration;

use clap::{Parser, Subcommand};

use crate::forecast::ForecastConfig;
use crate::report::ReportConfig;
use crate::store::StoreConfig;
use crate::sync::SyncConfig;

#[derive(Parser, Debug)]
#[command(name = "finlog", about = "finlog - personal finance tracker and forecaster")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "finlog.toml")]
    pub config: String,

    /// Data directory (overrides config file)
    #[arg(short, long)]
    pub data_dir: Option<String>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a revenue or expense entry
    Add {
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// "revenue" or "expense"
        #[arg(long)]
        kind: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List records, optionally filtered
    List {
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Print the monthly table for a year
    Months {
        #[arg(long)]
        year: i32,
    },
    /// Generate the full report for a year
    Report {
        #[arg(long)]
        year: i32,
    },
    /// Project future periods for a year's net income
    Forecast {
        #[arg(long)]
        year: i32,
        /// linear, exponential or seasonal
        #[arg(long, default_value = "linear")]
        method: String,
        #[arg(long)]
        periods: Option<u32>,
    },
    /// Export records (or a monthly summary) as CSV to stdout
    Export {
        #[arg(long)]
        year: Option<i32>,
        /// Export the monthly summary instead of raw records
        #[arg(long)]
        monthly: bool,
    },
    /// Run the periodic maintenance loop (backup snapshots and cloud sync)
    Watch,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_store")]
    pub store: StoreSection,

    #[serde(default = "default_forecast")]
    pub forecast: ForecastSection,

    #[serde(default = "default_anomaly")]
    pub anomaly: AnomalySection,

    #[serde(default = "default_sync")]
    pub sync: SyncSection,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    #[serde(default = "default_max_record_age_days")]
    pub max_record_age_days: i64,

    #[serde(default = "default_review_threshold")]
    pub review_threshold: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastSection {
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,

    #[serde(default = "default_periods")]
    pub periods: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnomalySection {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncSection {
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_store() -> StoreSection {
    StoreSection {
        data_dir: default_data_dir(),
        namespace: default_namespace(),
        cache_ttl_secs: default_cache_ttl_secs(),
        max_backups: default_max_backups(),
        max_record_age_days: default_max_record_age_days(),
        review_threshold: default_review_threshold(),
    }
}

fn default_forecast() -> ForecastSection {
    ForecastSection {
        decay_rate: default_decay_rate(),
        confidence_floor: default_confidence_floor(),
        periods: default_periods(),
    }
}

fn default_anomaly() -> AnomalySection {
    AnomalySection {
        threshold: default_threshold(),
    }
}

fn default_sync() -> SyncSection {
    SyncSection {
        failure_rate: default_failure_rate(),
        max_attempts: default_max_attempts(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_data_dir() -> String {
    ".finlog".to_string()
}

fn default_namespace() -> String {
    "finlog".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_backups() -> usize {
    5
}

fn default_max_record_age_days() -> i64 {
    3650
}

fn default_review_threshold() -> Decimal {
    dec!(50_000)
}

fn default_decay_rate() -> f64 {
    0.1
}

fn default_confidence_floor() -> f64 {
    0.5
}

fn default_periods() -> u32 {
    6
}

fn default_threshold() -> f64 {
    2.5
}

fn default_failure_rate() -> f64 {
    0.1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: default_store(),
            forecast: default_forecast(),
            anomaly: default_anomaly(),
            sync: default_sync(),
            logging: default_logging(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(ref dir) = cli.data_dir {
            config.store.data_dir = dir.clone();
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        config
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            namespace: self.store.namespace.clone(),
            cache_ttl: Duration::seconds(self.store.cache_ttl_secs as i64),
            max_backups: self.store.max_backups,
            max_record_age_days: self.store.max_record_age_days,
            review_threshold: self.store.review_threshold,
        }
    }

    pub fn forecast_config(&self) -> ForecastConfig {
        ForecastConfig {
            decay_rate: self.forecast.decay_rate,
            confidence_floor: self.forecast.confidence_floor,
        }
    }

    pub fn report_config(&self) -> ReportConfig {
        ReportConfig {
            forecast: self.forecast_config(),
            forecast_periods: self.forecast.periods,
            anomaly_threshold: self.anomaly.threshold,
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            failure_rate: self.sync.failure_rate,
            max_attempts: self.sync.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let config = Config::default();
        assert_eq!(config.store.max_backups, 5);
        assert_eq!(config.store.cache_ttl_secs, 300);
        assert_eq!(config.forecast.confidence_floor, 0.5);
        assert_eq!(config.anomaly.threshold, 2.5);
        assert_eq!(config.sync.max_attempts, 3);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            "
            [store]
            max_backups = 3

            [forecast]
            decay_rate = 0.05
            ",
        )
        .unwrap();
        assert_eq!(config.store.max_backups, 3);
        assert_eq!(config.store.namespace, "finlog");
        assert_eq!(config.forecast.decay_rate, 0.05);
        assert_eq!(config.forecast.periods, 6);
    }
}
