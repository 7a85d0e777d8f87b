use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

use crate::domain::TimeInForce;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub order: OrderConfig,
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub account: AccountConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// REST API endpoint (testnet: https://testnet.binance.vision)
    pub base_url: String,
    /// recvWindow for signed requests, in milliseconds
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_recv_window() -> u64 {
    5000
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderConfig {
    /// Trading pair in exchange format (e.g., "BTCEUR")
    pub symbol: String,
    /// Amount of quote asset to spend per run
    #[serde(default)]
    pub spend_quote: Option<Decimal>,
    /// Fraction of best ask used as the limit price (e.g., 0.999)
    pub price_multiplier: Decimal,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    /// Maximum reprice attempts before giving up
    pub max_reprices: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Poll the placed order until it fills
    pub enabled: bool,
    /// Seconds between order status checks
    pub poll_interval_secs: u64,
    /// Consecutive polls with the ask above the limit before repricing
    pub intervals_before_reprice: u32,
    /// Stop polling after this many checks and leave the order resting
    pub max_polls: u32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScheduleConfig {
    /// Skip the run if a buy already filled this ISO week
    #[serde(default)]
    pub once_per_week: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// User name the orders are recorded under
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; persistence is disabled when absent
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    2
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DryRunConfig {
    /// Enable dry run mode (no real orders)
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a config directory, then the environment
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("exchange.base_url", "https://api.binance.com")?
            .set_default("exchange.recv_window", 5000)?
            .set_default("exchange.timeout_secs", 30)?
            .set_default("order.symbol", "BTCEUR")?
            .set_default("order.price_multiplier", "0.999")?
            .set_default("order.time_in_force", "GTC")?
            .set_default("order.max_reprices", 3)?
            .set_default("monitor.enabled", true)?
            .set_default("monitor.poll_interval_secs", 60)?
            .set_default("monitor.intervals_before_reprice", 5)?
            .set_default("monitor.max_polls", 1440)?
            .set_default("schedule.once_per_week", false)?
            .set_default("account.user", "default")?
            .set_default("database.max_connections", 2)?
            .set_default("dry_run.enabled", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("DCA_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (DCA__ORDER__SYMBOL, etc.)
            .add_source(
                Environment::with_prefix("DCA")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for tests and one-off runs
    pub fn default_config(dry_run: bool, symbol: &str) -> Self {
        use rust_decimal_macros::dec;

        Self {
            exchange: ExchangeConfig {
                base_url: "https://api.binance.com".to_string(),
                recv_window: 5000,
                timeout_secs: 30,
            },
            order: OrderConfig {
                symbol: symbol.to_string(),
                spend_quote: Some(dec!(100)),
                price_multiplier: dec!(0.999),
                time_in_force: TimeInForce::GTC,
                max_reprices: 3,
            },
            monitor: MonitorConfig {
                enabled: true,
                poll_interval_secs: 60,
                intervals_before_reprice: 5,
                max_polls: 1440,
            },
            schedule: ScheduleConfig::default(),
            account: AccountConfig {
                user: "default".to_string(),
            },
            database: DatabaseConfig::default(),
            dry_run: DryRunConfig { enabled: dry_run },
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match self.order.spend_quote {
            None => errors.push("spend amount is required (--spend-eur)".to_string()),
            Some(spend) if spend <= Decimal::ZERO => {
                errors.push(format!("spend amount must be positive, got {spend}"))
            }
            Some(_) => {}
        }

        let multiplier = self.order.price_multiplier;
        if multiplier <= Decimal::ZERO || multiplier > Decimal::ONE {
            errors.push(format!(
                "price_multiplier must be in (0, 1], got {multiplier}"
            ));
        }

        if self.order.symbol.trim().is_empty() {
            errors.push("symbol must not be empty".to_string());
        }

        if self.exchange.base_url.trim().is_empty() {
            errors.push("exchange base_url must not be empty".to_string());
        }

        if self.exchange.timeout_secs == 0 {
            errors.push("exchange timeout_secs must be positive".to_string());
        }

        if self.monitor.enabled && self.monitor.intervals_before_reprice == 0 {
            errors.push("intervals_before_reprice must be at least 1".to_string());
        }

        if self.account.user.trim().is_empty() {
            errors.push("account user must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
