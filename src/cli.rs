use clap::Parser;
use rust_decimal::Decimal;

use crate::config::AppConfig;
use crate::domain::TimeInForce;
use crate::validation::normalize_symbol;

/// Discounted limit-buy DCA bot for Binance spot
///
/// Values given here override the config files and `DCA__*` environment
/// variables. Credentials are read from BINANCE_API_KEY and BINANCE_API_SECRET.
#[derive(Parser, Debug, Clone)]
#[command(name = "crypto-dca")]
#[command(version)]
#[command(about = "Place a discounted limit buy and record it", long_about = None)]
pub struct Cli {
    /// Config directory (default.toml, $DCA_ENV.toml)
    #[arg(long, env = "DCA_CONFIG_DIR", default_value = "config")]
    pub config: String,

    /// Exchange REST endpoint (testnet: https://testnet.binance.vision)
    #[arg(long, env = "BINANCE_BASE_URL")]
    pub base_url: Option<String>,

    /// Trading pair, e.g. BTCEUR, BTC/EUR or btc-eur
    #[arg(long, env = "SYMBOL")]
    pub symbol: Option<String>,

    /// Quote amount to spend
    #[arg(long, env = "SPEND_EUR")]
    pub spend_eur: Option<Decimal>,

    /// Fraction of the best ask used as limit price, in (0, 1]
    #[arg(long, env = "PRICE_MULTIPLIER")]
    pub price_multiplier: Option<Decimal>,

    /// GTC, IOC or FOK
    #[arg(long, env = "TIME_IN_FORCE")]
    pub time_in_force: Option<TimeInForce>,

    /// Log the order that would be placed without submitting it
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// trace, debug, info, warn or error
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Seconds between order status checks
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Consecutive polls with the ask above the limit before repricing
    #[arg(long)]
    pub intervals_before_reprice: Option<u32>,

    #[arg(long)]
    pub max_reprices: Option<u32>,

    /// recvWindow for signed requests (ms)
    #[arg(long, env = "RECV_WINDOW")]
    pub recv_window: Option<u64>,

    /// User the orders are recorded under
    #[arg(long, env = "DCA_USER")]
    pub user: Option<String>,

    /// PostgreSQL URL; without it nothing is recorded
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Return right after placing the order instead of waiting for a fill
    #[arg(long)]
    pub no_monitor: bool,

    /// Skip the run when a buy already filled this ISO week
    #[arg(long)]
    pub once_per_week: bool,
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(url) = &self.base_url {
            config.exchange.base_url = url.clone();
        }
        if let Some(symbol) = &self.symbol {
            config.order.symbol = normalize_symbol(symbol);
        } else {
            config.order.symbol = normalize_symbol(&config.order.symbol);
        }
        if let Some(spend) = self.spend_eur {
            config.order.spend_quote = Some(spend);
        }
        if let Some(multiplier) = self.price_multiplier {
            config.order.price_multiplier = multiplier;
        }
        if let Some(tif) = self.time_in_force {
            config.order.time_in_force = tif;
        }
        if let Some(max) = self.max_reprices {
            config.order.max_reprices = max;
        }
        if let Some(recv_window) = self.recv_window {
            config.exchange.recv_window = recv_window;
        }
        if let Some(secs) = self.poll_interval {
            config.monitor.poll_interval_secs = secs;
        }
        if let Some(n) = self.intervals_before_reprice {
            config.monitor.intervals_before_reprice = n;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.to_lowercase();
        }
        if let Some(user) = &self.user {
            config.account.user = user.clone();
        }
        if let Some(url) = &self.database_url {
            config.database.url = Some(url.clone());
        }

        // Flags only switch behavior on
        if self.dry_run {
            config.dry_run.enabled = true;
        }
        if self.no_monitor {
            config.monitor.enabled = false;
        }
        if self.once_per_week {
            config.schedule.once_per_week = true;
        }
    }
}
