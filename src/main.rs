use clap::Parser;
use crypto_dca::adapters::PostgresStore;
use crypto_dca::cli::Cli;
use crypto_dca::config::AppConfig;
use crypto_dca::error::{DcaError, Result};
use crypto_dca::exchange::build_exchange_client;
use crypto_dca::persistence::OrderRepository;
use crypto_dca::signing::ApiCredentials;
use crypto_dca::strategy::{DcaExecutor, DcaParams, RunOutcome};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(errors) => {
            for e in errors {
                eprintln!("Configuration error: {}", e);
            }
            return ExitCode::FAILURE;
        }
    };

    let _guard = init_logging(&config);
    log_config(&config);

    match run(&config).await {
        Ok(outcome) => {
            report(&outcome);
            if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            match &e {
                DcaError::Exchange { .. } => error!("Binance API error: {}", e),
                _ => error!("Unexpected error: {}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> std::result::Result<AppConfig, Vec<String>> {
    let mut config = AppConfig::load_from(&cli.config).map_err(|e| vec![e.to_string()])?;
    cli.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run(config: &AppConfig) -> Result<RunOutcome> {
    let credentials = match ApiCredentials::from_env() {
        Ok(creds) => Some(creds),
        Err(e) if config.dry_run.enabled => {
            warn!("{}; continuing with public endpoints only", e);
            None
        }
        Err(e) => return Err(e),
    };

    let exchange = build_exchange_client(config, credentials)?;

    let store: Option<Arc<dyn OrderRepository>> = match &config.database.url {
        Some(url) => {
            let store = PostgresStore::new(url, config.database.max_connections).await?;
            store.migrate().await?;
            Some(Arc::new(store))
        }
        None => None,
    };

    let params = DcaParams::from_config(config)?;
    DcaExecutor::new(exchange, store, params).execute().await
}

fn report(outcome: &RunOutcome) {
    info!("{}", "=".repeat(60));
    match outcome {
        RunOutcome::Filled { order } => {
            info!(
                "SUCCESS: Order filled - {} @ {} ({} notional)",
                order.quantity,
                order.price,
                order.notional()
            );
        }
        RunOutcome::Resting { order } => {
            info!(
                "COMPLETE: Order {} placed - {} @ {}",
                order.exchange_order_id.unwrap_or_default(),
                order.quantity,
                order.price
            );
        }
        RunOutcome::DryRun { price, quantity } => {
            info!("COMPLETE: Dry run - {} @ {}", quantity, price);
        }
        RunOutcome::Skipped { reason } => {
            info!("COMPLETE: {}", reason);
        }
        RunOutcome::Failed {
            reason, reprices, ..
        } => {
            error!("FAILED: {} (reprices: {})", reason, reprices);
        }
    }
    info!("{}", "=".repeat(60));
}

fn log_config(config: &AppConfig) {
    info!("{}", "=".repeat(60));
    info!("Crypto DCA");
    info!("{}", "=".repeat(60));
    info!("Symbol: {}", config.order.symbol);
    if let Some(spend) = config.order.spend_quote {
        info!("Spend: {}", spend);
    }
    info!("Price multiplier: {}", config.order.price_multiplier);
    info!("Time in force: {}", config.order.time_in_force);
    info!("Max reprices: {}", config.order.max_reprices);
    if config.monitor.enabled {
        info!(
            "Monitor: every {}s, reprice after {} intervals above",
            config.monitor.poll_interval_secs, config.monitor.intervals_before_reprice
        );
    } else {
        info!("Monitor: disabled");
    }
    info!("User: {}", config.account.user);
    info!(
        "Database: {}",
        if config.database.url.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    info!("Dry run: {}", config.dry_run.enabled);
    info!("Base URL: {}", config.exchange.base_url);
}

fn init_logging(config: &AppConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.logging.level)));

    // `tracing_appender::rolling::daily` panics when it cannot create the
    // initial file, so the directory must be writable first.
    let (file_layer, guard) = match std::env::var("DCA_LOG_DIR") {
        Ok(log_dir) => match prepare_log_dir(&log_dir) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(&log_dir, "crypto-dca.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                (None, None)
            }
        },
        Err(_) => (None, None),
    };

    let json_layer = config
        .logging
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let console_layer = (!config.logging.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    guard
}

fn prepare_log_dir(log_dir: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let test_path = std::path::Path::new(log_dir).join(".crypto_dca_write_test");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&test_path)?;
    let _ = std::fs::remove_file(&test_path);
    Ok(())
}
