pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod persistence;
pub mod signing;
pub mod strategy;
pub mod validation;

pub use adapters::{BinanceClient, PostgresStore};
pub use config::AppConfig;
pub use error::{DcaError, OrderError, Result};
pub use exchange::ExchangeClient;
pub use persistence::OrderRepository;
pub use strategy::{DcaExecutor, DcaParams, RunOutcome};
