pub mod binance_rest;
pub mod postgres;

pub use binance_rest::BinanceClient;
pub use postgres::PostgresStore;
