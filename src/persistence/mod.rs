//! Persistence layer for order history
//!
//! The executor only talks to [`OrderRepository`]; the PostgreSQL
//! implementation lives in `adapters::postgres`.

pub mod repository;

pub use repository::OrderRepository;
