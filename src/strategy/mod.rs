pub mod executor;
pub mod pricing;
pub mod repricer;

pub use executor::{DcaExecutor, DcaParams, RunOutcome};
pub use pricing::PriceEngine;
pub use repricer::{RepriceBudget, RepriceDecision, RepriceOutcome, RepriceState, Repricer};
