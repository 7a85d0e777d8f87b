//! Bounded submit/reprice state machine.
//!
//! ```text
//! PRICED -> SUBMITTED -> ACCEPTED
//!              |
//!              v
//!           REJECTED -> PRICED (fresh best ask, same multiplier)
//!              |
//!              v
//!            FAILED (reprice budget exhausted)
//! ```
//!
//! An accepted order that the market has drifted away from goes back to
//! PRICED through [`Repricer::resubmit_at`]. Exchange errors are never
//! retried here; they propagate to the caller unchanged.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::{DcaError, Result};
use crate::exchange::{ExchangeClient, LimitOrderRequest, OrderAck, SubmitOutcome};
use crate::strategy::pricing::PriceEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepriceState {
    Priced,
    Submitted,
    Accepted,
    Rejected,
    Failed,
}

impl RepriceState {
    fn can_transition_to(&self, next: RepriceState) -> bool {
        use RepriceState::*;
        matches!(
            (self, next),
            (Priced, Submitted)
                | (Submitted, Accepted)
                | (Submitted, Rejected)
                | (Rejected, Priced)
                | (Rejected, Failed)
                | (Accepted, Priced)
        )
    }
}

impl std::fmt::Display for RepriceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RepriceState::Priced => "PRICED",
            RepriceState::Submitted => "SUBMITTED",
            RepriceState::Accepted => "ACCEPTED",
            RepriceState::Rejected => "REJECTED",
            RepriceState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepriceDecision {
    Reprice,
    GiveUp,
}

/// Reprice counter shared by rejections and market drift.
///
/// `reprices` never exceeds `max_reprices`.
#[derive(Debug, Clone)]
pub struct RepriceBudget {
    max_reprices: u32,
    reprices: u32,
}

impl RepriceBudget {
    pub fn new(max_reprices: u32) -> Self {
        Self {
            max_reprices,
            reprices: 0,
        }
    }

    pub fn reprices(&self) -> u32 {
        self.reprices
    }

    pub fn max_reprices(&self) -> u32 {
        self.max_reprices
    }

    /// A submission was rejected. The rejection itself is counted; the run
    /// fails once the count reaches the maximum.
    pub fn on_rejection(&mut self) -> RepriceDecision {
        if self.reprices < self.max_reprices {
            self.reprices += 1;
        }
        if self.reprices >= self.max_reprices {
            RepriceDecision::GiveUp
        } else {
            RepriceDecision::Reprice
        }
    }

    /// A resting order fell behind the market. Counted only when a reprice
    /// actually happens.
    pub fn on_drift(&mut self) -> RepriceDecision {
        if self.reprices >= self.max_reprices {
            return RepriceDecision::GiveUp;
        }
        self.reprices += 1;
        RepriceDecision::Reprice
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepriceOutcome {
    Accepted(OrderAck),
    /// Budget exhausted; carries the last rejection reason
    Failed { reason: String },
}

pub struct Repricer<'a> {
    exchange: &'a dyn ExchangeClient,
    engine: PriceEngine,
    budget: RepriceBudget,
    request: LimitOrderRequest,
    state: RepriceState,
}

impl<'a> Repricer<'a> {
    /// Start in PRICED with an already priced request
    pub fn new(
        exchange: &'a dyn ExchangeClient,
        engine: PriceEngine,
        max_reprices: u32,
        request: LimitOrderRequest,
    ) -> Self {
        Self {
            exchange,
            engine,
            budget: RepriceBudget::new(max_reprices),
            request,
            state: RepriceState::Priced,
        }
    }

    pub fn reprices(&self) -> u32 {
        self.budget.reprices()
    }

    pub fn max_reprices(&self) -> u32 {
        self.budget.max_reprices()
    }

    /// Current (last submitted or about to be submitted) order
    pub fn request(&self) -> &LimitOrderRequest {
        &self.request
    }

    pub fn multiplier(&self) -> Decimal {
        self.engine.multiplier()
    }

    fn transition(&mut self, next: RepriceState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DcaError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        debug!("Repricer {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Submit the current request, repricing on rejection until accepted or
    /// the budget runs out.
    pub async fn submit(&mut self) -> Result<RepriceOutcome> {
        loop {
            self.transition(RepriceState::Submitted)?;

            match self.exchange.submit_limit_order(&self.request).await? {
                SubmitOutcome::Accepted(ack) => {
                    self.transition(RepriceState::Accepted)?;
                    return Ok(RepriceOutcome::Accepted(ack));
                }
                SubmitOutcome::Rejected { code, reason } => {
                    self.transition(RepriceState::Rejected)?;
                    warn!(
                        "Order @ {} rejected ({:?}): {}",
                        self.request.price, code, reason
                    );

                    match self.budget.on_rejection() {
                        RepriceDecision::GiveUp => {
                            self.transition(RepriceState::Failed)?;
                            info!(
                                "Max reprices ({}) reached, giving up",
                                self.budget.max_reprices()
                            );
                            return Ok(RepriceOutcome::Failed { reason });
                        }
                        RepriceDecision::Reprice => {
                            let ask = self.exchange.get_best_ask(&self.request.symbol).await?;
                            self.reprice(ask)?;
                            info!(
                                "Repriced to {} (reprice {}/{})",
                                self.request.price,
                                self.budget.reprices(),
                                self.budget.max_reprices()
                            );
                        }
                    }
                }
            }
        }
    }

    /// Count a drift reprice against the budget
    pub fn on_drift(&mut self) -> RepriceDecision {
        self.budget.on_drift()
    }

    /// Reprice an accepted (and already cancelled) order from `best_ask` and
    /// submit it again.
    pub async fn resubmit_at(&mut self, best_ask: Decimal) -> Result<RepriceOutcome> {
        self.reprice(best_ask)?;
        self.submit().await
    }

    fn reprice(&mut self, best_ask: Decimal) -> Result<()> {
        let price = self.engine.target_price(best_ask)?;
        self.request = self.request.repriced(price);
        self.transition(RepriceState::Priced)
    }
}
