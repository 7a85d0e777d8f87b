use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, MonitorConfig};
use crate::domain::{Order, OrderSide, OrderStatus, TimeInForce};
use crate::error::{DcaError, OrderError, Result};
use crate::exchange::{ExchangeClient, ExchangeOrderStatus, LimitOrderRequest};
use crate::persistence::OrderRepository;
use crate::strategy::pricing::{check_filters, compute_quantity, PriceEngine};
use crate::strategy::repricer::{RepriceDecision, RepriceOutcome, Repricer};
use crate::validation::{normalize_symbol, validate_symbol};

/// Validated inputs for one DCA run
#[derive(Debug, Clone)]
pub struct DcaParams {
    pub user: String,
    pub symbol: String,
    pub spend_quote: Decimal,
    pub price_multiplier: Decimal,
    pub time_in_force: TimeInForce,
    pub max_reprices: u32,
    pub once_per_week: bool,
    pub monitor: MonitorConfig,
}

impl DcaParams {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let symbol = normalize_symbol(&config.order.symbol);
        validate_symbol(&symbol)?;

        let spend_quote = config
            .order
            .spend_quote
            .filter(|s| *s > Decimal::ZERO)
            .ok_or_else(|| DcaError::Validation("spend amount must be positive".to_string()))?;

        Ok(Self {
            user: config.account.user.clone(),
            symbol,
            spend_quote,
            price_multiplier: config.order.price_multiplier,
            time_in_force: config.order.time_in_force,
            max_reprices: config.order.max_reprices,
            once_per_week: config.schedule.once_per_week,
            monitor: config.monitor.clone(),
        })
    }
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Order filled; row recorded FILLED
    Filled { order: Order },
    /// Order accepted and left on the book; row recorded PENDING
    Resting { order: Order },
    /// Nothing submitted
    DryRun { price: Decimal, quantity: Decimal },
    /// Weekly guard found a fill this week
    Skipped { reason: String },
    Failed {
        reason: OrderError,
        reprices: u32,
        /// Row recorded for an order that was accepted and later cancelled
        order: Option<Order>,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }
}

/// Exchange order that was last accepted, with the price it was accepted at
#[derive(Debug, Clone, Copy)]
struct Live {
    order_id: i64,
    price: Decimal,
}

/// Final state of an accepted order
#[derive(Debug, Clone)]
struct Settled {
    live: Live,
    status: OrderStatus,
    failure: Option<OrderError>,
}

impl Settled {
    fn filled(live: Live) -> Self {
        Self {
            live,
            status: OrderStatus::Filled,
            failure: None,
        }
    }

    fn resting(live: Live) -> Self {
        Self {
            live,
            status: OrderStatus::Pending,
            failure: None,
        }
    }

    fn cancelled(live: Live, failure: OrderError) -> Self {
        Self {
            live,
            status: OrderStatus::Cancelled,
            failure: Some(failure),
        }
    }
}

/// Runs one DCA buy: price, submit with bounded repricing, monitor, record
pub struct DcaExecutor {
    exchange: Arc<dyn ExchangeClient>,
    store: Option<Arc<dyn OrderRepository>>,
    params: DcaParams,
}

impl DcaExecutor {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        store: Option<Arc<dyn OrderRepository>>,
        params: DcaParams,
    ) -> Self {
        Self {
            exchange,
            store,
            params,
        }
    }

    pub async fn execute(&self) -> Result<RunOutcome> {
        let params = &self.params;
        let symbol = params.symbol.as_str();

        let user_id = match &self.store {
            Some(store) => store.ensure_user(&params.user).await?.id,
            None => Uuid::nil(),
        };

        if let Some(reason) = self.already_bought_this_week(user_id).await? {
            info!("{}", reason);
            return Ok(RunOutcome::Skipped { reason });
        }

        info!("Fetching exchange info for {}...", symbol);
        let filters = self.exchange.get_symbol_filters(symbol).await?;
        info!("Filters: {}", filters);

        let engine = PriceEngine::new(params.price_multiplier, filters.tick_size)?;

        let best_ask = self.exchange.get_best_ask(symbol).await?;
        info!("Best ask: {}", best_ask);

        let limit_price = engine.target_price(best_ask)?;
        let quantity = compute_quantity(params.spend_quote, limit_price, filters.step_size)?;
        info!(
            "Quantity: {} / {} -> {}",
            params.spend_quote, limit_price, quantity
        );

        if let Err(reason) = check_filters(quantity, limit_price, &filters) {
            warn!("{}", reason);
            return Ok(RunOutcome::Failed {
                reason,
                reprices: 0,
                order: None,
            });
        }

        info!(
            "Order: {} @ {} = {} notional",
            quantity,
            limit_price,
            quantity * limit_price
        );

        let request =
            LimitOrderRequest::buy(symbol, limit_price, quantity, params.time_in_force);

        if self.exchange.is_dry_run() {
            info!("{}", "=".repeat(60));
            info!("DRY RUN - would place:");
            info!(
                "  {} {} LIMIT {} @ {} ({})",
                request.symbol, request.side, request.quantity, request.price, request.time_in_force
            );
            info!("  Notional: {}", request.quantity * request.price);
            info!("{}", "=".repeat(60));
            return Ok(RunOutcome::DryRun {
                price: limit_price,
                quantity,
            });
        }

        info!("Placing limit order...");
        let mut repricer =
            Repricer::new(self.exchange.as_ref(), engine, params.max_reprices, request);

        let ack = match repricer.submit().await? {
            RepriceOutcome::Accepted(ack) => ack,
            RepriceOutcome::Failed { reason } => {
                warn!("Order not accepted: {}", reason);
                return Ok(RunOutcome::Failed {
                    reason: OrderError::MaxRepricesReached {
                        reprices: repricer.reprices(),
                    },
                    reprices: repricer.reprices(),
                    order: None,
                });
            }
        };
        info!("Order placed: id={}, status={}", ack.order_id, ack.status);
        let live = Live {
            order_id: ack.order_id,
            price: repricer.request().price,
        };

        let settled = if ack.status == ExchangeOrderStatus::Filled {
            info!("Filled immediately");
            Settled::filled(live)
        } else if params.monitor.enabled {
            self.monitor(&mut repricer, live).await?
        } else {
            Settled::resting(live)
        };

        let order = Order::new(
            user_id,
            symbol,
            OrderSide::Buy,
            settled.live.price,
            repricer.request().quantity,
            repricer.multiplier(),
            repricer.reprices(),
            settled.status,
        )
        .with_exchange_order_id(settled.live.order_id);

        self.record(&order).await?;

        Ok(match settled.failure {
            Some(reason) => RunOutcome::Failed {
                reason,
                reprices: order.reprices,
                order: Some(order),
            },
            None if order.status == OrderStatus::Filled => RunOutcome::Filled { order },
            None => RunOutcome::Resting { order },
        })
    }

    async fn already_bought_this_week(&self, user_id: Uuid) -> Result<Option<String>> {
        if !self.params.once_per_week {
            return Ok(None);
        }
        let Some(store) = &self.store else {
            warn!("Weekly guard enabled but no database configured; ignoring");
            return Ok(None);
        };

        let last = store
            .get_last_order(user_id, &self.params.symbol, OrderSide::Buy)
            .await?;

        Ok(last
            .filter(|o| o.is_same_iso_week(Utc::now()))
            .map(|o| {
                format!(
                    "Already bought {} {} @ {} this week ({}), skipping",
                    o.quantity, o.symbol, o.price, o.created_at
                )
            }))
    }

    async fn record(&self, order: &Order) -> Result<()> {
        match &self.store {
            Some(store) => {
                let id = store.insert_order(order).await?;
                info!("Recorded order {} as {}", id, order.status);
            }
            None => warn!("No database configured; order {} not recorded", order.id),
        }
        Ok(())
    }

    /// Poll an accepted order until it fills, repricing when the ask stays
    /// above the limit for `intervals_before_reprice` consecutive polls.
    async fn monitor(&self, repricer: &mut Repricer<'_>, mut live: Live) -> Result<Settled> {
        let cfg = &self.params.monitor;
        let symbol = self.params.symbol.as_str();
        let poll_interval = Duration::from_secs(cfg.poll_interval_secs);

        let mut intervals_above = 0u32;

        info!(
            "Monitoring (poll={}s, reprice after {}, max {} reprices)",
            cfg.poll_interval_secs,
            cfg.intervals_before_reprice,
            repricer.max_reprices()
        );

        for check in 1..=cfg.max_polls {
            sleep(poll_interval).await;

            let status = self.exchange.get_order(symbol, live.order_id).await?.status;
            let ask = self.exchange.get_best_ask(symbol).await?;
            let limit = live.price;

            if status == ExchangeOrderStatus::Filled {
                info!("[{}] FILLED", check);
                return Ok(Settled::filled(live));
            }

            if !status.is_open() {
                warn!("[{}] Unexpected status: {}", check, status);
                return Ok(Settled::cancelled(
                    live,
                    OrderError::UnexpectedStatus(status.to_string()),
                ));
            }

            if ask <= limit {
                let suffix = if intervals_above > 0 { "OK (reset)" } else { "OK" };
                intervals_above = 0;
                info!(
                    "[{}] {} | Limit: {} | Ask: {} | {}",
                    check, status, limit, ask, suffix
                );
                continue;
            }

            intervals_above += 1;
            let repricing = intervals_above >= cfg.intervals_before_reprice;
            info!(
                "[{}] {} | Limit: {} | Ask: {} | Above ({}/{}){}",
                check,
                status,
                limit,
                ask,
                intervals_above,
                cfg.intervals_before_reprice,
                if repricing { " -> Repricing" } else { "" }
            );

            if !repricing {
                continue;
            }

            match repricer.on_drift() {
                RepriceDecision::GiveUp => {
                    info!(
                        "Max reprices ({}) reached, giving up",
                        repricer.max_reprices()
                    );
                    self.exchange.cancel_order(symbol, live.order_id).await?;
                    return Ok(Settled::cancelled(
                        live,
                        OrderError::MaxRepricesReached {
                            reprices: repricer.reprices(),
                        },
                    ));
                }
                RepriceDecision::Reprice => {
                    self.exchange.cancel_order(symbol, live.order_id).await?;

                    match repricer.resubmit_at(ask).await? {
                        RepriceOutcome::Accepted(new_ack) => {
                            live = Live {
                                order_id: new_ack.order_id,
                                price: repricer.request().price,
                            };
                            intervals_above = 0;
                            info!(
                                "New order {} @ {} (reprice {}/{})",
                                live.order_id,
                                live.price,
                                repricer.reprices(),
                                repricer.max_reprices()
                            );
                            if new_ack.status == ExchangeOrderStatus::Filled {
                                return Ok(Settled::filled(live));
                            }
                        }
                        RepriceOutcome::Failed { reason } => {
                            // The cancelled order keeps the price it rested at
                            warn!("Replacement order not accepted: {}", reason);
                            return Ok(Settled::cancelled(
                                live,
                                OrderError::MaxRepricesReached {
                                    reprices: repricer.reprices(),
                                },
                            ));
                        }
                    }
                }
            }
        }

        info!(
            "Stopped monitoring after {} polls; order {} left resting",
            cfg.max_polls, live.order_id
        );
        Ok(Settled::resting(live))
    }
}
