//! Binance Spot REST adapter.
//!
//! Public endpoints (exchange info, book ticker) need no credentials, so a
//! dry run can price an order without API keys. Order endpoints are SIGNED:
//! `timestamp` and `recvWindow` are appended to the query and the whole query
//! string is signed with HMAC-SHA256.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ExchangeConfig;
use crate::domain::SymbolFilters;
use crate::error::{DcaError, Result};
use crate::exchange::{
    ExchangeClient, ExchangeOrderStatus, LimitOrderRequest, OrderAck, SubmitOutcome,
};
use crate::signing::{ApiCredentials, HmacAuth};
use crate::validation::{parse_decimal, validate_price};

const DEFAULT_BINANCE_API_BASE: &str = "https://api.binance.com";

/// Error codes under which Binance refuses a new order:
/// -2010 NEW_ORDER_REJECTED, -1013 filter failure.
const REJECTION_CODES: &[i64] = &[-2010, -1013];

/// Message fragments of refusals a new price can fix. The same codes also
/// carry insufficient balance and LOT_SIZE/NOTIONAL failures, which stay fatal.
const PRICE_REJECTION_MARKERS: &[&str] = &["would immediately match", "percent_price"];

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<i64>,
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookTicker {
    ask_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    #[serde(default)]
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    filters: Vec<RawFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum RawFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price { tick_size: String },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        step_size: String,
        min_qty: String,
        max_qty: String,
    },
    #[serde(rename = "NOTIONAL", rename_all = "camelCase")]
    Notional { min_notional: String },
    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional { min_notional: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    status: String,
}

#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
    auth: Option<HmacAuth>,
    recv_window: u64,
    dry_run: bool,
}

impl BinanceClient {
    pub fn new(
        base_url: Option<&str>,
        credentials: Option<ApiCredentials>,
        recv_window: u64,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_BINANCE_API_BASE)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .user_agent("crypto-dca/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| DcaError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            auth: credentials.map(HmacAuth::new),
            recv_window,
            dry_run,
        })
    }

    pub fn from_config(
        config: &ExchangeConfig,
        credentials: Option<ApiCredentials>,
        dry_run: bool,
    ) -> Result<Self> {
        Self::new(
            Some(&config.base_url),
            credentials,
            config.recv_window,
            Duration::from_secs(config.timeout_secs),
            dry_run,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth(&self) -> Result<&HmacAuth> {
        self.auth.as_ref().ok_or_else(|| {
            DcaError::Auth("BINANCE_API_KEY and BINANCE_API_SECRET are required".to_string())
        })
    }

    fn encode_query(params: &[(&str, String)]) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Query string with timestamp, recvWindow and signature appended
    fn signed_query_at(&self, params: &[(&str, String)], timestamp_ms: i64) -> Result<String> {
        let auth = self.auth()?;
        let mut all: Vec<(&str, String)> = params.to_vec();
        all.push(("timestamp", timestamp_ms.to_string()));
        all.push(("recvWindow", self.recv_window.to_string()));

        let query = Self::encode_query(&all);
        let signature = auth.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<T> {
        let query = if signed {
            self.signed_query_at(params, Utc::now().timestamp_millis())?
        } else {
            Self::encode_query(params)
        };

        // The signature is the last pair and never logged
        debug!(
            "Request: {} {} params={}",
            method,
            path,
            Self::encode_query(params)
        );

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let mut req = self.http.request(method, &url);
        if let Some(auth) = &self.auth {
            req = req.headers(auth.build_headers()?);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), &text));
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn api_error(status: u16, body: &str) -> DcaError {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(err) => DcaError::Exchange {
                status,
                code: err.code,
                message: err.msg.unwrap_or_else(|| body.to_string()),
            },
            Err(_) => DcaError::Exchange {
                status,
                code: None,
                message: body.to_string(),
            },
        }
    }

    fn is_rejection(status: u16, code: Option<i64>, message: &str) -> bool {
        let message = message.to_ascii_lowercase();
        (400..500).contains(&status)
            && code.is_some_and(|c| REJECTION_CODES.contains(&c))
            && PRICE_REJECTION_MARKERS.iter().any(|m| message.contains(m))
    }

    fn parse_symbol_filters(info: ExchangeInfo, symbol: &str) -> Result<SymbolFilters> {
        let entry = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| {
                DcaError::SymbolNotFound(format!("{} not found in exchange info", symbol))
            })?;

        let mut filters = SymbolFilters::default();
        let mut legacy_min_notional = None;
        let mut min_notional = None;

        for filter in entry.filters {
            match filter {
                RawFilter::Price { tick_size } => {
                    filters.tick_size = parse_decimal(&tick_size, "tickSize")?;
                }
                RawFilter::LotSize {
                    step_size,
                    min_qty,
                    max_qty,
                } => {
                    filters.step_size = parse_decimal(&step_size, "stepSize")?;
                    filters.min_qty = parse_decimal(&min_qty, "minQty")?;
                    filters.max_qty = parse_decimal(&max_qty, "maxQty")?;
                }
                RawFilter::Notional { min_notional: v } => {
                    min_notional = Some(parse_decimal(&v, "minNotional")?);
                }
                RawFilter::MinNotional { min_notional: v } => {
                    legacy_min_notional = Some(parse_decimal(&v, "minNotional")?);
                }
                RawFilter::Other => {}
            }
        }

        if let Some(v) = min_notional.or(legacy_min_notional) {
            filters.min_notional = v;
        }

        validate_price(filters.tick_size, "tickSize")?;
        validate_price(filters.step_size, "stepSize")?;
        Ok(filters)
    }

    fn parse_best_ask(ticker: BookTicker, symbol: &str) -> Result<Decimal> {
        let raw = ticker
            .ask_price
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                DcaError::InvalidMarketData(format!("No ask price found for {}", symbol))
            })?;
        let ask = parse_decimal(&raw, "askPrice")?;
        validate_price(ask, "askPrice")?;
        Ok(ask)
    }

    fn format_decimal(value: Decimal) -> String {
        value.normalize().to_string()
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        let info: ExchangeInfo = self
            .request_json(
                Method::GET,
                "/api/v3/exchangeInfo",
                &[("symbol", symbol.to_string())],
                false,
            )
            .await?;
        Self::parse_symbol_filters(info, symbol)
    }

    async fn get_best_ask(&self, symbol: &str) -> Result<Decimal> {
        let ticker: BookTicker = self
            .request_json(
                Method::GET,
                "/api/v3/ticker/bookTicker",
                &[("symbol", symbol.to_string())],
                false,
            )
            .await?;
        Self::parse_best_ask(ticker, symbol)
    }

    async fn submit_limit_order(&self, request: &LimitOrderRequest) -> Result<SubmitOutcome> {
        if self.dry_run {
            return Err(DcaError::Validation(
                "refusing to submit an order in dry-run mode".to_string(),
            ));
        }

        let params = [
            ("symbol", request.symbol.clone()),
            ("side", request.side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", request.time_in_force.as_str().to_string()),
            ("quantity", Self::format_decimal(request.quantity)),
            ("price", Self::format_decimal(request.price)),
        ];

        debug!(
            "Placing {} LIMIT order: {} {} @ {} ({})",
            request.side, request.quantity, request.symbol, request.price, request.time_in_force
        );

        match self
            .request_json::<OrderResponse>(Method::POST, "/api/v3/order", &params, true)
            .await
        {
            Ok(resp) => Ok(SubmitOutcome::Accepted(OrderAck {
                order_id: resp.order_id,
                status: ExchangeOrderStatus::parse(&resp.status),
            })),
            Err(DcaError::Exchange {
                status,
                code,
                message,
            }) if Self::is_rejection(status, code, &message) => Ok(SubmitOutcome::Rejected {
                code,
                reason: message,
            }),
            Err(err) => Err(err),
        }
    }

    async fn get_order(&self, symbol: &str, order_id: i64) -> Result<OrderAck> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let resp: OrderResponse = self
            .request_json(Method::GET, "/api/v3/order", &params, true)
            .await?;
        Ok(OrderAck {
            order_id: resp.order_id,
            status: ExchangeOrderStatus::parse(&resp.status),
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<()> {
        info!("Cancelling order {} for {}", order_id, symbol);
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let _: serde_json::Value = self
            .request_json(Method::DELETE, "/api/v3/order", &params, true)
            .await?;
        Ok(())
    }
}
