use std::sync::Arc;

use crate::adapters::BinanceClient;
use crate::config::AppConfig;
use crate::error::{DcaError, Result};
use crate::signing::ApiCredentials;

use super::ExchangeClient;

/// Create the runtime exchange client from `AppConfig`.
///
/// Live runs need credentials. Dry runs only read public market data, so
/// credentials are optional there.
pub fn build_exchange_client(
    app_config: &AppConfig,
    credentials: Option<ApiCredentials>,
) -> Result<Arc<dyn ExchangeClient>> {
    let dry_run = app_config.dry_run.enabled;

    if !dry_run && credentials.is_none() {
        return Err(DcaError::Auth(
            "BINANCE_API_KEY and BINANCE_API_SECRET must be set for live trading".to_string(),
        ));
    }

    let client = BinanceClient::from_config(&app_config.exchange, credentials, dry_run)?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_run_requires_credentials() {
        let config = AppConfig::default_config(false, "BTCEUR");
        let err = build_exchange_client(&config, None).err().unwrap();
        assert!(matches!(err, DcaError::Auth(_)));
    }

    #[test]
    fn dry_run_builds_without_credentials() {
        let config = AppConfig::default_config(true, "BTCEUR");
        let client = build_exchange_client(&config, None).unwrap();
        assert!(client.is_dry_run());
    }

    #[test]
    fn live_run_with_credentials() {
        let config = AppConfig::default_config(false, "BTCEUR");
        let creds = ApiCredentials::new("key".to_string(), "secret".to_string());
        let client = build_exchange_client(&config, Some(creds)).unwrap();
        assert!(!client.is_dry_run());
    }
}
