use crate::error::{DcaError, Result};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key on every authenticated request
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// API credentials for signed endpoints
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    secret: Zeroizing<String>,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl ApiCredentials {
    pub fn new(api_key: String, secret: String) -> Self {
        Self {
            api_key,
            secret: Zeroizing::new(secret),
        }
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("BINANCE_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| DcaError::Auth("BINANCE_API_KEY is required".to_string()))?;
        let secret = std::env::var("BINANCE_API_SECRET")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| DcaError::Auth("BINANCE_API_SECRET is required".to_string()))?;

        Ok(Self::new(api_key, secret))
    }
}

/// HMAC-SHA256 request signer for SIGNED endpoints
#[derive(Clone, Debug)]
pub struct HmacAuth {
    credentials: ApiCredentials,
}

impl HmacAuth {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self { credentials }
    }

    /// Hex-encoded HMAC-SHA256 of the query string
    pub fn sign(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret.as_bytes())
            .map_err(|e| DcaError::Signature(format!("HMAC init failed: {}", e)))?;

        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Headers sent with every request that needs the API key
    pub fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&self.credentials.api_key)
                .map_err(|e| DcaError::Auth(format!("Invalid API key header: {}", e)))?,
        );
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_matches_published_vector() {
        let creds = ApiCredentials::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A".to_string(),
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j".to_string(),
        );
        let auth = HmacAuth::new(creds);

        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            auth.sign(query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ApiCredentials::new("key".to_string(), "super-secret".to_string());
        let debug = format!("{:?}", creds);
        assert!(debug.contains("key"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_build_headers() {
        let auth = HmacAuth::new(ApiCredentials::new("abc".to_string(), "s".to_string()));
        let headers = auth.build_headers().unwrap();
        assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "abc");
    }
}
