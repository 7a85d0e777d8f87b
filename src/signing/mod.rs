pub mod hmac;

pub use hmac::{ApiCredentials, HmacAuth, API_KEY_HEADER};
