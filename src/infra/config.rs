use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub cors_origin: HeaderValue,
    /// Whether to trust X-Forwarded-For headers. Set to true when behind a reverse proxy (Caddy, nginx).
    /// SECURITY: Only enable this when the API is not directly exposed to the internet.
    pub trust_proxy: bool,
    /// Stripe secret key. Empty means the gateway is unconfigured and all
    /// best-effort mirroring is skipped.
    pub stripe_secret_key: SecretString,
    /// Hard ceiling on every outbound gateway request.
    pub gateway_timeout: Duration,
    /// ISO currency code used for gateway prices and coupons.
    pub currency: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        // Default to false for security - must explicitly enable when behind a trusted proxy
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);
        let stripe_secret_key: SecretString =
            SecretString::new(get_env_default("STRIPE_SECRET_KEY", String::new()).into());
        let gateway_timeout_secs: u64 = get_env_default("GATEWAY_TIMEOUT_SECS", 10);
        let currency: String = get_env_default("CURRENCY", "usd".to_string());

        Self {
            bind_addr,
            database_url,
            cors_origin,
            trust_proxy,
            stripe_secret_key,
            gateway_timeout: Duration::from_secs(gateway_timeout_secs),
            currency,
        }
    }
}
