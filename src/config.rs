//! Process configuration pulled from the environment.

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub stripe_secret_key: String,
    pub frontend_url: String,
    pub nats_url: Option<String>,
    /// Flat shipping fee added to every order, in minor currency units.
    pub shipping_fee: i64,
    pub currency: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            port: std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8000),
            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            nats_url: std::env::var("NATS_URL").ok(),
            shipping_fee: std::env::var("SHIPPING_FEE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "usd".to_string()),
        })
    }

    pub fn success_url(&self) -> String {
        format!(
            "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.frontend_url
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/checkout/cancel", self.frontend_url)
    }
}
