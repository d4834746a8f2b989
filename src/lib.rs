//! Boutique storefront backend.
//!
//! CRUD catalog and order routes over Postgres, checkout through a hosted
//! payment gateway, and a shared-pool stock model: availability is derived
//! from the order ledger on every read rather than kept as a counter.

use std::sync::Arc;

pub mod audit;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod routes;
pub mod stripe;

use crate::stripe::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub nats: Option<async_nats::Client>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<config::Config>,
}
