//! Checkout session routes.
//!
//! Session creation snapshots prices and stock decisions; the status poll is
//! one of the two idempotent triggers into the reconciler (the other is the
//! webhook in `routes::orders`).

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Identity;
use crate::domain::cart::{CartLine, CartSnapshot, METADATA_CART_KEY, METADATA_USER_KEY};
use crate::error::{ApiError, Result};
use crate::ledger;
use crate::models::User;
use crate::reconcile;
use crate::routes::products::fetch_product;
use crate::AppState;

#[derive(Debug, serde::Deserialize, Validate)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    pub checkout_url: Option<String>,
    pub session_id: String,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutSessionResponse>> {
    let user_id = identity.require_user()?;
    if payload.items.is_empty() {
        return Err(ApiError::Validation("Cart is empty".into()));
    }
    for item in &payload.items {
        item.validate()?;
    }

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let mut lines = Vec::with_capacity(payload.items.len() + 1);
    let mut cart_lines = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let product = fetch_product(&state, item.product_id).await?;

        // Advisory check: concurrent checkouts may still race past it, but
        // no session is started for a cart that is already unfulfillable.
        let available = ledger::available(&state.db, &product).await?;
        if available < item.quantity {
            return Err(ApiError::StockExhausted(product.name));
        }

        let price = product.effective_price();
        let mut name = product.name.clone();
        if let Some(size) = item.selected_size.as_deref().filter(|s| !s.is_empty()) {
            name.push_str(&format!(" - Size: {size}"));
        }
        if let Some(color) = item.selected_color.as_deref().filter(|c| !c.is_empty()) {
            name.push_str(&format!(" - Color: {color}"));
        }

        lines.push(crate::stripe::SessionLine {
            name,
            description: product.description.chars().take(100).collect(),
            unit_amount: price,
            quantity: item.quantity,
        });
        cart_lines.push(CartLine {
            product_id: item.product_id,
            quantity: item.quantity,
            price,
            selected_size: item.selected_size.clone(),
            selected_color: item.selected_color.clone(),
        });
    }

    lines.push(crate::stripe::SessionLine {
        name: "Shipping".into(),
        description: "Standard shipping".into(),
        unit_amount: state.config.shipping_fee,
        quantity: 1,
    });

    let snapshot = CartSnapshot::new(cart_lines);
    let metadata = HashMap::from([
        (METADATA_USER_KEY.to_string(), user.id.to_string()),
        (METADATA_CART_KEY.to_string(), snapshot.to_metadata()?),
    ]);

    let session = state
        .gateway
        .create_session(crate::stripe::CreateSessionRequest {
            lines,
            currency: state.config.currency.clone(),
            customer_email: user.email.clone(),
            success_url: state.config.success_url(),
            cancel_url: state.config.cancel_url(),
            metadata,
        })
        .await?;

    tracing::info!(session_id = %session.id, user_id = %user.id, "checkout session created");

    Ok(Json(CheckoutSessionResponse {
        checkout_url: session.url.clone(),
        session_id: session.id,
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub status: String,
    pub customer_email: Option<String>,
}

/// Polls the gateway for a session and, when it reports paid, runs the same
/// idempotent reconciliation as the webhook. Polling after the webhook has
/// already landed is a no-op that returns the existing order's session
/// status.
pub async fn session_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>> {
    identity.require_user()?;

    let session = state.gateway.fetch_session(&session_id).await?;

    if session.is_paid() {
        reconcile::reconcile_paid_session(&state, &session).await?;
    }

    Ok(Json(SessionStatusResponse {
        status: session.payment_status.clone(),
        customer_email: session.email().map(str::to_string),
    }))
}
