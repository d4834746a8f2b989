//! Converts a paid checkout session into a durable order, exactly once.
//!
//! Both confirmation paths (webhook push and client status poll) funnel into
//! [`reconcile_paid_session`]; whichever arrives first creates the order and
//! every later arrival gets the same order back.

use uuid::Uuid;

use crate::audit;
use crate::domain::cart::{CartSnapshot, METADATA_CART_KEY, METADATA_USER_KEY};
use crate::error::{ApiError, Result};
use crate::models::Order;
use crate::stripe::CheckoutSession;
use crate::AppState;

/// Outcome of a reconciliation attempt.
#[derive(Debug)]
pub enum Reconciliation {
    Created(Order),
    AlreadyProcessed(Order),
}

impl Reconciliation {
    pub fn order(&self) -> &Order {
        match self {
            Self::Created(order) | Self::AlreadyProcessed(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Created(order) | Self::AlreadyProcessed(order) => order,
        }
    }
}

/// Session-derived uniqueness key stored in `orders.payment_method`.
pub fn payment_method_key(session_id: &str) -> String {
    format!("stripe_{session_id}")
}

/// Creates the order and its items for a paid session, or returns the
/// existing order when this session was already processed.
///
/// Idempotency rests on the UNIQUE index over `orders.payment_method`: two
/// concurrent confirmations both attempt the insert, the loser sees no
/// returned row and reads the winner's order instead. The order and its
/// items commit together or not at all; no stock counter is touched, since
/// the inserted items are themselves the decrement.
pub async fn reconcile_paid_session(
    state: &AppState,
    session: &CheckoutSession,
) -> Result<Reconciliation> {
    let user_id = session
        .metadata
        .get(METADATA_USER_KEY)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| ApiError::Validation("Session metadata is missing a valid user id".into()))?;
    let raw_cart = session
        .metadata
        .get(METADATA_CART_KEY)
        .ok_or_else(|| ApiError::Validation("Session metadata is missing cart data".into()))?;
    let cart = CartSnapshot::from_metadata(raw_cart)?;

    let key = payment_method_key(&session.id);
    let total = cart.total_with_shipping(state.config.shipping_fee);
    let order_number = format!("ORD-{:08}", rand::random::<u32>());

    let mut tx = state.db.begin().await?;

    let inserted = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, order_number, user_id, status, payment_status, payment_method, \
                             total_amount, shipping_address, created_at, updated_at) \
         VALUES ($1, $2, $3, 'processing', 'completed', $4, $5, $6, NOW(), NOW()) \
         ON CONFLICT (payment_method) DO NOTHING \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&order_number)
    .bind(user_id)
    .bind(&key)
    .bind(total)
    .bind(session.shipping_address())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(order) = inserted else {
        // A concurrent confirmation won the insert; hand back its order.
        tx.rollback().await?;
        let existing = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_method = $1")
            .bind(&key)
            .fetch_one(&state.db)
            .await?;
        tracing::debug!(order_id = %existing.id, session_id = %session.id, "session already reconciled");
        return Ok(Reconciliation::AlreadyProcessed(existing));
    };

    for line in &cart.lines {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW())",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(order_id = %order.id, session_id = %session.id, total, "order created from paid session");

    audit::log_order_event(&state.db, audit::OrderEvent::created(&order)).await;
    publish_order_created(state, &order).await;

    Ok(Reconciliation::Created(order))
}

/// Best-effort event publication; a missing or failing broker never affects
/// the committed order.
async fn publish_order_created(state: &AppState, order: &Order) {
    let Some(nats) = &state.nats else { return };
    let payload = serde_json::json!({
        "order_id": order.id,
        "user_id": order.user_id,
        "total_amount": order.total_amount,
    });
    if let Err(error) = nats
        .publish("orders.created", payload.to_string().into())
        .await
    {
        tracing::warn!(%error, order_id = %order.id, "failed to publish order event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniqueness_key_embeds_the_session_id() {
        assert_eq!(payment_method_key("sess_123"), "stripe_sess_123");
        // Distinct sessions can never collide on the unique index.
        assert_ne!(payment_method_key("sess_123"), payment_method_key("sess_124"));
    }

    #[test]
    fn reconciliation_unwraps_to_the_same_order_either_way() {
        let order = sample_order();
        let created = Reconciliation::Created(order.clone());
        let replayed = Reconciliation::AlreadyProcessed(order.clone());
        assert_eq!(created.order().id, order.id);
        assert_eq!(replayed.into_order().id, order.id);
    }

    fn sample_order() -> Order {
        let now = chrono::Utc::now();
        Order {
            id: Uuid::now_v7(),
            order_number: "ORD-00000001".into(),
            user_id: Uuid::now_v7(),
            status: "processing".into(),
            payment_status: "completed".into(),
            payment_method: Some(payment_method_key("sess_123")),
            total_amount: 3400,
            shipping_address: Some("1 High St, Lagos, NG".into()),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}
