//! Stripe checkout-session gateway.
//!
//! The rest of the system treats the gateway as an opaque source of
//! "session created" and "session paid" facts; everything order-shaped lives
//! in the reconciler. Webhook signature verification is delegated to the
//! gateway's own tooling and not re-implemented here.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

const API_BASE: &str = "https://api.stripe.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request to payment gateway failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
}

/// One display line sent to the gateway's hosted checkout page.
#[derive(Debug, Clone)]
pub struct SessionLine {
    pub name: String,
    pub description: String,
    /// Minor currency units.
    pub unit_amount: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub lines: Vec<SessionLine>,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// Session facts as reported by the gateway, from either the create call,
/// a status poll, or a pushed webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub payment_status: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref()?.email.as_deref())
    }

    /// Comma-joined shipping address from the gateway's customer details,
    /// falling back to the customer email when no address was collected.
    pub fn shipping_address(&self) -> String {
        let parts: Vec<&str> = self
            .customer_details
            .as_ref()
            .and_then(|d| d.address.as_ref())
            .map(|a| {
                [&a.line1, &a.line2, &a.city, &a.state, &a.postal_code, &a.country]
                    .into_iter()
                    .filter_map(|p| p.as_deref())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if parts.is_empty() {
            match self.email() {
                Some(email) => format!("Email: {email}"),
                None => "No address provided".to_string(),
            }
        } else {
            parts.join(", ")
        }
    }
}

/// Envelope of a pushed gateway event. Only `checkout.session.completed`
/// carries a session this service acts on.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    pub fn checkout_session(&self) -> Option<CheckoutSession> {
        if self.event_type != "checkout.session.completed" {
            return None;
        }
        serde_json::from_value(self.data.object.clone()).ok()
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn fetch_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError>;
}

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    /// Bounded timeout: a slow gateway surfaces as a retryable error to the
    /// caller, never as a hung request.
    pub fn new(secret_key: impl Into<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let response = self
            .client
            .post(format!("{API_BASE}/checkout/sessions"))
            .bearer_auth(&self.secret_key)
            .form(&session_form(&request))
            .send()
            .await?;
        parse_session_response(response).await
    }

    async fn fetch_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        let response = self
            .client
            .get(format!("{API_BASE}/checkout/sessions/{session_id}"))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        parse_session_response(response).await
    }
}

/// Flattens a session request into Stripe's bracketed form-parameter style.
fn session_form(request: &CreateSessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("customer_email".to_string(), request.customer_email.clone()),
    ];
    for (i, line) in request.lines.iter().enumerate() {
        params.push((
            format!("line_items[{i}][price_data][currency]"),
            request.currency.clone(),
        ));
        params.push((
            format!("line_items[{i}][price_data][unit_amount]"),
            line.unit_amount.to_string(),
        ));
        params.push((
            format!("line_items[{i}][price_data][product_data][name]"),
            line.name.clone(),
        ));
        if !line.description.is_empty() {
            params.push((
                format!("line_items[{i}][price_data][product_data][description]"),
                line.description.clone(),
            ));
        }
        params.push((format!("line_items[{i}][quantity]"), line.quantity.to_string()));
    }
    for (key, value) in &request.metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }
    params
}

async fn parse_session_response(response: reqwest::Response) -> Result<CheckoutSession, GatewayError> {
    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or(body);
        return Err(GatewayError::Rejected(message));
    }
    Ok(response.json().await?)
}

#[derive(Default, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    error: StripeErrorDetail,
}

#[derive(Default, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateSessionRequest {
        CreateSessionRequest {
            lines: vec![
                SessionLine {
                    name: "Classic Blazer - Size: M".into(),
                    description: "Premium blazer".into(),
                    unit_amount: 125_000,
                    quantity: 2,
                },
                SessionLine {
                    name: "Shipping".into(),
                    description: String::new(),
                    unit_amount: 500,
                    quantity: 1,
                },
            ],
            currency: "usd".into(),
            customer_email: "jo@example.com".into(),
            success_url: "http://localhost:3000/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .into(),
            cancel_url: "http://localhost:3000/checkout/cancel".into(),
            metadata: HashMap::from([("user_id".to_string(), "u-1".to_string())]),
        }
    }

    fn value_of<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn form_encodes_every_line_item() {
        let params = session_form(&request());
        assert_eq!(value_of(&params, "mode"), Some("payment"));
        assert_eq!(
            value_of(&params, "line_items[0][price_data][unit_amount]"),
            Some("125000")
        );
        assert_eq!(value_of(&params, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            value_of(&params, "line_items[1][price_data][product_data][name]"),
            Some("Shipping")
        );
        // Empty descriptions are omitted, not sent as blank strings.
        assert!(value_of(&params, "line_items[1][price_data][product_data][description]").is_none());
        assert_eq!(value_of(&params, "metadata[user_id]"), Some("u-1"));
    }

    #[test]
    fn webhook_event_exposes_completed_sessions_only() {
        let raw = serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_123",
                "payment_status": "paid",
                "metadata": { "user_id": "u-1", "cart_data": "[]" }
            }}
        });
        let event: WebhookEvent = serde_json::from_value(raw).unwrap();
        let session = event.checkout_session().unwrap();
        assert_eq!(session.id, "cs_test_123");
        assert!(session.is_paid());

        let other: WebhookEvent = serde_json::from_value(serde_json::json!({
            "type": "payment_intent.succeeded",
            "data": { "object": {} }
        }))
        .unwrap();
        assert!(other.checkout_session().is_none());
    }

    #[test]
    fn shipping_address_joins_present_parts() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "payment_status": "paid",
            "customer_details": {
                "email": "jo@example.com",
                "address": { "line1": "1 High St", "city": "Lagos", "country": "NG" }
            }
        }))
        .unwrap();
        assert_eq!(session.shipping_address(), "1 High St, Lagos, NG");
    }

    #[test]
    fn shipping_address_falls_back_to_email() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "payment_status": "paid",
            "customer_email": "jo@example.com"
        }))
        .unwrap();
        assert_eq!(session.shipping_address(), "Email: jo@example.com");
    }

    #[test]
    fn unpaid_sessions_are_not_paid() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "payment_status": "unpaid"
        }))
        .unwrap();
        assert!(!session.is_paid());
    }
}
