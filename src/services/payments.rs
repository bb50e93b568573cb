use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

/// Metadata attached to every payment intent so the processor's dashboard
/// and webhooks can be traced back to our records.
#[derive(Debug, Clone)]
pub struct IntentMetadata {
    pub order_id: Uuid,
    pub user_id: Uuid,
}

/// External payment intent as seen by this service.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Client-usable secret the frontend needs to complete authorization.
    pub client_secret: Option<String>,
    pub status: String,
    pub amount: i64,
    pub currency: String,
}

/// Capability interface over the external payment processor.
///
/// Checkout only ever calls `create_intent` and `retrieve_intent`;
/// confirmation is keyed by intent id and handled against our own order
/// records, so it lives in the order service, not here.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for `amount_cents` in the smallest currency
    /// unit and returns its identifier plus client secret.
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: IntentMetadata,
    ) -> Result<PaymentIntent, ServiceError>;

    /// Fetches the current state of an intent, including its client secret.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: Option<GatewayErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetails {
    message: Option<String>,
}

/// Stripe-backed gateway speaking the payment-intents REST API.
#[derive(Clone)]
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            base_url,
        }
    }

    async fn parse_intent(&self, response: reqwest::Response) -> Result<PaymentIntent, ServiceError> {
        if response.status().is_success() {
            return response
                .json::<PaymentIntent>()
                .await
                .map_err(|e| ServiceError::PaymentGateway(format!("malformed response: {}", e)));
        }

        let status = response.status();
        let message = response
            .json::<GatewayErrorBody>()
            .await
            .ok()
            .and_then(|b| b.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("gateway returned {}", status));
        Err(ServiceError::PaymentGateway(message))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, metadata), fields(order_id = %metadata.order_id))]
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: IntentMetadata,
    ) -> Result<PaymentIntent, ServiceError> {
        let params = [
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_string()),
            ("metadata[order_id]", metadata.order_id.to_string()),
            ("metadata[user_id]", metadata.user_id.to_string()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("request failed: {}", e)))?;

        let intent = self.parse_intent(response).await?;
        info!(intent_id = %intent.id, amount_cents, "payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError> {
        let response = self
            .http
            .get(format!("{}/v1/payment_intents/{}", self.base_url, intent_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("request failed: {}", e)))?;

        self.parse_intent(response).await
    }
}

/// Gateway used when no secret key is configured. Card checkouts fail
/// loudly instead of silently pretending to charge.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_intent(
        &self,
        _amount_cents: i64,
        _currency: &str,
        _metadata: IntentMetadata,
    ) -> Result<PaymentIntent, ServiceError> {
        Err(ServiceError::PaymentGateway(
            "payment gateway is not configured".to_string(),
        ))
    }

    async fn retrieve_intent(&self, _intent_id: &str) -> Result<PaymentIntent, ServiceError> {
        Err(ServiceError::PaymentGateway(
            "payment gateway is not configured".to_string(),
        ))
    }
}
