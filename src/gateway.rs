use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// The slice of the payment provider the portal depends on: create an
/// intent for a quoted amount and re-fetch it at confirmation time.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn create_intent(&self, request: IntentRequest) -> Result<CreatedIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentDetails>;
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct IntentDetails {
    pub id: String,
    pub status: String,
    pub amount_cents: i64,
    pub metadata: HashMap<String, String>,
}

pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        }
    }
}

#[derive(Deserialize)]
struct StripeIntent {
    id: String,
    status: String,
    amount: i64,
    client_secret: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<CreatedIntent> {
        // Stripe's API is form-encoded; metadata entries use bracket keys.
        let mut params: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount_cents.to_string()),
            ("currency".to_string(), request.currency),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in request.metadata {
            params.push((format!("metadata[{key}]"), value));
        }

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .context("failed to reach payment gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("gateway rejected intent creation: {status} {body}"));
        }

        let intent: StripeIntent = response
            .json()
            .await
            .context("failed to decode gateway intent response")?;

        let client_secret = intent
            .client_secret
            .ok_or_else(|| anyhow!("gateway returned intent without client secret"))?;

        Ok(CreatedIntent {
            id: intent.id,
            client_secret,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentDetails> {
        let response = self
            .client
            .get(format!("{}/v1/payment_intents/{intent_id}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("failed to reach payment gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("gateway intent lookup failed: {status} {body}"));
        }

        let intent: StripeIntent = response
            .json()
            .await
            .context("failed to decode gateway intent response")?;

        Ok(IntentDetails {
            id: intent.id,
            status: intent.status,
            amount_cents: intent.amount,
            metadata: intent.metadata,
        })
    }
}
