//! Stripe-flavoured payment gateway client.
//!
//! Only the charge-intent call is implemented; refunds stay ledger-local.
//! The request timeout is bounded so a slow provider cannot pin a promotion
//! handler. On timeout the caller's ledger entry stays `pending` because
//! the charge may still have gone through on the provider side.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::collaborators::{ChargeIntent, ChargeMetadata, GatewayError, PaymentGateway};

pub struct StripeGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            secret_key: secret_key.into(),
        })
    }
}

#[derive(Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: String,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_charge_intent(
        &self,
        amount_minor: i64,
        metadata: &ChargeMetadata,
    ) -> Result<ChargeIntent, GatewayError> {
        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", "usd".to_string()),
            ("metadata[listing_id]", metadata.listing_id.to_string()),
            ("metadata[user_id]", metadata.user_id.to_string()),
            ("metadata[tier]", metadata.tier.as_str().to_string()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let intent: PaymentIntentResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))?;

        Ok(ChargeIntent {
            handle: intent.id,
            client_secret: intent.client_secret,
        })
    }
}
