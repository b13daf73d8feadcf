//! NOWPayments REST client.

use super::{PaymentProvider, PaymentSession, ProviderError, SessionRequest};
use crate::config::ProviderConfig;
use async_trait::async_trait;
use depo_sdk::objects::provider::{
    CreatePaymentRequest, CreatePaymentResponse, PaymentStatusResponse,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const PRICE_CURRENCY: &str = "usd";
const PAY_CURRENCY: &str = "btc";

/// Talks to `{base_url}/payment`.
///
/// Connection settings are read from the shared config section on every
/// call, so a reload takes effect for the next request.
pub struct NowPaymentsClient {
    config: Arc<RwLock<ProviderConfig>>,
    http_client: reqwest::Client,
}

impl NowPaymentsClient {
    /// Fails if the HTTP client (TLS backend) cannot be initialised.
    pub fn new(
        config: Arc<RwLock<ProviderConfig>>,
        timeout: std::time::Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth {
                status: status.as_u16(),
            });
        }
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!(
                "provider returned {status}"
            )));
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for NowPaymentsClient {
    fn name(&self) -> &'static str {
        "nowpayments"
    }

    #[tracing::instrument(skip_all, err, fields(order_id = %request.order_id))]
    async fn create_payment(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, ProviderError> {
        let (url, api_key, timeout, body) = {
            let config = self.config.read().await;
            let body = CreatePaymentRequest {
                price_amount: request.amount_usd,
                price_currency: PRICE_CURRENCY.to_string(),
                pay_currency: PAY_CURRENCY.to_string(),
                ipn_callback_url: config
                    .callback_url
                    .as_ref()
                    .map(|u| u.to_string())
                    .unwrap_or_default(),
                order_id: request.order_id.clone(),
                order_description: request.description.clone(),
                success_url: config.success_url.as_ref().map(|u| u.to_string()),
                cancel_url: config.cancel_url.as_ref().map(|u| u.to_string()),
            };
            (
                config.endpoint("payment"),
                config.api_key.clone(),
                config.request_timeout,
                body,
            )
        };

        let response = self
            .http_client
            .post(url)
            .header("x-api-key", api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;
        let created: CreatePaymentResponse = Self::decode(response).await?;
        if created.pay_address.is_empty() {
            warn!(payment_id = %created.id, "Provider returned a session without pay address");
            return Err(ProviderError::Malformed("empty pay_address".into()));
        }
        debug!(payment_id = %created.id, "Provider session opened");

        Ok(PaymentSession {
            external_payment_id: created.id,
            payment_url: created.invoice_url,
            pay_address: created.pay_address,
            pay_amount: created.pay_amount,
        })
    }

    #[tracing::instrument(skip_all, err, fields(payment_id = %external_payment_id))]
    async fn payment_status(&self, external_payment_id: &str) -> Result<String, ProviderError> {
        let (url, api_key, timeout) = {
            let config = self.config.read().await;
            (
                config.endpoint(&format!("payment/{external_payment_id}")),
                config.api_key.clone(),
                config.request_timeout,
            )
        };
        let response = self
            .http_client
            .get(url)
            .header("x-api-key", api_key)
            .timeout(timeout)
            .send()
            .await?;
        let status: PaymentStatusResponse = Self::decode(response).await?;
        Ok(status.payment_status)
    }
}
