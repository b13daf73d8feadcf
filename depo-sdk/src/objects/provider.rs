//! Payment provider (NOWPayments) request and response bodies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `POST /payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub price_amount: Decimal,
    pub price_currency: String,
    pub pay_currency: String,
    pub ipn_callback_url: String,
    pub order_id: String,
    pub order_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
}

/// Response of `POST /payment`.
///
/// The payment endpoint names the id `payment_id`, the invoice endpoint
/// names it `id`; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    #[serde(alias = "payment_id", deserialize_with = "super::string_or_number::deserialize")]
    pub id: String,
    #[serde(default)]
    pub invoice_url: Option<String>,
    pub pay_address: String,
    pub pay_amount: Decimal,
}

/// Response of `GET /payment/{payment_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    #[serde(deserialize_with = "super::string_or_number::deserialize")]
    pub payment_id: String,
    pub payment_status: String,
    #[serde(default)]
    pub order_id: Option<String>,
}
