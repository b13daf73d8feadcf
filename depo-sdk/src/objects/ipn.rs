//! Instant payment notification (IPN) bodies pushed by the provider.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An IPN callback body.
///
/// Only the fields the service acts on are modelled; everything else the
/// provider sends is ignored (but still covered by the signature, which is
/// computed over the raw body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpnNotification {
    #[serde(default, deserialize_with = "super::string_or_number::option::deserialize")]
    pub payment_id: Option<String>,
    pub payment_status: String,
    #[serde(default)]
    pub pay_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "super::string_or_number::option::deserialize")]
    pub order_id: Option<String>,
}

/// Body returned to the provider after an IPN was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpnAck {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipn_parsing() {
        let json = r#"{
            "payment_id": 4522625843,
            "payment_status": "finished",
            "pay_address": "bc1qexample",
            "pay_amount": 0.0011,
            "order_id": "deposit_u1_1700000000000000000"
        }"#;
        let ipn: IpnNotification = serde_json::from_str(json).unwrap();
        assert_eq!(ipn.payment_id.as_deref(), Some("4522625843"));
        assert_eq!(ipn.payment_status, "finished");
        assert_eq!(ipn.order_id.as_deref(), Some("deposit_u1_1700000000000000000"));
    }

    #[test]
    fn test_ipn_empty_order_id_is_none() {
        let json = r#"{"payment_id": "77", "payment_status": "waiting", "order_id": ""}"#;
        let ipn: IpnNotification = serde_json::from_str(json).unwrap();
        assert_eq!(ipn.order_id, None);
        assert_eq!(ipn.pay_amount, None);
    }
}
