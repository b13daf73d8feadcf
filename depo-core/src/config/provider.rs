//! Payment provider configuration.

use std::time::Duration;
use url::Url;

pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.nowpayments.io/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// NowPayments connection settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Sent as `x-api-key` on every request.
    pub api_key: String,
    /// API root, e.g. `https://api.nowpayments.io/v1`.
    pub base_url: Url,
    /// Shared secret for `x-nowpayments-sig`.
    pub ipn_secret: Option<Box<[u8]>>,
    /// Reject unsigned or badly signed IPN callbacks.
    pub verify_ipn_signature: bool,
    /// Our IPN endpoint as seen from the provider.
    pub callback_url: Option<Url>,
    pub success_url: Option<Url>,
    pub cancel_url: Option<Url>,
    /// Upper bound for a single provider request.
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// `{base_url}/{segment}` without doubling or dropping slashes.
    pub fn endpoint(&self, segment: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            segment.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: "k".into(),
            base_url: Url::parse(base).unwrap(),
            ipn_secret: None,
            verify_ipn_signature: false,
            callback_url: None,
            success_url: None,
            cancel_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[test]
    fn test_endpoint_joins_paths() {
        assert_eq!(
            config(DEFAULT_PROVIDER_BASE_URL).endpoint("payment"),
            "https://api.nowpayments.io/v1/payment"
        );
        assert_eq!(
            config("http://127.0.0.1:9000/v1/").endpoint("/payment/42"),
            "http://127.0.0.1:9000/v1/payment/42"
        );
    }
}
