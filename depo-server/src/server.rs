//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(api::user::router())
        .merge(api::ipn::router())
        .nest("/admin", api::admin::router());

    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        // Add state to all routes
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
///
/// `shutdown_tx` is flipped as soon as a signal arrives so open WebSocket
/// streams and the reconciler stop alongside the listener.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::runtime::{
        AdminConfig, DemoConfig, IdentityConfig, ProviderConfig, ReconcilerConfig, ServerConfig,
        SharedConfig,
    };
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use depo_core::config::{DEFAULT_REQUEST_TIMEOUT, Environment};
    use depo_core::provider::DemoProvider;
    use depo_core::store::{MemoryStore, Stores, WalletStore};
    use depo_sdk::objects::admin::{AdminDepositResponse, SweepReportResponse};
    use depo_sdk::objects::{DepositResponse, DepositStatus, WalletResponse};
    use depo_sdk::signature::{
        ADMIN_AUTH_HEADER, IPN_SIGNATURE_HEADER, SIGNATURE_HEADER, USER_ID_HEADER, sign_ipn,
        sign_user,
    };
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use url::Url;

    const IDENTITY_SECRET: &[u8] = b"gateway-secret";
    const IPN_SECRET: &[u8] = b"ipn-secret";
    const ADMIN_SECRET: &str = "admin-secret";

    fn test_config() -> SharedConfig {
        SharedConfig::new(
            ServerConfig {
                listen: "127.0.0.1:0".parse().unwrap(),
                environment: Environment::Development,
            },
            AdminConfig::new(AdminConfig::hash_secret(ADMIN_SECRET).unwrap()),
            IdentityConfig::new(IDENTITY_SECRET.to_vec()),
            ProviderConfig {
                api_key: String::new(),
                base_url: Url::parse("http://127.0.0.1:1/v1").unwrap(),
                ipn_secret: Some(IPN_SECRET.into()),
                verify_ipn_signature: true,
                callback_url: None,
                success_url: None,
                cancel_url: None,
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            DemoConfig::default(),
            ReconcilerConfig::default(),
        )
    }

    fn app() -> (Router, Arc<MemoryStore>) {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let (_, shutdown_rx) = watch::channel(false);
        // Long enough that demo sessions never confirm during a test.
        let provider = Arc::new(DemoProvider::new(Duration::from_secs(3600)));
        let state = AppState::with_provider(
            config,
            Stores::memory(store.clone()),
            provider,
            shutdown_rx,
        );
        (build_router(state), store)
    }

    fn user_request(method: &str, uri: &str, user: &str, body: Option<String>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, user)
            .header(SIGNATURE_HEADER, sign_user(user, IDENTITY_SECRET));
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    fn ipn_request(body: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/ipn")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(IPN_SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn admin_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(ADMIN_AUTH_HEADER, ADMIN_SECRET)
            .body(Body::empty())
            .unwrap()
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_deposit(router: &Router, user: &str, amount: &str) -> DepositResponse {
        let response = router
            .clone()
            .oneshot(user_request(
                "POST",
                "/api/v1/deposits",
                user,
                Some(format!(r#"{{"amount_usd": {amount}}}"#)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        json(response).await
    }

    fn finished_ipn(deposit: &DepositResponse) -> String {
        serde_json::json!({
            "payment_id": deposit.external_payment_id,
            "payment_status": "finished",
            "pay_amount": deposit.pay_currency_amount,
            "order_id": deposit.order_id,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_state_builds_provider_client() {
        let (_, shutdown_rx) = watch::channel(false);
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(test_config(), Stores::memory(store), shutdown_rx)
            .await
            .unwrap();
        assert_eq!(state.services.provider.name(), "nowpayments");
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_user_api_requires_identity_assertion() {
        let (router, _) = app();
        let response = router
            .clone()
            .oneshot(Request::get("/api/v1/wallet").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let forged = Request::get("/api/v1/wallet")
            .header(USER_ID_HEADER, "alice")
            .header(SIGNATURE_HEADER, sign_user("alice", b"not-the-secret"))
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(forged).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deposit_credit_flow() {
        let (router, _) = app();
        let deposit = create_deposit(&router, "alice", "50").await;
        assert_eq!(deposit.status, DepositStatus::Pending);
        assert!(deposit.is_demo);
        assert_eq!(deposit.amount_usd, dec!(50));

        let body = finished_ipn(&deposit);
        let signature = sign_ipn(&body, IPN_SECRET).unwrap();
        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(ipn_request(&body, Some(signature.clone())))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router
            .clone()
            .oneshot(user_request("GET", "/api/v1/wallet", "alice", None))
            .await
            .unwrap();
        let wallet: WalletResponse = json(response).await;
        assert_eq!(wallet.balance, dec!(50));
        assert_eq!(wallet.total_deposited, dec!(50));

        let uri = format!("/api/v1/deposits/{}", deposit.id);
        let response = router
            .clone()
            .oneshot(user_request("GET", &uri, "alice", None))
            .await
            .unwrap();
        let polled: DepositResponse = json(response).await;
        assert_eq!(polled.status, DepositStatus::Credited);
        assert!(polled.credited_at.is_some());

        let response = router
            .oneshot(user_request("GET", "/api/v1/deposits", "alice", None))
            .await
            .unwrap();
        let history: Vec<DepositResponse> = json(response).await;
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_amount_is_rejected() {
        let (router, store) = app();
        for amount in ["4.99", "1000.01", "0"] {
            let response = router
                .clone()
                .oneshot(user_request(
                    "POST",
                    "/api/v1/deposits",
                    "bob",
                    Some(format!(r#"{{"amount_usd": {amount}}}"#)),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{amount}");
        }
        assert!(store.get_wallet("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_other_users_deposit_is_not_found() {
        let (router, _) = app();
        let deposit = create_deposit(&router, "alice", "10").await;
        let uri = format!("/api/v1/deposits/{}", deposit.id);
        let response = router
            .oneshot(user_request("GET", &uri, "mallory", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_debit_beyond_balance_conflicts() {
        let (router, _) = app();
        let response = router
            .oneshot(user_request(
                "POST",
                "/api/v1/wallet/debit",
                "carol",
                Some(r#"{"amount": 1, "memo": "ad slot"}"#.into()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_ipn_rejections() {
        let (router, _) = app();
        let deposit = create_deposit(&router, "dave", "20").await;
        let body = finished_ipn(&deposit);

        let unsigned = router.clone().oneshot(ipn_request(&body, None)).await.unwrap();
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        let forged = sign_ipn(&body, b"wrong").unwrap();
        let response = router
            .clone()
            .oneshot(ipn_request(&body, Some(forged)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let garbage = "{not json";
        let response = router
            .clone()
            .oneshot(ipn_request(garbage, Some("00".into())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let unknown = r#"{"payment_id":"nope","payment_status":"finished","order_id":"nope"}"#;
        let signature = sign_ipn(unknown, IPN_SECRET).unwrap();
        let response = router
            .oneshot(ipn_request(unknown, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_contended_deposit_is_not_an_error() {
        let (router, store) = app();
        let deposit = create_deposit(&router, "gina", "30").await;
        store.set_lose_status_writes(true);

        let body = finished_ipn(&deposit);
        let signature = sign_ipn(&body, IPN_SECRET).unwrap();
        let response = router
            .clone()
            .oneshot(ipn_request(&body, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(user_request(
                "GET",
                &format!("/api/v1/deposits/{}?refresh=true", deposit.id),
                "gina",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let polled: DepositResponse = json(response).await;
        assert_eq!(polled.status, DepositStatus::Pending);
        assert!(store.get_wallet("gina").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_api() {
        let (router, _) = app();
        let response = router
            .clone()
            .oneshot(Request::get("/api/v1/admin/deposits").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        create_deposit(&router, "erin", "15").await;
        create_deposit(&router, "frank", "25").await;

        let response = router
            .clone()
            .oneshot(admin_request("GET", "/api/v1/admin/deposits?user_id=erin"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let deposits: Vec<AdminDepositResponse> = json(response).await;
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].user_id, "erin");

        let response = router
            .clone()
            .oneshot(admin_request("GET", "/api/v1/admin/wallets/erin"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(admin_request("POST", "/api/v1/admin/reconcile"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report: SweepReportResponse = json(response).await;
        assert_eq!(report, SweepReportResponse::default());
    }
}
