//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `AuthenticatedUser`: verifies the `Depo-Signature` identity assertion
//!   for the user named in `Depo-User-Id` (used by the User API).
//! - `AdminAuth`: checks `Depo-Admin-Authorization` against the argon2
//!   hash of the admin secret (used by the Admin API).
//!
//! All cryptographic operations are delegated to [`depo_sdk::signature`].

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use depo_sdk::signature::{
    self, ADMIN_AUTH_HEADER, SIGNATURE_HEADER, SignatureError, USER_ID_HEADER,
};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// AuthenticatedUser - User API authentication via identity assertion
// ---------------------------------------------------------------------------

/// The user id vouched for by the identity gateway.
///
/// # Header format
///
/// ```text
/// Depo-User-Id:   {user_id}
/// Depo-Signature: {unix_timestamp}.{base64_signature}
/// ```
///
/// The signature is computed as
/// `HMAC-SHA256("{user_id}.{timestamp}", identity_secret)`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// Errors returned by the [`AuthenticatedUser`] extractor.
#[derive(Debug)]
pub enum UserAuthError {
    MissingUserId,
    MissingSignature,
    InvalidHeader,
    InvalidBase64,
    SignatureMismatch,
    TimestampTooOld,
}

impl From<SignatureError> for UserAuthError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat | SignatureError::InvalidHex | SignatureError::Json(_) => {
                Self::InvalidHeader
            }
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::SignatureMismatch => Self::SignatureMismatch,
            SignatureError::Expired => Self::TimestampTooOld,
        }
    }
}

impl IntoResponse for UserAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            UserAuthError::MissingUserId => {
                (StatusCode::UNAUTHORIZED, "missing Depo-User-Id header")
            }
            UserAuthError::MissingSignature => {
                (StatusCode::UNAUTHORIZED, "missing Depo-Signature header")
            }
            UserAuthError::InvalidHeader => (StatusCode::BAD_REQUEST, "invalid header format"),
            UserAuthError::InvalidBase64 => {
                (StatusCode::BAD_REQUEST, "invalid signature encoding")
            }
            UserAuthError::SignatureMismatch => {
                (StatusCode::UNAUTHORIZED, "signature verification failed")
            }
            UserAuthError::TimestampTooOld => (StatusCode::UNAUTHORIZED, "signature expired"),
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = UserAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(UserAuthError::MissingUserId)?
            .to_str()
            .map_err(|_| UserAuthError::InvalidHeader)?
            .trim();
        if user_id.is_empty() {
            return Err(UserAuthError::MissingUserId);
        }

        let sig_value = parts
            .headers
            .get(SIGNATURE_HEADER)
            .ok_or(UserAuthError::MissingSignature)?
            .to_str()
            .map_err(|_| UserAuthError::InvalidHeader)?;

        let (timestamp, signature_bytes) = signature::parse_signature_header(sig_value)?;

        let identity = state.config.identity().await;
        signature::verify_user(user_id, timestamp, &signature_bytes, identity.secret_bytes())
            .inspect_err(|e| tracing::debug!(user_id, error = %e, "Identity assertion rejected"))?;
        drop(identity);

        Ok(AuthenticatedUser(user_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// AdminAuth - Admin API authentication via plaintext secret
// ---------------------------------------------------------------------------

/// Marker extractor for requests carrying the admin secret.
pub struct AdminAuth;

/// Errors returned by the [`AdminAuth`] extractor.
#[derive(Debug)]
pub enum AdminAuthError {
    MissingHeader,
    InvalidSecret,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AdminAuthError::MissingHeader => "missing Depo-Admin-Authorization header",
            AdminAuthError::InvalidSecret => "invalid admin secret",
        };
        (StatusCode::UNAUTHORIZED, message).into_response()
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidSecret)?
            .to_owned();

        let admin = state.config.admin().await.clone();
        // argon2 runs on the blocking pool.
        let verified = tokio::task::spawn_blocking(move || admin.verify_secret(&provided))
            .await
            .unwrap_or(false);

        if verified {
            Ok(AdminAuth)
        } else {
            tracing::warn!("Admin API request with invalid secret");
            Err(AdminAuthError::InvalidSecret)
        }
    }
}
