//! Admin token verification and chat webhook signatures

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::warn;

use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of a chat webhook body
pub const CHAT_SIGNATURE_HEADER: &str = "x-masaqil-signature";

/// Role an admin token must carry
pub const ADMIN_ROLE: &str = "admin";

/// Claims of an HS256 admin token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    /// Subject (operator name)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    #[serde(default)]
    pub role: Option<String>,
}

/// Verify a JWT token and extract claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<AdminClaims, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidToken);
    }

    let header_b64 = parts[0];
    let payload_b64 = parts[1];
    let signature_b64 = parts[2];

    // Verify signature (HMAC-SHA256)
    let message = format!("{}.{}", header_b64, payload_b64);
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(message.as_bytes());

    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    mac.verify_slice(&provided_signature)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    let claims: AdminClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    if claims.exp < now {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Verify a token and require the admin role
pub fn verify_admin(token: &str, secret: &str) -> Result<AdminClaims, AuthError> {
    let claims = verify_jwt(token, secret)?;
    if claims.role.as_deref() != Some(ADMIN_ROLE) {
        return Err(AuthError::Forbidden);
    }
    Ok(claims)
}

/// Extract JWT from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Admin role required")]
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingHeader => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
        };

        (status, self.to_string()).into_response()
    }
}

/// Middleware guarding the control panel routes
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingHeader)?;

    let token = extract_bearer_token(auth_header).ok_or(AuthError::InvalidFormat)?;
    let claims = verify_admin(token, &state.config.admin_jwt_secret).map_err(|e| {
        warn!(error = %e, "Rejected admin request");
        e
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Chat webhook errors
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid payload")]
    InvalidPayload,
}

/// Check the hex HMAC-SHA256 of a chat bridge payload
pub fn verify_chat_signature(
    body: &[u8],
    signature_hex: &str,
    secret: &str,
) -> Result<(), WebhookError> {
    let provided = hex::decode(signature_hex.trim()).map_err(|_| WebhookError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Hex signature the chat bridge attaches to a payload
#[cfg(test)]
pub fn sign_chat_body(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Mint an HS256 token; used by tests to talk to guarded routes
#[cfg(test)]
pub fn issue_token(claims: &AdminClaims, secret: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{header}.{payload}").as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{header}.{payload}.{signature}")
}

#[cfg(test)]
pub fn admin_claims(role: &str) -> AdminClaims {
    AdminClaims {
        sub: "operator".into(),
        exp: chrono::Utc::now().timestamp() as u64 + 3600,
        iat: 0,
        role: Some(role.into()),
    }
}
