//! Access-token verification.
//!
//! Tokens are HS256 JSON Web Tokens whose `id` claim names the account. A
//! token is accepted when the signature matches `ACCESS_TOKEN_SECRET` and it
//! has not expired. Accounts are issued elsewhere, so the first verified
//! token for an unseen `id` provisions a bare row in `users`.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};

use skillswap_shared::UserId;

use crate::api::AppState;
use crate::directory::SharedDb;
use crate::error::ServerError;

type HmacSha256 = Hmac<Sha256>;

/// Resolves a presented credential to an account, or refuses it.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify_and_resolve_user(&self, credential: &str) -> Option<UserId>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not a compact JWT")]
    Malformed,

    #[error("unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token carries no usable id claim")]
    MissingSubject,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Check an HS256 token and return the user it names. `now` is unix seconds.
pub fn verify_token(secret: &[u8], token: &str, now: i64) -> Result<UserId, TokenError> {
    let mut parts = token.trim().split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header: Header = decode_segment(header_b64)?;
    if header.alg != "HS256" {
        return Err(TokenError::UnsupportedAlgorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| TokenError::Malformed)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::BadSignature)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let claims: Claims = decode_segment(claims_b64)?;
    if matches!(claims.exp, Some(exp) if now >= exp) {
        return Err(TokenError::Expired);
    }

    claims
        .id
        .and_then(|id| UserId::new(id).ok())
        .ok_or(TokenError::MissingSubject)
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

/// Token in an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// JWT verification that provisions the accounts table.
pub struct JwtAuthenticator {
    secret: Option<Vec<u8>>,
    db: SharedDb,
}

impl JwtAuthenticator {
    pub fn new(secret: Option<&str>, db: SharedDb) -> Self {
        if secret.is_none() {
            warn!("ACCESS_TOKEN_SECRET is not set; every connection will be refused");
        }
        Self {
            secret: secret.map(|s| s.as_bytes().to_vec()),
            db,
        }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn verify_and_resolve_user(&self, credential: &str) -> Option<UserId> {
        let secret = self.secret.as_deref()?;
        let user = match verify_token(secret, credential, chrono::Utc::now().timestamp()) {
            Ok(user) => user,
            Err(e) => {
                debug!(error = %e, "Access token refused");
                return None;
            }
        };

        match self.db.lock().await.ensure_user(&user) {
            Ok(created) => {
                if created {
                    info!(user = %user, "Provisioned account on first sign-in");
                }
                Some(user)
            }
            Err(e) => {
                warn!(user = %user, error = %e, "Account provisioning failed");
                None
            }
        }
    }
}

/// The authenticated caller of a REST route.
pub struct AuthUser(pub UserId);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ServerError::Unauthorized)?;
        state
            .auth
            .verify_and_resolve_user(token)
            .await
            .map(AuthUser)
            .ok_or(ServerError::Unauthorized)
    }
}

/// Mint a token the way the account service does.
#[cfg(test)]
pub(crate) fn sign_token(secret: &[u8], user: &str, exp: Option<i64>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let mut claims = serde_json::json!({ "id": user, "iat": 0 });
    if let Some(exp) = exp {
        claims["exp"] = serde_json::json!(exp);
    }
    let claims = URL_SAFE_NO_PAD.encode(claims.to_string());

    let mut mac = HmacSha256::new_from_slice(secret).unwrap();
    mac.update(format!("{header}.{claims}").as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{header}.{claims}.{sig}")
}
