//! Bearer credential verification.
//!
//! Tokens are HS256 JWTs carrying `{ "sub": { "userId": "..." }, "exp": ... }`.
//! Issuing them is another service's job; this crate only checks them.

use crate::authority::UserId;
use crate::known_errors::KnownErrors;
use axum::extract::FromRef;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::crypto;
use jsonwebtoken::decode_header;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Subject,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
enum TokenError {
    #[error("token is not three dot separated segments")]
    Malformed,

    #[error("unexpected algorithm {0:?}")]
    Algorithm(Algorithm),

    #[error("signature mismatch")]
    Signature,

    #[error("token expired")]
    Expired,

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Claims(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: Arc<DecodingKey>,
    #[cfg(test)]
    secret: Arc<str>,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            #[cfg(test)]
            secret: Arc::from(secret),
        }
    }

    pub fn verify(&self, token: &str) -> Result<UserId, KnownErrors> {
        self.claims(token)
            .map(|claims| claims.sub.user_id)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                KnownErrors::NotLoggedIn
            })
    }

    // `sub` is an object here, not the registered string claim, so the
    // payload is checked by hand instead of through `jsonwebtoken::decode`.
    fn claims(&self, token: &str) -> Result<Claims, TokenError> {
        let (message, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (_, payload) = message.split_once('.').ok_or(TokenError::Malformed)?;
        if payload.contains('.') {
            return Err(TokenError::Malformed);
        }

        let header = decode_header(token)?;
        if header.alg != JWT_ALGORITHM {
            return Err(TokenError::Algorithm(header.alg));
        }
        if !crypto::verify(signature, message.as_bytes(), &self.key, JWT_ALGORITHM)? {
            return Err(TokenError::Signature);
        }

        let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload)?)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    #[cfg(test)]
    pub fn issue(&self, user_id: UserId, ttl: chrono::Duration) -> String {
        self.sign(&Claims {
            sub: Subject { user_id },
            exp: (Utc::now() + ttl).timestamp(),
        })
    }

    #[cfg(test)]
    pub fn sign<T: Serialize>(&self, claims: &T) -> String {
        use jsonwebtoken::EncodingKey;
        use jsonwebtoken::Header;

        jsonwebtoken::encode(
            &Header::new(JWT_ALGORITHM),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("failed to sign test token")
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// The authenticated actor of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    TokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = KnownErrors;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(KnownErrors::NotLoggedIn)?;
        let verifier = TokenVerifier::from_ref(state);
        verifier.verify(token).map(CurrentUser)
    }
}
