//! Session tokens to [`AuthContext`].
//!
//! The session JWT is read from `Authorization: Bearer` or the `__session`
//! cookie. A missing or invalid token yields an anonymous caller; the gate
//! and actions decide what an anonymous caller may do.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use homefind_core::AuthContext;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "__session";

/// Claims read from a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
    /// Active plans, e.g. `u:agent` or `u:agent,o:team`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pla: Option<String>,
}

impl SessionClaims {
    pub fn plans(&self) -> Vec<String> {
        self.pla
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| p.split_once(':').map_or(p, |(_, plan)| plan).to_string())
            .collect()
    }
}

#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl SessionVerifier {
    /// RS256 tokens signed by the identity provider.
    pub fn rs256(pem: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self::with_key(
            DecodingKey::from_rsa_pem(pem.as_bytes())?,
            Algorithm::RS256,
        ))
    }

    /// HS256 tokens minted with a shared secret, for development.
    pub fn hs256(secret: &str) -> Self {
        Self::with_key(DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        Self { key, validation }
    }

    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        match decode::<SessionClaims>(token, &self.key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "session token rejected");
                None
            }
        }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> AuthContext {
        let Some(token) = session_token(headers) else {
            return AuthContext::anonymous();
        };
        match self.verify(&token) {
            Some(claims) => {
                let plans = claims.plans();
                AuthContext::signed_in(claims.sub, plans)
            }
            None => AuthContext::anonymous(),
        }
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

/// The caller of a request, as an extractor.
#[derive(Debug, Clone)]
pub struct Caller(pub AuthContext);

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Caller(state.sessions().authenticate(&parts.headers)))
    }
}
