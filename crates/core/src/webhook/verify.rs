//! Svix signature verification for identity-provider webhooks.
//!
//! The signed content is `{svix-id}.{svix-timestamp}.{raw body}`, MACed with
//! HMAC-SHA256 under the base64 key that follows `whsec_` in the secret.
//! `svix-signature` carries one or more space-separated `v1,<base64>` entries.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::WebhookError;

type HmacSha256 = Hmac<Sha256>;

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";
/// Allowed clock difference between sender and receiver.
pub const TOLERANCE_SECS: i64 = 5 * 60;

pub const ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";

#[derive(Debug, Clone, Copy)]
pub struct SvixHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Result<Self, WebhookError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|_| WebhookError::InvalidSecret)?;
        if key.is_empty() {
            return Err(WebhookError::InvalidSecret);
        }
        Ok(Self { key })
    }

    fn mac(&self, id: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| WebhookError::InvalidSecret)?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }

    /// Check the timestamp window, then accept if any `v1` entry matches.
    pub fn verify(
        &self,
        headers: &SvixHeaders<'_>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let sent: i64 = headers
            .timestamp
            .trim()
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;
        if (now.timestamp() - sent).abs() > TOLERANCE_SECS {
            return Err(WebhookError::TimestampOutOfRange);
        }

        for entry in headers.signature.split_whitespace() {
            let Some((version, encoded)) = entry.split_once(',') else {
                continue;
            };
            if version != SIGNATURE_VERSION {
                continue;
            }
            let Ok(signature) = STANDARD.decode(encoded) else {
                continue;
            };
            let mac = self.mac(headers.id, headers.timestamp, body)?;
            if mac.verify_slice(&signature).is_ok() {
                return Ok(());
            }
        }
        Err(WebhookError::InvalidSignature)
    }

    /// The `v1,<base64>` signature entry for a message.
    pub fn sign(&self, id: &str, timestamp: i64, body: &[u8]) -> Result<String, WebhookError> {
        let mac = self.mac(id, &timestamp.to_string(), body)?;
        Ok(format!(
            "{SIGNATURE_VERSION},{}",
            STANDARD.encode(mac.finalize().into_bytes())
        ))
    }
}
