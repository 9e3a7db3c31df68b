//! debi Webhook Verification
//!
//! Each delivery carries two headers:
//!
//! - `debi-Timestamp`: unix seconds at signing time
//! - `debi-Signature`: hex HMAC-SHA256 of `"{timestamp}.{payload}"` keyed by
//!   the endpoint secret, either bare or as `v1=<hex>` entries
//!
//! The signature is checked before the payload is parsed, so a tampered body
//! is reported as a signature failure rather than a parse failure.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{DebiError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Timestamp header name (HTTP headers are case-insensitive)
pub const TIMESTAMP_HEADER: &str = "debi-timestamp";

/// Signature header name
pub const SIGNATURE_HEADER: &str = "debi-signature";

/// Maximum accepted clock skew between signing and verification
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// A verified webhook event
///
/// Any JSON object is accepted. `id` and `type` are read leniently, so a
/// numeric id comes through as its decimal text.
#[derive(Clone, Debug, PartialEq)]
pub struct WebhookEvent {
    pub id: Option<String>,

    /// e.g. `payment.updated`
    pub event_type: String,

    /// `null` when the event has no `data`
    pub data: Value,

    /// The whole event as sent
    pub raw: Value,
}

impl WebhookEvent {
    fn from_object(raw: Value) -> Self {
        Self {
            id: field_text(&raw, "id"),
            event_type: field_text(&raw, "type").unwrap_or_default(),
            data: raw.get("data").cloned().unwrap_or(Value::Null),
            raw,
        }
    }

    /// `data.id`, if the event carries one
    pub fn resource_id(&self) -> Option<&str> {
        self.data.get("id").and_then(Value::as_str)
    }
}

/// Webhook verifier bound to one endpoint secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: Option<i64>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: Some(DEFAULT_TOLERANCE_SECS),
        }
    }

    /// Change the accepted clock skew
    #[must_use]
    pub const fn with_tolerance(mut self, secs: i64) -> Self {
        self.tolerance_secs = Some(secs);
        self
    }

    /// Accept any timestamp (replays included)
    #[must_use]
    pub const fn without_tolerance(mut self) -> Self {
        self.tolerance_secs = None;
        self
    }

    /// Verify headers against the payload and parse the event.
    pub fn construct_event(
        &self,
        payload: &str,
        timestamp: Option<&str>,
        signature: Option<&str>,
    ) -> Result<WebhookEvent> {
        self.construct_event_at(payload, timestamp, signature, Utc::now().timestamp())
    }

    /// Same as [`construct_event`](Self::construct_event) with an explicit clock.
    pub fn construct_event_at(
        &self,
        payload: &str,
        timestamp: Option<&str>,
        signature: Option<&str>,
        now: i64,
    ) -> Result<WebhookEvent> {
        self.verify_at(payload, timestamp, signature, now)?;
        parse_event(payload)
    }

    /// Check the signature only
    pub fn verify_at(
        &self,
        payload: &str,
        timestamp: Option<&str>,
        signature: Option<&str>,
        now: i64,
    ) -> Result<()> {
        let timestamp = non_empty(timestamp)
            .ok_or_else(|| signature_error("missing debi-Timestamp header"))?;
        let signature = non_empty(signature)
            .ok_or_else(|| signature_error("missing debi-Signature header"))?;

        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| signature_error(format!("timestamp is not an integer: {timestamp}")))?;

        if let Some(tolerance) = self.tolerance_secs {
            if now.abs_diff(signed_at) > tolerance.unsigned_abs() {
                return Err(signature_error(format!(
                    "timestamp {signed_at} outside the {tolerance}s tolerance window"
                )));
            }
        }

        let candidates = signature_candidates(signature);
        if candidates.is_empty() {
            return Err(signature_error("no v1 signature in header"));
        }

        let signed_payload = format!("{timestamp}.{payload}");
        for candidate in candidates {
            let Ok(expected) = hex::decode(candidate) else {
                continue;
            };
            let mut mac = self.mac()?;
            mac.update(signed_payload.as_bytes());
            if mac.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }

        Err(signature_error("no signature matches the payload"))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| DebiError::Config(format!("invalid webhook secret: {e}")))
    }
}

/// Compute the signature header value for a payload.
pub fn sign(payload: &str, timestamp: i64, secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DebiError::Config(format!("invalid webhook secret: {e}")))?;
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn parse_event(payload: &str) -> Result<WebhookEvent> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| DebiError::WebhookPayload(e.to_string()))?;
    if !value.is_object() {
        return Err(DebiError::WebhookPayload(
            "event must be a JSON object".into(),
        ));
    }
    Ok(WebhookEvent::from_object(value))
}

/// String fields as-is, other non-null values as their JSON text.
fn field_text(event: &Value, key: &str) -> Option<String> {
    match event.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Hex values worth comparing: bare hex, or `v1=` entries of a
/// comma-separated list. Other schemes are ignored.
fn signature_candidates(header: &str) -> Vec<&str> {
    header
        .split(',')
        .map(str::trim)
        .filter_map(|part| match part.split_once('=') {
            Some((scheme, value)) => (scheme.trim() == "v1").then(|| value.trim()),
            None => Some(part),
        })
        .filter(|value| !value.is_empty())
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn signature_error(message: impl Into<String>) -> DebiError {
    DebiError::WebhookSignature(message.into())
}
