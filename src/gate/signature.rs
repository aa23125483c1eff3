//! Signed request fields and HMAC-SHA256 verification.
//!
//! A signed request carries five query parameters:
//!
//! ```text
//! key        identifier of the shared secret
//! timestamp  UTC, YYYY-MM-DDTHH:MM:SS.ffffffZ
//! seq        integer
//! nonce      integer
//! signature  base64url(HMAC-SHA256(secret, key | timestamp | seq | nonce | body))
//! ```
//!
//! The concatenation is over the raw decoded parameter bytes exactly as
//! received, followed by the raw body.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::gate::denial::Denial;
use crate::gate::pipeline::VerificationConfig;

type HmacSha256 = Hmac<Sha256>;

/// The signed-request fields found in the query string.
///
/// Raw values are kept for signature computation; parsed values are kept
/// alongside for callers that want them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureMaterial {
    pub key: Option<Vec<u8>>,
    pub timestamp: Option<Vec<u8>>,
    pub seq: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub seq_value: Option<i128>,
    pub nonce_value: Option<i128>,
}

impl SignatureMaterial {
    pub fn is_empty(&self) -> bool {
        self.key.is_none()
            && self.timestamp.is_none()
            && self.seq.is_none()
            && self.nonce.is_none()
            && self.signature.is_none()
    }
}

/// Pull the five fields out of the query parameters.
///
/// Fields are mandatory only when a secret is configured. A field that is
/// present is always validated, signed mode or not.
pub fn extract_fields(
    query: &HashMap<String, Vec<u8>>,
    config: &VerificationConfig,
    now: DateTime<Utc>,
) -> Result<SignatureMaterial, Denial> {
    let signed = config.secret.is_some();
    let field = |name: &'static str| -> Result<Option<Vec<u8>>, Denial> {
        match query.get(name) {
            Some(value) => Ok(Some(value.clone())),
            None if signed => Err(Denial::MissingSignedField(name)),
            None => Ok(None),
        }
    };

    let mut material = SignatureMaterial {
        key: field("key")?,
        ..SignatureMaterial::default()
    };

    material.timestamp = field("timestamp")?;
    if let Some(raw) = &material.timestamp {
        let issued_at = std::str::from_utf8(raw)
            .ok()
            .and_then(parse_timestamp)
            .ok_or_else(|| Denial::InvalidTimestamp(String::from_utf8_lossy(raw).into_owned()))?;
        check_freshness(issued_at, now, config.timestamp_delta_limit)?;
        material.issued_at = Some(issued_at);
    }

    material.seq = field("seq")?;
    if let Some(raw) = &material.seq {
        if !is_integer(raw) {
            return Err(Denial::InvalidSeq(String::from_utf8_lossy(raw).into_owned()));
        }
        material.seq_value = integer_value(raw);
    }

    material.nonce = field("nonce")?;
    if let Some(raw) = &material.nonce {
        if !is_integer(raw) {
            return Err(Denial::InvalidNonce(String::from_utf8_lossy(raw).into_owned()));
        }
        material.nonce_value = integer_value(raw);
    }

    material.signature = field("signature")?;
    Ok(material)
}

/// Verify the request signature when a secret is configured.
///
/// Returns the verified key, or `None` in unsigned mode.
pub fn verify(
    material: &SignatureMaterial,
    config: &VerificationConfig,
    body: &[u8],
) -> Result<Option<Vec<u8>>, Denial> {
    let Some(secret) = &config.secret else {
        return Ok(None);
    };

    let key = material.key.as_deref().ok_or(Denial::MissingSignedField("key"))?;
    let timestamp = material
        .timestamp
        .as_deref()
        .ok_or(Denial::MissingSignedField("timestamp"))?;
    let seq = material.seq.as_deref().ok_or(Denial::MissingSignedField("seq"))?;
    let nonce = material.nonce.as_deref().ok_or(Denial::MissingSignedField("nonce"))?;
    let provided = material
        .signature
        .as_deref()
        .ok_or(Denial::MissingSignedField("signature"))?;

    if config.key.as_deref() != Some(key) {
        return Err(Denial::UnknownKey(String::from_utf8_lossy(key).into_owned()));
    }

    let expected = compute_signature(secret, key, timestamp, seq, nonce, body);
    if provided.ct_eq(expected.as_bytes()).into() {
        debug!(log_category = "AR203", "REST request signature valid");
        Ok(Some(key.to_vec()))
    } else {
        Err(Denial::InvalidSignature)
    }
}

/// `base64url(HMAC-SHA256(secret, key | timestamp | seq | nonce | body))`, padded.
pub fn compute_signature(
    secret: &[u8],
    key: &[u8],
    timestamp: &[u8],
    seq: &[u8],
    nonce: &[u8],
    body: &[u8],
) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(key);
    mac.update(timestamp);
    mac.update(seq);
    mac.update(nonce);
    mac.update(body);
    URL_SAFE.encode(mac.finalize().into_bytes())
}

/// Parse `YYYY-MM-DDTHH:MM:SS.ffffffZ`. The fraction takes one to six digits.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let (datetime, fraction) = raw.strip_suffix('Z')?.split_once('.')?;
    if fraction.is_empty() || fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(datetime, "%Y-%m-%dT%H:%M:%S").ok()?;
    let micros: i64 = format!("{fraction:0<6}").parse().ok()?;
    Some((naive + chrono::Duration::microseconds(micros)).and_utc())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Zero disables the window.
fn check_freshness(issued_at: DateTime<Utc>, now: DateTime<Utc>, delta_limit: u64) -> Result<(), Denial> {
    let skew = issued_at - now;
    let delta = match skew.num_microseconds() {
        Some(micros) => micros.abs() as f64 / 1_000_000.0,
        None => skew.num_milliseconds().abs() as f64 / 1000.0,
    };
    if delta_limit > 0 && delta > delta_limit as f64 {
        return Err(Denial::RequestExpired(delta));
    }
    Ok(())
}

/// Optional sign followed by decimal digits, surrounding whitespace allowed.
/// There is no magnitude limit.
fn is_integer(raw: &[u8]) -> bool {
    let digits = raw.trim_ascii();
    let digits = digits.strip_prefix(b"+").or_else(|| digits.strip_prefix(b"-")).unwrap_or(digits);
    !digits.is_empty() && digits.iter().all(u8::is_ascii_digit)
}

/// `None` when the integer does not fit in an `i128`.
fn integer_value(raw: &[u8]) -> Option<i128> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

/// Client side of the protocol: the five signed fields for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedQuery {
    pub key: String,
    pub timestamp: String,
    pub seq: u64,
    pub nonce: u64,
    pub signature: String,
}

impl SignedQuery {
    pub fn new(key: &str, secret: &[u8], seq: u64, nonce: u64, body: &[u8], now: DateTime<Utc>) -> Self {
        let timestamp = format_timestamp(now);
        let signature = compute_signature(
            secret,
            key.as_bytes(),
            timestamp.as_bytes(),
            seq.to_string().as_bytes(),
            nonce.to_string().as_bytes(),
            body,
        );
        Self {
            key: key.to_string(),
            timestamp,
            seq,
            nonce,
            signature,
        }
    }

    /// Render as a percent-encoded query string.
    pub fn to_query_string(&self) -> String {
        format!(
            "key={}&timestamp={}&seq={}&nonce={}&signature={}",
            utf8_percent_encode(&self.key, NON_ALPHANUMERIC),
            utf8_percent_encode(&self.timestamp, NON_ALPHANUMERIC),
            self.seq,
            self.nonce,
            utf8_percent_encode(&self.signature, NON_ALPHANUMERIC),
        )
    }
}
