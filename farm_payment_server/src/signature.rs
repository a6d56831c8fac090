//! Webhook signature verification.
//!
//! The processor signs every delivery with the webhook signing secret and sends the result in a header of the form
//! `t=<unix seconds>,v1=<hex HMAC-SHA256>`. More than one `v1` entry may be present while a secret is being rolled.
//! The signed payload is the timestamp, a `.`, and the raw request body, so verification must happen on the exact bytes
//! received, before any JSON parsing.
use std::time::Duration;

use chrono::Utc;
use farm_payment_engine::PaymentEvent;
use fpg_common::Secret;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;
use thiserror::Error;

use crate::integrations::processor::parse_payment_event;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const DEFAULT_SIGNATURE_TOLERANCE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("No webhook signing secret has been configured.")]
    SecretNotConfigured,
    #[error("The signature header is malformed. {0}")]
    MalformedHeader(String),
    #[error("The signature timestamp is {age} seconds away from the current time.")]
    TimestampOutOfTolerance { age: i64 },
    #[error("No signature in the header matches the payload.")]
    Mismatch,
    #[error("The payload is not a valid payment event. {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Secret<String>,
    header_name: String,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: Secret<String>) -> Self {
        Self { secret, header_name: DEFAULT_SIGNATURE_HEADER.to_string(), tolerance: DEFAULT_SIGNATURE_TOLERANCE }
    }

    pub fn with_header_name<S: Into<String>>(mut self, header_name: S) -> Self {
        self.header_name = header_name.into();
        self
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The name of the request header carrying the signature.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Authenticates `raw_body` against `signature_header` and parses the payment event it contains.
    pub fn verify(&self, raw_body: &[u8], signature_header: &str) -> Result<PaymentEvent, SignatureError> {
        self.verify_at(raw_body, signature_header, Utc::now().timestamp())
    }

    /// As [`Self::verify`], with `now` (unix seconds) as the reference time for the tolerance check.
    pub fn verify_at(&self, raw_body: &[u8], signature_header: &str, now: i64) -> Result<PaymentEvent, SignatureError> {
        self.check_signature(raw_body, signature_header, now)?;
        trace!("🔐️ Webhook signature ✅️");
        parse_payment_event(raw_body).map_err(|e| {
            warn!("🔐️ A correctly signed webhook carried an unreadable payload. {e}");
            SignatureError::InvalidPayload(e.to_string())
        })
    }

    /// Produces a signature header for `raw_body`, as the processor would send it.
    pub fn sign(&self, timestamp: i64, raw_body: &[u8]) -> Result<String, SignatureError> {
        let mac = self.mac_for(timestamp, raw_body)?;
        Ok(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
    }

    fn check_signature(&self, raw_body: &[u8], signature_header: &str, now: i64) -> Result<(), SignatureError> {
        let header = SignatureHeader::parse(signature_header).map_err(|e| {
            warn!("🔐️ Rejecting webhook. {e}");
            e
        })?;
        let age = now.saturating_sub(header.timestamp);
        if age.unsigned_abs() > self.tolerance.as_secs() {
            warn!("🔐️ Rejecting webhook with a signature timestamp {age}s old.");
            return Err(SignatureError::TimestampOutOfTolerance { age });
        }
        let mac = self.mac_for(header.timestamp, raw_body)?;
        let matched = header
            .signatures
            .iter()
            .filter_map(|sig| hex::decode(sig).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());
        if matched {
            Ok(())
        } else {
            warn!("🔐️ Rejecting webhook. The signature does not match the payload.");
            Err(SignatureError::Mismatch)
        }
    }

    fn mac_for(&self, timestamp: i64, raw_body: &[u8]) -> Result<HmacSha256, SignatureError> {
        if self.secret.is_empty() {
            error!("🔐️ A webhook arrived, but no signing secret is configured. Set FPG_WEBHOOK_SIGNING_SECRET.");
            return Err(SignatureError::SecretNotConfigured);
        }
        let mut mac = HmacSha256::new_from_slice(self.secret.reveal().as_bytes())
            .map_err(|_| SignatureError::SecretNotConfigured)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(raw_body);
        Ok(mac)
    }
}

#[derive(Debug)]
struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

impl<'a> SignatureHeader<'a> {
    fn parse(value: &'a str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in value.split(',') {
            match part.trim().split_once('=') {
                Some(("t", t)) => {
                    let t = t.parse::<i64>().map_err(|e| SignatureError::MalformedHeader(format!("Bad timestamp. {e}")))?;
                    timestamp = Some(t);
                },
                Some(("v1", sig)) => signatures.push(sig),
                // Other schemes (e.g. v0) are not used for verification
                _ => {},
            }
        }
        let timestamp = timestamp.ok_or_else(|| SignatureError::MalformedHeader("No timestamp".into()))?;
        if signatures.is_empty() {
            return Err(SignatureError::MalformedHeader("No v1 signature".into()));
        }
        Ok(Self { timestamp, signatures })
    }
}
