// src/api/stripe.rs
//
// Stripe webhook signature scheme: the `Stripe-Signature` header carries
// `t=<unix ts>,v1=<hex hmac>` where the hmac is HMAC-SHA256 over
// "<ts>.<raw body>" with the endpoint signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Events older than this are rejected even with a valid mac (replay window).
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub fn sign_hmac_sha256_hex(secret: &str, data: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies the raw payload against the signature header. This is the
/// security boundary of the webhook endpoint: nothing downstream runs unless
/// this returns Ok.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), ApiError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => {
                timestamp = v.parse::<i64>().ok();
            }
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return Err(ApiError::Signature("missing timestamp".into()));
    };
    if candidates.is_empty() {
        return Err(ApiError::Signature("missing v1 signature".into()));
    }
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(ApiError::Signature("timestamp outside tolerance".into()));
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    for candidate in candidates {
        let Ok(sig) = hex::decode(candidate) else {
            continue;
        };
        if mac.clone().verify_slice(&sig).is_ok() {
            return Ok(());
        }
    }

    Err(ApiError::Signature("no matching v1 signature".into()))
}
