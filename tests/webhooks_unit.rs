use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use payview::api::stripe::{sign_hmac_sha256_hex, verify_signature, SIGNATURE_TOLERANCE_SECS};

type HmacSha256 = Hmac<Sha256>;

const SECRET: &str = "whsec_test123secret456";

fn compute_signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[test]
fn valid_signature_is_accepted() {
    let payload = br#"{"type":"checkout.session.completed"}"#;
    let now = Utc::now().timestamp();
    let header = format!("t={},v1={}", now, compute_signature(payload, SECRET, now));

    assert!(verify_signature(payload, &header, SECRET, now).is_ok());
}

#[test]
fn wrong_secret_is_rejected() {
    let payload = br#"{"type":"checkout.session.completed"}"#;
    let now = Utc::now().timestamp();
    let header = format!(
        "t={},v1={}",
        now,
        compute_signature(payload, "wrong_secret", now)
    );

    assert!(verify_signature(payload, &header, SECRET, now).is_err());
}

#[test]
fn tampered_payload_is_rejected() {
    let original = br#"{"type":"checkout.session.completed"}"#;
    let modified = br#"{"type":"checkout.session.completed","hacked":true}"#;
    let now = Utc::now().timestamp();
    let header = format!("t={},v1={}", now, compute_signature(original, SECRET, now));

    assert!(verify_signature(modified, &header, SECRET, now).is_err());
}

#[test]
fn stale_timestamp_is_rejected() {
    let payload = br#"{"type":"checkout.session.completed"}"#;
    let now = Utc::now().timestamp();
    let old = now - SIGNATURE_TOLERANCE_SECS - 60;
    let header = format!("t={},v1={}", old, compute_signature(payload, SECRET, old));

    assert!(verify_signature(payload, &header, SECRET, now).is_err());
}

#[test]
fn missing_timestamp_is_rejected() {
    let payload = br#"{}"#;
    let now = Utc::now().timestamp();
    let header = format!("v1={}", compute_signature(payload, SECRET, now));

    assert!(verify_signature(payload, &header, SECRET, now).is_err());
}

#[test]
fn malformed_header_is_rejected() {
    let payload = br#"{}"#;
    let now = Utc::now().timestamp();

    assert!(verify_signature(payload, "not-a-signature", SECRET, now).is_err());
    assert!(verify_signature(payload, "", SECRET, now).is_err());
    assert!(verify_signature(payload, "t=abc,v1=zz", SECRET, now).is_err());
}

#[test]
fn second_v1_candidate_matches() {
    // Key rotation: the header may carry one stale and one current signature.
    let payload = br#"{"type":"account.updated"}"#;
    let now = Utc::now().timestamp();
    let good = compute_signature(payload, SECRET, now);
    let header = format!("t={},v1={},v1={}", now, "00".repeat(32), good);

    assert!(verify_signature(payload, &header, SECRET, now).is_ok());
}

#[test]
fn hex_helper_matches_manual_mac() {
    let data = "1700000000.{}";
    let expected = {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).expect("hmac key");
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    };
    assert_eq!(sign_hmac_sha256_hex(SECRET, data), expected);
}
