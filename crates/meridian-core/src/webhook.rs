//! # Bank Webhook Authentication & Parsing
//!
//! The payment provider POSTs a JSON body for every incoming transfer and
//! signs it with a shared secret.
//!
//! ## Signature Scheme
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Header:   x-webhook-signature: t=1718000000,v1=9f2c…(hex)             │
//! │                                                                         │
//! │  canonical = JSON with object keys sorted recursively,                 │
//! │              arrays in original order, no whitespace                   │
//! │                                                                         │
//! │  expected  = hex( HMAC-SHA512( secret, "{t}.{canonical}" ) )           │
//! │                                                                         │
//! │  compare   = constant time (Mac::verify_slice)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payload Shape
//! ```json
//! { "error": 0,
//!   "data": { "description": "NAP123456ABC chuyen tien",
//!             "amount": 100000,
//!             "tid": "FT24123",
//!             "transactionDate": "2024-06-10 10:00:00" } }
//! ```
//! `reference` is accepted in place of `tid`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;

use crate::error::{CoreError, CoreResult};
use crate::REQUEST_CODE_PREFIX;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Length of a request code: prefix + 6 digits + 3 alphanumerics.
pub const REQUEST_CODE_LEN: usize = 12;

const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// =============================================================================
// Signature
// =============================================================================

/// Parsed `t=<timestamp>,v1=<hex>` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: String,
    pub signature: Vec<u8>,
}

pub fn parse_signature_header(value: &str) -> CoreResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signature = None;

    for part in value.split(',') {
        let Some((key, val)) = part.trim().split_once('=') else {
            continue;
        };
        match key.trim() {
            "t" => timestamp = Some(val.trim().to_string()),
            "v1" => signature = Some(val.trim().to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CoreError::InvalidSignature("missing timestamp".to_string()))?;
    let signature = signature
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::InvalidSignature("missing v1 signature".to_string()))?;
    let signature = hex::decode(&signature)
        .map_err(|_| CoreError::InvalidSignature("signature is not hex".to_string()))?;

    Ok(SignatureHeader {
        timestamp,
        signature,
    })
}

/// Serializes `value` with object keys sorted at every depth.
///
/// Written out explicitly so the result does not depend on how
/// `serde_json::Map` happens to be ordered in this build.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(v) = map.get(*key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn mac_for(secret: &[u8], timestamp: &str, body: &Value) -> CoreResult<HmacSha512> {
    let mut mac = HmacSha512::new_from_slice(secret)
        .map_err(|_| CoreError::InvalidSignature("unusable webhook secret".to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(canonical_json(body).as_bytes());
    Ok(mac)
}

/// Produces the hex signature the provider would send for `body`.
pub fn sign(secret: &[u8], timestamp: &str, body: &Value) -> CoreResult<String> {
    Ok(hex::encode(mac_for(secret, timestamp, body)?.finalize().into_bytes()))
}

/// Builds a complete header value for `body`.
pub fn signature_header_value(secret: &[u8], timestamp: &str, body: &Value) -> CoreResult<String> {
    Ok(format!("t={},v1={}", timestamp, sign(secret, timestamp, body)?))
}

/// Authenticates a raw webhook delivery and returns the parsed body.
///
/// Every failure is `InvalidSignature`; nothing about the body is trusted
/// until this returns `Ok`.
pub fn verify(secret: &[u8], header: Option<&str>, raw_body: &[u8]) -> CoreResult<Value> {
    let header = header
        .ok_or_else(|| CoreError::InvalidSignature("missing signature header".to_string()))?;
    let parsed = parse_signature_header(header)?;

    let body: Value = serde_json::from_slice(raw_body)
        .map_err(|_| CoreError::InvalidSignature("body is not valid JSON".to_string()))?;

    mac_for(secret, &parsed.timestamp, &body)?
        .verify_slice(&parsed.signature)
        .map_err(|_| CoreError::InvalidSignature("signature mismatch".to_string()))?;

    Ok(body)
}

// =============================================================================
// Payload
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawWebhook {
    #[serde(default)]
    error: i64,
    data: Option<RawTransfer>,
}

#[derive(Debug, Deserialize)]
struct RawTransfer {
    #[serde(default)]
    description: String,
    amount: Option<Value>,
    #[serde(alias = "reference")]
    tid: Option<String>,
    #[serde(rename = "transactionDate")]
    transaction_date: Option<String>,
}

/// A bank transfer that references one of our request codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankTransfer {
    pub request_code: String,
    pub amount: i64,
    pub bank_transaction_id: Option<String>,
    pub transaction_date: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Provider reported an error for this delivery.
    ProviderError(i64),
    NoData,
    /// Description carries no request code (not a top-up transfer).
    NoRequestCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Ignored(IgnoreReason),
    Transfer(BankTransfer),
}

/// Interprets an authenticated webhook body.
pub fn interpret(body: Value) -> CoreResult<WebhookEvent> {
    let raw: RawWebhook = serde_json::from_value(body)
        .map_err(|e| CoreError::external("bank webhook", format!("unexpected payload: {}", e)))?;

    if raw.error != 0 {
        return Ok(WebhookEvent::Ignored(IgnoreReason::ProviderError(raw.error)));
    }

    let Some(data) = raw.data else {
        return Ok(WebhookEvent::Ignored(IgnoreReason::NoData));
    };

    let Some(request_code) = find_request_code(&data.description) else {
        return Ok(WebhookEvent::Ignored(IgnoreReason::NoRequestCode));
    };

    let amount = parse_amount(data.amount.as_ref())?;

    Ok(WebhookEvent::Transfer(BankTransfer {
        request_code,
        amount,
        bank_transaction_id: data.tid,
        transaction_date: data.transaction_date,
        description: data.description,
    }))
}

fn parse_amount(amount: Option<&Value>) -> CoreResult<i64> {
    let parsed = match amount {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| CoreError::external("bank webhook", "amount missing or not an integer"))
}

// =============================================================================
// Request Codes
// =============================================================================

fn is_code_at(bytes: &[u8]) -> bool {
    let prefix = REQUEST_CODE_PREFIX.as_bytes();
    bytes.len() >= REQUEST_CODE_LEN
        && &bytes[..prefix.len()] == prefix
        && bytes[prefix.len()..prefix.len() + 6]
            .iter()
            .all(|b| b.is_ascii_digit())
        && bytes[prefix.len() + 6..REQUEST_CODE_LEN]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Finds the first request code in a free-text transfer note.
///
/// Matching is case-insensitive; the result is upper-case.
pub fn find_request_code(description: &str) -> Option<String> {
    let upper = description.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    (0..bytes.len())
        .find(|&i| is_code_at(&bytes[i..]))
        .map(|i| bytes[i..i + REQUEST_CODE_LEN].iter().map(|&b| b as char).collect())
}

/// Whether `code` is exactly one well-formed request code.
pub fn is_request_code(code: &str) -> bool {
    code.len() == REQUEST_CODE_LEN && is_code_at(code.as_bytes())
}

/// Generates a new request code from a random UUID's bits.
pub fn generate_request_code() -> String {
    let bytes = *uuid::Uuid::new_v4().as_bytes();
    let digits = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) % 1_000_000;
    let suffix: String = bytes[10..13]
        .iter()
        .map(|b| CODE_ALPHABET[(*b as usize) % CODE_ALPHABET.len()] as char)
        .collect();
    format!("{}{:06}{}", REQUEST_CODE_PREFIX, digits, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &[u8] = b"whsec_test";

    #[test]
    fn test_canonical_json_sorts_recursively() {
        let value = json!({
            "b": 1,
            "a": { "z": [3, {"y": 1, "x": 2}], "c": "é" },
        });
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"é","z":[3,{"x":2,"y":1}]},"b":1}"#
        );
    }

    #[test]
    fn test_verify_accepts_reordered_body() {
        let body = json!({"error": 0, "data": {"amount": 100000, "description": "NAP123456ABC"}});
        let header = signature_header_value(SECRET, "1718000000", &body).unwrap();

        // Same content, different key order and whitespace on the wire
        let raw = br#"{ "data": { "description": "NAP123456ABC", "amount": 100000 }, "error": 0 }"#;
        let parsed = verify(SECRET, Some(&header), raw).unwrap();
        assert_eq!(parsed, body);
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let body = json!({"error": 0, "data": {"amount": 100000}});
        let header = signature_header_value(SECRET, "1718000000", &body).unwrap();

        let tampered = br#"{"error":0,"data":{"amount":900000}}"#;
        assert!(matches!(
            verify(SECRET, Some(&header), tampered),
            Err(CoreError::InvalidSignature(_))
        ));

        // Timestamp is part of the signed message
        let moved = header.replace("t=1718000000", "t=1718000001");
        let raw = serde_json::to_vec(&body).unwrap();
        assert!(verify(SECRET, Some(&moved), &raw).is_err());

        // Wrong secret
        assert!(verify(b"other", Some(&header), &raw).is_err());
    }

    #[test]
    fn test_verify_rejects_malformed_input() {
        let raw = br#"{"error":0}"#;
        assert!(verify(SECRET, None, raw).is_err());
        assert!(verify(SECRET, Some("garbage"), raw).is_err());
        assert!(verify(SECRET, Some("t=1,v1=zz"), raw).is_err());
        assert!(verify(SECRET, Some("v1=abcd"), raw).is_err());

        let header = signature_header_value(SECRET, "1", &json!({})).unwrap();
        assert!(verify(SECRET, Some(&header), b"not json").is_err());
    }

    #[test]
    fn test_find_request_code() {
        assert_eq!(
            find_request_code("CT DEN:0123 nap123456abc chuyen tien"),
            Some("NAP123456ABC".to_string())
        );
        assert_eq!(find_request_code("NAP12345ABC"), None);
        assert_eq!(find_request_code("NAP123456AB"), None);
        assert_eq!(find_request_code("thanh toán NAP000001Z9Z"), Some("NAP000001Z9Z".to_string()));
        assert_eq!(find_request_code(""), None);
    }

    #[test]
    fn test_generate_request_code_shape() {
        for _ in 0..100 {
            let code = generate_request_code();
            assert!(is_request_code(&code), "bad code {}", code);
        }
    }

    #[test]
    fn test_interpret() {
        let ev = interpret(json!({"error": 0, "data": {
            "description": "NAP123456ABC", "amount": 100000, "reference": "FT1",
            "transactionDate": "2024-06-10 10:00:00"
        }}))
        .unwrap();
        assert_eq!(
            ev,
            WebhookEvent::Transfer(BankTransfer {
                request_code: "NAP123456ABC".to_string(),
                amount: 100_000,
                bank_transaction_id: Some("FT1".to_string()),
                transaction_date: Some("2024-06-10 10:00:00".to_string()),
                description: "NAP123456ABC".to_string(),
            })
        );

        assert_eq!(
            interpret(json!({"error": 1, "data": {"description": "NAP123456ABC", "amount": 1}}))
                .unwrap(),
            WebhookEvent::Ignored(IgnoreReason::ProviderError(1))
        );
        assert_eq!(
            interpret(json!({"error": 0, "data": {"description": "hello", "amount": 1}})).unwrap(),
            WebhookEvent::Ignored(IgnoreReason::NoRequestCode)
        );
        assert!(matches!(
            interpret(json!({"error": 0, "data": {"description": "NAP123456ABC", "amount": 1.5}})),
            Err(CoreError::ExternalService { .. })
        ));
    }
}
