//! Keyed-MD5 request signing shared by the TokenPay and EPUSDT gateways.
//!
//! Both providers sign the same canonical form: every payload field except empty values and the
//! signature field itself, keys sorted byte-wise ascending, joined as `key=value` pairs with
//! `&`, with the shared secret appended directly to the end (no separator). The signature is
//! the lowercase hex MD5 of that string, and comparisons are case-insensitive.

use md5::{Digest, Md5};
use serde_json::{Map, Value};

pub fn sign_payload(payload: &Map<String, Value>, secret: &str) -> String {
    let mut keys = payload
        .iter()
        .filter(|(key, value)| !key.trim().eq_ignore_ascii_case("signature") && !is_empty_value(value))
        .map(|(key, _)| key.as_str())
        .collect::<Vec<&str>>();
    keys.sort_unstable();
    let pairs = keys.iter().map(|key| format!("{key}={}", sign_value(&payload[*key]))).collect::<Vec<String>>();
    let sign_text = format!("{}{}", pairs.join("&"), secret.trim());
    let digest = Md5::digest(sign_text.as_bytes());
    format!("{digest:x}")
}

/// Whether `provided` is the correct signature for `payload` under `secret`.
pub fn signature_matches(payload: &Map<String, Value>, provided: &str, secret: &str) -> bool {
    let provided = provided.trim();
    !provided.is_empty() && sign_payload(payload, secret).eq_ignore_ascii_case(provided)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn sign_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default().trim().to_string(),
    }
}
