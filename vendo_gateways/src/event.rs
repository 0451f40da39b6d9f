use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use vendo_common::{Money, PaymentStatus};

use crate::data_objects::ProviderType;

//--------------------------------------    CallbackEvent    ---------------------------------------------------------
/// A provider notification normalized into canonical form. This is what the settlement engine
/// consumes; nothing provider-specific survives past this point except the raw payload, which
/// is stored verbatim against the payment.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub provider: ProviderType,
    /// The provider's own reference for the transaction.
    pub provider_ref: String,
    /// The merchant order number the provider echoes back, when it does.
    pub order_no: String,
    /// Payment id recovered from passthrough metadata, used for primary payment resolution.
    pub passthrough_payment_id: Option<i64>,
    pub status: PaymentStatus,
    pub amount: Option<Money>,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub payload: Value,
}

/// Recovers a payment id from passthrough metadata. Accepts the `payment_id=<n>` form (possibly
/// among other `&`-separated pairs) and a bare integer. Zero and garbage both come back as
/// `None`.
pub fn parse_passthrough_payment_id(raw: &str) -> Option<i64> {
    let mut text = raw.trim();
    if text.contains('=') {
        text = text
            .split('&')
            .filter_map(|part| part.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("payment_id"))
            .map(|(_, value)| value.trim())?;
    }
    match text.parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => None,
    }
}

/// Parses the timestamp formats the keyed-MD5 providers send: `2024-05-01 10:30:00` (naive,
/// taken as UTC) or RFC 3339.
pub fn parse_provider_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc)).ok()
}

#[cfg(test)]
mod test {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn passthrough_accepts_pairs_and_bare_ids() {
        assert_eq!(parse_passthrough_payment_id("payment_id=42"), Some(42));
        assert_eq!(parse_passthrough_payment_id("PAYMENT_ID=42"), Some(42));
        assert_eq!(parse_passthrough_payment_id("a=1&payment_id=42&b=2"), Some(42));
        assert_eq!(parse_passthrough_payment_id(" 42 "), Some(42));
        assert_eq!(parse_passthrough_payment_id("payment_id=0"), None);
        assert_eq!(parse_passthrough_payment_id("order_no=42"), None);
        assert_eq!(parse_passthrough_payment_id("forty-two"), None);
        assert_eq!(parse_passthrough_payment_id(""), None);
    }

    #[test]
    fn provider_datetimes_parse_both_layouts() {
        let naive = parse_provider_datetime("2024-05-01 10:30:00").unwrap();
        assert_eq!(naive.hour(), 10);
        let rfc = parse_provider_datetime("2024-05-01T10:30:00+02:00").unwrap();
        assert_eq!(rfc.hour(), 8);
        assert!(parse_provider_datetime("yesterday").is_none());
        assert!(parse_provider_datetime("").is_none());
    }
}
