//! # Stripe gateway adapter
//!
//! Payments run through Stripe Checkout: order creation makes a hosted checkout session and the
//! buyer pays on Stripe's page. Settlement arrives as webhooks signed with the
//! `Stripe-Signature` header scheme: `t=<unix>,v1=<hexdigest>[,v1=...]`, where the digest is
//! HMAC-SHA256 over `"{t}.{raw_body}"` with the endpoint's webhook secret. Events older than
//! the tolerance window are rejected outright.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use vendo_common::{Money, PaymentStatus, Secret};

use crate::{
    data_objects::{CreateOrderRequest, InitiationData},
    event::CallbackEvent,
    helpers::pick_string,
    GatewayError,
    ProviderType,
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

/// Stripe acknowledges webhooks with a bare 2xx; there is no body token.
pub const ACK_SUCCESS: &str = "";
pub const ACK_FAIL: &str = "";

const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
const EVENT_CHECKOUT_EXPIRED: &str = "checkout.session.expired";
const EVENT_CHECKOUT_ASYNC_FAILED: &str = "checkout.session.async_payment_failed";
const EVENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
const EVENT_INTENT_PROCESSING: &str = "payment_intent.processing";
const EVENT_INTENT_CANCELED: &str = "payment_intent.canceled";
const EVENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

const PAYMENT_STATUS_PAID: &str = "paid";
const PAYMENT_STATUS_NO_PAYMENT_REQUIRED: &str = "no_payment_required";
const SESSION_STATUS_EXPIRED: &str = "expired";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

//--------------------------------------    StripeConfig     ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub payment_method_types: Vec<String>,
    pub api_base_url: String,
    pub webhook_tolerance_seconds: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            success_url: String::new(),
            cancel_url: String::new(),
            payment_method_types: vec!["card".to_string()],
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            webhook_tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
        }
    }
}

pub fn parse_config(raw: &Value) -> Result<StripeConfig, GatewayError> {
    if !raw.is_object() {
        return Err(GatewayError::ConfigInvalid("channel config must be a JSON object".into()));
    }
    let mut cfg: StripeConfig = serde_json::from_value(raw.clone())
        .map_err(|e| GatewayError::ConfigInvalid(format!("could not decode config: {e}")))?;
    cfg.normalize();
    Ok(cfg)
}

impl StripeConfig {
    fn normalize(&mut self) {
        self.secret_key = Secret::new(self.secret_key.reveal().trim().to_string());
        self.webhook_secret = Secret::new(self.webhook_secret.reveal().trim().to_string());
        self.success_url = self.success_url.trim().to_string();
        self.cancel_url = self.cancel_url.trim().to_string();
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if self.api_base_url.is_empty() {
            self.api_base_url = DEFAULT_API_BASE_URL.to_string();
        }
        if self.webhook_tolerance_seconds <= 0 {
            self.webhook_tolerance_seconds = DEFAULT_TOLERANCE_SECONDS;
        }
        self.payment_method_types =
            self.payment_method_types.iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect();
        if self.payment_method_types.is_empty() {
            self.payment_method_types = vec!["card".to_string()];
        }
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.secret_key.reveal().is_empty() {
            return Err(GatewayError::ConfigInvalid("secret_key is required".into()));
        }
        if self.webhook_secret.reveal().is_empty() {
            return Err(GatewayError::ConfigInvalid("webhook_secret is required".into()));
        }
        if self.success_url.is_empty() || self.cancel_url.is_empty() {
            return Err(GatewayError::ConfigInvalid("success_url and cancel_url are required".into()));
        }
        Ok(())
    }
}

//--------------------------------------  Webhook signatures ---------------------------------------------------------
/// The hex HMAC-SHA256 digest Stripe computes over `"{timestamp}.{body}"`.
pub fn compute_signature(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GatewayError::ConfigInvalid("webhook_secret is unusable as an HMAC key".into()))?;
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    Ok(format!("{digest:x}"))
}

fn parse_signature_header(header: &str) -> Option<(i64, Vec<&str>)> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for element in header.split(',') {
        let (key, value) = element.split_once('=')?;
        match key.trim() {
            "t" => timestamp = value.trim().parse::<i64>().ok(),
            "v1" => candidates.push(value.trim()),
            _ => {},
        }
    }
    match (timestamp, candidates.is_empty()) {
        (Some(t), false) => Some((t, candidates)),
        _ => None,
    }
}

pub fn verify_webhook(
    config: &StripeConfig,
    signature_header: Option<&str>,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<(), GatewayError> {
    if config.webhook_secret.reveal().is_empty() {
        return Err(GatewayError::ConfigInvalid("webhook_secret is required".into()));
    }
    let header = signature_header.map(str::trim).unwrap_or_default();
    let Some((timestamp, candidates)) = parse_signature_header(header) else {
        return Err(GatewayError::SignatureInvalid);
    };
    let tolerance = config.webhook_tolerance_seconds;
    if (now.timestamp() - timestamp).abs() > tolerance {
        debug!("Webhook timestamp outside the {tolerance}s tolerance window");
        return Err(GatewayError::SignatureInvalid);
    }
    let expected = compute_signature(config.webhook_secret.reveal(), timestamp, body)?;
    if candidates.iter().any(|candidate| candidate.eq_ignore_ascii_case(&expected)) {
        Ok(())
    } else {
        Err(GatewayError::SignatureInvalid)
    }
}

//--------------------------------------   Status mapping    ---------------------------------------------------------
fn map_payment_intent_status(status: &str) -> PaymentStatus {
    match status {
        "succeeded" => PaymentStatus::Success,
        "processing" => PaymentStatus::Pending,
        "canceled" | "requires_payment_method" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

fn map_event_type_status(event_type: &str) -> Option<PaymentStatus> {
    match event_type {
        EVENT_CHECKOUT_COMPLETED | EVENT_INTENT_SUCCEEDED => Some(PaymentStatus::Success),
        EVENT_CHECKOUT_EXPIRED => Some(PaymentStatus::Expired),
        EVENT_CHECKOUT_ASYNC_FAILED | EVENT_INTENT_CANCELED | EVENT_INTENT_FAILED => Some(PaymentStatus::Failed),
        EVENT_INTENT_PROCESSING => Some(PaymentStatus::Pending),
        _ => None,
    }
}

fn map_checkout_session_status(payment_status: &str, session_status: &str) -> PaymentStatus {
    if payment_status == PAYMENT_STATUS_PAID || payment_status == PAYMENT_STATUS_NO_PAYMENT_REQUIRED {
        PaymentStatus::Success
    } else if session_status == SESSION_STATUS_EXPIRED {
        PaymentStatus::Expired
    } else {
        PaymentStatus::Pending
    }
}

/// Reduces a webhook event to canonical callback form WITHOUT verifying the signature.
/// Callers that need the payment identifiers before they can look up the signing secret
/// parse first and verify with [`verify_webhook`] once the channel config is in hand.
pub fn parse_webhook(body: &[u8]) -> Result<CallbackEvent, GatewayError> {
    let raw: Value =
        serde_json::from_slice(body).map_err(|e| GatewayError::ResponseInvalid(format!("could not decode event: {e}")))?;
    let event_type = raw["type"].as_str().unwrap_or_default().to_string();
    if event_type.is_empty() {
        return Err(GatewayError::ResponseInvalid("event has no type".into()));
    }
    let object = raw["data"]["object"]
        .as_object()
        .ok_or_else(|| GatewayError::ResponseInvalid("event has no data object".into()))?;
    let provider_ref = pick_string(object, &["id"]).trim().to_string();
    if provider_ref.is_empty() {
        return Err(GatewayError::ResponseInvalid("event object has no id".into()));
    }

    let intent_status = object.get("status").and_then(Value::as_str).unwrap_or_default();
    let status = if event_type == EVENT_CHECKOUT_COMPLETED {
        let payment_status = object.get("payment_status").and_then(Value::as_str).unwrap_or_default();
        map_checkout_session_status(payment_status, intent_status)
    } else if event_type.starts_with("payment_intent.") && !intent_status.is_empty() {
        map_payment_intent_status(intent_status)
    } else {
        map_event_type_status(&event_type).unwrap_or(PaymentStatus::Pending)
    };

    let amount = object
        .get("amount_total")
        .or_else(|| object.get("amount"))
        .and_then(Value::as_i64)
        .map(Money::from_cents);
    let currency = object.get("currency").and_then(Value::as_str).unwrap_or_default().to_uppercase();
    let empty = Map::new();
    let metadata = object.get("metadata").and_then(Value::as_object).unwrap_or(&empty);
    let passthrough_payment_id = match pick_string(metadata, &["payment_id"]).trim().parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => None,
    };
    let order_no = pick_string(metadata, &["order_no"]).trim().to_string();
    let paid_at = raw["created"].as_i64().and_then(|seconds| Utc.timestamp_opt(seconds, 0).single());

    Ok(CallbackEvent {
        provider: ProviderType::Stripe,
        provider_ref,
        order_no,
        passthrough_payment_id,
        status,
        amount,
        currency,
        paid_at,
        payload: raw,
    })
}

/// Verifies the webhook signature and reduces the event to canonical callback form.
pub fn verify_and_parse_webhook(
    config: &StripeConfig,
    signature_header: Option<&str>,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<CallbackEvent, GatewayError> {
    verify_webhook(config, signature_header, body, now)?;
    parse_webhook(body)
}

//--------------------------------------      StripeApi      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Creates a hosted checkout session for the payment and returns its redirect URL.
    pub async fn create_checkout_session(&self, request: &CreateOrderRequest) -> Result<InitiationData, GatewayError> {
        if request.order_no.trim().is_empty() {
            return Err(GatewayError::ConfigInvalid("order_no is required".into()));
        }
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), self.config.success_url.clone()),
            ("cancel_url".into(), self.config.cancel_url.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("line_items[0][price_data][currency]".into(), request.currency.to_lowercase()),
            ("line_items[0][price_data][unit_amount]".into(), request.amount.value().to_string()),
            ("line_items[0][price_data][product_data][name]".into(), request.order_no.trim().to_string()),
            ("metadata[payment_id]".into(), request.payment_id.to_string()),
            ("metadata[order_no]".into(), request.order_no.trim().to_string()),
        ];
        for (i, method) in self.config.payment_method_types.iter().enumerate() {
            form.push((format!("payment_method_types[{i}]"), method.clone()));
        }

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        trace!("Creating Stripe checkout session for {}", request.order_no);
        let response = self
            .client
            .post(url)
            .bearer_auth(self.config.secret_key.reveal())
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
        let status = response.status();
        let raw: Value =
            response.json().await.map_err(|e| GatewayError::ResponseInvalid(e.to_string()))?;
        if !status.is_success() {
            let message = raw["error"]["message"].as_str().unwrap_or_default().to_string();
            return Err(GatewayError::RequestFailed(format!("checkout session returned status {status}: {message}")));
        }
        let session_id = raw["id"].as_str().unwrap_or_default().to_string();
        if session_id.is_empty() {
            return Err(GatewayError::ResponseInvalid("checkout session response has no id".into()));
        }
        let pay_url = raw["url"].as_str().unwrap_or_default().to_string();
        debug!("Stripe checkout session {session_id} created for {}", request.order_no);
        Ok(InitiationData { provider_ref: session_id, pay_url, raw, ..InitiationData::default() })
    }

    /// Verifies and parses an inbound webhook against the current clock.
    pub fn handle_callback(&self, signature_header: Option<&str>, body: &[u8]) -> Result<CallbackEvent, GatewayError> {
        verify_and_parse_webhook(&self.config, signature_header, body, Utc::now())
    }
}
