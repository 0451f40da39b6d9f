//! # EPUSDT gateway adapter
//!
//! EPUSDT is a self-hosted stablecoin gateway. It shares the keyed-MD5 scheme in
//! [`crate::signing`] with TokenPay but speaks snake_case JSON and a trade-type enumeration
//! (`usdt.trc20`, `usdc.trc20`, `trx`). Order creation is a JSON POST to
//! `/api/v1/order/create-transaction`; callbacks carry the signature in the body.

use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use vendo_common::{Money, PaymentStatus, Secret, SITE_CURRENCY_CODE};

use crate::{
    data_objects::{CreateOrderRequest, InitiationData},
    event::CallbackEvent,
    helpers::{parse_wire_amount, pick_i64, pick_string},
    signing::{sign_payload, signature_matches},
    GatewayError,
    ProviderType,
};

pub const ACK_SUCCESS: &str = "ok";
pub const ACK_FAIL: &str = "fail";

pub const TRADE_TYPE_USDT_TRC20: &str = "usdt.trc20";
pub const TRADE_TYPE_USDC_TRC20: &str = "usdc.trc20";
pub const TRADE_TYPE_TRX: &str = "trx";

pub const STATUS_WAITING: i64 = 1;
pub const STATUS_SUCCESS: i64 = 2;
pub const STATUS_EXPIRED: i64 = 3;

const CREATE_TRANSACTION_PATH: &str = "/api/v1/order/create-transaction";
const RESPONSE_OK: i64 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

//--------------------------------------    EpusdtConfig     ---------------------------------------------------------
/// Per-channel EPUSDT configuration, deserialized from the channel's JSON config blob.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EpusdtConfig {
    pub gateway_url: String,
    pub auth_token: Secret<String>,
    pub notify_url: String,
    pub return_url: String,
    pub trade_type: String,
    pub fiat: String,
}

pub fn parse_config(raw: &Value) -> Result<EpusdtConfig, GatewayError> {
    if !raw.is_object() {
        return Err(GatewayError::ConfigInvalid("channel config must be a JSON object".into()));
    }
    let mut cfg: EpusdtConfig = serde_json::from_value(raw.clone())
        .map_err(|e| GatewayError::ConfigInvalid(format!("could not decode config: {e}")))?;
    cfg.normalize();
    Ok(cfg)
}

impl EpusdtConfig {
    fn normalize(&mut self) {
        self.gateway_url = self.gateway_url.trim().trim_end_matches('/').to_string();
        self.auth_token = Secret::new(self.auth_token.reveal().trim().to_string());
        self.notify_url = self.notify_url.trim().to_string();
        self.return_url = self.return_url.trim().to_string();
        self.trade_type = self.trade_type.trim().to_lowercase();
        if self.trade_type.is_empty() {
            self.trade_type = TRADE_TYPE_USDT_TRC20.to_string();
        }
        self.fiat = self.fiat.trim().to_uppercase();
        if self.fiat.is_empty() {
            self.fiat = SITE_CURRENCY_CODE.to_string();
        }
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.gateway_url.is_empty() {
            return Err(GatewayError::ConfigInvalid("gateway_url is required".into()));
        }
        if self.auth_token.reveal().is_empty() {
            return Err(GatewayError::ConfigInvalid("auth_token is required".into()));
        }
        if self.notify_url.is_empty() || self.return_url.is_empty() {
            return Err(GatewayError::ConfigInvalid("notify_url and return_url are required".into()));
        }
        Ok(())
    }
}

/// The trade type a channel type settles in. Unknown channel types resolve to `None` and the
/// caller falls back to the configured trade type.
pub fn resolve_trade_type(channel_type: &str) -> Option<&'static str> {
    match channel_type.trim().to_ascii_lowercase().as_str() {
        "usdt" | "usdt_trc20" => Some(TRADE_TYPE_USDT_TRC20),
        "usdc_trc20" => Some(TRADE_TYPE_USDC_TRC20),
        "trx" => Some(TRADE_TYPE_TRX),
        _ => None,
    }
}

/// Forks of the gateway add their own chain/asset pairs, so any trade type is allowed through.
pub fn is_supported_trade_type(_trade_type: &str) -> bool {
    true
}

/// EPUSDT order status codes: 1 is waiting, 2 is paid, 3 is expired.
pub fn to_payment_status(status: i64) -> PaymentStatus {
    match status {
        STATUS_SUCCESS => PaymentStatus::Success,
        STATUS_EXPIRED => PaymentStatus::Expired,
        _ => PaymentStatus::Pending,
    }
}

/// Renders an amount the way the gateway signs numbers: no trailing zeros, whole amounts as
/// bare integers. The same value goes on the wire so both sides sign identical text.
fn wire_amount(amount: Money) -> Value {
    let rendered = amount.to_string();
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    trimmed.parse::<Value>().unwrap_or(Value::String(rendered))
}

//--------------------------------------   EpusdtCallback    ---------------------------------------------------------
/// A decoded callback body. The original key/value map is kept because the signature covers
/// the payload exactly as the gateway sent it.
#[derive(Debug, Clone)]
pub struct EpusdtCallback {
    pub raw: Map<String, Value>,
    pub signature: String,
    pub trade_id: String,
    pub order_id: String,
    pub status: i64,
    pub amount: String,
    pub actual_amount: String,
    pub token: String,
    pub block_transaction_id: String,
}

pub fn parse_callback(body: &[u8]) -> Result<EpusdtCallback, GatewayError> {
    if body.is_empty() {
        return Err(GatewayError::ResponseInvalid("empty callback body".into()));
    }
    let raw: Map<String, Value> = serde_json::from_slice(body)
        .map_err(|e| GatewayError::ResponseInvalid(format!("could not decode callback: {e}")))?;
    if raw.is_empty() {
        return Err(GatewayError::ResponseInvalid("empty callback payload".into()));
    }
    let callback = EpusdtCallback {
        signature: pick_string(&raw, &["signature"]).trim().to_string(),
        trade_id: pick_string(&raw, &["trade_id"]).trim().to_string(),
        order_id: pick_string(&raw, &["order_id"]).trim().to_string(),
        status: pick_i64(&raw, &["status"]),
        amount: pick_string(&raw, &["amount"]).trim().to_string(),
        actual_amount: pick_string(&raw, &["actual_amount"]).trim().to_string(),
        token: pick_string(&raw, &["token"]).trim().to_string(),
        block_transaction_id: pick_string(&raw, &["block_transaction_id"]).trim().to_string(),
        raw,
    };
    Ok(callback)
}

pub fn verify_callback(callback: &EpusdtCallback, auth_token: &Secret<String>) -> Result<(), GatewayError> {
    if auth_token.reveal().trim().is_empty() {
        return Err(GatewayError::ConfigInvalid("auth_token is required".into()));
    }
    if !signature_matches(&callback.raw, &callback.signature, auth_token.reveal()) {
        return Err(GatewayError::SignatureInvalid);
    }
    Ok(())
}

impl EpusdtCallback {
    /// A callback without these fields cannot belong to EPUSDT.
    pub fn has_required_fields(&self) -> bool {
        !self.signature.is_empty() && !self.trade_id.is_empty() && !self.order_id.is_empty()
    }

    /// The callback has no currency or pay-time fields, so the fiat comes from channel config
    /// and the settlement instant defaults downstream.
    pub fn into_event(self, fiat: &str) -> CallbackEvent {
        CallbackEvent {
            provider: ProviderType::Epusdt,
            passthrough_payment_id: None,
            status: to_payment_status(self.status),
            amount: parse_wire_amount(&self.amount),
            currency: fiat.to_uppercase(),
            paid_at: None,
            provider_ref: self.trade_id,
            order_no: self.order_id,
            payload: Value::Object(self.raw),
        }
    }
}

//--------------------------------------      EpusdtApi      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct EpusdtApi {
    config: EpusdtConfig,
    client: Arc<Client>,
}

impl EpusdtApi {
    pub fn new(config: EpusdtConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &EpusdtConfig {
        &self.config
    }

    /// Creates a transaction on the gateway and returns the data the buyer needs to pay it.
    pub async fn create_transaction(&self, request: &CreateOrderRequest) -> Result<InitiationData, GatewayError> {
        if request.order_no.trim().is_empty() {
            return Err(GatewayError::ConfigInvalid("order_no is required".into()));
        }
        let trade_type = resolve_trade_type(&request.channel_type)
            .map(str::to_string)
            .unwrap_or_else(|| self.config.trade_type.clone());

        let mut payload = Map::new();
        payload.insert("order_id".into(), Value::from(request.order_no.trim()));
        payload.insert("amount".into(), wire_amount(request.amount));
        payload.insert("notify_url".into(), Value::from(self.config.notify_url.as_str()));
        payload.insert("redirect_url".into(), Value::from(self.config.return_url.as_str()));
        payload.insert("trade_type".into(), Value::from(trade_type));
        let signature = sign_payload(&payload, self.config.auth_token.reveal());
        payload.insert("signature".into(), Value::from(signature));

        let url = format!("{}{CREATE_TRANSACTION_PATH}", self.config.gateway_url);
        trace!("Sending EPUSDT create transaction request for {}", request.order_no);
        let response = self
            .client
            .post(url)
            .json(&Value::Object(payload))
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::RequestFailed(format!("gateway returned status {}", response.status())));
        }
        let raw: Value = response.json().await.map_err(|e| GatewayError::ResponseInvalid(e.to_string()))?;

        if raw["status_code"].as_i64().unwrap_or_default() != RESPONSE_OK {
            let message = raw["message"].as_str().unwrap_or_default().trim().to_string();
            return Err(GatewayError::RequestFailed(message));
        }
        let empty = Map::new();
        let data = raw["data"].as_object().unwrap_or(&empty);
        let result = InitiationData {
            provider_ref: pick_string(data, &["trade_id"]).trim().to_string(),
            pay_url: pick_string(data, &["payment_url"]).trim().to_string(),
            to_address: pick_string(data, &["token"]).trim().to_string(),
            raw: raw.clone(),
            ..InitiationData::default()
        };
        debug!("EPUSDT transaction {} created, provider ref {}", request.order_no, result.provider_ref);
        Ok(result)
    }

    /// Parses and verifies an inbound callback body, returning the canonical event.
    pub fn handle_callback(&self, body: &[u8]) -> Result<CallbackEvent, GatewayError> {
        let callback = parse_callback(body)?;
        if !callback.has_required_fields() {
            return Err(GatewayError::ResponseInvalid("callback is missing required fields".into()));
        }
        verify_callback(&callback, &self.config.auth_token)?;
        Ok(callback.into_event(&self.config.fiat))
    }
}
