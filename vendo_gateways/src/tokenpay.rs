//! # TokenPay gateway adapter
//!
//! TokenPay is a self-hosted crypto gateway. Requests and callbacks are signed with the shared
//! keyed-MD5 scheme in [`crate::signing`]. Order creation is a JSON POST to `/CreateOrder`;
//! the gateway later notifies us with a JSON callback carrying the signature in the body.

use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use vendo_common::{PaymentStatus, Secret};

use crate::{
    data_objects::{CreateOrderRequest, InitiationData},
    event::{parse_passthrough_payment_id, parse_provider_datetime, CallbackEvent},
    helpers::{parse_wire_amount, pick_i64, pick_string},
    signing::{sign_payload, signature_matches},
    GatewayError,
    ProviderType,
};

pub const ACK_SUCCESS: &str = "success";
pub const ACK_FAIL: &str = "fail";
pub const DEFAULT_CURRENCY: &str = "USDT";

const CREATE_ORDER_PATH: &str = "/CreateOrder";
const QUERY_ORDER_PATH: &str = "/Query";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

//--------------------------------------   TokenPayConfig    ---------------------------------------------------------
/// Per-channel TokenPay configuration, deserialized from the channel's JSON config blob.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenPayConfig {
    pub gateway_url: String,
    pub notify_secret: Secret<String>,
    pub currency: String,
    pub notify_url: String,
    pub redirect_url: String,
    pub base_currency: String,
}

pub fn parse_config(raw: &Value) -> Result<TokenPayConfig, GatewayError> {
    if !raw.is_object() {
        return Err(GatewayError::ConfigInvalid("channel config must be a JSON object".into()));
    }
    let mut cfg: TokenPayConfig = serde_json::from_value(raw.clone())
        .map_err(|e| GatewayError::ConfigInvalid(format!("could not decode config: {e}")))?;
    cfg.normalize();
    Ok(cfg)
}

impl TokenPayConfig {
    fn normalize(&mut self) {
        self.gateway_url = self.gateway_url.trim().trim_end_matches('/').to_string();
        self.notify_secret = Secret::new(self.notify_secret.reveal().trim().to_string());
        self.currency = self.currency.trim().to_uppercase();
        self.notify_url = self.notify_url.trim().to_string();
        self.redirect_url = self.redirect_url.trim().to_string();
        self.base_currency = self.base_currency.trim().to_uppercase();
        if self.base_currency.is_empty() {
            self.base_currency = vendo_common::SITE_CURRENCY_CODE.to_string();
        }
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.gateway_url.is_empty() {
            return Err(GatewayError::ConfigInvalid("gateway_url is required".into()));
        }
        if self.notify_secret.reveal().is_empty() {
            return Err(GatewayError::ConfigInvalid("notify_secret is required".into()));
        }
        if self.currency.is_empty() {
            return Err(GatewayError::ConfigInvalid("currency is required".into()));
        }
        Ok(())
    }
}

/// The crypto currency TokenPay settles a channel type in.
pub fn resolve_currency(channel_type: &str) -> Option<&'static str> {
    match channel_type.trim().to_ascii_lowercase().as_str() {
        "usdt" | "usdt_trc20" => Some("USDT_TRC20"),
        "trx" => Some("TRX"),
        _ => None,
    }
}

pub fn is_supported_channel_type(channel_type: &str) -> bool {
    resolve_currency(channel_type).is_some()
}

/// TokenPay order status codes: 1 is paid, 2 is expired, everything else is still in flight.
pub fn to_payment_status(status: i64) -> PaymentStatus {
    match status {
        1 => PaymentStatus::Success,
        2 => PaymentStatus::Expired,
        _ => PaymentStatus::Pending,
    }
}

//--------------------------------------  TokenPayCallback   ---------------------------------------------------------
/// A decoded callback body. The original key/value map is kept because the signature covers
/// the payload exactly as the gateway sent it.
#[derive(Debug, Clone)]
pub struct TokenPayCallback {
    pub raw: Map<String, Value>,
    pub signature: String,
    pub provider_ref: String,
    pub out_order_id: String,
    pub order_user_key: String,
    pub status: i64,
    pub actual_amount: String,
    pub amount: String,
    pub base_currency: String,
    pub currency: String,
    pub pay_time: String,
    pub pass_through_info: String,
}

pub fn parse_callback(body: &[u8]) -> Result<TokenPayCallback, GatewayError> {
    if body.is_empty() {
        return Err(GatewayError::ResponseInvalid("empty callback body".into()));
    }
    let raw: Map<String, Value> = serde_json::from_slice(body)
        .map_err(|e| GatewayError::ResponseInvalid(format!("could not decode callback: {e}")))?;
    if raw.is_empty() {
        return Err(GatewayError::ResponseInvalid("empty callback payload".into()));
    }
    let callback = TokenPayCallback {
        signature: pick_string(&raw, &["Signature", "signature"]).trim().to_string(),
        provider_ref: pick_string(&raw, &["Id", "id"]).trim().to_string(),
        out_order_id: pick_string(&raw, &["OutOrderId", "out_order_id"]).trim().to_string(),
        order_user_key: pick_string(&raw, &["OrderUserKey", "order_user_key"]).trim().to_string(),
        status: pick_i64(&raw, &["Status", "status"]),
        actual_amount: pick_string(&raw, &["ActualAmount", "actual_amount"]).trim().to_string(),
        amount: pick_string(&raw, &["Amount", "amount"]).trim().to_string(),
        base_currency: pick_string(&raw, &["BaseCurrency", "base_currency"]).trim().to_uppercase(),
        currency: pick_string(&raw, &["Currency", "currency"]).trim().to_uppercase(),
        pay_time: pick_string(&raw, &["PayTime", "pay_time"]).trim().to_string(),
        pass_through_info: pick_string(&raw, &["PassThroughInfo", "pass_through_info"]).trim().to_string(),
        raw,
    };
    Ok(callback)
}

pub fn verify_callback(callback: &TokenPayCallback, notify_secret: &Secret<String>) -> Result<(), GatewayError> {
    if notify_secret.reveal().trim().is_empty() {
        return Err(GatewayError::ConfigInvalid("notify_secret is required".into()));
    }
    if !signature_matches(&callback.raw, &callback.signature, notify_secret.reveal()) {
        return Err(GatewayError::SignatureInvalid);
    }
    Ok(())
}

impl TokenPayCallback {
    /// A callback without these fields cannot belong to TokenPay.
    pub fn has_required_fields(&self) -> bool {
        !self.signature.is_empty() && !self.out_order_id.is_empty() && !self.provider_ref.is_empty()
    }

    pub fn into_event(self) -> CallbackEvent {
        CallbackEvent {
            provider: ProviderType::Tokenpay,
            passthrough_payment_id: parse_passthrough_payment_id(&self.pass_through_info),
            status: to_payment_status(self.status),
            amount: parse_wire_amount(&self.actual_amount),
            currency: self.base_currency,
            paid_at: parse_provider_datetime(&self.pay_time),
            provider_ref: self.provider_ref,
            order_no: self.out_order_id,
            payload: Value::Object(self.raw),
        }
    }
}

//--------------------------------------     TokenPayApi     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct TokenPayApi {
    config: TokenPayConfig,
    client: Arc<Client>,
}

impl TokenPayApi {
    pub fn new(config: TokenPayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &TokenPayConfig {
        &self.config
    }

    /// Creates an order on the gateway and returns the data the buyer needs to pay it.
    pub async fn create_order(&self, request: &CreateOrderRequest) -> Result<InitiationData, GatewayError> {
        if request.order_no.trim().is_empty() || request.user_key.trim().is_empty() {
            return Err(GatewayError::ConfigInvalid("order_no and user_key are required".into()));
        }
        let currency = resolve_currency(&request.channel_type)
            .map(str::to_string)
            .or_else(|| (!self.config.currency.is_empty()).then(|| self.config.currency.clone()))
            .ok_or_else(|| GatewayError::ConfigInvalid("currency is required".into()))?;

        let mut payload = Map::new();
        payload.insert("OutOrderId".into(), Value::from(request.order_no.trim()));
        payload.insert("OrderUserKey".into(), Value::from(request.user_key.trim()));
        payload.insert("ActualAmount".into(), Value::from(request.amount.to_string()));
        payload.insert("Currency".into(), Value::from(currency));
        if !self.config.notify_url.is_empty() {
            payload.insert("NotifyUrl".into(), Value::from(self.config.notify_url.as_str()));
        }
        if !self.config.redirect_url.is_empty() {
            payload.insert("RedirectUrl".into(), Value::from(self.config.redirect_url.as_str()));
        }
        payload.insert("PassThroughInfo".into(), Value::from(format!("payment_id={}", request.payment_id)));
        let signature = sign_payload(&payload, self.config.notify_secret.reveal());
        payload.insert("Signature".into(), Value::from(signature));

        let url = format!("{}{CREATE_ORDER_PATH}", self.config.gateway_url);
        trace!("Sending TokenPay create order request for {}", request.order_no);
        let raw = self.post_json(&url, &Value::Object(payload)).await?;

        if !raw["success"].as_bool().unwrap_or_default() {
            let message = raw["message"].as_str().unwrap_or_default().trim().to_string();
            return Err(GatewayError::RequestFailed(message));
        }
        let empty = Map::new();
        let info = raw["info"].as_object().unwrap_or(&empty);
        let mut pay_url = raw["data"].as_str().unwrap_or_default().trim().to_string();
        if pay_url.is_empty() {
            pay_url = pick_string(info, &["PaymentUrl"]).trim().to_string();
        }
        let result = InitiationData {
            provider_ref: pick_string(info, &["Id", "id"]).trim().to_string(),
            pay_url,
            qr_code: pick_string(info, &["QrCodeBase64"]).trim().to_string(),
            qr_link: pick_string(info, &["QrCodeLink"]).trim().to_string(),
            to_address: pick_string(info, &["ToAddress"]).trim().to_string(),
            raw: raw.clone(),
        };
        debug!("TokenPay order {} created, provider ref {}", request.order_no, result.provider_ref);
        Ok(result)
    }

    /// Probes the gateway for the current state of an order.
    pub async fn query_order(&self, provider_ref: &str) -> Result<Value, GatewayError> {
        let provider_ref = provider_ref.trim();
        if provider_ref.is_empty() {
            return Err(GatewayError::ConfigInvalid("provider_ref is required".into()));
        }
        let mut params = Map::new();
        params.insert("Id".into(), Value::from(provider_ref));
        let signature = sign_payload(&params, self.config.notify_secret.reveal());
        let url = format!("{}{QUERY_ORDER_PATH}", self.config.gateway_url);
        trace!("Sending TokenPay query for order ref {provider_ref}");
        let response = self
            .client
            .get(url)
            .query(&[("Id", provider_ref), ("Signature", signature.as_str())])
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::RequestFailed(format!("query returned status {}", response.status())));
        }
        response.json::<Value>().await.map_err(|e| GatewayError::ResponseInvalid(e.to_string()))
    }

    /// Parses and verifies an inbound callback body, returning the canonical event.
    pub fn handle_callback(&self, body: &[u8]) -> Result<CallbackEvent, GatewayError> {
        let callback = parse_callback(body)?;
        if !callback.has_required_fields() {
            return Err(GatewayError::ResponseInvalid("callback is missing required fields".into()));
        }
        verify_callback(&callback, &self.config.notify_secret)?;
        Ok(callback.into_event())
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, GatewayError> {
        let response =
            self.client.post(url).json(body).send().await.map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::RequestFailed(format!("gateway returned status {}", response.status())));
        }
        response.json::<Value>().await.map_err(|e| GatewayError::ResponseInvalid(e.to_string()))
    }
}
