use std::{fmt::Display, str::FromStr};

use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Type;
use thiserror::Error;
use vendo_common::Money;

//--------------------------------------    ProviderType     ---------------------------------------------------------
/// The payment providers the storefront can settle through. `Wallet` is the internal
/// balance-only pseudo-provider; it has no adapter and never talks to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Wallet,
    Tokenpay,
    Stripe,
    Epusdt,
}

impl Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Wallet => write!(f, "wallet"),
            ProviderType::Tokenpay => write!(f, "tokenpay"),
            ProviderType::Stripe => write!(f, "stripe"),
            ProviderType::Epusdt => write!(f, "epusdt"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid provider type: {0}")]
pub struct ProviderTypeConversionError(String);

impl FromStr for ProviderType {
    type Err = ProviderTypeConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wallet" => Ok(Self::Wallet),
            "tokenpay" => Ok(Self::Tokenpay),
            "stripe" => Ok(Self::Stripe),
            "epusdt" => Ok(Self::Epusdt),
            other => Err(ProviderTypeConversionError(other.to_string())),
        }
    }
}

impl From<String> for ProviderType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid provider type: {value}. But this conversion cannot fail. Defaulting to Wallet");
            ProviderType::Wallet
        })
    }
}

//--------------------------------------   CallbackRequest   ---------------------------------------------------------
/// A raw inbound notification, exactly as the HTTP layer received it. The signature header is
/// only meaningful for providers that sign out-of-band (Stripe); the keyed-MD5 providers embed
/// the signature in the body.
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    pub body: Vec<u8>,
    pub signature_header: Option<String>,
}

impl CallbackRequest {
    pub fn from_body(body: impl Into<Vec<u8>>) -> Self {
        Self { body: body.into(), signature_header: None }
    }

    pub fn with_signature_header(body: impl Into<Vec<u8>>, header: impl Into<String>) -> Self {
        Self { body: body.into(), signature_header: Some(header.into()) }
    }
}

//--------------------------------------  CreateOrderRequest ---------------------------------------------------------
/// Everything an adapter needs to initiate a payment with its provider.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub payment_id: i64,
    pub order_no: String,
    /// The payer identity key forwarded to providers that segregate orders per buyer.
    pub user_key: String,
    pub amount: Money,
    pub currency: String,
    pub channel_type: String,
}

//--------------------------------------   InitiationData    ---------------------------------------------------------
/// Gateway-specific data the storefront needs to send the buyer off to pay. Fields the
/// provider does not supply stay empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitiationData {
    #[serde(default)]
    pub provider_ref: String,
    #[serde(default)]
    pub pay_url: String,
    #[serde(default)]
    pub qr_code: String,
    #[serde(default)]
    pub qr_link: String,
    #[serde(default)]
    pub to_address: String,
    #[serde(default)]
    pub raw: Value,
}
