//! The provider-agnostic face of the adapters. The orchestrator holds a `Box<dyn
//! GatewayAdapter>` per channel and never needs to know which provider is behind it; the
//! internal wallet pseudo-provider has no adapter and is settled by the orchestrator itself.

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    data_objects::{CallbackRequest, CreateOrderRequest, InitiationData},
    epusdt::{self, EpusdtApi},
    event::CallbackEvent,
    stripe::{self, StripeApi},
    tokenpay::{self, TokenPayApi},
    GatewayError,
    ProviderType,
};

#[async_trait]
pub trait GatewayAdapter: std::fmt::Debug + Send + Sync {
    fn provider(&self) -> ProviderType;

    /// The body a callback endpoint answers with when the event was accepted (or was a benign
    /// no-match). Empty for providers that only look at the HTTP status.
    fn ack_success(&self) -> &'static str;

    /// The body a callback endpoint answers with when a verified event could not be processed,
    /// prompting the provider to retry.
    fn ack_failure(&self) -> &'static str;

    /// Parses and verifies an inbound notification, returning the canonical event.
    fn handle_callback(&self, request: &CallbackRequest) -> Result<CallbackEvent, GatewayError>;

    /// Initiates a payment with the provider. This is the only operation that talks to the
    /// network and must be called outside any held database lock.
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<InitiationData, GatewayError>;
}

/// Builds the adapter for a provider from a channel's JSON config blob.
pub fn adapter_for(provider: ProviderType, config: &Value) -> Result<Box<dyn GatewayAdapter>, GatewayError> {
    match provider {
        ProviderType::Wallet => Err(GatewayError::UnsupportedProvider(provider.to_string())),
        ProviderType::Tokenpay => Ok(Box::new(TokenPayApi::new(tokenpay::parse_config(config)?)?)),
        ProviderType::Stripe => Ok(Box::new(StripeApi::new(stripe::parse_config(config)?)?)),
        ProviderType::Epusdt => Ok(Box::new(EpusdtApi::new(epusdt::parse_config(config)?)?)),
    }
}

#[async_trait]
impl GatewayAdapter for TokenPayApi {
    fn provider(&self) -> ProviderType {
        ProviderType::Tokenpay
    }

    fn ack_success(&self) -> &'static str {
        tokenpay::ACK_SUCCESS
    }

    fn ack_failure(&self) -> &'static str {
        tokenpay::ACK_FAIL
    }

    fn handle_callback(&self, request: &CallbackRequest) -> Result<CallbackEvent, GatewayError> {
        TokenPayApi::handle_callback(self, &request.body)
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<InitiationData, GatewayError> {
        TokenPayApi::create_order(self, request).await
    }
}

#[async_trait]
impl GatewayAdapter for StripeApi {
    fn provider(&self) -> ProviderType {
        ProviderType::Stripe
    }

    fn ack_success(&self) -> &'static str {
        stripe::ACK_SUCCESS
    }

    fn ack_failure(&self) -> &'static str {
        stripe::ACK_FAIL
    }

    fn handle_callback(&self, request: &CallbackRequest) -> Result<CallbackEvent, GatewayError> {
        StripeApi::handle_callback(self, request.signature_header.as_deref(), &request.body)
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<InitiationData, GatewayError> {
        self.create_checkout_session(request).await
    }
}

#[async_trait]
impl GatewayAdapter for EpusdtApi {
    fn provider(&self) -> ProviderType {
        ProviderType::Epusdt
    }

    fn ack_success(&self) -> &'static str {
        epusdt::ACK_SUCCESS
    }

    fn ack_failure(&self) -> &'static str {
        epusdt::ACK_FAIL
    }

    fn handle_callback(&self, request: &CallbackRequest) -> Result<CallbackEvent, GatewayError> {
        EpusdtApi::handle_callback(self, &request.body)
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<InitiationData, GatewayError> {
        self.create_transaction(request).await
    }
}
