//! # Vendo payment gateway adapters
//!
//! Outbound order creation and inbound callback handling for the payment providers the Vendo
//! storefront settles through:
//!
//! * [`tokenpay`] - a crypto gateway with keyed-MD5 request signing.
//! * [`stripe`] - Stripe Checkout with HMAC-SHA256 webhook verification.
//! * [`epusdt`] - a stablecoin gateway from the same keyed-MD5 signing family as TokenPay.
//!
//! Every adapter normalizes its provider's notifications into a [`CallbackEvent`] carrying the
//! canonical [`vendo_common::PaymentStatus`]. Provider status codes that are not recognised map
//! to `Pending`, never to an error, so new codes cannot wedge settlement.
//!
//! Callers that do not care which provider they are talking to can go through the object-safe
//! [`GatewayAdapter`] trait and the [`adapter_for`] factory.
mod adapter;
mod error;
mod event;
mod helpers;
mod signing;

pub mod epusdt;
pub mod stripe;
pub mod tokenpay;

mod data_objects;

pub use adapter::{adapter_for, GatewayAdapter};
pub use data_objects::{CallbackRequest, CreateOrderRequest, InitiationData, ProviderType};
pub use error::GatewayError;
pub use event::{parse_passthrough_payment_id, parse_provider_datetime, CallbackEvent};
pub use signing::{sign_payload, signature_matches};
