use thiserror::Error;
use vendo_gateways::GatewayError;

use crate::traits::SettlementError;

/// Everything that can go wrong in a payment flow: the store side and the provider side.
#[derive(Debug, Error)]
pub enum PaymentFlowError {
    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}
