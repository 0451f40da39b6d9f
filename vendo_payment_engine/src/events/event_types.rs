use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, Payment, WalletRechargeOrder},
    traits::SettlementResult,
};

/// Emitted after a payment settles successfully. Exactly one of `order` and `recharge` is set:
/// a settled order payment carries the paid order, a settled top-up carries the recharge.
/// Wallet-only settlements never produce this event; they complete inside the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettledEvent {
    pub payment: Payment,
    pub order: Option<Order>,
    pub recharge: Option<WalletRechargeOrder>,
}

impl PaymentSettledEvent {
    pub fn new(payment: Payment, order: Option<Order>, recharge: Option<WalletRechargeOrder>) -> Self {
        Self { payment, order, recharge }
    }
}

impl From<SettlementResult> for PaymentSettledEvent {
    fn from(result: SettlementResult) -> Self {
        Self::new(result.payment, result.order, result.recharge)
    }
}

/// Emitted when a payment is closed without settling, whether by a provider failure
/// notification or by the recharge reaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAnnulledEvent {
    pub payment: Payment,
}

impl PaymentAnnulledEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}
