use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vendo_common::{Money, PaymentStatus};
use vendo_gateways::CallbackEvent;

use crate::db_types::{Order, Payment, WalletRechargeOrder};

/// Result of [`create_payment`](crate::traits::SettlementDatabase::create_payment). When the
/// wallet balance covered the whole amount due, `payment` is `None` and the synthesized
/// settlement row lives only in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentResult {
    pub order: Order,
    pub order_paid: bool,
    /// The amount debited from the wallet by this call, not the lifetime wallet share.
    pub wallet_debited: Money,
    pub payment: Option<Payment>,
}

impl CreatePaymentResult {
    pub fn settled_from_wallet(order: Order, wallet_debited: Money) -> Self {
        Self { order, order_paid: true, wallet_debited, payment: None }
    }

    pub fn awaiting_provider(order: Order, wallet_debited: Money, payment: Payment) -> Self {
        Self { order, order_paid: false, wallet_debited, payment: Some(payment) }
    }
}

/// A freshly created wallet top-up and the payment that will fund it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RechargeResult {
    pub payment: Payment,
    pub recharge: WalletRechargeOrder,
}

/// What a provider notification did to the store. `changed` is `false` when the payment was
/// already terminal and the notification was a replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub changed: bool,
    pub payment: Payment,
    pub order: Option<Order>,
    pub recharge: Option<WalletRechargeOrder>,
}

impl SettlementResult {
    pub fn unchanged(payment: Payment) -> Self {
        Self { changed: false, payment, order: None, recharge: None }
    }
}

/// Result of the recharge reaper. `expired_now` is `true` only when this call performed the
/// flip; replays and order-owned payments report `false` with the rows as they stand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RechargeExpiry {
    pub expired_now: bool,
    pub payment: Payment,
    pub recharge: Option<WalletRechargeOrder>,
}

impl RechargeExpiry {
    pub fn unchanged(payment: Payment, recharge: Option<WalletRechargeOrder>) -> Self {
        Self { expired_now: false, payment, recharge }
    }
}

/// A verified provider notification reduced to what the store needs: the resolved payment and
/// the fields to write. Verification and payment resolution happen before this is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackInput {
    pub payment_id: i64,
    pub status: PaymentStatus,
    pub provider_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    /// The provider's payload, stored verbatim on the payment row.
    pub payload: String,
}

impl CallbackInput {
    pub fn from_event(payment_id: i64, event: &CallbackEvent) -> Self {
        let provider_ref = (!event.provider_ref.is_empty()).then(|| event.provider_ref.clone());
        Self {
            payment_id,
            status: event.status,
            provider_ref,
            paid_at: event.paid_at,
            payload: event.payload.to_string(),
        }
    }
}
