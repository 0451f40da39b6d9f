use serde::{Deserialize, Serialize};
use vendo_common::Money;
use vendo_gateways::InitiationData;

use crate::db_types::{Order, Payment, WalletRechargeOrder};

/// The response to `create_payment` calls. When the wallet balance covered the whole amount
/// due there was no provider round trip, so `payment` and `initiation` are both `None` and
/// `order_paid` is `true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCreated {
    pub order: Order,
    pub order_paid: bool,
    /// The amount this call debited from the wallet, not the lifetime wallet share.
    pub wallet_debited: Money,
    pub payment: Option<Payment>,
    /// Where and how the buyer pays the remainder, straight from the provider.
    pub initiation: Option<InitiationData>,
}

/// The response to `create_wallet_recharge` calls. Top-ups always go through a provider, so
/// the initiation data is always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RechargeCreated {
    pub payment: Payment,
    pub recharge: WalletRechargeOrder,
    pub initiation: InitiationData,
}

//--------------------------------------    IngestOutcome    ---------------------------------------------------------
/// What an inbound provider notification amounted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestOutcome {
    /// The notification carried a terminal status and settlement ran.
    Settled,
    /// The notification was recognised but changed nothing: a replay of an already-terminal
    /// payment, or a status that is not final yet.
    Ignored,
    /// The body is not a notification from this provider, or no payment matches it yet.
    NotAMatch,
    /// The notification matched a payment but could not be applied.
    Rejected(String),
}

//--------------------------------------     CallbackAck     ---------------------------------------------------------
/// The exact response a callback endpoint must hand back to the provider. Providers keep
/// redelivering a notification until they see their success token, so `Settled` and `Ignored`
/// acknowledge positively and everything else asks for a retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackAck {
    pub success: bool,
    /// The literal response body. Empty for providers that read the HTTP status instead.
    pub body: String,
    pub outcome: IngestOutcome,
}

impl CallbackAck {
    pub fn new(outcome: IngestOutcome, ack_success: &str, ack_failure: &str) -> Self {
        let success = matches!(outcome, IngestOutcome::Settled | IngestOutcome::Ignored);
        let body = if success { ack_success } else { ack_failure }.to_string();
        Self { success, body, outcome }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn acks_follow_the_outcome() {
        let ack = CallbackAck::new(IngestOutcome::Settled, "success", "fail");
        assert!(ack.success);
        assert_eq!(ack.body, "success");
        let ack = CallbackAck::new(IngestOutcome::Ignored, "ok", "fail");
        assert!(ack.success);
        assert_eq!(ack.body, "ok");
        let ack = CallbackAck::new(IngestOutcome::NotAMatch, "success", "fail");
        assert!(!ack.success);
        assert_eq!(ack.body, "fail");
        let ack = CallbackAck::new(IngestOutcome::Rejected("bad signature".into()), "success", "fail");
        assert!(!ack.success);
        assert_eq!(ack.body, "fail");
    }
}
