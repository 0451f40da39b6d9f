use thiserror::Error;
use vendo_common::Money;
use vendo_gateways::{InitiationData, ProviderType};

use crate::{
    db_types::{
        NewOrder,
        NewPaymentChannel,
        NewWalletRecharge,
        Order,
        Payment,
        PaymentChannel,
        WalletRechargeOrder,
    },
    traits::{
        data_objects::{CallbackInput, CreatePaymentResult, RechargeExpiry, RechargeResult, SettlementResult},
        WalletLedgerError,
    },
};

/// This trait defines the settlement flows a backend must support for the Vendo storefront.
///
/// This behaviour includes:
/// * Creating payments for orders, including debiting the wallet share inside the same
///   transaction
/// * Creating wallet top-ups and their backing payments
/// * Applying verified provider notifications idempotently
/// * Expiring abandoned wallet top-ups
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order. Orders normally arrive from checkout; this entry point exists for
    /// upstream services and for seeding.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, SettlementError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, SettlementError>;

    async fn fetch_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>, SettlementError>;

    async fn insert_channel(&self, channel: NewPaymentChannel) -> Result<PaymentChannel, SettlementError>;

    async fn fetch_channel(&self, channel_id: i64) -> Result<Option<PaymentChannel>, SettlementError>;

    /// Fetches the channels a buyer may currently choose from, ordered by `sort_order` then id.
    async fn fetch_active_channels(&self) -> Result<Vec<PaymentChannel>, SettlementError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, SettlementError>;

    /// Fetches the payment a provider reference belongs to. References are only unique per
    /// provider, and a provider may reuse one across retries, so the **latest** matching
    /// payment wins.
    async fn fetch_payment_by_provider_ref(
        &self,
        provider_type: ProviderType,
        provider_ref: &str,
    ) -> Result<Option<Payment>, SettlementError>;

    /// Creates a payment for an order. In a single atomic transaction:
    /// * the order is loaded and rejected unless it is still awaiting payment,
    /// * when `use_wallet_balance` is set, `min(balance, due)` is debited, journalled, and
    ///   added to the order's wallet share,
    /// * a zero remainder marks the order paid and synthesizes a settled wallet payment,
    /// * a positive remainder inserts an `Initiated` payment against the chosen channel.
    ///
    /// The provider handshake happens after this call, via [`attach_initiation`].
    ///
    /// [`attach_initiation`]: SettlementDatabase::attach_initiation
    async fn create_payment(
        &self,
        order_id: i64,
        channel_id: i64,
        use_wallet_balance: bool,
    ) -> Result<CreatePaymentResult, SettlementError>;

    /// Creates a wallet top-up: one transaction inserting the backing payment (`Initiated`,
    /// no order) and the `Pending` recharge order pointing at it.
    async fn create_wallet_recharge(&self, recharge: NewWalletRecharge) -> Result<RechargeResult, SettlementError>;

    /// Stores the provider's initiation data against a payment and promotes it from
    /// `Initiated` to `Pending`. A payment that has already moved on (a fast callback can
    /// settle it first) keeps its status; the provider reference is still recorded if the
    /// payment has none.
    async fn attach_initiation(&self, payment_id: i64, initiation: &InitiationData)
        -> Result<Payment, SettlementError>;

    /// Applies a verified provider notification. In a single atomic transaction:
    /// * the payment is re-read; an already-terminal payment is returned unchanged,
    /// * otherwise status, provider reference, paid-at and the raw payload are written,
    /// * a success with an owning order marks the order paid and records the online share,
    /// * a success without an order marks the recharge successful and credits the wallet,
    /// * a failure or expiry propagates to the recharge row when one exists.
    async fn apply_payment_callback(&self, input: &CallbackInput) -> Result<SettlementResult, SettlementError>;

    /// Expires an abandoned wallet top-up. Payments that own an order are left alone, as are
    /// payment/recharge pairs that have already reached a terminal state. Eligible pairs are
    /// flipped to `Expired` in one transaction, with `expired_at` set on the payment.
    async fn expire_wallet_recharge_payment(&self, payment_id: i64) -> Result<RechargeExpiry, SettlementError>;

    async fn fetch_recharge(&self, recharge_no: &str) -> Result<Option<WalletRechargeOrder>, SettlementError>;

    async fn fetch_recharge_for_payment(&self, payment_id: i64)
        -> Result<Option<WalletRechargeOrder>, SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The payment request is not valid. {0}")]
    PaymentInvalid(String),
    #[error("The requested payment (internal id {0}) does not exist")]
    PaymentNotFound(i64),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("The payment channel {0} does not exist or is not active")]
    ChannelNotAvailable(i64),
    #[error("Payment {0} has no wallet recharge order")]
    WalletRechargeNotFound(i64),
    #[error("Cannot insert recharge, since it already exists with number {0}")]
    RechargeAlreadyExists(String),
    #[error("Cannot insert order, since it already exists with number {0}")]
    OrderAlreadyExists(String),
    #[error("Insufficient wallet balance for user {user_id}. Requested {requested}, available {available}")]
    InsufficientFunds { user_id: i64, requested: Money, available: Money },
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}

impl From<WalletLedgerError> for SettlementError {
    fn from(e: WalletLedgerError) -> Self {
        match e {
            WalletLedgerError::InsufficientFunds { user_id, requested, available } => {
                SettlementError::InsufficientFunds { user_id, requested, available }
            },
            other => SettlementError::DatabaseError(other.to_string()),
        }
    }
}
