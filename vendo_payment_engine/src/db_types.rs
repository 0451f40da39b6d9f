//! Core data types for the Vendo payment engine.
//!
//! These are the records the engine persists (payments, orders, wallets, recharges, channels,
//! SKUs and inventory units) together with the `New*` shapes used to insert them. All monetary
//! fields are [`Money`] (minor units); all timestamps are UTC.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use vendo_common::{Money, PaymentStatus, SITE_CURRENCY_CODE};
use vendo_gateways::ProviderType;

/// The SKU code reserved for the sole variant of a non-variant product.
pub const DEFAULT_SKU_CODE: &str = "default";

/// Inventory units recorded before per-SKU tracking existed carry this SKU id.
pub const LEGACY_SKU_ID: i64 = 0;

/// Channel id recorded on payments that settle purely from the wallet balance. There is no
/// channel row behind it.
pub const WALLET_CHANNEL_ID: i64 = 0;

/// The channel type recorded on synthesized wallet settlements.
pub const WALLET_CHANNEL_TYPE: &str = "balance";

#[derive(Debug, Clone, Error)]
#[error("Invalid {0}: {1}")]
pub struct ConversionError(&'static str, String);

//--------------------------------------     OrderStatus     ---------------------------------------------------------
/// Order lifecycle as far as the settlement core is concerned. Orders are created upstream;
/// this crate only ever moves `PendingPayment` to `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Completed,
    Cancelled,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::PendingPayment => write!(f, "PendingPayment"),
            OrderStatus::Paid => write!(f, "Paid"),
            OrderStatus::Completed => write!(f, "Completed"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PendingPayment" => Ok(Self::PendingPayment),
            "Paid" => Ok(Self::Paid),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError("order status", s.to_string())),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to PendingPayment");
            OrderStatus::PendingPayment
        })
    }
}

//--------------------------------------    RechargeStatus   ---------------------------------------------------------
/// Lifecycle of a wallet top-up. It mirrors the owning payment's status, but is a separate
/// record because a payment may instead belong to an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RechargeStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Expired,
}

impl RechargeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RechargeStatus::Success | RechargeStatus::Failed | RechargeStatus::Expired)
    }
}

impl Display for RechargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RechargeStatus::Pending => write!(f, "Pending"),
            RechargeStatus::Success => write!(f, "Success"),
            RechargeStatus::Failed => write!(f, "Failed"),
            RechargeStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for RechargeStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError("recharge status", s.to_string())),
        }
    }
}

impl From<String> for RechargeStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid recharge status: {value}. But this conversion cannot fail. Defaulting to Pending");
            RechargeStatus::Pending
        })
    }
}

//--------------------------------------   InteractionMode   ---------------------------------------------------------
/// How the buyer completes a payment: sent to a hosted page, shown a QR payload, or settled
/// against the wallet balance with no provider round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum InteractionMode {
    #[default]
    Redirect,
    Qr,
    Balance,
}

impl Display for InteractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionMode::Redirect => write!(f, "Redirect"),
            InteractionMode::Qr => write!(f, "Qr"),
            InteractionMode::Balance => write!(f, "Balance"),
        }
    }
}

impl FromStr for InteractionMode {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Redirect" => Ok(Self::Redirect),
            "Qr" => Ok(Self::Qr),
            "Balance" => Ok(Self::Balance),
            s => Err(ConversionError("interaction mode", s.to_string())),
        }
    }
}

impl From<String> for InteractionMode {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid interaction mode: {value}. But this conversion cannot fail. Defaulting to Redirect");
            InteractionMode::Redirect
        })
    }
}

//--------------------------------------   InventoryStatus   ---------------------------------------------------------
/// State of a single saleable inventory unit ("card secret"). Transitions are performed by
/// fulfilment; this crate only aggregates counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum InventoryStatus {
    #[default]
    Available,
    Reserved,
    Used,
}

impl Display for InventoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryStatus::Available => write!(f, "Available"),
            InventoryStatus::Reserved => write!(f, "Reserved"),
            InventoryStatus::Used => write!(f, "Used"),
        }
    }
}

impl FromStr for InventoryStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(Self::Available),
            "Reserved" => Ok(Self::Reserved),
            "Used" => Ok(Self::Used),
            s => Err(ConversionError("inventory status", s.to_string())),
        }
    }
}

impl From<String> for InventoryStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid inventory status: {value}. But this conversion cannot fail. Defaulting to Available");
            InventoryStatus::Available
        })
    }
}

//--------------------------------------     TxDirection     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TxDirection {
    Credit,
    Debit,
}

impl Display for TxDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxDirection::Credit => write!(f, "Credit"),
            TxDirection::Debit => write!(f, "Debit"),
        }
    }
}

impl FromStr for TxDirection {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Credit" => Ok(Self::Credit),
            "Debit" => Ok(Self::Debit),
            s => Err(ConversionError("transaction direction", s.to_string())),
        }
    }
}

impl From<String> for TxDirection {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid transaction direction: {value}. But this conversion cannot fail. Defaulting to Credit");
            TxDirection::Credit
        })
    }
}

//--------------------------------------     WalletTxType    ---------------------------------------------------------
/// Why a wallet balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WalletTxType {
    /// The balance part-funded or fully funded an order.
    OrderPayment,
    /// A successful top-up through a payment provider.
    Recharge,
    /// A manual correction by an operator.
    Adjustment,
}

impl Display for WalletTxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletTxType::OrderPayment => write!(f, "OrderPayment"),
            WalletTxType::Recharge => write!(f, "Recharge"),
            WalletTxType::Adjustment => write!(f, "Adjustment"),
        }
    }
}

impl FromStr for WalletTxType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OrderPayment" => Ok(Self::OrderPayment),
            "Recharge" => Ok(Self::Recharge),
            "Adjustment" => Ok(Self::Adjustment),
            s => Err(ConversionError("wallet transaction type", s.to_string())),
        }
    }
}

impl From<String> for WalletTxType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid wallet transaction type: {value}. But this conversion cannot fail. Defaulting to Adjustment");
            WalletTxType::Adjustment
        })
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
/// An order as the settlement core sees it. Created by checkout (external); this crate flips
/// `PendingPayment` to `Paid` and maintains the wallet/online paid split.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_no: String,
    pub user_id: i64,
    pub status: OrderStatus,
    pub currency: String,
    pub total_amount: Money,
    pub wallet_paid_amount: Money,
    pub online_paid_amount: Money,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The amount still owed, net of what the wallet has already covered.
    pub fn due_amount(&self) -> Money {
        self.total_amount - self.wallet_paid_amount
    }
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_no: String,
    pub user_id: i64,
    pub total_amount: Money,
    pub currency: String,
}

impl NewOrder {
    pub fn new(order_no: impl Into<String>, user_id: i64, total_amount: Money) -> Self {
        Self { order_no: order_no.into(), user_id, total_amount, currency: SITE_CURRENCY_CODE.to_string() }
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------
/// A payment attempt. `order_id` is absent for standalone wallet top-ups; `channel_id` is
/// [`WALLET_CHANNEL_ID`] for settlements synthesized from the wallet balance.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: Option<i64>,
    pub channel_id: i64,
    pub provider_type: ProviderType,
    pub channel_type: String,
    pub interaction_mode: InteractionMode,
    pub amount: Money,
    pub fee_rate_bps: i64,
    pub fee_amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub provider_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    /// The raw provider payload from the settling notification, stored verbatim.
    pub payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewPayment     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: Option<i64>,
    pub channel_id: i64,
    pub provider_type: ProviderType,
    pub channel_type: String,
    pub interaction_mode: InteractionMode,
    pub amount: Money,
    pub fee_rate_bps: i64,
    pub fee_amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl NewPayment {
    /// A payment that will be initiated with the channel's provider. It starts `Initiated`;
    /// the gateway handshake promotes it to `Pending`.
    pub fn for_channel(order_id: Option<i64>, channel: &PaymentChannel, amount: Money, currency: &str) -> Self {
        Self {
            order_id,
            channel_id: channel.id,
            provider_type: channel.provider_type,
            channel_type: channel.channel_type.clone(),
            interaction_mode: channel.interaction_mode,
            amount,
            fee_rate_bps: channel.fee_rate_bps,
            fee_amount: amount.fee_at_bps(channel.fee_rate_bps),
            currency: currency.to_string(),
            status: PaymentStatus::Initiated,
            paid_at: None,
        }
    }

    /// The payment backing a wallet top-up. The buyer pays the payable amount, fee included.
    pub fn for_recharge(recharge: &NewWalletRecharge) -> Self {
        Self {
            order_id: None,
            channel_id: recharge.channel_id,
            provider_type: recharge.provider_type,
            channel_type: recharge.channel_type.clone(),
            interaction_mode: recharge.interaction_mode,
            amount: recharge.payable_amount,
            fee_rate_bps: recharge.fee_rate_bps,
            fee_amount: recharge.fee_amount,
            currency: recharge.currency.clone(),
            status: PaymentStatus::Initiated,
            paid_at: None,
        }
    }

    /// A settlement that was covered entirely by the wallet balance. There is no provider
    /// round trip, so the payment is born `Success`.
    pub fn wallet_settlement(order: &Order, amount: Money) -> Self {
        Self {
            order_id: Some(order.id),
            channel_id: WALLET_CHANNEL_ID,
            provider_type: ProviderType::Wallet,
            channel_type: WALLET_CHANNEL_TYPE.to_string(),
            interaction_mode: InteractionMode::Balance,
            amount,
            fee_rate_bps: 0,
            fee_amount: Money::default(),
            currency: order.currency.clone(),
            status: PaymentStatus::Success,
            paid_at: Some(Utc::now()),
        }
    }
}

//--------------------------------------    PaymentChannel   ---------------------------------------------------------
/// An administrator-managed payment channel. `config` holds the provider-specific JSON blob
/// that the matching gateway adapter parses and validates at use time.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub id: i64,
    pub name: String,
    pub provider_type: ProviderType,
    pub channel_type: String,
    pub interaction_mode: InteractionMode,
    pub fee_rate_bps: i64,
    pub is_active: bool,
    pub sort_order: i64,
    pub config: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentChannel {
    /// The channel's config blob as JSON, ready for the adapter factory.
    pub fn config_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.config)
    }
}

//--------------------------------------  NewPaymentChannel  ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPaymentChannel {
    pub name: String,
    pub provider_type: ProviderType,
    pub channel_type: String,
    pub interaction_mode: InteractionMode,
    pub fee_rate_bps: i64,
    pub is_active: bool,
    pub sort_order: i64,
    pub config: String,
}

impl NewPaymentChannel {
    pub fn new(name: impl Into<String>, provider_type: ProviderType, channel_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_type,
            channel_type: channel_type.into(),
            interaction_mode: InteractionMode::Redirect,
            fee_rate_bps: 0,
            is_active: true,
            sort_order: 0,
            config: "{}".to_string(),
        }
    }

    pub fn with_config(mut self, config: &serde_json::Value) -> Self {
        self.config = config.to_string();
        self
    }

    pub fn with_fee_rate_bps(mut self, fee_rate_bps: i64) -> Self {
        self.fee_rate_bps = fee_rate_bps;
        self
    }

    pub fn with_interaction_mode(mut self, mode: InteractionMode) -> Self {
        self.interaction_mode = mode;
        self
    }
}

//--------------------------------------    WalletAccount    ---------------------------------------------------------
/// A user's balance. Mutated only through the ledger functions, each of which journals the
/// movement in the same transaction. The balance never goes negative.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WalletAccount {
    pub id: i64,
    pub user_id: i64,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  WalletTransaction  ---------------------------------------------------------
/// One entry in the append-only wallet journal.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: i64,
    pub direction: TxDirection,
    pub tx_type: WalletTxType,
    pub amount: Money,
    pub balance_after: Money,
    /// The order number or recharge number this movement belongs to.
    pub reference: String,
    pub remark: String,
    pub created_at: DateTime<Utc>,
}

//------------------------------------- WalletRechargeOrder  ---------------------------------------------------------
/// A wallet top-up. `amount` is what the wallet is credited on success; `payable_amount` is
/// what the buyer sends through the provider, fee included.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WalletRechargeOrder {
    pub id: i64,
    pub recharge_no: String,
    pub user_id: i64,
    pub payment_id: i64,
    pub channel_id: i64,
    pub provider_type: ProviderType,
    pub channel_type: String,
    pub interaction_mode: InteractionMode,
    pub amount: Money,
    pub payable_amount: Money,
    pub fee_rate_bps: i64,
    pub fee_amount: Money,
    pub currency: String,
    pub status: RechargeStatus,
    pub remark: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//-------------------------------------   NewWalletRecharge  ---------------------------------------------------------
/// Insert shape for a top-up. The backing payment is created by the same flow, so there is no
/// `payment_id` here; the flow wires it up after the payment insert.
#[derive(Debug, Clone)]
pub struct NewWalletRecharge {
    pub recharge_no: String,
    pub user_id: i64,
    pub channel_id: i64,
    pub provider_type: ProviderType,
    pub channel_type: String,
    pub interaction_mode: InteractionMode,
    pub amount: Money,
    pub payable_amount: Money,
    pub fee_rate_bps: i64,
    pub fee_amount: Money,
    pub currency: String,
    pub remark: String,
}

impl NewWalletRecharge {
    /// A top-up of `amount` through `channel`. The buyer pays `amount` plus the channel fee;
    /// the wallet is credited `amount` on success.
    pub fn new(user_id: i64, channel: &PaymentChannel, amount: Money, remark: impl Into<String>) -> Self {
        let fee_amount = amount.fee_at_bps(channel.fee_rate_bps);
        Self {
            recharge_no: crate::helpers::new_recharge_no(),
            user_id,
            channel_id: channel.id,
            provider_type: channel.provider_type,
            channel_type: channel.channel_type.clone(),
            interaction_mode: channel.interaction_mode,
            amount,
            payable_amount: amount + fee_amount,
            fee_rate_bps: channel.fee_rate_bps,
            fee_amount,
            currency: SITE_CURRENCY_CODE.to_string(),
            remark: remark.into(),
        }
    }
}

//--------------------------------------      ProductSku     ---------------------------------------------------------
/// A product variant. The four stock counters are not stored; they are filled in from the
/// inventory aggregation and default to zero when a SKU is read straight from the database.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ProductSku {
    pub id: i64,
    pub product_id: i64,
    pub sku_code: String,
    pub is_active: bool,
    pub sort_order: i64,
    pub price: Money,
    /// Administrator-entered stock figure for products not backed by inventory units.
    pub manual_stock_total: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(default)]
    pub available: i64,
    #[sqlx(default)]
    pub locked: i64,
    #[sqlx(default)]
    pub sold: i64,
    #[sqlx(default)]
    pub total: i64,
}

//--------------------------------------       NewSku        ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewSku {
    pub product_id: i64,
    pub sku_code: String,
    pub is_active: bool,
    pub sort_order: i64,
    pub price: Money,
    pub manual_stock_total: i64,
}

impl NewSku {
    pub fn new(product_id: i64, sku_code: impl Into<String>, price: Money) -> Self {
        Self { product_id, sku_code: sku_code.into(), is_active: true, sort_order: 0, price, manual_stock_total: 0 }
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

//--------------------------------------    InventoryUnit    ---------------------------------------------------------
/// One saleable unit of a digital product. `sku_id` is [`LEGACY_SKU_ID`] for rows recorded
/// before per-SKU tracking existed.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub id: i64,
    pub product_id: i64,
    pub sku_id: i64,
    pub secret: String,
    pub status: InventoryStatus,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   NewInventoryUnit  ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewInventoryUnit {
    pub product_id: i64,
    pub sku_id: i64,
    pub secret: String,
    pub status: InventoryStatus,
}

impl NewInventoryUnit {
    pub fn new(product_id: i64, sku_id: i64, secret: impl Into<String>) -> Self {
        Self { product_id, sku_id, secret: secret.into(), status: InventoryStatus::Available }
    }

    pub fn with_status(mut self, status: InventoryStatus) -> Self {
        self.status = status;
        self
    }
}

//--------------------------------------    StockCountRow    ---------------------------------------------------------
/// One row of the grouped inventory count query: how many units a (product, SKU, status)
/// combination has.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StockCountRow {
    pub product_id: i64,
    pub sku_id: i64,
    pub status: InventoryStatus,
    pub count: i64,
}

//--------------------------------------     ProductStock    ---------------------------------------------------------
/// A product's SKUs plus the aggregate stock counters across them. This is the unit the stock
/// reconciler works on; the product record itself is owned upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: i64,
    pub available: i64,
    pub locked: i64,
    pub sold: i64,
    pub total: i64,
    pub skus: Vec<ProductSku>,
}

impl ProductStock {
    pub fn new(product_id: i64, skus: Vec<ProductSku>) -> Self {
        Self { product_id, available: 0, locked: 0, sold: 0, total: 0, skus }
    }
}
