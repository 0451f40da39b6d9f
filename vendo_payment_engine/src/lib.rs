//! Vendo Payment Engine
//!
//! The Vendo Payment Engine is the settlement core of the Vendo digital-goods storefront. This library contains the
//! logic for splitting order payments between the buyer's wallet balance and an online payment provider, ingesting
//! provider notifications idempotently, expiring abandoned wallet top-ups, and keeping simple products on a single
//! active SKU with stock counted from the inventory units.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). Currently, Sqlite is the supported backend. You should never
//!    need to access the database directly. Instead, use the public API provided by the payment engine. The exception
//!    is the data types used in the database. These are defined in the `db_types` module and are public.
//! 2. The payment engine public API ([`mod@vpe_api`]). This provides the public-facing functionality of the payment
//!    engine. It is responsible for payments, wallet top-ups, wallet balances and stock. Specific backends need to
//!    implement the traits in the [`mod@traits`] module in order to act as a backend for the Vendo storefront.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted when payments reach
//! a terminal state. A simple Actor framework is used so that you can easily hook into these events and perform
//! custom actions, such as delivering the goods or notifying the merchant.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;
mod vpe_api;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{SettlementDatabase, SettlementError, StockError, StockManagement, WalletLedger, WalletLedgerError};
pub use vpe_api::{
    errors::PaymentFlowError,
    payment_flow_api::PaymentFlowApi,
    payment_objects,
    stock_api::StockApi,
    wallet_api::WalletApi,
};
