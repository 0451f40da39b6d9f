//! # Database management and control.
//!
//! This module provides the interfaces that define the contracts of the payment engine
//! database *backends*.
//!
//! ## Traits
//! * [`SettlementDatabase`] defines the settlement flows: creating payments and wallet
//!   top-ups, applying provider notifications, and expiring abandoned top-ups.
//! * [`WalletLedger`] defines behaviour for querying and moving wallet balances.
//! * [`StockManagement`] defines behaviour for SKU maintenance and inventory counting.
//!
//! A backend implements all three on the same type so that flows which span concerns (a
//! successful top-up credits the wallet, for instance) stay inside one transaction.
mod data_objects;
mod settlement_database;
mod stock_management;
mod wallet_ledger;

pub use data_objects::{CallbackInput, CreatePaymentResult, RechargeExpiry, RechargeResult, SettlementResult};
pub use settlement_database::{SettlementDatabase, SettlementError};
pub use stock_management::{StockError, StockManagement};
pub use wallet_ledger::{WalletLedger, WalletLedgerError};
