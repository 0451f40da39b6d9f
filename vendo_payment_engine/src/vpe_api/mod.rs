//! # Engine public API
//!
//! The `vpe_api` module is the surface client code talks to. Each API wraps one concern and asks
//! only for the backend trait it needs, so a deployment can hand the same `SqliteDatabase` to all
//! three, or split settlement and stock across processes later without touching any call sites.
//!
//! * [`payment_flow_api`] drives payments and wallet top-ups end to end: creating them, ingesting
//!   provider notifications, and expiring abandoned top-ups.
//! * [`wallet_api`] reads balances and journal history and applies operator adjustments.
//! * [`stock_api`] keeps simple products on a single active SKU and counts stock from the
//!   inventory units.
//!
//! Construction is uniform across the APIs: supply any backend implementing the trait the API
//! asks for.
//!
//! ```rust,ignore
//! use vendo_payment_engine::{SqliteDatabase, WalletApi};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements WalletLedger
//! let api = WalletApi::new(db);
//! let balance = api.balance(user_id).await?;
//! ```

pub mod errors;
pub mod payment_flow_api;
pub mod payment_objects;
pub mod stock_api;

pub mod wallet_api;
