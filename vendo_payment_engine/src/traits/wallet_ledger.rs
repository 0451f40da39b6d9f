use thiserror::Error;
use vendo_common::Money;

use crate::db_types::{WalletAccount, WalletTransaction, WalletTxType};

#[derive(Debug, Clone, Error)]
pub enum WalletLedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Insufficient wallet balance for user {user_id}. Requested {requested}, available {available}")]
    InsufficientFunds { user_id: i64, requested: Money, available: Money },
    #[error("Wallet movements must be positive. Got {0}")]
    InvalidAmount(Money),
}

impl From<sqlx::Error> for WalletLedgerError {
    fn from(e: sqlx::Error) -> Self {
        WalletLedgerError::DatabaseError(e.to_string())
    }
}

/// The `WalletLedger` trait defines behaviour for querying and moving wallet balances.
///
/// Settlement flows move balances inside their own transactions; the entry points here run in
/// a transaction of their own and exist for operator adjustments and upstream queries. Every
/// movement is journalled, and the balance can never go negative.
#[allow(async_fn_in_trait)]
pub trait WalletLedger: Clone {
    /// Fetches the wallet account for the given user. If the user has never held a balance,
    /// `None` is returned.
    async fn fetch_wallet_account(&self, user_id: i64) -> Result<Option<WalletAccount>, WalletLedgerError>;

    /// Credits the user's wallet, creating the account row on first touch. Zero amounts are
    /// no-ops that journal nothing. Returns the account after the movement.
    async fn credit_wallet(
        &self,
        user_id: i64,
        amount: Money,
        tx_type: WalletTxType,
        reference: &str,
        remark: &str,
    ) -> Result<WalletAccount, WalletLedgerError>;

    /// Debits the user's wallet. Fails with [`WalletLedgerError::InsufficientFunds`] when the
    /// balance does not cover `amount`. Zero amounts are no-ops that journal nothing.
    async fn debit_wallet(
        &self,
        user_id: i64,
        amount: Money,
        tx_type: WalletTxType,
        reference: &str,
        remark: &str,
    ) -> Result<WalletAccount, WalletLedgerError>;

    /// Fetches the most recent journal entries for the user, newest first.
    async fn fetch_wallet_history(&self, user_id: i64, limit: i64)
        -> Result<Vec<WalletTransaction>, WalletLedgerError>;
}
