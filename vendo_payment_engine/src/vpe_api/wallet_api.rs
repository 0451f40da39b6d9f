use std::fmt::Debug;

use log::trace;
use vendo_common::Money;

use crate::{
    db_types::{WalletAccount, WalletTransaction, WalletTxType},
    traits::{WalletLedger, WalletLedgerError},
};

/// `WalletApi` provides methods for querying wallet balances and history, and for operator
/// adjustments outside the settlement flows. Settlement itself moves balances through
/// [`SettlementDatabase`](crate::traits::SettlementDatabase), inside its own transactions.
#[derive(Clone)]
pub struct WalletApi<B> {
    db: B,
}

impl<B: Debug> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi ({:?})", self.db)
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WalletApi<B>
where B: WalletLedger
{
    /// The user's current balance. A user that has never held a balance reads as zero.
    pub async fn balance(&self, user_id: i64) -> Result<Money, WalletLedgerError> {
        let account = self.db.fetch_wallet_account(user_id).await?;
        Ok(account.map(|a| a.balance).unwrap_or_default())
    }

    pub async fn fetch_wallet_account(&self, user_id: i64) -> Result<Option<WalletAccount>, WalletLedgerError> {
        self.db.fetch_wallet_account(user_id).await
    }

    /// Credits the user's wallet as an operator adjustment. The movement is journalled with
    /// the given reference and remark.
    pub async fn adjust_credit(
        &self,
        user_id: i64,
        amount: Money,
        reference: &str,
        remark: &str,
    ) -> Result<WalletAccount, WalletLedgerError> {
        trace!("Crediting {amount} to the wallet of user {user_id}");
        self.db.credit_wallet(user_id, amount, WalletTxType::Adjustment, reference, remark).await
    }

    /// Debits the user's wallet as an operator adjustment. Fails with
    /// [`WalletLedgerError::InsufficientFunds`] rather than letting the balance go negative.
    pub async fn adjust_debit(
        &self,
        user_id: i64,
        amount: Money,
        reference: &str,
        remark: &str,
    ) -> Result<WalletAccount, WalletLedgerError> {
        trace!("Debiting {amount} from the wallet of user {user_id}");
        self.db.debit_wallet(user_id, amount, WalletTxType::Adjustment, reference, remark).await
    }

    /// The most recent journal entries for the user, newest first.
    pub async fn history(&self, user_id: i64, limit: i64) -> Result<Vec<WalletTransaction>, WalletLedgerError> {
        self.db.fetch_wallet_history(user_id, limit).await
    }
}
