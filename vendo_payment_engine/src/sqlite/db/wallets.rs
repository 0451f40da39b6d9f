use log::debug;
use sqlx::SqliteConnection;
use vendo_common::Money;

use crate::{
    db_types::{TxDirection, WalletAccount, WalletTransaction, WalletTxType},
    traits::WalletLedgerError,
};

pub async fn fetch_wallet_account(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletAccount>, sqlx::Error> {
    let account =
        sqlx::query_as("SELECT * FROM wallet_accounts WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(account)
}

/// Fetches the user's wallet account, creating a zero-balance row on first touch.
pub(crate) async fn ensure_wallet_account(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<WalletAccount, sqlx::Error> {
    sqlx::query("INSERT INTO wallet_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    let account =
        sqlx::query_as("SELECT * FROM wallet_accounts WHERE user_id = $1").bind(user_id).fetch_one(conn).await?;
    Ok(account)
}

/// Credits the user's wallet and journals the movement. Zero amounts are no-ops that journal
/// nothing. Not atomic on its own; run it inside the caller's transaction.
pub(crate) async fn credit(
    user_id: i64,
    amount: Money,
    tx_type: WalletTxType,
    reference: &str,
    remark: &str,
    conn: &mut SqliteConnection,
) -> Result<WalletAccount, WalletLedgerError> {
    if amount < Money::default() {
        return Err(WalletLedgerError::InvalidAmount(amount));
    }
    if amount.is_zero() {
        return Ok(ensure_wallet_account(user_id, conn).await?);
    }
    ensure_wallet_account(user_id, &mut *conn).await?;
    let account: WalletAccount = sqlx::query_as(
        "UPDATE wallet_accounts SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2 \
         RETURNING *",
    )
    .bind(amount)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    journal(user_id, TxDirection::Credit, tx_type, amount, account.balance, reference, remark, conn).await?;
    debug!("📝️ Credited {amount} to user {user_id}'s wallet. New balance: {}", account.balance);
    Ok(account)
}

/// Debits the user's wallet and journals the movement. Fails when the balance does not cover
/// `amount`; zero amounts are no-ops that journal nothing. Not atomic on its own; run it
/// inside the caller's transaction.
pub(crate) async fn debit(
    user_id: i64,
    amount: Money,
    tx_type: WalletTxType,
    reference: &str,
    remark: &str,
    conn: &mut SqliteConnection,
) -> Result<WalletAccount, WalletLedgerError> {
    if amount < Money::default() {
        return Err(WalletLedgerError::InvalidAmount(amount));
    }
    if amount.is_zero() {
        return Ok(ensure_wallet_account(user_id, conn).await?);
    }
    let debited: Option<WalletAccount> = sqlx::query_as(
        "UPDATE wallet_accounts SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2 AND \
         balance >= $1 RETURNING *",
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(account) = debited else {
        let available = fetch_wallet_account(user_id, &mut *conn).await?.map(|a| a.balance).unwrap_or_default();
        return Err(WalletLedgerError::InsufficientFunds { user_id, requested: amount, available });
    };
    journal(user_id, TxDirection::Debit, tx_type, amount, account.balance, reference, remark, conn).await?;
    debug!("📝️ Debited {amount} from user {user_id}'s wallet. New balance: {}", account.balance);
    Ok(account)
}

pub async fn fetch_history(
    user_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM wallet_transactions WHERE user_id = $1 ORDER BY id DESC LIMIT $2")
        .bind(user_id)
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

#[allow(clippy::too_many_arguments)]
async fn journal(
    user_id: i64,
    direction: TxDirection,
    tx_type: WalletTxType,
    amount: Money,
    balance_after: Money,
    reference: &str,
    remark: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO wallet_transactions (
                user_id,
                direction,
                tx_type,
                amount,
                balance_after,
                reference,
                remark
            ) VALUES ($1, $2, $3, $4, $5, $6, $7);
        "#,
    )
    .bind(user_id)
    .bind(direction)
    .bind(tx_type)
    .bind(amount)
    .bind(balance_after)
    .bind(reference)
    .bind(remark)
    .execute(conn)
    .await?;
    Ok(())
}
