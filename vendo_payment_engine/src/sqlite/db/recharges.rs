use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWalletRecharge, RechargeStatus, WalletRechargeOrder},
    traits::SettlementError,
};

/// Inserts the recharge order, pointing at the payment that will fund it.
pub(crate) async fn insert_recharge(
    recharge: NewWalletRecharge,
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<WalletRechargeOrder, SettlementError> {
    let result: Result<WalletRechargeOrder, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO wallet_recharge_orders (
                recharge_no,
                user_id,
                payment_id,
                channel_id,
                provider_type,
                channel_type,
                interaction_mode,
                amount,
                payable_amount,
                fee_rate_bps,
                fee_amount,
                currency,
                remark
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *;
        "#,
    )
    .bind(&recharge.recharge_no)
    .bind(recharge.user_id)
    .bind(payment_id)
    .bind(recharge.channel_id)
    .bind(recharge.provider_type)
    .bind(&recharge.channel_type)
    .bind(recharge.interaction_mode)
    .bind(recharge.amount)
    .bind(recharge.payable_amount)
    .bind(recharge.fee_rate_bps)
    .bind(recharge.fee_amount)
    .bind(&recharge.currency)
    .bind(&recharge.remark)
    .fetch_one(conn)
    .await;
    match result {
        Ok(inserted) => {
            debug!("📝️ Recharge [{}] inserted with id {}", inserted.recharge_no, inserted.id);
            Ok(inserted)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SettlementError::RechargeAlreadyExists(recharge.recharge_no))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_recharge_by_no(
    recharge_no: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletRechargeOrder>, sqlx::Error> {
    let recharge = sqlx::query_as("SELECT * FROM wallet_recharge_orders WHERE recharge_no = $1")
        .bind(recharge_no)
        .fetch_optional(conn)
        .await?;
    Ok(recharge)
}

pub async fn fetch_recharge_by_payment_id(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletRechargeOrder>, sqlx::Error> {
    let recharge = sqlx::query_as("SELECT * FROM wallet_recharge_orders WHERE payment_id = $1")
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(recharge)
}

pub(crate) async fn update_recharge_status(
    id: i64,
    status: RechargeStatus,
    paid_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<WalletRechargeOrder, SettlementError> {
    let result: Option<WalletRechargeOrder> = sqlx::query_as(
        "UPDATE wallet_recharge_orders SET status = $1, paid_at = COALESCE($2, paid_at), updated_at = \
         CURRENT_TIMESTAMP WHERE id = $3 RETURNING *",
    )
    .bind(status)
    .bind(paid_at)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(SettlementError::WalletRechargeNotFound(id))
}
