use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;
use vendo_gateways::ProviderType;

use crate::{
    db_types::{NewPayment, Payment},
    traits::{CallbackInput, SettlementError},
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, SettlementError> {
    let inserted: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (
                order_id,
                channel_id,
                provider_type,
                channel_type,
                interaction_mode,
                amount,
                fee_rate_bps,
                fee_amount,
                currency,
                status,
                paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.channel_id)
    .bind(payment.provider_type)
    .bind(&payment.channel_type)
    .bind(payment.interaction_mode)
    .bind(payment.amount)
    .bind(payment.fee_rate_bps)
    .bind(payment.fee_amount)
    .bind(&payment.currency)
    .bind(payment.status)
    .bind(payment.paid_at)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Payment inserted with id {} ({} via {})", inserted.id, inserted.amount, inserted.provider_type);
    Ok(inserted)
}

pub async fn fetch_payment_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

/// Returns the latest payment carrying the given provider reference. Providers may replay a
/// reference across retries, so the highest id wins.
pub async fn fetch_latest_payment_by_provider_ref(
    provider_type: ProviderType,
    provider_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        "SELECT * FROM payments WHERE provider_type = $1 AND provider_ref = $2 ORDER BY id DESC LIMIT 1",
    )
    .bind(provider_type)
    .bind(provider_ref)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Stores the provider handshake result and promotes the payment from `Initiated` to
/// `Pending`. A payment that a fast callback has already moved keeps its status; only a
/// missing provider reference is backfilled in that case.
pub(crate) async fn attach_initiation(
    id: i64,
    provider_ref: Option<&str>,
    payload: &str,
    conn: &mut SqliteConnection,
) -> Result<Payment, SettlementError> {
    let promoted = sqlx::query(
        "UPDATE payments SET status = 'Pending', provider_ref = COALESCE($1, provider_ref), payload = $2, \
         updated_at = CURRENT_TIMESTAMP WHERE id = $3 AND status = 'Initiated'",
    )
    .bind(provider_ref)
    .bind(payload)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if promoted.rows_affected() == 0 {
        debug!("📝️ Payment {id} moved on before its initiation data arrived. Backfilling the provider reference");
        sqlx::query(
            "UPDATE payments SET provider_ref = COALESCE(provider_ref, $1), updated_at = CURRENT_TIMESTAMP WHERE id \
             = $2",
        )
        .bind(provider_ref)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }
    fetch_payment_by_id(id, conn).await?.ok_or(SettlementError::PaymentNotFound(id))
}

/// Writes the outcome of a verified provider notification onto the payment row.
pub(crate) async fn update_payment_from_callback(
    input: &CallbackInput,
    paid_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Payment, SettlementError> {
    let result: Option<Payment> = sqlx::query_as(
        "UPDATE payments SET status = $1, provider_ref = COALESCE($2, provider_ref), paid_at = $3, payload = $4, \
         updated_at = CURRENT_TIMESTAMP WHERE id = $5 RETURNING *",
    )
    .bind(input.status)
    .bind(input.provider_ref.as_deref())
    .bind(paid_at)
    .bind(&input.payload)
    .bind(input.payment_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(SettlementError::PaymentNotFound(input.payment_id))
}

pub(crate) async fn mark_payment_expired(
    id: i64,
    expired_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, SettlementError> {
    let result: Option<Payment> = sqlx::query_as(
        "UPDATE payments SET status = 'Expired', expired_at = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 \
         RETURNING *",
    )
    .bind(expired_at)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(SettlementError::PaymentNotFound(id))
}
