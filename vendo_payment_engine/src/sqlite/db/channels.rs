use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewPaymentChannel, PaymentChannel};

pub async fn insert_channel(
    channel: NewPaymentChannel,
    conn: &mut SqliteConnection,
) -> Result<PaymentChannel, sqlx::Error> {
    let inserted: PaymentChannel = sqlx::query_as(
        r#"
            INSERT INTO payment_channels (
                name,
                provider_type,
                channel_type,
                interaction_mode,
                fee_rate_bps,
                is_active,
                sort_order,
                config
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(&channel.name)
    .bind(channel.provider_type)
    .bind(&channel.channel_type)
    .bind(channel.interaction_mode)
    .bind(channel.fee_rate_bps)
    .bind(channel.is_active)
    .bind(channel.sort_order)
    .bind(&channel.config)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Payment channel [{}] inserted with id {}", inserted.name, inserted.id);
    Ok(inserted)
}

pub async fn fetch_channel_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentChannel>, sqlx::Error> {
    let channel =
        sqlx::query_as("SELECT * FROM payment_channels WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(channel)
}

pub async fn fetch_active_channels(conn: &mut SqliteConnection) -> Result<Vec<PaymentChannel>, sqlx::Error> {
    let channels =
        sqlx::query_as("SELECT * FROM payment_channels WHERE is_active = 1 ORDER BY sort_order, id")
            .fetch_all(conn)
            .await?;
    Ok(channels)
}
