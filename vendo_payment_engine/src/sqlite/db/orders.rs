use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;
use vendo_common::Money;

use crate::{
    db_types::{NewOrder, Order},
    traits::SettlementError,
};

pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SettlementError> {
    let result: Result<Order, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_no,
                user_id,
                currency,
                total_amount
            ) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(&order.order_no)
    .bind(order.user_id)
    .bind(&order.currency)
    .bind(order.total_amount)
    .fetch_one(conn)
    .await;
    match result {
        Ok(inserted) => {
            debug!("📝️ Order [{}] inserted with id {}", inserted.order_no, inserted.id);
            Ok(inserted)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SettlementError::OrderAlreadyExists(order.order_no))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_order_no(
    order_no: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_no = $1").bind(order_no).fetch_optional(conn).await?;
    Ok(order)
}

/// Adds `amount` to the order's wallet-paid share.
pub(crate) async fn add_wallet_paid(
    id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET wallet_paid_amount = wallet_paid_amount + $1, updated_at = CURRENT_TIMESTAMP WHERE id = \
         $2 RETURNING *",
    )
    .bind(amount)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(SettlementError::OrderNotFound(id))
}

/// Adds `amount` to the order's online-paid share.
pub(crate) async fn add_online_paid(
    id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET online_paid_amount = online_paid_amount + $1, updated_at = CURRENT_TIMESTAMP WHERE id = \
         $2 RETURNING *",
    )
    .bind(amount)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(SettlementError::OrderNotFound(id))
}

/// Marks the order as paid. Only a pending order is flipped, so replayed notifications leave
/// the row alone; the current row is returned either way.
pub(crate) async fn mark_order_paid(
    id: i64,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementError> {
    sqlx::query(
        "UPDATE orders SET status = 'Paid', paid_at = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = \
         'PendingPayment'",
    )
    .bind(paid_at)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    fetch_order_by_id(id, conn).await?.ok_or(SettlementError::OrderNotFound(id))
}
