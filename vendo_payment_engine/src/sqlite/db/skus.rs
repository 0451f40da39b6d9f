use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};
use vendo_common::Money;

use crate::{
    db_types::{NewSku, ProductSku},
    traits::StockError,
};

pub async fn insert_sku(sku: NewSku, conn: &mut SqliteConnection) -> Result<ProductSku, StockError> {
    let result: Result<ProductSku, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO product_skus (
                product_id,
                sku_code,
                is_active,
                sort_order,
                price,
                manual_stock_total
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(sku.product_id)
    .bind(&sku.sku_code)
    .bind(sku.is_active)
    .bind(sku.sort_order)
    .bind(sku.price)
    .bind(sku.manual_stock_total)
    .fetch_one(conn)
    .await;
    match result {
        Ok(inserted) => {
            debug!("📝️ SKU [{}] inserted for product {} with id {}", inserted.sku_code, inserted.product_id, inserted.id);
            Ok(inserted)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(StockError::SkuAlreadyExists { product_id: sku.product_id, sku_code: sku.sku_code })
        },
        Err(e) => Err(e.into()),
    }
}

/// Fetches the product's SKUs in display order. Stock counters come back zeroed; the
/// reconciliation fold fills them in.
pub async fn fetch_skus_for_product(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductSku>, sqlx::Error> {
    let skus = sqlx::query_as("SELECT * FROM product_skus WHERE product_id = $1 ORDER BY sort_order, id")
        .bind(product_id)
        .fetch_all(conn)
        .await?;
    Ok(skus)
}

pub async fn fetch_skus_for_products(
    product_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductSku>, sqlx::Error> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM product_skus WHERE product_id IN (");
    let mut ids = builder.separated(", ");
    for id in product_ids {
        ids.push_bind(*id);
    }
    builder.push(") ORDER BY product_id, sort_order, id");
    let skus = builder.build_query_as::<ProductSku>().fetch_all(conn).await?;
    Ok(skus)
}

pub(crate) async fn update_sku_for_sync(
    id: i64,
    price: Money,
    stock: i64,
    active: bool,
    conn: &mut SqliteConnection,
) -> Result<ProductSku, StockError> {
    let result: Option<ProductSku> = sqlx::query_as(
        "UPDATE product_skus SET price = $1, manual_stock_total = $2, is_active = $3, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $4 RETURNING *",
    )
    .bind(price)
    .bind(stock)
    .bind(active)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| StockError::DatabaseError(format!("SKU {id} disappeared mid-sync")))
}

pub(crate) async fn deactivate_other_skus(
    product_id: i64,
    keep_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE product_skus SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE product_id = $1 AND id != $2 \
         AND is_active = 1",
    )
    .bind(product_id)
    .bind(keep_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
