use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{InventoryUnit, NewInventoryUnit, StockCountRow};

pub async fn insert_inventory_unit(
    unit: NewInventoryUnit,
    conn: &mut SqliteConnection,
) -> Result<InventoryUnit, sqlx::Error> {
    let inserted: InventoryUnit = sqlx::query_as(
        r#"
            INSERT INTO inventory_units (
                product_id,
                sku_id,
                secret,
                status
            ) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(unit.product_id)
    .bind(unit.sku_id)
    .bind(&unit.secret)
    .bind(unit.status)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Inventory unit {} added to product {} (SKU {})", inserted.id, inserted.product_id, inserted.sku_id);
    Ok(inserted)
}

/// Counts the inventory units of all the given products in one grouped query. Products with
/// no units simply produce no rows.
pub async fn count_units_by_status(
    product_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<StockCountRow>, sqlx::Error> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new(
        "SELECT product_id, sku_id, status, COUNT(*) AS count FROM inventory_units WHERE product_id IN (",
    );
    let mut ids = builder.separated(", ");
    for id in product_ids {
        ids.push_bind(*id);
    }
    builder.push(") GROUP BY product_id, sku_id, status");
    trace!("📝️ Executing query: {}", builder.sql());
    let rows = builder.build_query_as::<StockCountRow>().fetch_all(conn).await?;
    Ok(rows)
}
