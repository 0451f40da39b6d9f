use crate::db_types::{InventoryStatus, ProductStock, StockCountRow, DEFAULT_SKU_CODE, LEGACY_SKU_ID};

/// Folds grouped inventory counts onto the products' SKUs and aggregates.
///
/// Every row of a product lands in its aggregates. Rows carrying the legacy SKU id land on the
/// product's default-code SKU when one exists; rows whose SKU is unknown still count at the
/// product level. Products and SKUs without rows end up with explicit zeros.
pub fn apply_stock_counts(products: &mut [ProductStock], counts: &[StockCountRow]) {
    for product in products.iter_mut() {
        product.available = 0;
        product.locked = 0;
        product.sold = 0;
        for sku in product.skus.iter_mut() {
            sku.available = 0;
            sku.locked = 0;
            sku.sold = 0;
        }
        for row in counts.iter().filter(|c| c.product_id == product.product_id) {
            match row.status {
                InventoryStatus::Available => product.available += row.count,
                InventoryStatus::Reserved => product.locked += row.count,
                InventoryStatus::Used => product.sold += row.count,
            }
            let target = if row.sku_id == LEGACY_SKU_ID {
                product.skus.iter_mut().find(|s| s.sku_code == DEFAULT_SKU_CODE)
            } else {
                product.skus.iter_mut().find(|s| s.id == row.sku_id)
            };
            if let Some(sku) = target {
                match row.status {
                    InventoryStatus::Available => sku.available += row.count,
                    InventoryStatus::Reserved => sku.locked += row.count,
                    InventoryStatus::Used => sku.sold += row.count,
                }
            }
        }
        for sku in product.skus.iter_mut() {
            sku.total = sku.available + sku.locked + sku.sold;
        }
        product.total = product.available + product.locked + product.sold;
    }
}
