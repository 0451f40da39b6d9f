use thiserror::Error;
use vendo_common::Money;

use crate::db_types::{InventoryUnit, NewInventoryUnit, NewSku, ProductSku, ProductStock, StockCountRow};

#[derive(Debug, Clone, Error)]
pub enum StockError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert SKU, since code {sku_code} already exists for product {product_id}")]
    SkuAlreadyExists { product_id: i64, sku_code: String },
}

impl From<sqlx::Error> for StockError {
    fn from(e: sqlx::Error) -> Self {
        StockError::DatabaseError(e.to_string())
    }
}

/// The `StockManagement` trait defines behaviour for SKU maintenance and inventory counting.
///
/// Simple products keep exactly one active SKU; [`sync_single_active_sku`] upholds that shape
/// no matter what state the SKU rows are in. Stock levels are never stored: they are counted
/// from the inventory units on demand and folded onto the SKUs in memory.
///
/// [`sync_single_active_sku`]: StockManagement::sync_single_active_sku
#[allow(async_fn_in_trait)]
pub trait StockManagement: Clone {
    async fn insert_sku(&self, sku: NewSku) -> Result<ProductSku, StockError>;

    /// Fetches the product's SKUs ordered by `sort_order` then id. Stock counters on the
    /// returned rows are zero; use [`fetch_product_stock`] for filled-in counts.
    ///
    /// [`fetch_product_stock`]: StockManagement::fetch_product_stock
    async fn fetch_skus_for_product(&self, product_id: i64) -> Result<Vec<ProductSku>, StockError>;

    async fn insert_inventory_unit(&self, unit: NewInventoryUnit) -> Result<InventoryUnit, StockError>;

    /// One grouped count over the inventory units of all the given products: how many units
    /// each (product, SKU, status) combination has.
    async fn count_inventory_units(&self, product_ids: &[i64]) -> Result<Vec<StockCountRow>, StockError>;

    /// Upholds the single-active-SKU shape for a simple product, in one transaction:
    /// * the target is the active SKU with the lowest `(sort_order, id)`, else the SKU whose
    ///   code is the default code, else the lowest `(sort_order, id)` overall,
    /// * no SKUs at all inserts a fresh default-code SKU with the given values,
    /// * the target takes the given price, manual stock and active flag; every other SKU is
    ///   deactivated.
    async fn sync_single_active_sku(
        &self,
        product_id: i64,
        price: Money,
        stock: i64,
        active: bool,
    ) -> Result<ProductSku, StockError>;

    /// Fetches the SKUs of all the given products with their stock counters filled in from
    /// the grouped inventory count, plus per-product aggregates.
    async fn fetch_product_stock(&self, product_ids: &[i64]) -> Result<Vec<ProductStock>, StockError>;
}
