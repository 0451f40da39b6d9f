use std::fmt::Debug;

use log::debug;
use vendo_common::Money;

use crate::{
    db_types::{InventoryUnit, NewInventoryUnit, NewSku, ProductSku, ProductStock},
    traits::{StockError, StockManagement},
};

/// `StockApi` keeps simple products on a single active SKU and counts stock from the
/// inventory units on demand.
#[derive(Clone)]
pub struct StockApi<B> {
    db: B,
}

impl<B: Debug> Debug for StockApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StockApi ({:?})", self.db)
    }
}

impl<B> StockApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> StockApi<B>
where B: StockManagement
{
    pub async fn insert_sku(&self, sku: NewSku) -> Result<ProductSku, StockError> {
        self.db.insert_sku(sku).await
    }

    pub async fn fetch_skus_for_product(&self, product_id: i64) -> Result<Vec<ProductSku>, StockError> {
        self.db.fetch_skus_for_product(product_id).await
    }

    pub async fn insert_inventory_unit(&self, unit: NewInventoryUnit) -> Result<InventoryUnit, StockError> {
        self.db.insert_inventory_unit(unit).await
    }

    /// Collapses a simple product back onto one active SKU carrying the given price, manual
    /// stock and active flag. Administrative edits can transiently leave several SKUs active;
    /// this is the repair path, run after every product save.
    pub async fn sync_single_active_sku(
        &self,
        product_id: i64,
        price: Money,
        stock: i64,
        active: bool,
    ) -> Result<ProductSku, StockError> {
        let sku = self.db.sync_single_active_sku(product_id, price, stock, active).await?;
        debug!("Product {product_id} collapsed onto SKU [{}] ({})", sku.id, sku.sku_code);
        Ok(sku)
    }

    /// The given products with per-SKU and per-product stock counters filled in from one
    /// grouped count over their inventory units.
    pub async fn fetch_product_stock(&self, product_ids: &[i64]) -> Result<Vec<ProductStock>, StockError> {
        self.db.fetch_product_stock(product_ids).await
    }
}
