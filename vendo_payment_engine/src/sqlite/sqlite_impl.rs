//! `SqliteDatabase` is a concrete implementation of a Vendo payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
//!
//! [`traits`]: crate::traits
use std::{cmp::min, fmt::Debug};

use chrono::Utc;
use log::*;
use sqlx::SqlitePool;
use vendo_common::{Money, PaymentStatus};
use vendo_gateways::{InitiationData, ProviderType};

use super::db::{channels, db_url, inventory, new_pool, orders, payments, recharges, skus, wallets};
use crate::{
    db_types::{
        InventoryUnit,
        NewInventoryUnit,
        NewOrder,
        NewPayment,
        NewPaymentChannel,
        NewSku,
        NewWalletRecharge,
        Order,
        OrderStatus,
        Payment,
        PaymentChannel,
        ProductSku,
        ProductStock,
        RechargeStatus,
        StockCountRow,
        WalletAccount,
        WalletRechargeOrder,
        WalletTransaction,
        WalletTxType,
        DEFAULT_SKU_CODE,
        WALLET_CHANNEL_ID,
    },
    helpers::apply_stock_counts,
    traits::{
        CallbackInput,
        CreatePaymentResult,
        RechargeExpiry,
        RechargeResult,
        SettlementDatabase,
        SettlementError,
        SettlementResult,
        StockError,
        StockManagement,
        WalletLedger,
        WalletLedgerError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_id(order_id, &mut conn).await?)
    }

    async fn fetch_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_no(order_no, &mut conn).await?)
    }

    async fn insert_channel(&self, channel: NewPaymentChannel) -> Result<PaymentChannel, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(channels::insert_channel(channel, &mut conn).await?)
    }

    async fn fetch_channel(&self, channel_id: i64) -> Result<Option<PaymentChannel>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(channels::fetch_channel_by_id(channel_id, &mut conn).await?)
    }

    async fn fetch_active_channels(&self) -> Result<Vec<PaymentChannel>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(channels::fetch_active_channels(&mut conn).await?)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_id(payment_id, &mut conn).await?)
    }

    async fn fetch_payment_by_provider_ref(
        &self,
        provider_type: ProviderType,
        provider_ref: &str,
    ) -> Result<Option<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_latest_payment_by_provider_ref(provider_type, provider_ref, &mut conn).await?)
    }

    async fn create_payment(
        &self,
        order_id: i64,
        channel_id: i64,
        use_wallet_balance: bool,
    ) -> Result<CreatePaymentResult, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or(SettlementError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::PendingPayment {
            return Err(SettlementError::PaymentInvalid(format!(
                "Order [{}] is {} and cannot take payments",
                order.order_no, order.status
            )));
        }
        let due = order.due_amount();
        let balance = if use_wallet_balance {
            wallets::fetch_wallet_account(order.user_id, &mut tx).await?.map(|a| a.balance).unwrap_or_default()
        } else {
            Money::default()
        };
        let wallet_share = min(balance, due);
        let remaining = due - wallet_share;
        if channel_id == WALLET_CHANNEL_ID && !remaining.is_zero() {
            return Err(SettlementError::InsufficientFunds {
                user_id: order.user_id,
                requested: due,
                available: balance,
            });
        }
        if !wallet_share.is_zero() {
            wallets::debit(
                order.user_id,
                wallet_share,
                WalletTxType::OrderPayment,
                &order.order_no,
                "Wallet share of order payment",
                &mut tx,
            )
            .await?;
            order = orders::add_wallet_paid(order.id, wallet_share, &mut tx).await?;
            debug!("🗃️ Debited {wallet_share} from user {}'s wallet for order [{}]", order.user_id, order.order_no);
        }
        if remaining.is_zero() {
            if !wallet_share.is_zero() {
                payments::insert_payment(NewPayment::wallet_settlement(&order, wallet_share), &mut tx).await?;
            }
            let order = orders::mark_order_paid(order.id, Utc::now(), &mut tx).await?;
            tx.commit().await?;
            info!("🗃️ Order [{}] fully covered by the wallet balance and marked paid", order.order_no);
            return Ok(CreatePaymentResult::settled_from_wallet(order, wallet_share));
        }
        let channel = channels::fetch_channel_by_id(channel_id, &mut tx)
            .await?
            .filter(|c| c.is_active)
            .ok_or(SettlementError::ChannelNotAvailable(channel_id))?;
        let payment =
            payments::insert_payment(NewPayment::for_channel(Some(order.id), &channel, remaining, &order.currency), &mut tx)
                .await?;
        tx.commit().await?;
        info!(
            "🗃️ Payment {} created for order [{}]: {remaining} due via {} after {wallet_share} from the wallet",
            payment.id, order.order_no, channel.name
        );
        Ok(CreatePaymentResult::awaiting_provider(order, wallet_share, payment))
    }

    async fn create_wallet_recharge(&self, recharge: NewWalletRecharge) -> Result<RechargeResult, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::insert_payment(NewPayment::for_recharge(&recharge), &mut tx).await?;
        let recharge = recharges::insert_recharge(recharge, payment.id, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Recharge [{}] created for user {}: {} to pay, {} to credit",
            recharge.recharge_no, recharge.user_id, recharge.payable_amount, recharge.amount
        );
        Ok(RechargeResult { payment, recharge })
    }

    async fn attach_initiation(
        &self,
        payment_id: i64,
        initiation: &InitiationData,
    ) -> Result<Payment, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let provider_ref = (!initiation.provider_ref.is_empty()).then_some(initiation.provider_ref.as_str());
        let payload = initiation.raw.to_string();
        let payment = payments::attach_initiation(payment_id, provider_ref, &payload, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment {} holds initiation data and is now {}", payment.id, payment.status);
        Ok(payment)
    }

    async fn apply_payment_callback(&self, input: &CallbackInput) -> Result<SettlementResult, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let current = payments::fetch_payment_by_id(input.payment_id, &mut tx)
            .await?
            .ok_or(SettlementError::PaymentNotFound(input.payment_id))?;
        if current.status.is_terminal() {
            debug!("🗃️ Payment {} is already {}. Notification ignored", current.id, current.status);
            return Ok(SettlementResult::unchanged(current));
        }
        if !input.status.is_terminal() {
            debug!("🗃️ Notification for payment {} carries non-final status {}. Nothing to do", current.id, input.status);
            return Ok(SettlementResult::unchanged(current));
        }
        let paid_at = (input.status == PaymentStatus::Success).then(|| input.paid_at.unwrap_or_else(Utc::now));
        let payment = payments::update_payment_from_callback(input, paid_at, &mut tx).await?;
        let mut order = None;
        let mut recharge = None;
        match (payment.status, payment.order_id) {
            (PaymentStatus::Success, Some(order_id)) => {
                orders::add_online_paid(order_id, payment.amount, &mut tx).await?;
                let updated = orders::mark_order_paid(order_id, paid_at.unwrap_or_else(Utc::now), &mut tx).await?;
                info!("🗃️ Order [{}] settled by payment {} for {}", updated.order_no, payment.id, payment.amount);
                order = Some(updated);
            },
            (PaymentStatus::Success, None) => {
                let pending = recharges::fetch_recharge_by_payment_id(payment.id, &mut tx)
                    .await?
                    .ok_or(SettlementError::WalletRechargeNotFound(payment.id))?;
                let updated =
                    recharges::update_recharge_status(pending.id, RechargeStatus::Success, paid_at, &mut tx).await?;
                wallets::credit(
                    updated.user_id,
                    updated.amount,
                    WalletTxType::Recharge,
                    &updated.recharge_no,
                    "Wallet recharge",
                    &mut tx,
                )
                .await?;
                info!(
                    "🗃️ Recharge [{}] settled by payment {}. {} credited to user {}",
                    updated.recharge_no, payment.id, updated.amount, updated.user_id
                );
                recharge = Some(updated);
            },
            (PaymentStatus::Failed | PaymentStatus::Expired, _) => {
                if let Some(pending) = recharges::fetch_recharge_by_payment_id(payment.id, &mut tx).await? {
                    let status = if payment.status == PaymentStatus::Failed {
                        RechargeStatus::Failed
                    } else {
                        RechargeStatus::Expired
                    };
                    recharge = Some(recharges::update_recharge_status(pending.id, status, None, &mut tx).await?);
                }
                info!("🗃️ Payment {} closed as {}", payment.id, payment.status);
            },
            _ => {},
        }
        tx.commit().await?;
        Ok(SettlementResult { changed: true, payment, order, recharge })
    }

    async fn expire_wallet_recharge_payment(&self, payment_id: i64) -> Result<RechargeExpiry, SettlementError> {
        if payment_id <= 0 {
            return Err(SettlementError::PaymentInvalid(format!("Payment id must be positive. Got {payment_id}")));
        }
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_payment_by_id(payment_id, &mut tx)
            .await?
            .ok_or(SettlementError::PaymentNotFound(payment_id))?;
        if payment.order_id.is_some() {
            debug!("🗃️ Payment {} belongs to an order. The recharge reaper leaves it alone", payment.id);
            return Ok(RechargeExpiry::unchanged(payment, None));
        }
        let recharge = recharges::fetch_recharge_by_payment_id(payment.id, &mut tx)
            .await?
            .ok_or(SettlementError::WalletRechargeNotFound(payment.id))?;
        let reapable = matches!(payment.status, PaymentStatus::Initiated | PaymentStatus::Pending) &&
            recharge.status == RechargeStatus::Pending;
        if !reapable {
            debug!(
                "🗃️ Recharge [{}] is already settled (payment {}, recharge {}). Nothing to expire",
                recharge.recharge_no, payment.status, recharge.status
            );
            return Ok(RechargeExpiry::unchanged(payment, Some(recharge)));
        }
        let payment = payments::mark_payment_expired(payment.id, Utc::now(), &mut tx).await?;
        let recharge = recharges::update_recharge_status(recharge.id, RechargeStatus::Expired, None, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Recharge [{}] expired along with payment {}", recharge.recharge_no, payment.id);
        Ok(RechargeExpiry { expired_now: true, payment, recharge: Some(recharge) })
    }

    async fn fetch_recharge(&self, recharge_no: &str) -> Result<Option<WalletRechargeOrder>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(recharges::fetch_recharge_by_no(recharge_no, &mut conn).await?)
    }

    async fn fetch_recharge_for_payment(
        &self,
        payment_id: i64,
    ) -> Result<Option<WalletRechargeOrder>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(recharges::fetch_recharge_by_payment_id(payment_id, &mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

impl WalletLedger for SqliteDatabase {
    async fn fetch_wallet_account(&self, user_id: i64) -> Result<Option<WalletAccount>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::fetch_wallet_account(user_id, &mut conn).await?)
    }

    async fn credit_wallet(
        &self,
        user_id: i64,
        amount: Money,
        tx_type: WalletTxType,
        reference: &str,
        remark: &str,
    ) -> Result<WalletAccount, WalletLedgerError> {
        let mut tx = self.pool.begin().await?;
        let account = wallets::credit(user_id, amount, tx_type, reference, remark, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn debit_wallet(
        &self,
        user_id: i64,
        amount: Money,
        tx_type: WalletTxType,
        reference: &str,
        remark: &str,
    ) -> Result<WalletAccount, WalletLedgerError> {
        let mut tx = self.pool.begin().await?;
        let account = wallets::debit(user_id, amount, tx_type, reference, remark, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn fetch_wallet_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::fetch_history(user_id, limit, &mut conn).await?)
    }
}

impl StockManagement for SqliteDatabase {
    async fn insert_sku(&self, sku: NewSku) -> Result<ProductSku, StockError> {
        let mut conn = self.pool.acquire().await?;
        skus::insert_sku(sku, &mut conn).await
    }

    async fn fetch_skus_for_product(&self, product_id: i64) -> Result<Vec<ProductSku>, StockError> {
        let mut conn = self.pool.acquire().await?;
        Ok(skus::fetch_skus_for_product(product_id, &mut conn).await?)
    }

    async fn insert_inventory_unit(&self, unit: NewInventoryUnit) -> Result<InventoryUnit, StockError> {
        let mut conn = self.pool.acquire().await?;
        Ok(inventory::insert_inventory_unit(unit, &mut conn).await?)
    }

    async fn count_inventory_units(&self, product_ids: &[i64]) -> Result<Vec<StockCountRow>, StockError> {
        let mut conn = self.pool.acquire().await?;
        Ok(inventory::count_units_by_status(product_ids, &mut conn).await?)
    }

    async fn sync_single_active_sku(
        &self,
        product_id: i64,
        price: Money,
        stock: i64,
        active: bool,
    ) -> Result<ProductSku, StockError> {
        let mut tx = self.pool.begin().await?;
        let existing = skus::fetch_skus_for_product(product_id, &mut tx).await?;
        let target = existing
            .iter()
            .find(|s| s.is_active)
            .or_else(|| existing.iter().find(|s| s.sku_code == DEFAULT_SKU_CODE))
            .or_else(|| existing.first());
        let synced = match target {
            None => {
                let fresh = NewSku {
                    is_active: active,
                    manual_stock_total: stock,
                    ..NewSku::new(product_id, DEFAULT_SKU_CODE, price)
                };
                let sku = skus::insert_sku(fresh, &mut tx).await?;
                info!("🗃️ Product {product_id} had no SKUs. Created default SKU {}", sku.id);
                sku
            },
            Some(t) => {
                let sku = skus::update_sku_for_sync(t.id, price, stock, active, &mut tx).await?;
                let deactivated = skus::deactivate_other_skus(product_id, sku.id, &mut tx).await?;
                if deactivated > 0 {
                    debug!("🗃️ Deactivated {deactivated} other SKU(s) of product {product_id}");
                }
                sku
            },
        };
        tx.commit().await?;
        Ok(synced)
    }

    async fn fetch_product_stock(&self, product_ids: &[i64]) -> Result<Vec<ProductStock>, StockError> {
        let mut conn = self.pool.acquire().await?;
        let skus = skus::fetch_skus_for_products(product_ids, &mut conn).await?;
        let counts = inventory::count_units_by_status(product_ids, &mut conn).await?;
        let mut products: Vec<ProductStock> = product_ids
            .iter()
            .map(|&product_id| {
                let skus = skus.iter().filter(|s| s.product_id == product_id).cloned().collect();
                ProductStock::new(product_id, skus)
            })
            .collect();
        apply_stock_counts(&mut products, &counts);
        Ok(products)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
