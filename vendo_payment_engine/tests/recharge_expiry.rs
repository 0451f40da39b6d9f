use std::sync::{atomic::AtomicI32, Arc};

use log::*;
use serde_json::json;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;
use vendo_common::{Money, PaymentStatus};
use vendo_gateways::{InitiationData, ProviderType};
use vendo_payment_engine::{
    db_types::{NewOrder, NewPaymentChannel, NewWalletRecharge, PaymentChannel, RechargeStatus},
    events::{EventHandlers, EventHooks},
    traits::CallbackInput,
    PaymentFlowApi,
    PaymentFlowError,
    SettlementDatabase,
    SettlementError,
    SqliteDatabase,
    WalletLedger,
};

use crate::support::prepare_env::prepare_test_env;

mod support;

async fn setup() -> (PaymentFlowApi<SqliteDatabase>, SqliteDatabase) {
    let db = prepare_test_env().await;
    (PaymentFlowApi::new(db.clone(), Default::default()), db)
}

async fn tear_down(mut db: SqliteDatabase) {
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(db.url()).await.unwrap();
}

async fn epusdt_channel(db: &SqliteDatabase) -> PaymentChannel {
    let config = json!({
        "gateway_url": "http://127.0.0.1:9",
        "auth_token": "ep-auth-token",
        "notify_url": "http://localhost/callbacks/epusdt",
        "return_url": "http://localhost/orders",
        "fiat": "USD",
    });
    let channel = NewPaymentChannel::new("EPUSDT TRC20", ProviderType::Epusdt, "usdt.trc20").with_config(&config);
    db.insert_channel(channel).await.expect("Error inserting channel")
}

/// A pending top-up the reaper is allowed to act on.
async fn abandoned_recharge(db: &SqliteDatabase, user_id: i64, provider_ref: &str) -> i64 {
    let channel = epusdt_channel(db).await;
    let result = db
        .create_wallet_recharge(NewWalletRecharge::new(user_id, &channel, Money::from_cents(20_00), "Top-up"))
        .await
        .expect("Error creating recharge");
    let initiation = InitiationData { provider_ref: provider_ref.to_string(), ..Default::default() };
    db.attach_initiation(result.payment.id, &initiation).await.expect("Error attaching initiation data");
    result.payment.id
}

#[test]
fn bad_ids_are_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let err = api.expire_wallet_recharge_payment(0).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Settlement(SettlementError::PaymentInvalid(_))));
        let err = api.expire_wallet_recharge_payment(-5).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Settlement(SettlementError::PaymentInvalid(_))));
        let err = api.expire_wallet_recharge_payment(99_999).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Settlement(SettlementError::PaymentNotFound(99_999))));
        tear_down(db).await;
    });
}

#[test]
fn order_payments_are_not_reaped() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = epusdt_channel(&db).await;
        let order = db
            .insert_order(NewOrder::new("SO-5001", 501, Money::from_cents(35_00)))
            .await
            .expect("Error inserting order");
        let created = db.create_payment(order.id, channel.id, false).await.expect("Error creating payment");
        let payment = created.payment.expect("A provider payment was expected");

        let expiry = api.expire_wallet_recharge_payment(payment.id).await.expect("Error running the reaper");
        assert!(!expiry.expired_now);
        assert!(expiry.recharge.is_none());
        assert_eq!(expiry.payment.status, PaymentStatus::Initiated);
        tear_down(db).await;
    });
}

#[test]
fn payments_without_a_recharge_are_flagged() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let payment_id = abandoned_recharge(&db, 502, "ep-5002").await;
        sqlx::query("DELETE FROM wallet_recharge_orders WHERE payment_id = $1")
            .bind(payment_id)
            .execute(db.pool())
            .await
            .expect("Error orphaning the payment");

        let err = api.expire_wallet_recharge_payment(payment_id).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Settlement(SettlementError::WalletRechargeNotFound(_))));
        tear_down(db).await;
    });
}

#[test]
fn abandoned_recharges_expire_once() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let payment_id = abandoned_recharge(&db, 503, "ep-5003").await;

        let expiry = api.expire_wallet_recharge_payment(payment_id).await.expect("Error running the reaper");
        assert!(expiry.expired_now);
        assert_eq!(expiry.payment.status, PaymentStatus::Expired);
        assert!(expiry.payment.expired_at.is_some());
        let recharge = expiry.recharge.expect("The recharge should ride along");
        assert_eq!(recharge.status, RechargeStatus::Expired);

        // replays find a terminal pair and do nothing
        let expiry = api.expire_wallet_recharge_payment(payment_id).await.expect("Error running the reaper");
        assert!(!expiry.expired_now);
        assert_eq!(expiry.payment.status, PaymentStatus::Expired);
        assert_eq!(expiry.recharge.unwrap().status, RechargeStatus::Expired);
        tear_down(db).await;
    });
    info!("⏳️ abandoned_recharges_expire_once complete");
}

#[test]
fn settled_recharges_are_left_alone() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let payment_id = abandoned_recharge(&db, 504, "ep-5004").await;
        let input = CallbackInput {
            payment_id,
            status: PaymentStatus::Success,
            provider_ref: None,
            paid_at: None,
            payload: "{}".into(),
        };
        let settled = api.handle_callback(input).await.expect("Error applying callback");
        assert!(settled.changed);
        assert_eq!(db.fetch_wallet_account(504).await.unwrap().unwrap().balance, Money::from_cents(20_00));

        let expiry = api.expire_wallet_recharge_payment(payment_id).await.expect("Error running the reaper");
        assert!(!expiry.expired_now);
        assert_eq!(expiry.payment.status, PaymentStatus::Success);
        assert_eq!(expiry.recharge.unwrap().status, RechargeStatus::Success);
        // the credit stands
        assert_eq!(db.fetch_wallet_account(504).await.unwrap().unwrap().balance, Money::from_cents(20_00));
        tear_down(db).await;
    });
}

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[test]
fn the_annulled_hook_fires_when_a_recharge_expires() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let rt = Runtime::new().unwrap();
    let event = HookCalled::default();
    let event_copy = event.clone();
    let event_waiter = event.clone();
    rt.block_on(async move {
        let db = prepare_test_env().await;
        let mut hooks = EventHooks::default();
        hooks.on_payment_annulled(move |ev| {
            info!("🪝️ Payment {} annulled", ev.payment.id);
            event_copy.called();
            Box::pin(async {})
        });
        let handlers = EventHandlers::new(10, hooks);
        let api = PaymentFlowApi::new(db.clone(), handlers.producers());
        handlers.start_handlers().await;

        let payment_id = abandoned_recharge(&db, 505, "ep-5005").await;
        let expiry = api.expire_wallet_recharge_payment(payment_id).await.expect("Error running the reaper");
        assert!(expiry.expired_now);
        // a replay fires nothing
        let expiry = api.expire_wallet_recharge_payment(payment_id).await.expect("Error running the reaper");
        assert!(!expiry.expired_now);

        for _ in 0..50 {
            if event_waiter.count() >= 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        tear_down(db).await;
    });
    assert_eq!(event.count(), 1);
    info!("🪝️ the_annulled_hook_fires_when_a_recharge_expires complete");
}
