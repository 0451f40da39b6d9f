use std::sync::{atomic::AtomicI32, Arc};

use chrono::{TimeZone, Utc};
use log::*;
use serde_json::{json, Map, Value};
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;
use vendo_common::{Money, PaymentStatus};
use vendo_gateways::{sign_payload, stripe, InitiationData, ProviderType};
use vendo_payment_engine::{
    db_types::{
        NewOrder,
        NewPaymentChannel,
        NewWalletRecharge,
        Order,
        OrderStatus,
        Payment,
        PaymentChannel,
        RechargeStatus,
        WalletTxType,
    },
    events::{EventHandlers, EventHooks},
    payment_objects::IngestOutcome,
    traits::CallbackInput,
    PaymentFlowApi,
    SettlementDatabase,
    SqliteDatabase,
    WalletLedger,
};

use crate::support::prepare_env::prepare_test_env;

mod support;

const TOKENPAY_SECRET: &str = "tp-notify-secret";
const EPUSDT_TOKEN: &str = "ep-auth-token";
const STRIPE_WEBHOOK_SECRET: &str = "whsec_settlement_tests";

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

async fn seed_order(db: &SqliteDatabase, order_no: &str, user_id: i64, total_cents: i64) -> Order {
    db.insert_order(NewOrder::new(order_no, user_id, Money::from_cents(total_cents)))
        .await
        .expect("Error inserting order")
}

async fn tokenpay_channel(db: &SqliteDatabase) -> PaymentChannel {
    let config = json!({
        "gateway_url": "http://127.0.0.1:9",
        "notify_secret": TOKENPAY_SECRET,
        "currency": "USDT",
        "notify_url": "http://localhost/callbacks/tokenpay",
        "redirect_url": "http://localhost/orders",
        "base_currency": "USD",
    });
    let channel = NewPaymentChannel::new("TokenPay USDT", ProviderType::Tokenpay, "USDT").with_config(&config);
    db.insert_channel(channel).await.expect("Error inserting channel")
}

async fn epusdt_channel(db: &SqliteDatabase, fee_rate_bps: i64) -> PaymentChannel {
    let config = json!({
        "gateway_url": "http://127.0.0.1:9",
        "auth_token": EPUSDT_TOKEN,
        "notify_url": "http://localhost/callbacks/epusdt",
        "return_url": "http://localhost/orders",
        "fiat": "USD",
    });
    let channel = NewPaymentChannel::new("EPUSDT TRC20", ProviderType::Epusdt, "usdt.trc20")
        .with_config(&config)
        .with_fee_rate_bps(fee_rate_bps);
    db.insert_channel(channel).await.expect("Error inserting channel")
}

async fn stripe_channel(db: &SqliteDatabase) -> PaymentChannel {
    let config = json!({
        "secret_key": "sk_test_settlement",
        "webhook_secret": STRIPE_WEBHOOK_SECRET,
        "success_url": "http://localhost/orders/success",
        "cancel_url": "http://localhost/orders/cancel",
    });
    let channel = NewPaymentChannel::new("Stripe Checkout", ProviderType::Stripe, "card").with_config(&config);
    db.insert_channel(channel).await.expect("Error inserting channel")
}

/// Creates the payment for an order and stores the provider handshake, without any network
/// round trip. This is the state a payment is in when a provider notification arrives.
async fn pending_order_payment(
    db: &SqliteDatabase,
    channel: &PaymentChannel,
    order: &Order,
    provider_ref: &str,
) -> Payment {
    let created = db.create_payment(order.id, channel.id, false).await.expect("Error creating payment");
    let payment = created.payment.expect("A provider payment was expected");
    let initiation = InitiationData { provider_ref: provider_ref.to_string(), ..Default::default() };
    db.attach_initiation(payment.id, &initiation).await.expect("Error attaching initiation data")
}

fn signed_tokenpay_body(payment_id: i64, provider_ref: &str, status: i64, amount: &str, secret: &str) -> Vec<u8> {
    let mut fields = Map::new();
    fields.insert("Id".into(), json!(provider_ref));
    fields.insert("OutOrderId".into(), json!(format!("VENDO-{payment_id}")));
    fields.insert("OrderUserKey".into(), json!("buyer-key"));
    fields.insert("Status".into(), json!(status));
    fields.insert("ActualAmount".into(), json!(amount));
    fields.insert("Amount".into(), json!(amount));
    fields.insert("BaseCurrency".into(), json!("USD"));
    fields.insert("Currency".into(), json!("USDT"));
    fields.insert("PayTime".into(), json!("2024-05-01 10:30:00"));
    fields.insert("PassThroughInfo".into(), json!(format!("payment_id={payment_id}")));
    let signature = sign_payload(&fields, secret);
    fields.insert("Signature".into(), json!(signature));
    serde_json::to_vec(&Value::Object(fields)).unwrap()
}

fn signed_epusdt_body(trade_id: &str, order_id: &str, status: i64, amount: &str, token: &str) -> Vec<u8> {
    let mut fields = Map::new();
    fields.insert("trade_id".into(), json!(trade_id));
    fields.insert("order_id".into(), json!(order_id));
    fields.insert("amount".into(), json!(amount));
    fields.insert("actual_amount".into(), json!("25.13"));
    fields.insert("token".into(), json!("TXhrze1kqQO5ZU4CPoxMrUxNvGnWu2AdN1"));
    fields.insert("block_transaction_id".into(), json!("0xdeadbeef"));
    fields.insert("status".into(), json!(status));
    let signature = sign_payload(&fields, token);
    fields.insert("signature".into(), json!(signature));
    serde_json::to_vec(&Value::Object(fields)).unwrap()
}

fn stripe_body(payment_id: i64, provider_ref: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_settlement_test",
        "type": "payment_intent.succeeded",
        "created": 1_714_558_200,
        "data": { "object": {
            "id": provider_ref,
            "object": "payment_intent",
            "status": "succeeded",
            "amount": 4200,
            "currency": "usd",
            "metadata": { "payment_id": payment_id.to_string() },
        }},
    }))
    .unwrap()
}

fn stripe_header(body: &[u8], timestamp: i64) -> String {
    let signature = stripe::compute_signature(STRIPE_WEBHOOK_SECRET, timestamp, body).unwrap();
    format!("t={timestamp},v1={signature}")
}

#[test]
fn a_verified_tokenpay_notification_settles_the_order() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = tokenpay_channel(&db).await;
        let order = seed_order(&db, "SO-3001", 301, 80_00).await;
        let payment = pending_order_payment(&db, &channel, &order, "tp-3001").await;

        let body = signed_tokenpay_body(payment.id, "tp-3001", 1, "80.00", TOKENPAY_SECRET);
        let ack = api.ingest_tokenpay_callback(&body).await;
        assert!(ack.success);
        assert_eq!(ack.body, "success");
        assert_eq!(ack.outcome, IngestOutcome::Settled);

        let payment = db.fetch_payment(payment.id).await.unwrap().expect("Payment disappeared");
        assert_eq!(payment.status, PaymentStatus::Success);
        let paid_at = payment.paid_at.expect("paid_at was not recorded");
        assert_eq!(paid_at, Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap());
        assert!(payment.payload.is_some());
        let order = db.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.online_paid_amount, Money::from_cents(80_00));

        // the provider redelivers: same ack, nothing double-counted
        let ack = api.ingest_tokenpay_callback(&body).await;
        assert!(ack.success);
        assert_eq!(ack.outcome, IngestOutcome::Ignored);
        let order = db.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.online_paid_amount, Money::from_cents(80_00));
        tear_down(db).await;
    });
    info!("🔄️ a_verified_tokenpay_notification_settles_the_order complete");
}

#[test]
fn tampered_signatures_are_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = tokenpay_channel(&db).await;
        let order = seed_order(&db, "SO-3002", 302, 40_00).await;
        let payment = pending_order_payment(&db, &channel, &order, "tp-3002").await;

        let body = signed_tokenpay_body(payment.id, "tp-3002", 1, "40.00", "some-other-secret");
        let ack = api.ingest_tokenpay_callback(&body).await;
        assert!(!ack.success);
        assert_eq!(ack.body, "fail");
        assert!(matches!(ack.outcome, IngestOutcome::Rejected(_)));
        let payment = db.fetch_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        tear_down(db).await;
    });
}

#[test]
fn notifications_for_unknown_payments_ask_for_a_retry() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        tokenpay_channel(&db).await;

        // nothing carries this reference yet; the fail token keeps the provider retrying
        // until the initiation data lands
        let body = signed_tokenpay_body(0, "tp-nothing", 1, "10.00", TOKENPAY_SECRET);
        let ack = api.ingest_tokenpay_callback(&body).await;
        assert!(!ack.success);
        assert_eq!(ack.body, "fail");
        assert_eq!(ack.outcome, IngestOutcome::NotAMatch);

        // bodies from another world are not matches either
        let ack = api.ingest_tokenpay_callback(b"certainly-not-json").await;
        assert!(!ack.success);
        assert_eq!(ack.outcome, IngestOutcome::NotAMatch);
        tear_down(db).await;
    });
}

#[test]
fn non_final_statuses_settle_nothing() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = tokenpay_channel(&db).await;
        let order = seed_order(&db, "SO-3003", 303, 20_00).await;
        let payment = pending_order_payment(&db, &channel, &order, "tp-3003").await;

        let body = signed_tokenpay_body(payment.id, "tp-3003", 0, "20.00", TOKENPAY_SECRET);
        let ack = api.ingest_tokenpay_callback(&body).await;
        assert!(ack.success, "Progress reports are acknowledged, not retried");
        assert_eq!(ack.outcome, IngestOutcome::Ignored);
        let payment = db.fetch_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        tear_down(db).await;
    });
}

#[test]
fn notifications_for_the_wrong_provider_are_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = stripe_channel(&db).await;
        let order = seed_order(&db, "SO-3004", 304, 25_00).await;
        let payment = pending_order_payment(&db, &channel, &order, "pi_3004").await;

        // a TokenPay-shaped notification naming a payment on a Stripe channel
        let body = signed_tokenpay_body(payment.id, "tp-impostor", 1, "25.00", TOKENPAY_SECRET);
        let ack = api.ingest_tokenpay_callback(&body).await;
        assert!(!ack.success);
        assert!(matches!(ack.outcome, IngestOutcome::Rejected(_)));
        let payment = db.fetch_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        tear_down(db).await;
    });
}

#[test]
fn a_verified_epusdt_notification_credits_the_wallet() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = epusdt_channel(&db, 200).await;
        let result = db
            .create_wallet_recharge(NewWalletRecharge::new(402, &channel, Money::from_cents(25_00), "Top-up"))
            .await
            .expect("Error creating recharge");
        let initiation = InitiationData { provider_ref: "ep-4002".into(), ..Default::default() };
        db.attach_initiation(result.payment.id, &initiation).await.expect("Error attaching initiation data");

        let body = signed_epusdt_body("ep-4002", &result.recharge.recharge_no, 2, "25.50", EPUSDT_TOKEN);
        let ack = api.ingest_epusdt_callback(&body).await;
        assert!(ack.success);
        assert_eq!(ack.body, "ok");
        assert_eq!(ack.outcome, IngestOutcome::Settled);

        let recharge = db.fetch_recharge(&result.recharge.recharge_no).await.unwrap().expect("Recharge disappeared");
        assert_eq!(recharge.status, RechargeStatus::Success);
        assert!(recharge.paid_at.is_some());
        // the wallet is credited the recharge amount, not the fee-inclusive payable amount
        assert_eq!(db.fetch_wallet_account(402).await.unwrap().unwrap().balance, Money::from_cents(25_00));
        let history = db.fetch_wallet_history(402, 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_type, WalletTxType::Recharge);
        assert_eq!(history[0].reference, recharge.recharge_no);
        tear_down(db).await;
    });
}

#[test]
fn provider_failures_propagate_to_the_recharge() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = epusdt_channel(&db, 0).await;
        let result = db
            .create_wallet_recharge(NewWalletRecharge::new(403, &channel, Money::from_cents(10_00), "Top-up"))
            .await
            .expect("Error creating recharge");

        let input = CallbackInput {
            payment_id: result.payment.id,
            status: PaymentStatus::Failed,
            provider_ref: Some("ep-4003".into()),
            paid_at: None,
            payload: "{}".into(),
        };
        let settled = api.handle_callback(input).await.expect("Error applying callback");
        assert!(settled.changed);
        assert_eq!(settled.payment.status, PaymentStatus::Failed);
        let recharge = settled.recharge.expect("The recharge should ride along");
        assert_eq!(recharge.status, RechargeStatus::Failed);
        assert!(recharge.paid_at.is_none());
        // no credit on failure
        assert!(db.fetch_wallet_account(403).await.unwrap().is_none());
        tear_down(db).await;
    });
}

#[test]
fn stripe_webhooks_settle_when_the_signature_is_fresh() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = stripe_channel(&db).await;
        let order = seed_order(&db, "SO-3005", 305, 42_00).await;
        let payment = pending_order_payment(&db, &channel, &order, "pi_3005").await;

        let body = stripe_body(payment.id, "pi_3005");
        let header = stripe_header(&body, Utc::now().timestamp());
        let ack = api.ingest_stripe_webhook(Some(&header), &body).await;
        assert!(ack.success);
        assert!(ack.body.is_empty(), "Stripe reads the HTTP status, not a token");
        assert_eq!(ack.outcome, IngestOutcome::Settled);

        let payment = db.fetch_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        let order = db.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.online_paid_amount, Money::from_cents(42_00));
        tear_down(db).await;
    });
}

#[test]
fn stale_stripe_signatures_are_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = stripe_channel(&db).await;
        let order = seed_order(&db, "SO-3006", 306, 30_00).await;
        let payment = pending_order_payment(&db, &channel, &order, "pi_3006").await;

        let body = stripe_body(payment.id, "pi_3006");
        let stale = Utc::now().timestamp() - 301;
        let header = stripe_header(&body, stale);
        let ack = api.ingest_stripe_webhook(Some(&header), &body).await;
        assert!(!ack.success);
        assert!(matches!(ack.outcome, IngestOutcome::Rejected(_)));

        // a missing header is no better
        let ack = api.ingest_stripe_webhook(None, &body).await;
        assert!(!ack.success);
        let payment = db.fetch_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
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

async fn wait_for_count(event: &HookCalled, expected: i32) {
    for _ in 0..50 {
        if event.count() >= expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

#[test]
fn the_settled_hook_fires_exactly_once() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let rt = Runtime::new().unwrap();
    let event = HookCalled::default();
    let event_copy = event.clone();
    let event_waiter = event.clone();
    rt.block_on(async move {
        let db = prepare_test_env().await;
        let mut hooks = EventHooks::default();
        hooks.on_payment_settled(move |ev| {
            info!("🪝️ Payment {} settled", ev.payment.id);
            event_copy.called();
            Box::pin(async {})
        });
        let handlers = EventHandlers::new(10, hooks);
        let api = PaymentFlowApi::new(db.clone(), handlers.producers());
        handlers.start_handlers().await;

        let channel = tokenpay_channel(&db).await;
        let order = seed_order(&db, "SO-3007", 307, 15_00).await;
        let payment = pending_order_payment(&db, &channel, &order, "tp-3007").await;
        let body = signed_tokenpay_body(payment.id, "tp-3007", 1, "15.00", TOKENPAY_SECRET);
        let ack = api.ingest_tokenpay_callback(&body).await;
        assert_eq!(ack.outcome, IngestOutcome::Settled);
        // a replay fires nothing
        let ack = api.ingest_tokenpay_callback(&body).await;
        assert_eq!(ack.outcome, IngestOutcome::Ignored);
        wait_for_count(&event_waiter, 1).await;
        tear_down(db).await;
    });
    assert_eq!(event.count(), 1);
    info!("🪝️ the_settled_hook_fires_exactly_once complete");
}
