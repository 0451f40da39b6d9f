use log::*;
use serde_json::json;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;
use vendo_common::{Money, PaymentStatus};
use vendo_gateways::{InitiationData, ProviderType};
use vendo_payment_engine::{
    db_types::{
        InteractionMode,
        NewOrder,
        NewPaymentChannel,
        NewWalletRecharge,
        Order,
        OrderStatus,
        Payment,
        PaymentChannel,
        RechargeStatus,
        TxDirection,
        WalletTxType,
        WALLET_CHANNEL_ID,
    },
    events::EventProducers,
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
    (PaymentFlowApi::new(db.clone(), EventProducers::default()), db)
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

async fn seed_balance(db: &SqliteDatabase, user_id: i64, cents: i64) {
    db.credit_wallet(user_id, Money::from_cents(cents), WalletTxType::Adjustment, "seed", "Test balance")
        .await
        .expect("Error seeding wallet");
}

fn tokenpay_config() -> serde_json::Value {
    // port 9 is never listening, so provider round trips fail fast
    json!({
        "gateway_url": "http://127.0.0.1:9",
        "notify_secret": "tp-notify-secret",
        "currency": "USDT",
        "notify_url": "http://localhost/callbacks/tokenpay",
        "redirect_url": "http://localhost/orders",
        "base_currency": "USD",
    })
}

async fn tokenpay_channel(db: &SqliteDatabase, fee_rate_bps: i64) -> PaymentChannel {
    let channel = NewPaymentChannel::new("TokenPay USDT", ProviderType::Tokenpay, "USDT")
        .with_config(&tokenpay_config())
        .with_fee_rate_bps(fee_rate_bps);
    db.insert_channel(channel).await.expect("Error inserting channel")
}

#[test]
fn a_covering_wallet_balance_settles_the_order_inline() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        seed_balance(&db, 201, 100_00).await;
        let order = seed_order(&db, "SO-2001", 201, 60_00).await;
        let channel = tokenpay_channel(&db, 0).await;

        let created = api.create_payment(order.id, channel.id, true).await.expect("Error creating payment");
        assert!(created.order_paid);
        assert_eq!(created.wallet_debited, Money::from_cents(60_00));
        assert!(created.payment.is_none());
        assert!(created.initiation.is_none());

        let order = db.fetch_order(order.id).await.unwrap().expect("Order disappeared");
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.wallet_paid_amount, Money::from_cents(60_00));
        assert_eq!(order.online_paid_amount, Money::default());
        assert!(order.paid_at.is_some());
        assert_eq!(db.fetch_wallet_account(201).await.unwrap().unwrap().balance, Money::from_cents(40_00));

        // the debit is journalled against the order number
        let journal = db.fetch_wallet_history(201, 10).await.unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].direction, TxDirection::Debit);
        assert_eq!(journal[0].tx_type, WalletTxType::OrderPayment);
        assert_eq!(journal[0].amount, Money::from_cents(60_00));
        assert_eq!(journal[0].balance_after, Money::from_cents(40_00));
        assert_eq!(journal[0].reference, "SO-2001");

        // the synthesized settlement is recorded against the internal wallet channel
        let settlement: Payment = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1")
            .bind(order.id)
            .fetch_one(db.pool())
            .await
            .expect("Error fetching the synthesized payment");
        assert_eq!(settlement.status, PaymentStatus::Success);
        assert_eq!(settlement.channel_id, WALLET_CHANNEL_ID);
        assert_eq!(settlement.provider_type, ProviderType::Wallet);
        assert_eq!(settlement.amount, Money::from_cents(60_00));
        assert!(settlement.paid_at.is_some());
        tear_down(db).await;
    });
    info!("📦️ a_covering_wallet_balance_settles_the_order_inline complete");
}

#[test]
fn provider_failures_leave_the_initiated_payment_for_the_sweeps() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        seed_balance(&db, 202, 30_00).await;
        let order = seed_order(&db, "SO-2002", 202, 100_00).await;
        let channel = tokenpay_channel(&db, 150).await;

        let err = api.create_payment(order.id, channel.id, true).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Gateway(_)), "Expected a gateway error, got {err}");

        // the wallet share was committed before the provider round trip
        let order = db.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.wallet_paid_amount, Money::from_cents(30_00));
        assert_eq!(db.fetch_wallet_account(202).await.unwrap().unwrap().balance, Money::default());

        let stranded: Payment = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1")
            .bind(order.id)
            .fetch_one(db.pool())
            .await
            .expect("Error fetching the stranded payment");
        assert_eq!(stranded.status, PaymentStatus::Initiated);
        assert_eq!(stranded.amount, Money::from_cents(70_00));
        assert_eq!(stranded.fee_rate_bps, 150);
        assert_eq!(stranded.fee_amount, Money::from_cents(70_00).fee_at_bps(150));
        assert!(stranded.provider_ref.is_none());
        tear_down(db).await;
    });
}

#[test]
fn the_wallet_channel_requires_the_full_balance() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        seed_balance(&db, 203, 30_00).await;
        let order = seed_order(&db, "SO-2003", 203, 100_00).await;

        let err = api.create_payment(order.id, WALLET_CHANNEL_ID, true).await.unwrap_err();
        match err {
            PaymentFlowError::Settlement(SettlementError::InsufficientFunds { user_id, requested, available }) => {
                assert_eq!(user_id, 203);
                assert_eq!(requested, Money::from_cents(100_00));
                assert_eq!(available, Money::from_cents(30_00));
            },
            other => panic!("Expected InsufficientFunds, got {other}"),
        }
        // nothing was debited or recorded
        assert_eq!(db.fetch_wallet_account(203).await.unwrap().unwrap().balance, Money::from_cents(30_00));
        let order = db.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.wallet_paid_amount, Money::default());
        tear_down(db).await;
    });
}

#[test]
fn unavailable_channels_are_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let order = seed_order(&db, "SO-2004", 204, 50_00).await;

        let err = api.create_payment(order.id, 999, false).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Settlement(SettlementError::ChannelNotAvailable(999))));

        let mut dark =
            NewPaymentChannel::new("Dark TokenPay", ProviderType::Tokenpay, "USDT").with_config(&tokenpay_config());
        dark.is_active = false;
        let dark = db.insert_channel(dark).await.expect("Error inserting channel");
        let err = api.create_payment(order.id, dark.id, false).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Settlement(SettlementError::ChannelNotAvailable(_))));

        // disabled channels are also hidden from the checkout listing
        let live = tokenpay_channel(&db, 0).await;
        let listed = db.fetch_active_channels().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, live.id);
        tear_down(db).await;
    });
}

#[test]
fn initiation_data_promotes_the_payment_once() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (_api, db) = setup().await;
        let order = seed_order(&db, "SO-2005", 205, 45_00).await;
        let channel = tokenpay_channel(&db, 0).await;

        let created = db.create_payment(order.id, channel.id, false).await.expect("Error creating payment");
        let payment = created.payment.expect("A provider payment was expected");
        assert_eq!(payment.status, PaymentStatus::Initiated);

        let initiation = InitiationData {
            provider_ref: "tp-2005".into(),
            pay_url: "https://pay.example/tp-2005".into(),
            ..Default::default()
        };
        let payment = db.attach_initiation(payment.id, &initiation).await.expect("Error attaching initiation data");
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.provider_ref.as_deref(), Some("tp-2005"));

        // a payment that has already settled keeps its status and reference
        let input = CallbackInput {
            payment_id: payment.id,
            status: PaymentStatus::Success,
            provider_ref: None,
            paid_at: None,
            payload: "{}".into(),
        };
        let settled = db.apply_payment_callback(&input).await.expect("Error applying callback");
        assert!(settled.changed);
        let late = InitiationData { provider_ref: "tp-2005-late".into(), ..Default::default() };
        let payment = db.attach_initiation(payment.id, &late).await.expect("Error attaching initiation data");
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.provider_ref.as_deref(), Some("tp-2005"));
        tear_down(db).await;
    });
}

#[test]
fn paid_orders_refuse_further_payments() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        seed_balance(&db, 206, 40_00).await;
        let order = seed_order(&db, "SO-2006", 206, 40_00).await;
        let channel = tokenpay_channel(&db, 0).await;

        let created = api.create_payment(order.id, channel.id, true).await.expect("Error creating payment");
        assert!(created.order_paid);
        let err = api.create_payment(order.id, channel.id, true).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Settlement(SettlementError::PaymentInvalid(_))));
        tear_down(db).await;
    });
}

#[test]
fn duplicate_order_numbers_are_rejected() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (_api, db) = setup().await;
        let order = seed_order(&db, "SO-2007", 207, 10_00).await;
        let err = db.insert_order(NewOrder::new("SO-2007", 207, Money::from_cents(20_00))).await.unwrap_err();
        assert!(matches!(err, SettlementError::OrderAlreadyExists(no) if no == "SO-2007"));

        // the original row is untouched
        let fetched = db.fetch_order_by_order_no("SO-2007").await.unwrap().expect("Order disappeared");
        assert_eq!(fetched.id, order.id);
        assert_eq!(fetched.total_amount, Money::from_cents(10_00));
        tear_down(db).await;
    });
}

#[test]
fn recharges_link_the_payment_and_record_the_fee() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (_api, db) = setup().await;
        let channel = tokenpay_channel(&db, 200).await;

        let recharge = NewWalletRecharge::new(208, &channel, Money::from_cents(50_00), "Top-up");
        let result = db.create_wallet_recharge(recharge).await.expect("Error creating recharge");
        assert!(result.recharge.recharge_no.starts_with("WR"));
        assert_eq!(result.recharge.status, RechargeStatus::Pending);
        assert_eq!(result.recharge.amount, Money::from_cents(50_00));
        assert_eq!(result.recharge.fee_amount, Money::from_cents(1_00));
        assert_eq!(result.recharge.payable_amount, Money::from_cents(51_00));
        assert_eq!(result.recharge.payment_id, result.payment.id);
        // the buyer pays the fee-inclusive amount
        assert_eq!(result.payment.amount, Money::from_cents(51_00));
        assert_eq!(result.payment.status, PaymentStatus::Initiated);
        assert!(result.payment.order_id.is_none());

        let fetched =
            db.fetch_recharge_for_payment(result.payment.id).await.unwrap().expect("Recharge was not linked");
        assert_eq!(fetched, result.recharge);
        tear_down(db).await;
    });
}

#[test]
fn recharges_reject_bad_requests() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async move {
        let (api, db) = setup().await;
        let channel = tokenpay_channel(&db, 0).await;
        let err = api.create_wallet_recharge(209, channel.id, Money::default(), "Zero").await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Settlement(SettlementError::PaymentInvalid(_))));

        // the wallet pseudo-provider cannot top itself up
        let balance_channel = NewPaymentChannel::new("Balance", ProviderType::Wallet, "balance")
            .with_interaction_mode(InteractionMode::Balance);
        let balance_channel = db.insert_channel(balance_channel).await.expect("Error inserting channel");
        let err =
            api.create_wallet_recharge(209, balance_channel.id, Money::from_cents(10_00), "Nope").await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::Settlement(SettlementError::PaymentInvalid(_))));
        tear_down(db).await;
    });
}
