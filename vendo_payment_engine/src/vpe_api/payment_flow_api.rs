use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::Value;
use vendo_common::Money;
use vendo_gateways::{
    adapter_for,
    epusdt,
    parse_passthrough_payment_id,
    stripe,
    tokenpay,
    CallbackEvent,
    CreateOrderRequest,
    GatewayError,
    InitiationData,
    ProviderType,
};

use crate::{
    db_types::{NewWalletRecharge, Payment, PaymentChannel},
    events::{EventProducers, PaymentAnnulledEvent, PaymentSettledEvent},
    traits::{CallbackInput, RechargeExpiry, SettlementDatabase, SettlementError, SettlementResult},
    vpe_api::{
        errors::PaymentFlowError,
        payment_objects::{CallbackAck, IngestOutcome, PaymentCreated, RechargeCreated},
    },
};

/// `PaymentFlowApi` is the primary API for creating payments and wallet top-ups, ingesting
/// provider notifications, and expiring abandoned top-ups.
pub struct PaymentFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

fn channel_config(channel: &PaymentChannel) -> Result<Value, GatewayError> {
    channel
        .config_value()
        .map_err(|e| GatewayError::ConfigInvalid(format!("channel {} config is not valid JSON: {e}", channel.id)))
}

impl<B> PaymentFlowApi<B>
where B: SettlementDatabase
{
    /// Creates a payment for an order, funding it from the wallet balance first when asked to.
    ///
    /// The wallet/online split is computed and persisted by the backend in one transaction.
    /// When the wallet covers the whole amount due, no provider is involved and the order comes
    /// back paid. Otherwise the remainder is initiated with the channel's provider and the
    /// returned initiation data tells the buyer where to pay.
    ///
    /// The provider round trip happens after the transaction has committed. If it fails, the
    /// stored payment stays behind in `Initiated` state for the timeout sweeps to clean up, and
    /// the caller may simply try again with a fresh payment.
    pub async fn create_payment(
        &self,
        order_id: i64,
        channel_id: i64,
        use_wallet_balance: bool,
    ) -> Result<PaymentCreated, PaymentFlowError> {
        let result = self.db.create_payment(order_id, channel_id, use_wallet_balance).await?;
        let Some(payment) = result.payment else {
            info!(
                "🔄️📦️ Order [{}] was settled from the wallet balance alone. No provider round trip is needed",
                result.order.order_no
            );
            return Ok(PaymentCreated {
                order: result.order,
                order_paid: result.order_paid,
                wallet_debited: result.wallet_debited,
                payment: None,
                initiation: None,
            });
        };
        let channel = self
            .db
            .fetch_channel(payment.channel_id)
            .await?
            .ok_or(SettlementError::ChannelNotAvailable(payment.channel_id))?;
        let initiation = self.initiate_with_provider(&payment, &channel, &result.order.order_no, result.order.user_id).await?;
        let payment = self.db.attach_initiation(payment.id, &initiation).await?;
        debug!(
            "🔄️📦️ Payment [{}] for order [{}] initiated with {}",
            payment.id, result.order.order_no, channel.provider_type
        );
        Ok(PaymentCreated {
            order: result.order,
            order_paid: result.order_paid,
            wallet_debited: result.wallet_debited,
            payment: Some(payment),
            initiation: Some(initiation),
        })
    }

    /// Creates a wallet top-up of `amount` through the given channel.
    ///
    /// The buyer pays `amount` plus the channel fee; the wallet is credited `amount` itself
    /// once the provider confirms. Abandoned top-ups are expired by
    /// [`Self::expire_wallet_recharge_payment`].
    pub async fn create_wallet_recharge(
        &self,
        user_id: i64,
        channel_id: i64,
        amount: Money,
        remark: &str,
    ) -> Result<RechargeCreated, PaymentFlowError> {
        if amount.value() <= 0 {
            return Err(
                SettlementError::PaymentInvalid(format!("Recharge amounts must be positive. Got {amount}")).into()
            );
        }
        let channel = self
            .db
            .fetch_channel(channel_id)
            .await?
            .filter(|c| c.is_active)
            .ok_or(SettlementError::ChannelNotAvailable(channel_id))?;
        if channel.provider_type == ProviderType::Wallet {
            return Err(SettlementError::PaymentInvalid("The wallet cannot top itself up".to_string()).into());
        }
        let recharge = NewWalletRecharge::new(user_id, &channel, amount, remark);
        let result = self.db.create_wallet_recharge(recharge).await?;
        let initiation =
            self.initiate_with_provider(&result.payment, &channel, &result.recharge.recharge_no, user_id).await?;
        let payment = self.db.attach_initiation(result.payment.id, &initiation).await?;
        info!(
            "🔄️💰️ Recharge [{}] for user {user_id} initiated with {}",
            result.recharge.recharge_no, channel.provider_type
        );
        Ok(RechargeCreated { payment, recharge: result.recharge, initiation })
    }

    /// The provider handshake. This runs strictly outside any database transaction; the
    /// payment row is already committed when it starts.
    async fn initiate_with_provider(
        &self,
        payment: &Payment,
        channel: &PaymentChannel,
        merchant_ref: &str,
        user_id: i64,
    ) -> Result<InitiationData, PaymentFlowError> {
        let config = channel_config(channel)?;
        let adapter = adapter_for(channel.provider_type, &config)?;
        let request = CreateOrderRequest {
            payment_id: payment.id,
            order_no: merchant_ref.to_string(),
            user_key: user_id.to_string(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            channel_type: payment.channel_type.clone(),
        };
        trace!("🔄️📦️ Creating {} order for payment [{}]", channel.provider_type, payment.id);
        let initiation = adapter.create_order(&request).await?;
        Ok(initiation)
    }

    /// Applies a verified provider notification and fires the matching hooks.
    ///
    /// Verification and payment resolution have already happened by the time a
    /// [`CallbackInput`] exists; the ingest methods below do both for raw bodies. Replays of
    /// an already-terminal payment come back with `changed == false` and fire nothing.
    pub async fn handle_callback(&self, input: CallbackInput) -> Result<SettlementResult, PaymentFlowError> {
        trace!("🔄️✅️ Payment [{}] is being settled with status {}", input.payment_id, input.status);
        let result = self.db.apply_payment_callback(&input).await?;
        if result.changed {
            use vendo_common::PaymentStatus::*;
            match result.payment.status {
                Success => self.call_payment_settled_hook(&result).await,
                Failed | Expired => self.call_payment_annulled_hook(&result.payment).await,
                _ => {},
            }
        }
        Ok(result)
    }

    /// Expires an abandoned wallet top-up. Invoked by a scheduled external trigger; payments
    /// that own an order and pairs that already reached a terminal state are left alone.
    pub async fn expire_wallet_recharge_payment(&self, payment_id: i64) -> Result<RechargeExpiry, PaymentFlowError> {
        trace!("🔄️❌️ Payment [{payment_id}] is being checked for expiry");
        let result = self.db.expire_wallet_recharge_payment(payment_id).await?;
        if result.expired_now {
            info!("🔄️❌️ Recharge payment [{payment_id}] expired");
            self.call_payment_annulled_hook(&result.payment).await;
        }
        Ok(result)
    }

    async fn call_payment_settled_hook(&self, result: &SettlementResult) {
        for emitter in &self.producers.payment_settled_producer {
            debug!("🔄️✅️ Notifying payment settled hook subscribers");
            let event = PaymentSettledEvent::from(result.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_payment_annulled_hook(&self, payment: &Payment) {
        for emitter in &self.producers.payment_annulled_producer {
            debug!("🔄️❌️ Notifying payment annulled hook subscribers");
            let event = PaymentAnnulledEvent::new(payment.clone());
            emitter.publish_event(event).await;
        }
    }

    //--------------------------------------  Notification ingest  ----------------------------------------------------

    /// Ingests a raw TokenPay notification end to end and produces the acknowledgement the
    /// endpoint must return. Never errors: failures are folded into the acknowledgement,
    /// because the provider retries on anything but its success token.
    pub async fn ingest_tokenpay_callback(&self, body: &[u8]) -> CallbackAck {
        let outcome = match self.process_tokenpay(body).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("🔄️❌️ TokenPay notification could not be applied: {e}");
                IngestOutcome::Rejected(e.to_string())
            },
        };
        CallbackAck::new(outcome, tokenpay::ACK_SUCCESS, tokenpay::ACK_FAIL)
    }

    /// Ingests a raw Stripe webhook delivery. The acknowledgement body is always empty;
    /// Stripe reads the HTTP status, so `success` is what the endpoint must map to 2xx.
    pub async fn ingest_stripe_webhook(&self, signature_header: Option<&str>, body: &[u8]) -> CallbackAck {
        let outcome = match self.process_stripe(signature_header, body).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("🔄️❌️ Stripe event could not be applied: {e}");
                IngestOutcome::Rejected(e.to_string())
            },
        };
        CallbackAck::new(outcome, "", "")
    }

    /// Ingests a raw EPUSDT notification end to end, exactly like
    /// [`Self::ingest_tokenpay_callback`] but with EPUSDT parsing and tokens.
    pub async fn ingest_epusdt_callback(&self, body: &[u8]) -> CallbackAck {
        let outcome = match self.process_epusdt(body).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("🔄️❌️ EPUSDT notification could not be applied: {e}");
                IngestOutcome::Rejected(e.to_string())
            },
        };
        CallbackAck::new(outcome, epusdt::ACK_SUCCESS, epusdt::ACK_FAIL)
    }

    async fn process_tokenpay(&self, body: &[u8]) -> Result<IngestOutcome, PaymentFlowError> {
        let callback = match tokenpay::parse_callback(body) {
            Ok(callback) => callback,
            Err(e) => {
                debug!("🔄️❌️ Inbound body is not a TokenPay notification: {e}");
                return Ok(IngestOutcome::NotAMatch);
            },
        };
        if !callback.has_required_fields() {
            debug!("🔄️❌️ Inbound body lacks the TokenPay notification fields. Not a match");
            return Ok(IngestOutcome::NotAMatch);
        }
        let passthrough = parse_passthrough_payment_id(&callback.pass_through_info);
        let Some(payment) = self.resolve_payment(ProviderType::Tokenpay, passthrough, &callback.provider_ref).await?
        else {
            warn!("🔄️❌️ No payment matches TokenPay notification [{}] yet", callback.provider_ref);
            return Ok(IngestOutcome::NotAMatch);
        };
        let channel = self.notification_channel(&payment, ProviderType::Tokenpay).await?;
        let config = tokenpay::parse_config(&channel_config(&channel)?)?;
        config.validate()?;
        tokenpay::verify_callback(&callback, &config.notify_secret)?;
        info!(
            "🔄️💰️ Verified TokenPay notification [{}] for payment [{}] with provider status {}",
            callback.provider_ref, payment.id, callback.status
        );
        self.settle_event(&payment, callback.into_event()).await
    }

    async fn process_stripe(
        &self,
        signature_header: Option<&str>,
        body: &[u8],
    ) -> Result<IngestOutcome, PaymentFlowError> {
        let event = match stripe::parse_webhook(body) {
            Ok(event) => event,
            Err(e) => {
                debug!("🔄️❌️ Inbound body is not a Stripe event: {e}");
                return Ok(IngestOutcome::NotAMatch);
            },
        };
        let Some(payment) =
            self.resolve_payment(ProviderType::Stripe, event.passthrough_payment_id, &event.provider_ref).await?
        else {
            warn!("🔄️❌️ No payment matches Stripe event [{}] yet", event.provider_ref);
            return Ok(IngestOutcome::NotAMatch);
        };
        let channel = self.notification_channel(&payment, ProviderType::Stripe).await?;
        let config = stripe::parse_config(&channel_config(&channel)?)?;
        config.validate()?;
        stripe::verify_webhook(&config, signature_header, body, Utc::now())?;
        info!(
            "🔄️💰️ Verified Stripe event [{}] for payment [{}] with status {}",
            event.provider_ref, payment.id, event.status
        );
        self.settle_event(&payment, event).await
    }

    async fn process_epusdt(&self, body: &[u8]) -> Result<IngestOutcome, PaymentFlowError> {
        let callback = match epusdt::parse_callback(body) {
            Ok(callback) => callback,
            Err(e) => {
                debug!("🔄️❌️ Inbound body is not an EPUSDT notification: {e}");
                return Ok(IngestOutcome::NotAMatch);
            },
        };
        if !callback.has_required_fields() {
            debug!("🔄️❌️ Inbound body lacks the EPUSDT notification fields. Not a match");
            return Ok(IngestOutcome::NotAMatch);
        }
        let Some(payment) = self.resolve_payment(ProviderType::Epusdt, None, &callback.trade_id).await? else {
            warn!("🔄️❌️ No payment matches EPUSDT notification [{}] yet", callback.trade_id);
            return Ok(IngestOutcome::NotAMatch);
        };
        let channel = self.notification_channel(&payment, ProviderType::Epusdt).await?;
        let config = epusdt::parse_config(&channel_config(&channel)?)?;
        config.validate()?;
        epusdt::verify_callback(&callback, &config.auth_token)?;
        info!(
            "🔄️💰️ Verified EPUSDT notification [{}] for payment [{}] with provider status {}",
            callback.trade_id, payment.id, callback.status
        );
        self.settle_event(&payment, callback.into_event(&config.fiat)).await
    }

    /// Resolves the payment a notification belongs to. An echoed payment id wins; otherwise
    /// the most recent payment carrying the provider's reference does.
    async fn resolve_payment(
        &self,
        provider: ProviderType,
        passthrough_payment_id: Option<i64>,
        provider_ref: &str,
    ) -> Result<Option<Payment>, SettlementError> {
        if let Some(id) = passthrough_payment_id {
            match self.db.fetch_payment(id).await? {
                Some(payment) => return Ok(Some(payment)),
                None => debug!("🔄️💰️ Echoed payment id {id} matches nothing. Falling back to the provider reference"),
            }
        }
        if provider_ref.is_empty() {
            return Ok(None);
        }
        self.db.fetch_payment_by_provider_ref(provider, provider_ref).await
    }

    /// The channel a notification must be verified against. A payment on a channel of another
    /// provider means the notification was delivered to the wrong endpoint.
    async fn notification_channel(
        &self,
        payment: &Payment,
        expected: ProviderType,
    ) -> Result<PaymentChannel, PaymentFlowError> {
        let channel = self
            .db
            .fetch_channel(payment.channel_id)
            .await?
            .ok_or(SettlementError::ChannelNotAvailable(payment.channel_id))?;
        if channel.provider_type != expected {
            return Err(SettlementError::PaymentInvalid(format!(
                "Payment [{}] belongs to a {} channel, not {expected}",
                payment.id, channel.provider_type
            ))
            .into());
        }
        Ok(channel)
    }

    async fn settle_event(&self, payment: &Payment, event: CallbackEvent) -> Result<IngestOutcome, PaymentFlowError> {
        if !event.status.is_terminal() {
            debug!("🔄️✅️ Payment [{}] reported {} by its provider. Nothing to settle yet", payment.id, event.status);
            return Ok(IngestOutcome::Ignored);
        }
        let input = CallbackInput::from_event(payment.id, &event);
        let result = self.handle_callback(input).await?;
        Ok(if result.changed { IngestOutcome::Settled } else { IngestOutcome::Ignored })
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
