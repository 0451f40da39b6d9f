use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, PaymentAnnulledEvent, PaymentSettledEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_settled_producer: Vec<EventProducer<PaymentSettledEvent>>,
    pub payment_annulled_producer: Vec<EventProducer<PaymentAnnulledEvent>>,
}

pub struct EventHandlers {
    pub on_payment_settled: Option<EventHandler<PaymentSettledEvent>>,
    pub on_payment_annulled: Option<EventHandler<PaymentAnnulledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_settled = hooks.on_payment_settled.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_annulled = hooks.on_payment_annulled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_settled, on_payment_annulled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_settled {
            result.payment_settled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_annulled {
            result.payment_annulled_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_settled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payment_annulled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_settled: Option<Handler<PaymentSettledEvent>>,
    pub on_payment_annulled: Option<Handler<PaymentAnnulledEvent>>,
}

impl EventHooks {
    pub fn on_payment_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_settled = Some(Arc::new(f));
        self
    }

    pub fn on_payment_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_annulled = Some(Arc::new(f));
        self
    }
}
