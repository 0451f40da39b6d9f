//! Stateless pub-sub plumbing for settlement events.
//!
//! Hooks subscribe to the settlement flows through an in-process mpsc channel. Handlers receive
//! the event value and nothing else; anything a hook needs must travel in the event itself.
//! Handlers run as spawned tasks, so a slow hook never holds up the settlement path.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    inbox: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, inbox) = mpsc::channel(buffer_size);
        Self { inbox, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // drop our copy of the sender, so the receive loop ends once the last producer is gone
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = self.inbox.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move {
                (handler)(ev).await;
                trace!("📬️ Event handled");
            });
        }
        // the channel is closed, but spawned hook jobs may still be in flight
        while let Some(result) = jobs.join_next().await {
            if let Err(e) = result {
                warn!("📬️ An event hook job did not run to completion: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            error!("📬️ Event dropped: the handler side of the channel has shut down");
        }
    }
}
