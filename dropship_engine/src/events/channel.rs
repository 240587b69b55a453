//! Minimal stateless pub-sub used to hook side effects (notifications, audit) onto engine events.
//!
//! Handlers receive the event value and nothing else — no access to engine internals — and may be
//! async. Each event is handled on its own task so a slow notifier cannot stall the settlement
//! flow that published it.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then drains the in-flight handler tasks.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // drop the internal sender so the loop ends once the last external producer is gone
        drop(self.sender);
        let mut in_flight = JoinSet::new();
        while let Some(event) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            in_flight.spawn(async move {
                (handler)(event).await;
            });
            // opportunistically reap finished tasks so the set does not grow unbounded
            while in_flight.try_join_next().is_some() {}
        }
        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                warn!("📬️ An event handler task panicked: {e}");
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
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn all_published_events_are_handled() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let tally = total.clone();
        let handler = Arc::new(move |v: u64| {
            let total = total.clone();
            Box::pin(async move {
                total.fetch_add(v, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(2, handler);
        let producer_a = event_handler.subscribe();
        let producer_b = event_handler.subscribe();
        tokio::spawn(async move {
            for i in 0..5u64 {
                producer_a.publish_event(i * 2 + 1).await;
            }
        });
        tokio::spawn(async move {
            for i in 0..5u64 {
                producer_b.publish_event(i * 2).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(tally.load(Ordering::SeqCst), 45);
    }
}
