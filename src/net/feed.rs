use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

use tokio::sync::{
    broadcast::{self, error::RecvError},
    watch,
};

fn log_target() -> String {
    "vss:feed".to_owned()
}

/// One-to-many fan-out: every value sent is cloned to each live subscriber.
///
/// Sending never waits. A subscriber that falls more than `capacity` values
/// behind loses the oldest ones.
pub struct Feed<T> {
    tx: broadcast::Sender<T>,
}

impl<T> Clone for Feed<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Feed<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> (Subscription, FeedReceiver<T>) {
        let (closer, closed) = watch::channel(false);
        (
            Subscription { closer },
            FeedReceiver {
                rx: self.tx.subscribe(),
                closed,
            },
        )
    }

    /// Returns the number of subscribers reached.
    pub fn send(&self, value: T) -> usize {
        self.tx.send(value).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of a [Feed] subscription.
pub struct FeedReceiver<T> {
    rx: broadcast::Receiver<T>,
    closed: watch::Receiver<bool>,
}

impl<T: Clone> FeedReceiver<T> {
    /// Next value, or `None` once the subscription ended.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if self.is_closed() {
                return None;
            }
            tokio::select! {
                biased;
                _ = self.closed.changed() => return None,
                next = self.rx.recv() => match next {
                    Ok(value) => return Some(value),
                    Err(RecvError::Lagged(skipped)) => log::warn!(
                        target: &log_target(),
                        "subscriber fell behind, {} values skipped",
                        skipped
                    ),
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.closed.has_changed().is_err()
    }
}

/// Handle ending a [Feed] subscription when unsubscribed or dropped.
pub struct Subscription {
    closer: watch::Sender<bool>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.closer.send_replace(true);
    }
}

/// Tracks subscriptions so they can all be ended at once.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Mutex<Vec<Subscription>>,
    closed: AtomicBool,
}

impl SubscriptionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `subscription` alive until [SubscriptionScope::close]. Once the
    /// scope is closed, tracked subscriptions end immediately.
    pub fn track(&self, subscription: Subscription) {
        if self.closed.load(Ordering::SeqCst) {
            subscription.unsubscribe();
            return;
        }
        self.lock().push(subscription);
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let subscriptions: Vec<Subscription> = self.lock().drain(..).collect();
        log::debug!(
            target: &log_target(),
            "closing {} tracked subscriptions",
            subscriptions.len()
        );
        subscriptions.into_iter().for_each(Subscription::unsubscribe);
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
