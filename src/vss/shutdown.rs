use std::sync::Arc;

use tokio::sync::watch;

/// Sticky broadcast shutdown: once signalled it stays signalled.
#[derive(Clone)]
pub struct Quit {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Quit {
    fn default() -> Self {
        Self::new()
    }
}

impl Quit {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn signal(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> QuitSignal {
        QuitSignal {
            rx: self.tx.subscribe(),
        }
    }
}

pub struct QuitSignal {
    rx: watch::Receiver<bool>,
}

impl QuitSignal {
    /// Resolves once quit is signalled, immediately if it already was.
    pub async fn recv(&mut self) {
        // a dropped sender means the owner is gone, which also ends the session
        let _ = self.rx.wait_for(|quit| *quit).await;
    }
}
