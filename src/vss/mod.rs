//! Deal and response exchange of the mediator DKG session.
//!
//! One [VssProtocol] runs a term: it distributes the deals of every locally
//! controlled mediator, drains the per-mediator deal buffers, drains one
//! response buffer per (local mediator, dealer) pair until quorum, and hands
//! certified mediators over to the [GroupSigner].

mod broadcasting_deals;
mod buffers;
mod processing_deals;
mod processing_responses;
mod routing;
mod shutdown;

#[cfg(test)]
mod testing;

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, OnceLock, PoisonError,
    },
};

use colored::Colorize;
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    config::VssConfig,
    dkg::{DealEvent, DkgSession, ResponseEvent},
    mediator::{Address, MembershipOracle},
    net::{Feed, FeedReceiver, SubscriptionScope},
    signing::GroupSigner,
};

pub use buffers::DealerStatus;
pub use shutdown::{Quit, QuitSignal};

use buffers::BufferRegistry;

pub(crate) type SharedDkg = Arc<futures::lock::Mutex<Box<dyn DkgSession>>>;

pub(crate) fn log_target() -> String {
    "vss:protocol".to_owned()
}

#[derive(Error, Debug)]
pub enum VssError {
    #[error("no active dkg session for mediator {0}")]
    MissingSession(Address),
    #[error("no active mediator at committee index {0}")]
    UnknownIndex(u32),
    #[error("{kind} buffer of mediator {mediator} is full")]
    BufferFull {
        kind: &'static str,
        mediator: Address,
    },
    #[error("{kind} buffer of mediator {mediator} is closed")]
    BufferClosed {
        kind: &'static str,
        mediator: Address,
    },
    #[error("mediator {mediator} no longer accepts responses regarding {dealer} ({status})")]
    PairFinished {
        mediator: Address,
        dealer: Address,
        status: DealerStatus,
    },
    #[error("vss protocol already started")]
    AlreadyStarted,
    #[error("vss protocol has been shut down")]
    ShutDown,
}

/// State shared by every task of one session.
pub(crate) struct VssContext {
    pub(crate) config: VssConfig,
    pub(crate) oracle: Arc<dyn MembershipOracle>,
    signer: Arc<dyn GroupSigner>,
    dkgs: Mutex<HashMap<Address, SharedDkg>>,
    pub(crate) buffers: BufferRegistry,
    pub(crate) deal_feed: Feed<DealEvent>,
    pub(crate) response_feed: Feed<ResponseEvent>,
    certified: Mutex<HashSet<Address>>,
    pub(crate) quit: Quit,
    scope: SubscriptionScope,
    deadline: OnceLock<Instant>,
}

impl VssContext {
    pub(crate) fn dkg(&self, mediator: &Address) -> Result<SharedDkg, VssError> {
        lock(&self.dkgs)
            .get(mediator)
            .cloned()
            .ok_or_else(|| VssError::MissingSession(mediator.clone()))
    }

    /// End of the session; fixed by the first caller.
    pub(crate) fn deadline(&self) -> Instant {
        *self
            .deadline
            .get_or_init(|| Instant::now() + self.config.session_timeout())
    }

    /// Runs the signing follow-up for `mediator` unless it already ran.
    pub(crate) fn trigger_certification(&self, mediator: &Address) {
        if !lock(&self.certified).insert(mediator.clone()) {
            log::trace!(
                target: &log_target(),
                "certification of {} already handled",
                mediator.short()
            );
            return;
        }
        log::info!(
            target: &log_target(),
            "the mediator({})'s DKG verification passed",
            mediator.short().green()
        );

        let signer = self.signer.clone();
        let med = mediator.clone();
        tokio::spawn(async move { signer.sign_pending_units_with_share(&med) });

        let signer = self.signer.clone();
        let med = mediator.clone();
        tokio::spawn(async move { signer.recover_units_with_group_signature(&med) });
    }

    pub(crate) fn is_certified(&self, mediator: &Address) -> bool {
        lock(&self.certified).contains(mediator)
    }
}

/// Entry point of the VSS session for the locally controlled mediators.
pub struct VssProtocol {
    ctx: Arc<VssContext>,
    started: AtomicBool,
}

impl VssProtocol {
    pub fn new(
        config: VssConfig,
        oracle: Arc<dyn MembershipOracle>,
        signer: Arc<dyn GroupSigner>,
    ) -> Self {
        let buffers = BufferRegistry::new(oracle.active_mediators_count());
        let feed_capacity = config.feed_capacity;
        Self {
            ctx: Arc::new(VssContext {
                config,
                oracle,
                signer,
                dkgs: Mutex::new(HashMap::new()),
                buffers,
                deal_feed: Feed::new(feed_capacity),
                response_feed: Feed::new(feed_capacity),
                certified: Mutex::new(HashSet::new()),
                quit: Quit::new(),
                scope: SubscriptionScope::new(),
                deadline: OnceLock::new(),
            }),
            started: AtomicBool::new(false),
        }
    }

    /// Registers the DKG handle of a locally controlled mediator for this term.
    pub fn add_session<D: DkgSession + 'static>(&self, mediator: Address, dkg: D) {
        let shared: SharedDkg = Arc::new(futures::lock::Mutex::new(Box::new(dkg)));
        lock(&self.ctx.dkgs).insert(mediator, shared);
    }

    /// Starts the deal loops and the deal distribution.
    /// Must be called within a tokio runtime.
    pub fn start(&self) -> Result<(), VssError> {
        if self.ctx.quit.is_set() {
            return Err(VssError::ShutDown);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(VssError::AlreadyStarted);
        }
        log::debug!(target: &log_target(), "Start completing the VSS protocol.");
        let deadline = self.ctx.deadline();

        processing_deals::launch_process_deal_loops(&self.ctx);
        tokio::spawn(broadcasting_deals::broadcast_vss_deals(self.ctx.clone()));
        tokio::spawn(expire_session(self.ctx.clone(), deadline));
        Ok(())
    }

    /// Outbound deals, for relaying to peers. Ends at shutdown. A relay that
    /// falls behind skips deals; it never holds back the session.
    pub fn subscribe_deals(&self) -> FeedReceiver<DealEvent> {
        let (subscription, rx) = self.ctx.deal_feed.subscribe();
        self.ctx.scope.track(subscription);
        rx
    }

    /// Outbound responses, for relaying to peers. Ends at shutdown.
    pub fn subscribe_responses(&self) -> FeedReceiver<ResponseEvent> {
        let (subscription, rx) = self.ctx.response_feed.subscribe();
        self.ctx.scope.track(subscription);
        rx
    }

    /// Delivers a deal received from a peer through the same path as the
    /// locally generated ones.
    pub fn publish_deal(&self, deal: DealEvent) {
        self.ctx.publish_deal(deal);
    }

    /// Delivers a response received from a peer.
    pub fn publish_response(&self, response: ResponseEvent) {
        self.ctx.publish_response(response);
    }

    pub fn add_to_deal_buf(&self, deal: &DealEvent) -> Result<(), VssError> {
        self.ctx.add_to_deal_buf(deal)
    }

    /// Returns how many local mediators queued the response.
    pub fn add_to_response_buf(&self, response: &ResponseEvent) -> Result<usize, VssError> {
        self.ctx.add_to_response_buf(response)
    }

    /// Stops every loop of the session. Irreversible.
    pub fn quit(&self) {
        if !self.ctx.quit.is_set() {
            log::debug!(target: &log_target(), "shutting down the VSS protocol");
        }
        self.ctx.quit.signal();
        self.ctx.scope.close();
    }

    pub fn is_quit(&self) -> bool {
        self.ctx.quit.is_set()
    }

    pub fn dealer_status(&self, local: &Address, dealer: &Address) -> DealerStatus {
        self.ctx.buffers.dealer_status(local, dealer)
    }

    pub fn is_certified(&self, mediator: &Address) -> bool {
        self.ctx.is_certified(mediator)
    }
}

impl Drop for VssProtocol {
    fn drop(&mut self) {
        self.quit();
    }
}

async fn expire_session(ctx: Arc<VssContext>, deadline: Instant) {
    let mut quit = ctx.quit.subscribe();
    tokio::select! {
        biased;
        _ = quit.recv() => {}
        _ = tokio::time::sleep_until(deadline) => {
            for (local, dealer) in ctx.buffers.expire_responses() {
                log::warn!(
                    target: &log_target(),
                    "session timed out for dealer {} (mediator {})",
                    dealer.short().yellow(),
                    local.short()
                );
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
