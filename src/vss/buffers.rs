use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use enum_display::EnumDisplay;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

use crate::{
    dkg::{DealEvent, ResponseEvent},
    mediator::Address,
};

use super::VssError;

/// Progress of the response loop for one (local mediator, dealer) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumDisplay)]
pub enum DealerStatus {
    /// No loop yet; responses may already be buffered.
    Idle,
    Running,
    Completed,
    TimedOut,
}

struct Buffer<T> {
    tx: Sender<T>,
    rx: Option<Receiver<T>>,
}

impl<T> Buffer<T> {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self { tx, rx: Some(rx) }
    }
}

type Pair = (Address, Address);

#[derive(Default)]
struct ResponseBuffers {
    live: HashMap<Pair, Buffer<ResponseEvent>>,
    finished: HashMap<Pair, DealerStatus>,
}

/// Per-key bounded queues between the publishers and the intake loops.
///
/// Each buffer is created at most once per key, is written by any number of
/// publishers and read by the single loop that took its receiver.
pub(crate) struct BufferRegistry {
    capacity: usize,
    deals: Mutex<HashMap<Address, Buffer<DealEvent>>>,
    responses: Mutex<ResponseBuffers>,
}

impl BufferRegistry {
    /// `committee_size - 1` producers feed every buffer.
    pub(crate) fn new(committee_size: usize) -> Self {
        Self {
            capacity: committee_size.saturating_sub(1).max(1),
            deals: Mutex::new(HashMap::new()),
            responses: Mutex::new(ResponseBuffers::default()),
        }
    }

    pub(crate) fn offer_deal(&self, local: &Address, deal: DealEvent) -> Result<(), VssError> {
        let mut deals = lock(&self.deals);
        let buffer = deals
            .entry(local.clone())
            .or_insert_with(|| Buffer::new(self.capacity));
        buffer.tx.try_send(deal).map_err(|e| match e {
            TrySendError::Full(_) => VssError::BufferFull {
                kind: "deal",
                mediator: local.clone(),
            },
            TrySendError::Closed(_) => VssError::BufferClosed {
                kind: "deal",
                mediator: local.clone(),
            },
        })
    }

    /// Hands the deal queue to its consumer; `None` once already taken.
    pub(crate) fn take_deal_receiver(&self, local: &Address) -> Option<Receiver<DealEvent>> {
        lock(&self.deals)
            .entry(local.clone())
            .or_insert_with(|| Buffer::new(self.capacity))
            .rx
            .take()
    }

    pub(crate) fn offer_response(
        &self,
        local: &Address,
        dealer: &Address,
        response: ResponseEvent,
    ) -> Result<(), VssError> {
        let key = (local.clone(), dealer.clone());
        let mut responses = lock(&self.responses);
        if let Some(status) = responses.finished.get(&key) {
            return Err(VssError::PairFinished {
                mediator: local.clone(),
                dealer: dealer.clone(),
                status: *status,
            });
        }
        if !responses.live.contains_key(&key) {
            log::trace!(
                target: &super::log_target(),
                "initializing response buffer of {} regarding {}",
                local.short(),
                dealer.short()
            );
        }
        let buffer = responses
            .live
            .entry(key)
            .or_insert_with(|| Buffer::new(self.capacity));
        buffer.tx.try_send(response).map_err(|e| match e {
            TrySendError::Full(_) => VssError::BufferFull {
                kind: "response",
                mediator: local.clone(),
            },
            TrySendError::Closed(_) => VssError::BufferClosed {
                kind: "response",
                mediator: local.clone(),
            },
        })
    }

    /// Hands the response queue of a pair to its loop. `None` when a loop
    /// already owns it or the pair is finished.
    pub(crate) fn take_response_receiver(
        &self,
        local: &Address,
        dealer: &Address,
    ) -> Option<Receiver<ResponseEvent>> {
        let key = (local.clone(), dealer.clone());
        let mut responses = lock(&self.responses);
        if responses.finished.contains_key(&key) {
            return None;
        }
        responses
            .live
            .entry(key)
            .or_insert_with(|| Buffer::new(self.capacity))
            .rx
            .take()
    }

    /// Removes the pair's buffer; later responses for it are refused. Returns
    /// false when the pair had already been torn down.
    pub(crate) fn finish_response(
        &self,
        local: &Address,
        dealer: &Address,
        status: DealerStatus,
    ) -> bool {
        let key = (local.clone(), dealer.clone());
        let mut responses = lock(&self.responses);
        let was_live = responses.live.remove(&key).is_some();
        responses.finished.entry(key).or_insert(status);
        was_live
    }

    /// Tears down every pair still in progress, returning them.
    pub(crate) fn expire_responses(&self) -> Vec<(Address, Address)> {
        let mut responses = lock(&self.responses);
        let expired: Vec<Pair> = responses.live.drain().map(|(key, _)| key).collect();
        for key in &expired {
            responses
                .finished
                .entry(key.clone())
                .or_insert(DealerStatus::TimedOut);
        }
        expired
    }

    pub(crate) fn dealer_status(&self, local: &Address, dealer: &Address) -> DealerStatus {
        let key = (local.clone(), dealer.clone());
        let responses = lock(&self.responses);
        if let Some(status) = responses.finished.get(&key) {
            return *status;
        }
        match responses.live.get(&key) {
            Some(buffer) if buffer.rx.is_none() => DealerStatus::Running,
            _ => DealerStatus::Idle,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
