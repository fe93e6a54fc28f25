use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    dkg::{Complaint, DealEvent, DkgError, DkgSession, ResponseEvent, ResponseStatus},
    mediator::{Address, StaticCommittee},
    signing::GroupSigner,
};

pub(crate) const MALFORMED: &[u8] = b"malformed";
pub(crate) const GARBAGE: &[u8] = b"garbage";
pub(crate) const COMPLAINT: &[u8] = b"complaint";

#[derive(Default)]
pub(crate) struct CallLog {
    pub(crate) deals: Vec<DealEvent>,
    pub(crate) responses: Vec<ResponseEvent>,
}

/// Deterministic stand-in for the DKG primitive. Like rabin, it is certified
/// once every dealer's deal was approved by all other members: its own
/// approval when it processed the deal, plus the peers' responses.
pub(crate) struct MockDkg {
    index: u32,
    committee_size: usize,
    malformed_to: HashSet<u32>,
    fail_setup: bool,
    dealers: HashSet<u32>,
    approvals: HashMap<u32, usize>,
    log: Arc<Mutex<CallLog>>,
}

impl MockDkg {
    pub(crate) fn new(index: u32, committee_size: usize) -> Self {
        Self {
            index,
            committee_size,
            malformed_to: HashSet::new(),
            fail_setup: false,
            dealers: HashSet::new(),
            approvals: HashMap::new(),
            log: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    pub(crate) fn with_malformed_deal_to(mut self, destination: u32) -> Self {
        self.malformed_to.insert(destination);
        self
    }

    pub(crate) fn failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    pub(crate) fn log(&self) -> Arc<Mutex<CallLog>> {
        self.log.clone()
    }
}

impl DkgSession for MockDkg {
    fn generate_deals(&mut self) -> Result<Vec<DealEvent>, DkgError> {
        if self.fail_setup {
            return Err(DkgError::Setup("mock without key material".to_owned()));
        }
        Ok((0..self.committee_size as u32)
            .filter(|i| *i != self.index)
            .map(|destination| DealEvent {
                dealer_index: self.index,
                destination_index: destination,
                deal: if self.malformed_to.contains(&destination) {
                    MALFORMED.into()
                } else {
                    format!("deal {}->{}", self.index, destination)
                        .into_bytes()
                        .into()
                },
            })
            .collect())
    }

    fn process_deal(&mut self, deal: &DealEvent) -> Result<ResponseEvent, DkgError> {
        self.log.lock().unwrap().deals.push(deal.clone());
        if deal.deal.as_bytes() == MALFORMED {
            return Err(DkgError::MalformedDeal {
                dealer: deal.dealer_index,
                reason: "bad share".to_owned(),
            });
        }
        if !self.dealers.insert(deal.dealer_index) {
            return Err(DkgError::Duplicate(format!("deal from {}", deal.dealer_index)));
        }
        *self.approvals.entry(deal.dealer_index).or_default() += 1;
        Ok(ResponseEvent {
            dealer_index: deal.dealer_index,
            responder_index: self.index,
            status: ResponseStatus::Approval,
            response: format!("resp {}@{}", self.index, deal.dealer_index)
                .into_bytes()
                .into(),
        })
    }

    fn process_response(
        &mut self,
        response: &ResponseEvent,
    ) -> Result<Option<Complaint>, DkgError> {
        self.log.lock().unwrap().responses.push(response.clone());
        match response.response.as_bytes() {
            GARBAGE => Err(DkgError::MalformedResponse {
                responder: response.responder_index,
                reason: "bad signature".to_owned(),
            }),
            COMPLAINT => Ok(Some(Complaint {
                dealer_index: response.dealer_index,
                evidence: COMPLAINT.into(),
            })),
            _ => {
                if response.is_approval() {
                    *self.approvals.entry(response.dealer_index).or_default() += 1;
                }
                Ok(None)
            }
        }
    }

    fn is_certified(&self) -> bool {
        let complete = self.committee_size.saturating_sub(1);
        (0..self.committee_size as u32)
            .all(|dealer| self.approvals.get(&dealer).copied().unwrap_or(0) >= complete)
    }
}

#[derive(Default)]
pub(crate) struct RecordingSigner {
    signed: Mutex<HashMap<Address, usize>>,
    recovered: Mutex<HashMap<Address, usize>>,
}

impl RecordingSigner {
    pub(crate) fn signed(&self, mediator: &Address) -> usize {
        self.signed.lock().unwrap().get(mediator).copied().unwrap_or(0)
    }

    pub(crate) fn recovered(&self, mediator: &Address) -> usize {
        self.recovered
            .lock()
            .unwrap()
            .get(mediator)
            .copied()
            .unwrap_or(0)
    }
}

impl GroupSigner for RecordingSigner {
    fn sign_pending_units_with_share(&self, mediator: &Address) {
        *self.signed.lock().unwrap().entry(mediator.clone()).or_default() += 1;
    }

    fn recover_units_with_group_signature(&self, mediator: &Address) {
        *self
            .recovered
            .lock()
            .unwrap()
            .entry(mediator.clone())
            .or_default() += 1;
    }
}

pub(crate) fn addresses(n: usize) -> Vec<Address> {
    (0..n)
        .map(|i| Address::new(format!("P1mediator{}", i)))
        .collect()
}

/// Committee of `n` where the members at `local` indices run on this node.
pub(crate) fn committee(n: usize, local: &[usize]) -> StaticCommittee {
    let members = addresses(n);
    let local = local.iter().map(|i| members[*i].clone()).collect::<Vec<_>>();
    StaticCommittee::new(members, local)
}

pub(crate) fn deal(dealer: u32, destination: u32, payload: &[u8]) -> DealEvent {
    DealEvent {
        dealer_index: dealer,
        destination_index: destination,
        deal: payload.into(),
    }
}

pub(crate) fn response(dealer: u32, responder: u32, payload: &[u8]) -> ResponseEvent {
    ResponseEvent {
        dealer_index: dealer,
        responder_index: responder,
        status: ResponseStatus::Approval,
        response: payload.into(),
    }
}

/// Polls `condition` until it holds, panicking after `limit`.
pub(crate) async fn wait_until<F: FnMut() -> bool>(limit: Duration, mut condition: F) {
    let polling = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    if tokio::time::timeout(limit, polling).await.is_err() {
        panic!("condition not met within {:?}", limit);
    }
}

/// Lets spawned tasks run for a while.
pub(crate) fn settle() -> impl Future<Output = ()> {
    tokio::time::sleep(Duration::from_millis(100))
}
