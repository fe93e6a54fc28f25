use std::sync::Arc;

use colored::Colorize;
use tokio::sync::mpsc::Receiver;

use crate::{config::ComplaintPolicy, dkg::ResponseEvent, mediator::Mediator};

use super::{DealerStatus, SharedDkg, VssContext};

fn log_target(local: &Mediator, dealer: &Mediator) -> String {
    format!("vss:responses:{}:{}", local.index, dealer.index)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResponseOutcome {
    Accepted,
    Complaint,
    Rejected,
}

/// Quorum counter of one (local mediator, dealer) pair.
#[derive(Debug)]
pub(crate) struct ResponseTally {
    count: usize,
    quorum: usize,
    policy: ComplaintPolicy,
}

impl ResponseTally {
    /// Every dealer needs a response from each of the other `N - 1` members.
    /// The local mediator's own response to a peer's deal is already folded in
    /// by processing that deal, so it starts counted.
    pub(crate) fn new(
        local: &Mediator,
        dealer: &Mediator,
        committee_size: usize,
        policy: ComplaintPolicy,
    ) -> Self {
        Self {
            count: usize::from(local.address != dealer.address),
            quorum: committee_size.saturating_sub(1),
            policy,
        }
    }

    pub(crate) fn record(&mut self, outcome: ResponseOutcome) {
        match (self.policy, outcome) {
            (ComplaintPolicy::CountAll, _) | (ComplaintPolicy::ApprovedOnly, ResponseOutcome::Accepted) => {
                self.count += 1
            }
            _ => {}
        }
    }

    pub(crate) fn reached(&self) -> bool {
        self.count >= self.quorum
    }
}

/// Starts the response loop of a pair unless it already runs or finished.
pub(crate) fn launch_process_response_loop(ctx: &Arc<VssContext>, local: &Mediator, dealer: &Mediator) {
    match ctx
        .buffers
        .take_response_receiver(&local.address, &dealer.address)
    {
        Some(responses) => {
            tokio::spawn(process_response_loop(
                ctx.clone(),
                local.clone(),
                dealer.clone(),
                responses,
            ));
        }
        None => log::trace!(
            target: &log_target(local, dealer),
            "response loop already launched"
        ),
    }
}

/// Drains the responses regarding `dealer` until quorum, session deadline or
/// shutdown, whichever comes first.
pub(crate) async fn process_response_loop(
    ctx: Arc<VssContext>,
    local: Mediator,
    dealer: Mediator,
    mut responses: Receiver<ResponseEvent>,
) {
    let target = log_target(&local, &dealer);
    let dkg = match ctx.dkg(&local.address) {
        Ok(dkg) => dkg,
        Err(e) => {
            log::warn!(target: &target, "{}", e);
            return;
        }
    };

    let mut tally = ResponseTally::new(
        &local,
        &dealer,
        ctx.oracle.active_mediators_count(),
        ctx.config.complaint_policy,
    );
    let mut quit = ctx.quit.subscribe();
    let deadline = ctx.deadline();
    log::debug!(
        target: &target,
        "the mediator({}) run the loop to process response regarding the mediator({})",
        local.address.short(),
        dealer.address.short()
    );

    loop {
        if tally.reached() {
            complete(&ctx, &local, &dealer, &dkg).await;
            return;
        }
        tokio::select! {
            biased;
            _ = quit.recv() => return,
            _ = tokio::time::sleep_until(deadline) => {
                if ctx.buffers.finish_response(&local.address, &dealer.address, DealerStatus::TimedOut) {
                    log::warn!(
                        target: &target,
                        "session timed out for dealer {} (mediator {})",
                        dealer.address.short().yellow(),
                        local.address.short()
                    );
                }
                return;
            }
            next = responses.recv() => match next {
                Some(response) => {
                    let outcome = process_vss_response(&dkg, &target, &response).await;
                    tally.record(outcome);
                }
                None => {
                    log::debug!(target: &target, "response buffer closed");
                    return;
                }
            }
        }
    }
}

async fn process_vss_response(dkg: &SharedDkg, target: &str, response: &ResponseEvent) -> ResponseOutcome {
    let processed = dkg.lock().await.process_response(response);
    match processed {
        Err(e) => {
            log::warn!(target: target, "dropping {}: {}", response, e);
            ResponseOutcome::Rejected
        }
        Ok(Some(complaint)) => {
            log::warn!(
                target: target,
                "DKG: wrong process response from mediator {} (evidence {})",
                response.responder_index,
                complaint.evidence
            );
            ResponseOutcome::Complaint
        }
        Ok(None) if !response.is_approval() => {
            log::warn!(
                target: target,
                "mediator {} complained about the deal of mediator {}",
                response.responder_index,
                response.dealer_index
            );
            ResponseOutcome::Complaint
        }
        Ok(None) => ResponseOutcome::Accepted,
    }
}

async fn complete(ctx: &Arc<VssContext>, local: &Mediator, dealer: &Mediator, dkg: &SharedDkg) {
    ctx.buffers
        .finish_response(&local.address, &dealer.address, DealerStatus::Completed);
    let certified = dkg.lock().await.is_certified();
    if certified {
        ctx.trigger_certification(&local.address);
    } else {
        log::debug!(
            target: &log_target(local, dealer),
            "quorum regarding the mediator({}) reached, the mediator({}) is not certified yet",
            dealer.address.short(),
            local.address.short()
        );
    }
}
