use crate::{
    dkg::{DealEvent, ResponseEvent},
    mediator::Address,
};

use super::{VssContext, VssError};

fn log_target() -> String {
    "vss:routing".to_owned()
}

impl VssContext {
    fn resolve(&self, index: u32) -> Result<Address, VssError> {
        self.oracle
            .active_mediator_addr(index)
            .ok_or(VssError::UnknownIndex(index))
    }

    /// Queues a deal for its local destination and hands it to the host
    /// relays. Never waits on a relay.
    pub(crate) fn publish_deal(&self, deal: DealEvent) {
        if self.quit.is_set() {
            log::trace!(target: &log_target(), "shut down, dropping {}", deal);
            return;
        }
        if let Err(e) = self.add_to_deal_buf(&deal) {
            log::warn!(target: &log_target(), "dropping {}: {}", deal, e);
        }
        self.deal_feed.send(deal);
    }

    /// Queues a response for the local mediators and hands it to the host
    /// relays. Never waits on a relay.
    pub(crate) fn publish_response(&self, response: ResponseEvent) {
        if self.quit.is_set() {
            log::trace!(target: &log_target(), "shut down, dropping {}", response);
            return;
        }
        if let Err(e) = self.add_to_response_buf(&response) {
            log::warn!(target: &log_target(), "dropping {}: {}", response, e);
        }
        self.response_feed.send(response);
    }

    /// Queues a deal for the local mediator it is addressed to.
    pub(crate) fn add_to_deal_buf(&self, deal: &DealEvent) -> Result<(), VssError> {
        if !self.config.group_signing_enabled {
            return Ok(());
        }

        let local = self.resolve(deal.destination_index)?;
        let dealer = self.resolve(deal.dealer_index)?;
        if !self.oracle.is_local(&local) {
            log::trace!(target: &log_target(), "skipping deal meant for other node");
            return Ok(());
        }
        log::debug!(
            target: &log_target(),
            "the mediator({}) received the vss deal from the mediator({})",
            local.short(),
            dealer.short()
        );
        self.buffers.offer_deal(&local, deal.clone())
    }

    /// Queues a response for every local mediator other than its sender.
    pub(crate) fn add_to_response_buf(&self, response: &ResponseEvent) -> Result<usize, VssError> {
        if !self.config.group_signing_enabled {
            return Ok(0);
        }

        let responder = self.resolve(response.responder_index)?;
        let dealer = self.resolve(response.dealer_index)?;
        let mut queued = 0;
        for local in self.oracle.local_active_mediators() {
            if local.address == responder {
                continue;
            }
            log::debug!(
                target: &log_target(),
                "the mediator({}) received the vss response from the mediator({}) to the mediator({})",
                local.address.short(),
                responder.short(),
                dealer.short()
            );
            match self
                .buffers
                .offer_response(&local.address, &dealer, response.clone())
            {
                Ok(()) => queued += 1,
                Err(e @ VssError::PairFinished { .. }) => {
                    log::trace!(target: &log_target(), "dropping late response: {}", e)
                }
                Err(e) => log::warn!(target: &log_target(), "dropping response: {}", e),
            }
        }
        Ok(queued)
    }
}
