use std::sync::Arc;

use colored::Colorize;
use tokio::sync::mpsc::Receiver;

use crate::{dkg::DealEvent, mediator::Mediator};

use super::{processing_responses::launch_process_response_loop, SharedDkg, VssContext};

fn log_target(local: &Mediator) -> String {
    format!("vss:deals:{}", local.index)
}

/// Starts one deal loop per local mediator, creating its deal buffer.
pub(crate) fn launch_process_deal_loops(ctx: &Arc<VssContext>) {
    for local in ctx.oracle.local_active_mediators() {
        match ctx.buffers.take_deal_receiver(&local.address) {
            Some(deals) => {
                tokio::spawn(process_deal_loop(ctx.clone(), local, deals));
            }
            None => log::debug!(
                target: &log_target(&local),
                "deal loop of {} already running",
                local.address.short()
            ),
        }
    }
}

/// Drains the deal buffer of `local` until shutdown.
pub(crate) async fn process_deal_loop(
    ctx: Arc<VssContext>,
    local: Mediator,
    mut deals: Receiver<DealEvent>,
) {
    let dkg = match ctx.dkg(&local.address) {
        Ok(dkg) => dkg,
        Err(e) => {
            log::warn!(
                target: &log_target(&local),
                "{}, not processing deals",
                e.to_string().red()
            );
            return;
        }
    };

    let mut quit = ctx.quit.subscribe();
    loop {
        tokio::select! {
            biased;
            _ = quit.recv() => break,
            next = deals.recv() => match next {
                Some(deal) => process_vss_deal(&ctx, &local, &dkg, deal).await,
                None => break,
            }
        }
    }
    log::trace!(target: &log_target(&local), "deal loop stopped");
}

async fn process_vss_deal(ctx: &Arc<VssContext>, local: &Mediator, dkg: &SharedDkg, deal: DealEvent) {
    if deal.destination_index != local.index {
        log::warn!(
            target: &log_target(local),
            "dropping {} routed to mediator {}",
            deal,
            local.index
        );
        return;
    }
    let dealer = match ctx.oracle.active_mediator_by_index(deal.dealer_index) {
        Some(dealer) => dealer,
        None => {
            log::warn!(target: &log_target(local), "dropping {}: unknown dealer", deal);
            return;
        }
    };

    let processed = dkg.lock().await.process_deal(&deal);
    let response = match processed {
        Ok(response) => response,
        Err(e) => {
            log::warn!(
                target: &log_target(local),
                "dkg: cannot process deal from {}: {}",
                dealer.address.short(),
                e
            );
            return;
        }
    };
    log::debug!(
        target: &log_target(local),
        "the mediator({}) processed the vss deal from the mediator({})",
        local.address.short(),
        dealer.address.short()
    );

    launch_process_response_loop(ctx, local, &dealer);

    if !response.is_approval() {
        log::warn!(
            target: &log_target(local),
            "DKG: own deal gave a complaint: {}",
            local.address.short().yellow()
        );
        return;
    }

    ctx.publish_response(response);
    log::debug!(
        target: &log_target(local),
        "the mediator({}) broadcast the vss response to the mediator({})",
        local.address.short(),
        dealer.address.short()
    );
}
