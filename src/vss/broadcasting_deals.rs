use std::sync::Arc;

use colored::Colorize;

use super::{processing_responses::launch_process_response_loop, VssContext};

fn log_target() -> String {
    "vss:deals".to_owned()
}

/// Generates and publishes the deals of every local mediator with an active
/// session. A mediator whose deals cannot be generated sits out the term.
pub(crate) async fn broadcast_vss_deals(ctx: Arc<VssContext>) {
    for local in ctx.oracle.local_active_mediators() {
        if ctx.quit.is_set() {
            return;
        }
        let dkg = match ctx.dkg(&local.address) {
            Ok(dkg) => dkg,
            Err(e) => {
                log::warn!(target: &log_target(), "{}, skipping this term", e.to_string().red());
                continue;
            }
        };

        let generated = dkg.lock().await.generate_deals();
        let deals = match generated {
            Ok(deals) => deals,
            Err(e) => {
                log::warn!(
                    target: &log_target(),
                    "the mediator({}) could not generate deals: {}",
                    local.address.short().red(),
                    e
                );
                continue;
            }
        };

        // responses regarding its own deal
        launch_process_response_loop(&ctx, &local, &local);
        log::debug!(
            target: &log_target(),
            "the mediator({}) broadcast {} vss deals",
            local.address.short().cyan(),
            deals.len()
        );

        for deal in deals {
            ctx.publish_deal(deal);
        }
    }
}
