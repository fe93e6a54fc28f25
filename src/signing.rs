use colored::Colorize;

use crate::mediator::Address;

/// Threshold-signing follow-up run once a local mediator is certified.
///
/// Both operations are invoked at most once per mediator per term, each on
/// its own task.
pub trait GroupSigner: Send + Sync {
    /// Signs pending units with the mediator's key share. A no-op when nothing
    /// is pending.
    fn sign_pending_units_with_share(&self, mediator: &Address);

    /// Replays units that were waiting on the group signature.
    fn recover_units_with_group_signature(&self, mediator: &Address);
}

/// Signer that only reports the calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingSigner;

impl GroupSigner for LoggingSigner {
    fn sign_pending_units_with_share(&self, mediator: &Address) {
        log::info!(
            target: "vss:signing",
            "signing pending units with the share of {}",
            mediator.short().green()
        );
    }

    fn recover_units_with_group_signature(&self, mediator: &Address) {
        log::info!(
            target: "vss:signing",
            "recovering units awaiting the group signature of {}",
            mediator.short().green()
        );
    }
}
