mod kyber;
mod messages;

pub use kyber::{committee_order, new_committee_dkgs, KyberDkg};
pub use messages::{
    CodecError, Complaint, DealEvent, Payload, ResponseEvent, ResponseStatus, VssMessage,
};

use thiserror::Error;

/// Cryptographic state of one locally controlled mediator for one term.
///
/// The protocol loops only ever observe these four operations; the internal
/// bookkeeping of the primitive stays behind this boundary.
pub trait DkgSession: Send {
    /// One outgoing deal per other committee member.
    fn generate_deals(&mut self) -> Result<Vec<DealEvent>, DkgError>;

    /// Validates and incorporates an inbound deal, returning the response to
    /// broadcast.
    fn process_deal(&mut self, deal: &DealEvent) -> Result<ResponseEvent, DkgError>;

    /// Incorporates a response about a previously seen deal. A returned
    /// complaint signals an inconsistency for that exchange only.
    fn process_response(&mut self, response: &ResponseEvent)
        -> Result<Option<Complaint>, DkgError>;

    /// Stable once true.
    fn is_certified(&self) -> bool;
}

#[derive(Error, Debug)]
pub enum DkgError {
    #[error("dkg session not initialized: {0}")]
    Setup(String),
    #[error("malformed deal from dealer {dealer}: {reason}")]
    MalformedDeal { dealer: u32, reason: String },
    #[error("malformed response from mediator {responder}: {reason}")]
    MalformedResponse { responder: u32, reason: String },
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("dkg primitive failure: {0}")]
    Primitive(String),
}

pub(crate) fn log_target() -> String {
    "vss:dkg".to_owned()
}
