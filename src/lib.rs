extern crate log;

pub mod config;
pub mod dkg;
pub mod mediator;
pub mod net;
pub mod signing;
pub mod vss;

pub use config::{ComplaintPolicy, VssConfig};
pub use mediator::{Address, Mediator, MembershipOracle, StaticCommittee};
pub use signing::{GroupSigner, LoggingSigner};
pub use vss::{DealerStatus, VssError, VssProtocol};
