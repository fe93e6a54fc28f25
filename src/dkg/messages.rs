use std::fmt::Display;

use enum_display::EnumDisplay;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque cryptographic bytes produced and consumed by the DKG primitive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload(pub Vec<u8>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoded = hex::encode(&self.0);
        if encoded.len() > 12 {
            write!(f, "{}..({}B)", &encoded[..12], self.0.len())
        } else {
            f.write_str(&encoded)
        }
    }
}

/// A deal from `dealer_index` to `destination_index`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealEvent {
    pub dealer_index: u32,
    pub destination_index: u32,
    pub deal: Payload,
}

impl Display for DealEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "deal {} -> {} [{}]",
            self.dealer_index, self.destination_index, self.deal
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Approval,
    Complaint,
}

/// The verdict of `responder_index` on the deal issued by `dealer_index`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub dealer_index: u32,
    pub responder_index: u32,
    pub status: ResponseStatus,
    pub response: Payload,
}

impl ResponseEvent {
    pub fn is_approval(&self) -> bool {
        self.status == ResponseStatus::Approval
    }
}

impl Display for ResponseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "response {} on dealer {} ({:?}) [{}]",
            self.responder_index, self.dealer_index, self.status, self.response
        )
    }
}

/// Evidence that a response uncovered a fault in a deal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    pub dealer_index: u32,
    pub evidence: Payload,
}

/// Unit relayed between physical nodes.
#[derive(Clone, Debug, PartialEq, Eq, EnumDisplay, Serialize, Deserialize)]
pub enum VssMessage {
    Deal(DealEvent),
    Response(ResponseEvent),
}

impl VssMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl From<DealEvent> for VssMessage {
    fn from(value: DealEvent) -> Self {
        Self::Deal(value)
    }
}

impl From<ResponseEvent> for VssMessage {
    fn from(value: ResponseEvent) -> Self {
        Self::Response(value)
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}
