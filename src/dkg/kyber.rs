use std::fmt::Display;

use kyber_rs::{
    group::edwards25519::{Point, SuiteEd25519},
    share::dkg::rabin::{new_dist_key_generator, Deal, DistKeyGenerator, Response},
    util::key::Pair,
};
use serde::{Deserialize, Serialize};

use super::{
    log_target, Complaint, DealEvent, DkgError, DkgSession, Payload, ResponseEvent,
    ResponseStatus,
};

#[derive(Serialize, Deserialize)]
struct DealWire {
    #[serde(deserialize_with = "Deal::deserialize")]
    deal: Deal<Point>,
}

/// Rabin DKG over Ed25519 for one committee member.
pub struct KyberDkg {
    dkg: DistKeyGenerator<SuiteEd25519>,
    index: u32,
}

impl KyberDkg {
    /// `committee` must already be in term order.
    pub fn new(key: &Pair<Point>, committee: &[Point], threshold: usize) -> Result<Self, DkgError> {
        let index = committee
            .iter()
            .position(|p| *p == key.public)
            .ok_or_else(|| DkgError::Setup("own key is not part of the committee".to_owned()))?;
        let dkg = new_dist_key_generator(
            &SuiteEd25519::new_blake3_sha256_ed25519(),
            &key.private,
            &committee.to_vec(),
            threshold,
        )
        .map_err(|e| DkgError::Setup(e.to_string()))?;
        Ok(Self {
            dkg,
            index: index as u32,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Display for KyberDkg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!(
            "rabin dkg (index: {}, participants: {})",
            self.index,
            self.dkg.participants.len()
        ))
    }
}

impl DkgSession for KyberDkg {
    fn generate_deals(&mut self) -> Result<Vec<DealEvent>, DkgError> {
        let deals = self
            .dkg
            .deals()
            .map_err(|e| DkgError::Setup(e.to_string()))?;
        let mut events = Vec::with_capacity(deals.len());
        for (destination, deal) in deals {
            let bytes = bincode::serialize(&DealWire { deal })
                .map_err(|e| DkgError::Primitive(e.to_string()))?;
            events.push(DealEvent {
                dealer_index: self.index,
                destination_index: destination as u32,
                deal: bytes.into(),
            });
        }
        events.sort_by_key(|d| d.destination_index);
        Ok(events)
    }

    fn process_deal(&mut self, deal: &DealEvent) -> Result<ResponseEvent, DkgError> {
        let wire: DealWire =
            bincode::deserialize(deal.deal.as_bytes()).map_err(|e| DkgError::MalformedDeal {
                dealer: deal.dealer_index,
                reason: e.to_string(),
            })?;
        let response = self
            .dkg
            .process_deal(&wire.deal)
            .map_err(|e| DkgError::MalformedDeal {
                dealer: deal.dealer_index,
                reason: e.to_string(),
            })?;
        let status = if response.response.approved {
            ResponseStatus::Approval
        } else {
            ResponseStatus::Complaint
        };
        let bytes =
            bincode::serialize(&response).map_err(|e| DkgError::Primitive(e.to_string()))?;
        Ok(ResponseEvent {
            dealer_index: deal.dealer_index,
            responder_index: self.index,
            status,
            response: bytes.into(),
        })
    }

    fn process_response(
        &mut self,
        response: &ResponseEvent,
    ) -> Result<Option<Complaint>, DkgError> {
        let decoded: Response = bincode::deserialize(response.response.as_bytes()).map_err(|e| {
            DkgError::MalformedResponse {
                responder: response.responder_index,
                reason: e.to_string(),
            }
        })?;
        let justification = self
            .dkg
            .process_response(&decoded)
            .map_err(|e| DkgError::MalformedResponse {
                responder: response.responder_index,
                reason: e.to_string(),
            })?;
        Ok(justification.map(|j| {
            let evidence = bincode::serialize(&j).unwrap_or_else(|e| {
                log::warn!(target: &log_target(), "could not encode justification: {}", e);
                Vec::new()
            });
            Complaint {
                dealer_index: response.dealer_index,
                evidence: Payload(evidence),
            }
        }))
    }

    fn is_certified(&self) -> bool {
        self.dkg.certified()
    }
}

/// Orders committee keys the way every member derives indices.
pub fn committee_order(public_keys: &[Point]) -> Vec<Point> {
    let mut ordered = public_keys.to_vec();
    ordered.sort_by_key(|pk| pk.to_string());
    ordered
}

/// One handle per locally controlled key pair, threshold `n / 2 + 1`.
pub fn new_committee_dkgs(
    local_keys: &[Pair<Point>],
    public_keys: &[Point],
) -> Result<Vec<KyberDkg>, DkgError> {
    let committee = committee_order(public_keys);
    let threshold = committee.len() / 2 + 1;
    local_keys
        .iter()
        .map(|key| KyberDkg::new(key, &committee, threshold))
        .collect()
}
