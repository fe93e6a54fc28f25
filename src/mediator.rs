use std::{collections::HashSet, fmt::Display};

use serde::{Deserialize, Serialize};

/// Stable address of a committee member.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self(address.into())
    }

    /// Last ten characters, used in log lines. Addresses share their
    /// leading prefix, so the tail is what tells mediators apart.
    pub fn short(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(9)
            .map(|(i, _)| i)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A committee member together with its index in the current term ordering.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Mediator {
    pub address: Address,
    pub index: u32,
}

/// Read-only view of the current committee.
///
/// Answers must reflect the committee of the running term; callers do not
/// cache them.
pub trait MembershipOracle: Send + Sync {
    fn active_mediators_count(&self) -> usize;

    /// Resolves a committee index, or `None` when the index is out of range.
    fn active_mediator_addr(&self, index: u32) -> Option<Address>;

    /// Mediators whose private key material this node controls.
    fn local_active_mediators(&self) -> Vec<Mediator>;

    fn active_mediator_by_index(&self, index: u32) -> Option<Mediator> {
        self.active_mediator_addr(index)
            .map(|address| Mediator { address, index })
    }

    fn is_local(&self, address: &Address) -> bool {
        self.local_active_mediators()
            .iter()
            .any(|m| &m.address == address)
    }
}

/// Fixed committee for one term.
#[derive(Clone, Debug)]
pub struct StaticCommittee {
    members: Vec<Address>,
    local: HashSet<Address>,
}

impl StaticCommittee {
    pub fn new(members: Vec<Address>, local: impl IntoIterator<Item = Address>) -> Self {
        Self {
            members,
            local: local.into_iter().collect(),
        }
    }
}

impl MembershipOracle for StaticCommittee {
    fn active_mediators_count(&self) -> usize {
        self.members.len()
    }

    fn active_mediator_addr(&self, index: u32) -> Option<Address> {
        self.members.get(index as usize).cloned()
    }

    fn local_active_mediators(&self) -> Vec<Mediator> {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, address)| self.local.contains(*address))
            .map(|(i, address)| Mediator {
                address: address.clone(),
                index: i as u32,
            })
            .collect()
    }

    fn is_local(&self, address: &Address) -> bool {
        self.local.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committee() -> StaticCommittee {
        StaticCommittee::new(
            vec!["P1alpha".into(), "P1beta".into(), "P1gamma".into()],
            vec![Address::from("P1gamma"), Address::from("P1alpha")],
        )
    }

    #[test]
    fn local_mediators_keep_committee_order() {
        let local = committee().local_active_mediators();
        assert_eq!(
            local,
            vec![
                Mediator {
                    address: "P1alpha".into(),
                    index: 0
                },
                Mediator {
                    address: "P1gamma".into(),
                    index: 2
                },
            ]
        );
    }

    #[test]
    fn out_of_range_index_does_not_resolve() {
        let committee = committee();
        assert_eq!(committee.active_mediators_count(), 3);
        assert_eq!(committee.active_mediator_addr(1), Some("P1beta".into()));
        assert_eq!(committee.active_mediator_addr(3), None);
        assert!(!committee.is_local(&"P1beta".into()));
    }

    #[test]
    fn short_address_handles_short_input() {
        assert_eq!(Address::from("P1").short(), "P1");
        assert_eq!(Address::from("P1abcdefghijkl").short(), "cdefghijkl");
        assert_ne!(
            Address::from("P1mediator10").short(),
            Address::from("P1mediator11").short()
        );
    }
}
