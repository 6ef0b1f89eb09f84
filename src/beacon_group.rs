use crate::beacon_config::BeaconConfig;
use crate::beacon_interface::{EntityId, GroupId, GroupStatus, Tick};
use hashbrown::HashMap;

/// A signing group formed by the ticket lottery
///
/// Membership is a list of seats, fixed at formation. A node that won several
/// tickets holds several seats, which is what the ownership distribution
/// measures: if any one owner holds more than `max_malicious_threshold` of the
/// seats, that owner could produce signatures alone and the group is
/// compromised.
#[derive(Debug, Clone)]
pub struct Group {
    id: EntityId,
    group_id: GroupId,
    members: Vec<EntityId>,
    /// Seat counts per distinct owner, largest first
    ownership: Vec<usize>,
    expires_in: Tick,
    status: GroupStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupTransition {
    status: GroupStatus,
    expires_in: Tick,
}

impl Group {
    pub fn new(id: EntityId, group_id: GroupId, members: Vec<EntityId>, expiry: Tick) -> Self {
        let ownership = ownership_distribution(&members);

        Self {
            id,
            group_id,
            members,
            ownership,
            expires_in: expiry,
            status: GroupStatus::Active,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn status(&self) -> GroupStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn expires_in(&self) -> Tick {
        self.expires_in
    }

    pub fn ownership_distribution(&self) -> &[usize] {
        &self.ownership
    }

    /// Share of seats held by the single largest owner (0.0 for an empty group)
    pub fn max_owner_share(&self) -> f64 {
        match self.ownership.first() {
            Some(&largest) if !self.members.is_empty() => {
                largest as f64 / self.members.len() as f64
            }
            _ => 0.0,
        }
    }

    pub fn compute(&self, config: &BeaconConfig) -> GroupTransition {
        if !self.is_active() {
            return GroupTransition {
                status: self.status,
                expires_in: self.expires_in,
            };
        }

        if self.max_owner_share() > config.max_malicious_threshold {
            return GroupTransition {
                status: GroupStatus::Compromised,
                expires_in: self.expires_in,
            };
        }

        let expires_in = self.expires_in.saturating_sub(1);
        let status = if expires_in == 0 {
            GroupStatus::Expired
        } else {
            GroupStatus::Active
        };

        GroupTransition { status, expires_in }
    }

    pub fn commit(&mut self, transition: GroupTransition) {
        if transition.status != self.status {
            log::debug!(
                "group {} (entity {}): {:?} -> {:?}",
                self.group_id,
                self.id,
                self.status,
                transition.status
            );
        }
        self.status = transition.status;
        self.expires_in = transition.expires_in;
    }
}

fn ownership_distribution(members: &[EntityId]) -> Vec<usize> {
    let mut seats: HashMap<EntityId, usize> = HashMap::new();
    for member in members {
        *seats.entry(*member).or_insert(0) += 1;
    }

    let mut counts: Vec<usize> = seats.into_values().collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));
    counts
}
