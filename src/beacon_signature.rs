use crate::beacon_interface::{
    EntityId, FailureReason, GroupId, GroupStatus, SignatureEvent, SignatureId, SignatureStatus,
    Tick,
};
use crate::beacon_scheduler::{Entity, StepView};
use std::fmt;

/// A relay entry being produced by one group
///
/// The signature waits `signature_delay` ticks, then checks its group in the
/// start-of-tick snapshot: the group must still be active and uncompromised,
/// and strictly more than half of its seats must belong to forked nodes.
#[derive(Debug, Clone)]
pub struct Signature {
    id: EntityId,
    signature_id: SignatureId,
    group: EntityId,
    group_id: GroupId,
    status: SignatureStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureTransition {
    status: SignatureStatus,
    event: Option<SignatureEvent>,
}

impl SignatureTransition {
    /// Failure record produced by this transition, if any
    pub fn take_event(&mut self) -> Option<SignatureEvent> {
        self.event.take()
    }
}

/// Signature could not be bound to a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// No entity was supplied
    MissingGroup,

    /// The referenced entity is not a group
    NotAGroup(EntityId),

    /// The group has no seats to sign with
    EmptyGroup(GroupId),
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::MissingGroup => write!(f, "no group supplied for signature"),
            SignatureError::NotAGroup(id) => write!(f, "entity {} is not a group", id),
            SignatureError::EmptyGroup(id) => write!(f, "group {} has no members", id),
        }
    }
}

impl std::error::Error for SignatureError {}

impl Signature {
    pub fn new(
        id: EntityId,
        signature_id: SignatureId,
        group: Option<&Entity>,
        delay: Tick,
    ) -> Result<Self, SignatureError> {
        let entity = group.ok_or(SignatureError::MissingGroup)?;
        let group = entity.as_group().ok_or(SignatureError::NotAGroup(entity.id()))?;

        if group.members().is_empty() {
            return Err(SignatureError::EmptyGroup(group.group_id()));
        }

        Ok(Self {
            id,
            signature_id,
            group: group.id(),
            group_id: group.group_id(),
            status: SignatureStatus::Pending { remaining: delay },
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn signature_id(&self) -> SignatureId {
        self.signature_id
    }

    /// Entity id of the signing group
    pub fn group(&self) -> EntityId {
        self.group
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn status(&self) -> SignatureStatus {
        self.status
    }

    pub fn compute(&self, view: &StepView<'_>) -> SignatureTransition {
        let remaining = match self.status {
            SignatureStatus::Pending { remaining } => remaining.saturating_sub(1),
            done => return SignatureTransition { status: done, event: None },
        };

        if remaining > 0 {
            return SignatureTransition {
                status: SignatureStatus::Pending { remaining },
                event: None,
            };
        }

        match self.evaluate(view) {
            Ok(()) => SignatureTransition {
                status: SignatureStatus::Complete,
                event: None,
            },
            Err(reason) => SignatureTransition {
                status: SignatureStatus::Failed(reason),
                event: Some(SignatureEvent {
                    tick: view.tick,
                    signature_id: self.signature_id,
                    group_id: self.group_id,
                    reason,
                }),
            },
        }
    }

    fn evaluate(&self, view: &StepView<'_>) -> Result<(), FailureReason> {
        let group = view.group(self.group).ok_or(FailureReason::GroupInactive)?;

        match group.status() {
            GroupStatus::Compromised => return Err(FailureReason::GroupCompromised),
            GroupStatus::Expired => return Err(FailureReason::GroupInactive),
            GroupStatus::Active => {}
        }

        let seats = group.members().len();
        let required = seats / 2 + 1;
        let online = group
            .members()
            .iter()
            .filter(|member| view.node(**member).map_or(false, |node| node.is_forked()))
            .count();

        if online < required {
            return Err(FailureReason::InsufficientSigners { online, required });
        }

        Ok(())
    }

    pub fn commit(&mut self, transition: SignatureTransition) {
        if transition.status != self.status {
            log::debug!(
                "signature {} on group {}: {:?} -> {:?}",
                self.signature_id,
                self.group_id,
                self.status,
                transition.status
            );
        }
        self.status = transition.status;
    }
}
