// Beacon Simulation Shared Types

/// Entity ids share one numeric type across nodes, groups and signatures
pub type EntityId = u64;
pub type GroupId = u64;
pub type SignatureId = u64;

/// Discrete simulation time (engine steps)
pub type Tick = u64;

/// Sortition key; lowest value wins a group seat
pub type Ticket = u64;

/// Probability of a relay request arriving on any given step
pub const RELAY_REQUEST_PROBABILITY: f64 = 0.5;

// ============================================================================
// Entity Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Group,
    Signature,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Group => "group",
            EntityKind::Signature => "signature",
        }
    }
}

// ============================================================================
// Node Connectivity
// ============================================================================

/// Connectivity of a node. Only `Forked` nodes may take part in a lottery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Dropped off the network this tick; reconnects from scratch next tick
    Disconnected,

    /// Establishing a connection to the chain
    Connecting { remaining: u64 },

    /// Connected, waiting for the relay main loop to fork
    Forking { remaining: u64 },

    /// Main loop running; eligible for group membership
    Forked,

    /// Main loop crashed this tick; restarts it next tick
    Failed,
}

impl NodeState {
    pub fn is_forked(&self) -> bool {
        matches!(self, NodeState::Forked)
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            NodeState::Forking { .. } | NodeState::Forked | NodeState::Failed
        )
    }
}

// ============================================================================
// Group / Signature Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Active,
    Expired,
    Compromised,
}

impl GroupStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, GroupStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    Pending { remaining: u64 },
    Complete,
    Failed(FailureReason),
}

/// Why a relay signature could not be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// A single owner controls more seats than the malicious threshold allows
    GroupCompromised,

    /// The group expired before signing finished
    GroupInactive,

    /// Not enough seats were held by forked nodes
    InsufficientSigners { online: usize, required: usize },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::GroupCompromised => write!(f, "group compromised"),
            FailureReason::GroupInactive => write!(f, "group inactive"),
            FailureReason::InsufficientSigners { online, required } => {
                write!(f, "insufficient signers ({} online, {} required)", online, required)
            }
        }
    }
}

/// An unsuccessful relay entry, recorded for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEvent {
    pub tick: Tick,
    pub signature_id: SignatureId,
    pub group_id: GroupId,
    pub reason: FailureReason,
}
