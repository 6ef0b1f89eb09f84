use crate::beacon_config::BeaconConfig;
use crate::beacon_interface::{EntityId, NodeState, Ticket, Tick};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A relay node that churns between connectivity states
///
/// Nodes are created once at engine start and live for the whole run. Each
/// tick a node computes its next [`NodeState`] from its current one; forked
/// nodes may fail (main loop restarts) or die (full reconnect).
///
/// Every node carries its own random stream so that its churn draws do not
/// depend on the order in which the scheduler visits entities.
#[derive(Debug, Clone)]
pub struct Node {
    id: EntityId,
    index: usize,
    ticket_count: usize,
    failure_percent: f64,
    death_percent: f64,
    connection_delay: Tick,
    mainloop_delay: Tick,
    state: NodeState,
    rng: StdRng,
    secret: [u8; 32],
    generation: u64,
    tickets: Vec<Ticket>,
}

/// Next state computed against the start-of-tick snapshot
#[derive(Debug, Clone)]
pub struct NodeTransition {
    state: NodeState,
    rng: StdRng,
}

impl Node {
    /// Create node number `index` of the population
    ///
    /// `rng` is the engine's master stream; the node draws its private seed
    /// and ticket secret from it.
    pub fn new(id: EntityId, index: usize, config: &BeaconConfig, rng: &mut StdRng) -> Self {
        let ticket_count = config.ticket_distribution.get(index).copied().unwrap_or(0);

        Self {
            id,
            index,
            ticket_count,
            failure_percent: config.node_failure_percent,
            death_percent: config.node_death_percent,
            connection_delay: config.node_connection_delay,
            mainloop_delay: config.node_mainloop_connection_delay,
            state: connecting(config.node_connection_delay, config.node_mainloop_connection_delay),
            rng: StdRng::from_seed(rng.gen()),
            secret: rng.gen(),
            generation: 0,
            tickets: Vec::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Position of this node in the population (and the ticket distribution)
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_forked(&self) -> bool {
        self.state.is_forked()
    }

    pub fn ticket_count(&self) -> usize {
        self.ticket_count
    }

    /// Tickets from the most recent [`Node::generate_tickets`] call
    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    /// Draw a fresh set of `ticket_count` tickets for a lottery
    ///
    /// Ticket = Blake3(secret || generation || index), lower 64 bits. Each call
    /// advances the generation, so successive lotteries see independent values.
    pub fn generate_tickets(&mut self) -> &[Ticket] {
        self.generation += 1;
        let secret = self.secret;
        let generation = self.generation;

        self.tickets = (0..self.ticket_count as u64)
            .map(|i| derive_ticket(&secret, generation, i))
            .collect();

        &self.tickets
    }

    /// Compute the next state without mutating the node
    pub fn compute(&self) -> NodeTransition {
        let mut rng = self.rng.clone();

        let state = match self.state {
            NodeState::Disconnected => connecting(self.connection_delay, self.mainloop_delay),
            NodeState::Connecting { remaining } => {
                if remaining <= 1 {
                    forking(self.mainloop_delay)
                } else {
                    NodeState::Connecting { remaining: remaining - 1 }
                }
            }
            NodeState::Forking { remaining } => {
                if remaining <= 1 {
                    NodeState::Forked
                } else {
                    NodeState::Forking { remaining: remaining - 1 }
                }
            }
            NodeState::Forked => {
                if rng.gen_bool(self.death_percent) {
                    NodeState::Disconnected
                } else if rng.gen_bool(self.failure_percent) {
                    NodeState::Failed
                } else {
                    NodeState::Forked
                }
            }
            NodeState::Failed => forking(self.mainloop_delay),
        };

        NodeTransition { state, rng }
    }

    pub fn commit(&mut self, transition: NodeTransition) {
        if transition.state != self.state {
            log::debug!(
                "node {} (#{}): {:?} -> {:?}",
                self.id,
                self.index,
                self.state,
                transition.state
            );
        }
        self.state = transition.state;
        self.rng = transition.rng;
    }
}

/// Entry state of the connect chain; zero delays skip straight through
fn connecting(connection_delay: Tick, mainloop_delay: Tick) -> NodeState {
    if connection_delay == 0 {
        forking(mainloop_delay)
    } else {
        NodeState::Connecting { remaining: connection_delay }
    }
}

fn forking(mainloop_delay: Tick) -> NodeState {
    if mainloop_delay == 0 {
        NodeState::Forked
    } else {
        NodeState::Forking { remaining: mainloop_delay }
    }
}

fn derive_ticket(secret: &[u8; 32], generation: u64, index: u64) -> Ticket {
    let mut hasher = blake3::Hasher::new();
    hasher.update(secret);
    hasher.update(&generation.to_le_bytes());
    hasher.update(&index.to_le_bytes());
    let hash = hasher.finalize();

    let mut lower = [0u8; 8];
    lower.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(lower)
}
