// Beacon Simulation Configuration

use crate::beacon_interface::Tick;
use std::fmt;

/// Immutable parameters for one simulation run.
///
/// Deserializable from YAML; fields missing from a scenario file fall back to
/// `Default`. Call [`BeaconConfig::validate`] (the engine does this on
/// construction) before using a hand-built config.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// Population size; every node is created up front and never destroyed
    pub nodes: usize,

    /// Tickets each node draws per lottery, indexed by node (len == nodes)
    pub ticket_distribution: Vec<usize>,

    /// Number of groups formed in the one-time bootstrap
    pub active_group_threshold: usize,

    /// Seats per group (lottery may overshoot on ties)
    pub group_size: usize,

    /// Largest single-owner seat share a group tolerates (0.0 - 1.0]
    pub max_malicious_threshold: f64,

    /// Ticks a group stays active before expiring
    pub group_expiry: Tick,

    /// Per-tick probability a forked node's main loop fails
    pub node_failure_percent: f64,

    /// Per-tick probability a forked node drops off the network
    pub node_death_percent: f64,

    /// Ticks a signature takes to complete
    pub signature_delay: Tick,

    /// Minimum forked nodes required before any group can form
    pub min_nodes: usize,

    /// Ticks to connect to the chain
    pub node_connection_delay: Tick,

    /// Ticks to fork the relay main loop once connected
    pub node_mainloop_connection_delay: Tick,

    /// Run identifier, included in run-level log output
    pub run_id: u32,

    /// Random seed for reproducibility
    pub seed: Option<[u8; 32]>,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            nodes: 100,
            ticket_distribution: vec![10; 100],
            active_group_threshold: 10,
            group_size: 20,
            max_malicious_threshold: 0.51,
            group_expiry: 100,
            node_failure_percent: 0.01,
            node_death_percent: 0.001,
            signature_delay: 2,
            min_nodes: 30,
            node_connection_delay: 5,
            node_mainloop_connection_delay: 3,
            run_id: 0,
            seed: None,
        }
    }
}

/// Configuration rejected before a run starts
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Population is empty
    NoNodes,

    /// Ticket distribution does not have one entry per node
    DistributionLength { expected: usize, found: usize },

    /// A node is configured to draw no tickets
    ZeroTickets { node: usize },

    /// Groups must have at least one seat
    ZeroGroupSize,

    /// Group size must be strictly smaller than the population
    GroupTooLarge { group_size: usize, nodes: usize },

    /// Formation threshold outside 1..=nodes
    MinNodesOutOfRange { min_nodes: usize, nodes: usize },

    /// The smallest eligible pool cannot fill a group
    InsufficientTickets { available: usize, group_size: usize },

    /// A probability-like parameter is outside its range
    OutOfRange { field: &'static str, value: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoNodes => write!(f, "population must contain at least one node"),
            ConfigError::DistributionLength { expected, found } => write!(
                f,
                "ticket distribution has {} entries, expected one per node ({})",
                found, expected
            ),
            ConfigError::ZeroTickets { node } => {
                write!(f, "node {} is configured with zero tickets", node)
            }
            ConfigError::ZeroGroupSize => write!(f, "group size must be at least 1"),
            ConfigError::GroupTooLarge { group_size, nodes } => write!(
                f,
                "group size {} must be smaller than the population ({})",
                group_size, nodes
            ),
            ConfigError::MinNodesOutOfRange { min_nodes, nodes } => write!(
                f,
                "min_nodes {} must be between 1 and the population ({})",
                min_nodes, nodes
            ),
            ConfigError::InsufficientTickets { available, group_size } => write!(
                f,
                "smallest formation pool holds {} tickets, a group of {} needs {}",
                available,
                group_size,
                group_size + 1
            ),
            ConfigError::OutOfRange { field, value } => {
                write!(f, "{} = {} is out of range", field, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl BeaconConfig {
    /// Reject configurations the engine could not sustain
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes == 0 {
            return Err(ConfigError::NoNodes);
        }

        if self.ticket_distribution.len() != self.nodes {
            return Err(ConfigError::DistributionLength {
                expected: self.nodes,
                found: self.ticket_distribution.len(),
            });
        }

        if let Some(node) = self.ticket_distribution.iter().position(|&t| t == 0) {
            return Err(ConfigError::ZeroTickets { node });
        }

        if self.group_size == 0 {
            return Err(ConfigError::ZeroGroupSize);
        }

        if self.group_size >= self.nodes {
            return Err(ConfigError::GroupTooLarge {
                group_size: self.group_size,
                nodes: self.nodes,
            });
        }

        if self.min_nodes == 0 || self.min_nodes > self.nodes {
            return Err(ConfigError::MinNodesOutOfRange {
                min_nodes: self.min_nodes,
                nodes: self.nodes,
            });
        }

        // Worst case: exactly min_nodes are forked and they are the poorest ones.
        // A lottery draws one seat past group_size.
        let mut counts = self.ticket_distribution.clone();
        counts.sort_unstable();
        let available: usize = counts.iter().take(self.min_nodes).sum();
        if available <= self.group_size {
            return Err(ConfigError::InsufficientTickets {
                available,
                group_size: self.group_size,
            });
        }

        check_probability("node_failure_percent", self.node_failure_percent)?;
        check_probability("node_death_percent", self.node_death_percent)?;

        if !(self.max_malicious_threshold > 0.0 && self.max_malicious_threshold <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "max_malicious_threshold",
                value: self.max_malicious_threshold,
            });
        }

        Ok(())
    }

    /// Largest ticket count of any node; lottery rows are padded to this width
    pub fn max_tickets(&self) -> usize {
        self.ticket_distribution.iter().copied().max().unwrap_or(0)
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}
