// Beacon Simulation Statistics

use crate::beacon_engine::{BeaconEngine, EngineCounters};
use crate::beacon_interface::{FailureReason, GroupStatus, SignatureStatus};

// ============================================================================
// Simulation Result
// ============================================================================

/// End-of-run summary built from an engine
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Configuration summary
    pub config_summary: String,

    /// Random seed used
    pub seed_used: [u8; 32],

    /// Steps executed
    pub total_steps: u64,

    /// Node population at the end of the run
    pub nodes: NodeCounts,

    /// Groups by final status
    pub groups: GroupCounts,

    /// Relay requests and their signatures
    pub signatures: SignatureCounts,

    /// Engine running totals
    pub counters: EngineCounters,

    /// Engine caches as of the last step
    pub active_nodes: usize,
    pub active_groups: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NodeCounts {
    pub total: usize,
    pub forked: usize,
    pub connected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GroupCounts {
    pub formed: usize,
    pub active: usize,
    pub expired: usize,
    pub compromised: usize,

    /// Mean seats per group (`group_size + 1`, more when ties overshoot)
    pub avg_seats: f64,

    /// Mean largest single-owner seat share
    pub avg_max_owner_share: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SignatureCounts {
    pub created: usize,
    pub pending: usize,
    pub complete: usize,
    pub failed: usize,
    pub failed_compromised: usize,
    pub failed_inactive: usize,
    pub failed_insufficient_signers: usize,
}

impl SimulationResult {
    pub fn from_engine(engine: &BeaconEngine) -> Self {
        let config = engine.config();
        let scheduler = engine.scheduler();

        let mut nodes = NodeCounts::default();
        for node in scheduler.nodes() {
            nodes.total += 1;
            if node.is_forked() {
                nodes.forked += 1;
            }
            if node.state().is_connected() {
                nodes.connected += 1;
            }
        }

        let mut groups = GroupCounts::default();
        let mut seats = 0;
        let mut share = 0.0;
        for group in scheduler.groups() {
            groups.formed += 1;
            seats += group.members().len();
            share += group.max_owner_share();
            match group.status() {
                GroupStatus::Active => groups.active += 1,
                GroupStatus::Expired => groups.expired += 1,
                GroupStatus::Compromised => groups.compromised += 1,
            }
        }
        if groups.formed > 0 {
            groups.avg_seats = seats as f64 / groups.formed as f64;
            groups.avg_max_owner_share = share / groups.formed as f64;
        }

        let mut signatures = SignatureCounts::default();
        for signature in scheduler.signatures() {
            signatures.created += 1;
            match signature.status() {
                SignatureStatus::Pending { .. } => signatures.pending += 1,
                SignatureStatus::Complete => signatures.complete += 1,
                SignatureStatus::Failed(_) => signatures.failed += 1,
            }
        }
        for event in engine.unsuccessful_signature_events() {
            match event.reason {
                FailureReason::GroupCompromised => signatures.failed_compromised += 1,
                FailureReason::GroupInactive => signatures.failed_inactive += 1,
                FailureReason::InsufficientSigners { .. } => {
                    signatures.failed_insufficient_signers += 1
                }
            }
        }

        SimulationResult {
            config_summary: format!(
                "Run: {}, Nodes: {}, Group size: {}, Bootstrap groups: {}, Min nodes: {}, Expiry: {}",
                config.run_id,
                config.nodes,
                config.group_size,
                config.active_group_threshold,
                config.min_nodes,
                config.group_expiry
            ),
            seed_used: engine.seed_used(),
            total_steps: engine.timer(),
            nodes,
            groups,
            signatures,
            counters: engine.counters(),
            active_nodes: engine.active_nodes().len(),
            active_groups: engine.active_groups().len(),
        }
    }

    /// Fraction of relay requests that produced a completed signature
    pub fn relay_success_rate(&self) -> f64 {
        if self.counters.relay_requests == 0 {
            return 0.0;
        }
        self.signatures.complete as f64 / self.counters.relay_requests as f64
    }

    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║    BEACON RELAY SIMULATION RESULTS                     ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Configuration: {}", self.config_summary);
        println!("Steps: {}", self.total_steps);
        println!();

        println!("═══ Nodes ═══");
        println!(
            "  {} total, {} connected, {} forked",
            self.nodes.total, self.nodes.connected, self.nodes.forked
        );
        println!("  Active at last refresh: {}", self.active_nodes);
        println!();

        println!("═══ Groups ═══");
        println!("  Formed: {}", self.groups.formed);
        println!("  Active: {} ({} cached)", self.groups.active, self.active_groups);
        println!("  Expired: {}", self.groups.expired);
        println!("  Compromised: {}", self.groups.compromised);
        println!("  Avg Seats: {:.2}", self.groups.avg_seats);
        println!(
            "  Avg Max Owner Share: {:.1}%",
            self.groups.avg_max_owner_share * 100.0
        );
        println!("  Registrations Skipped: {}", self.counters.registrations_skipped);
        println!();

        println!("═══ Relay Requests ═══");
        println!("  Requests: {}", self.counters.relay_requests);
        println!("  Unserved (no active group): {}", self.counters.signatures_unserved);
        println!(
            "  Signatures: {} created, {} complete, {} pending, {} failed",
            self.signatures.created,
            self.signatures.complete,
            self.signatures.pending,
            self.signatures.failed
        );
        if self.signatures.failed > 0 {
            println!(
                "  Failures: {} compromised, {} inactive, {} insufficient signers",
                self.signatures.failed_compromised,
                self.signatures.failed_inactive,
                self.signatures.failed_insufficient_signers
            );
        }
        println!("  Success Rate: {:.1}%", self.relay_success_rate() * 100.0);
        println!();
    }
}
