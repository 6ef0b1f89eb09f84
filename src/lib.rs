//! # beacon_sim - Random Beacon Relay Network Simulation
//!
//! A discrete-time simulation of a threshold-signature random beacon. Nodes
//! join and churn through a connection state machine, signing groups are
//! formed by a lowest-ticket-wins lottery, and relay requests spawn
//! signatures that succeed or fail depending on their group's health.
//!
//! ## Core Components
//!
//! - **BeaconEngine**: Step control, bootstrap, relay requests and group registration
//! - **Scheduler**: Simultaneous-activation arena of nodes, groups and signatures
//! - **LotteryTable**: Ticket table used for group sortition
//! - **DataCollector**: Per-step sampling of each entity's ownership distribution
//!
//! ```
//! use beacon_sim::{BeaconConfig, BeaconEngine, MemoryCollector, SimulationResult};
//!
//! let config = BeaconConfig {
//!     nodes: 30,
//!     ticket_distribution: vec![3; 30],
//!     active_group_threshold: 2,
//!     group_size: 5,
//!     min_nodes: 10,
//!     seed: Some([1u8; 32]),
//!     ..Default::default()
//! };
//!
//! let mut engine = BeaconEngine::new(config).unwrap();
//! let mut collector = MemoryCollector::new();
//! engine.run(50, &mut collector);
//!
//! let result = SimulationResult::from_engine(&engine);
//! assert_eq!(result.total_steps, 50);
//! ```
//!
//! ## Scenarios
//!
//! The `scenario_runner` binary in `simulator/` loads YAML scenario files
//! (see `scenarios/`) and prints a summary for each run.

// Shared types
pub mod beacon_interface;
pub mod beacon_config;

// Entities
pub mod beacon_node;
pub mod beacon_group;
pub mod beacon_signature;

// Simulation core
pub mod beacon_scheduler;
pub mod beacon_lottery;
pub mod beacon_engine;

// Reporting
pub mod beacon_collector;
pub mod beacon_stats;

// Re-export commonly used types
pub use beacon_collector::{
    ConsoleCollector, CsvCollector, DataCollector, MemoryCollector, MultiCollector, NoOpCollector,
    OwnershipRecord,
};
pub use beacon_config::{BeaconConfig, ConfigError};
pub use beacon_engine::{BeaconEngine, EngineCounters, StepReport};
pub use beacon_interface::{
    EntityId, EntityKind, FailureReason, GroupId, GroupStatus, NodeState, SignatureEvent,
    SignatureId, SignatureStatus, Tick, Ticket,
};
pub use beacon_scheduler::{Entity, Scheduler};
pub use beacon_stats::SimulationResult;
