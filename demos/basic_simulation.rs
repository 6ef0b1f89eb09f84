//! Basic beacon relay simulation
//!
//! Run with: cargo run --example basic_simulation

use beacon_sim::{BeaconConfig, BeaconEngine, MemoryCollector, SimulationResult};
use log::info;
use simple_logger::SimpleLogger;

fn main() {
    SimpleLogger::new().init().unwrap();

    info!("Setting up simulation...");

    let config = BeaconConfig {
        nodes: 200,
        ticket_distribution: (0..200).map(|i| 5 + i % 10).collect(),
        active_group_threshold: 8,
        group_size: 25,
        min_nodes: 60,
        group_expiry: 150,
        node_failure_percent: 0.02,
        node_death_percent: 0.002,
        seed: None, // Will be auto-generated
        ..Default::default()
    };

    info!("Starting simulation...");

    let mut engine = BeaconEngine::new(config).unwrap();
    let mut collector = MemoryCollector::new();
    engine.run(1000, &mut collector);

    // Display results
    info!("Simulation complete!");
    info!("Seed used: {:?}", engine.seed_used());

    let result = SimulationResult::from_engine(&engine);
    info!(
        "Groups: formed: {} active: {} expired: {} compromised: {}",
        result.groups.formed, result.groups.active, result.groups.expired, result.groups.compromised
    );
    info!(
        "Signatures: created: {} complete: {} failed: {}",
        result.signatures.created, result.signatures.complete, result.signatures.failed
    );

    let worst = collector
        .groups()
        .map(|record| record.max_share())
        .fold(0.0, f64::max);
    info!("Largest single-owner share seen in any group: {:.1}%", worst * 100.0);

    result.print_summary();
}
