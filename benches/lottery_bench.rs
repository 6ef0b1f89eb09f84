use beacon_sim::beacon_lottery::LotteryTable;
use beacon_sim::{BeaconConfig, BeaconEngine, NoOpCollector};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simple_logger::SimpleLogger;
use std::time::Instant;

/// Benchmark group sortition cost and full engine steps
fn main() {
    // Keep per-step debug logging out of the timed loops
    let _ = SimpleLogger::new().with_level(LevelFilter::Error).init();

    println!("\n=== Lottery Table Benchmark (Group Sortition Cost) ===\n");

    let mut rng = StdRng::from_seed([9u8; 32]);

    // (candidates, tickets per candidate, seats)
    let configs = vec![
        ("Small (50 nodes x 10)", 50, 10, 20),
        ("Medium (200 nodes x 10)", 200, 10, 50),
        ("Large (1000 nodes x 10)", 1000, 10, 100),
        ("Wide (200 nodes x 100)", 200, 100, 100),
    ];

    println!("{:<30} {:>12} {:>15}", "Configuration", "Time (ms)", "Draws/s");
    println!("{}", "-".repeat(60));

    for (name, candidates, tickets, seats) in configs {
        let iterations = 20;
        let rows: Vec<Vec<u64>> = (0..candidates)
            .map(|_| (0..tickets).map(|_| rng.gen()).collect())
            .collect();

        let start = Instant::now();
        for _ in 0..iterations {
            let mut table = LotteryTable::new(rows.clone(), tickets);
            let winners = table.draw(seats);
            assert!(winners.len() >= seats);
        }
        let per_draw = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;

        println!("{:<30} {:>12.3} {:>15.1}", name, per_draw, 1000.0 / per_draw);
    }

    println!("\n=== Engine Step Benchmark ===\n");
    println!("{:<30} {:>12} {:>15}", "Configuration", "Time (ms)", "Steps/s");
    println!("{}", "-".repeat(60));

    for nodes in [100usize, 500, 1000] {
        let steps = 500;
        let config = BeaconConfig {
            nodes,
            ticket_distribution: vec![10; nodes],
            group_size: 20,
            min_nodes: nodes / 3,
            seed: Some([1u8; 32]),
            ..Default::default()
        };

        let mut engine = match BeaconEngine::new(config) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("skipping {} nodes: {}", nodes, e);
                continue;
            }
        };

        let start = Instant::now();
        engine.run(steps, &mut NoOpCollector);
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;

        println!(
            "{:<30} {:>12.1} {:>15.1}",
            format!("{} nodes x {} steps", nodes, steps),
            elapsed,
            steps as f64 * 1000.0 / elapsed
        );
    }

    println!();
}
