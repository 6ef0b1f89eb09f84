// Scenario Runner - Load and execute beacon scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/bootstrap.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/bootstrap.yaml --seed 0x1234...
//   cargo run --bin scenario_runner scenarios/bootstrap.yaml --csv ownership.csv
//   cargo run --bin scenario_runner scenarios/bootstrap.yaml --log-groups

use beacon_sim::{
    BeaconConfig, BeaconEngine, ConsoleCollector, CsvCollector, MultiCollector, SimulationResult,
};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Scenario file format
#[derive(Debug, serde::Deserialize)]
struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    meta: ScenarioMeta,

    /// Number of engine steps
    #[serde(default = "default_steps")]
    steps: usize,

    /// Configuration overrides; unnamed fields keep their defaults
    #[serde(default)]
    config: BeaconConfig,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
    hypothesis: Option<String>,
}

fn default_steps() -> usize {
    500
}

struct Options {
    path: PathBuf,
    seed: Option<[u8; 32]>,
    csv: Option<PathBuf>,
    log_groups: bool,
}

fn main() {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .unwrap();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args);

    if options.path.is_file() {
        run_scenario_file(&options.path, &options);
    } else if options.path.is_dir() {
        run_scenario_directory(&options.path, &options);
    } else {
        eprintln!("Error: Path does not exist: {}", options.path.display());
        std::process::exit(1);
    }
}

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} <scenario.yaml | directory/> [--seed SEED_HEX] [--csv PATH] [--log-groups]",
        program
    );
    eprintln!("\nExamples:");
    eprintln!("  {} scenarios/bootstrap.yaml", program);
    eprintln!("  {} scenarios/", program);
    eprintln!("  {} scenarios/bootstrap.yaml --seed 0x123456...", program);
    eprintln!("  {} scenarios/bootstrap.yaml --csv ownership.csv", program);
    eprintln!("  {} scenarios/bootstrap.yaml --log-groups", program);
    std::process::exit(1);
}

fn parse_args(args: &[String]) -> Options {
    let program = args.first().map(String::as_str).unwrap_or("scenario_runner");
    if args.len() < 2 {
        usage(program);
    }

    let mut options = Options {
        path: PathBuf::from(&args[1]),
        seed: None,
        csv: None,
        log_groups: false,
    };

    let mut rest = args[2..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--log-groups" => options.log_groups = true,
            "--seed" => match rest.next() {
                Some(value) => options.seed = Some(parse_seed_hex(value)),
                None => usage(program),
            },
            "--csv" => match rest.next() {
                Some(value) => options.csv = Some(PathBuf::from(value)),
                None => usage(program),
            },
            _ => usage(program),
        }
    }

    options
}

fn run_scenario_directory(dir: &Path, options: &Options) {
    let mut scenarios = Vec::new();

    // Find all .yaml files
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let extension = path.extension().and_then(|s| s.to_str());
            if extension == Some("yaml") || extension == Some("yml") {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        std::process::exit(1);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  SCENARIO RUNNER - Multiple Scenarios                  ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Found {} scenario(s) to run\n", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        run_scenario_file(scenario_path, options);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  All scenarios complete!                               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
}

fn run_scenario_file(path: &Path, options: &Options) {
    println!("Loading scenario from: {}", path.display());

    // Load and parse YAML
    let yaml_content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let scenario: ScenarioFile = serde_yaml::from_str(&yaml_content).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        std::process::exit(1);
    });

    // Print scenario header
    let name = scenario.meta.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(|s| format!("Scenario: {}", s))
            .unwrap_or_else(|| "Scenario".to_string())
    });
    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  {}{}║", name, " ".repeat(54_usize.saturating_sub(name.chars().count())));
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    if let Some(ref hypothesis) = scenario.meta.hypothesis {
        println!("Hypothesis:");
        println!("  {}\n", hypothesis);
    }

    let mut config = scenario.config;
    if options.seed.is_some() {
        config.seed = options.seed;
    }

    println!("Configuration:");
    println!("  Steps: {}", scenario.steps);
    println!("  Nodes: {}", config.nodes);
    println!("  Group Size: {}", config.group_size);
    println!("  Bootstrap Groups: {}", config.active_group_threshold);
    println!("  Min Nodes: {}", config.min_nodes);
    println!("  Group Expiry: {}", config.group_expiry);
    println!(
        "  Churn: {:.1}% failure, {:.1}% death",
        config.node_failure_percent * 100.0,
        config.node_death_percent * 100.0
    );

    let mut engine = BeaconEngine::new(config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration in {}: {}", path.display(), e);
        std::process::exit(1);
    });

    println!("  Seed: 0x{}", seed_hex(&engine.seed_used()));
    println!("\nStarting simulation...\n");

    // Run simulation
    let mut collector = MultiCollector::new();
    collector.add_collector(Box::new(ConsoleCollector::new(options.log_groups)));
    if let Some(ref csv_path) = options.csv {
        match CsvCollector::new(csv_path) {
            Ok(csv) => {
                println!("Writing ownership samples to {}\n", csv_path.display());
                collector.add_collector(Box::new(csv));
            }
            Err(e) => {
                eprintln!("Failed to create {}: {}", csv_path.display(), e);
                std::process::exit(1);
            }
        }
    }

    engine.run(scenario.steps, &mut collector);

    // Print results
    let result = SimulationResult::from_engine(&engine);
    result.print_summary();

    println!("\n✓ Scenario complete!\n");
}

fn seed_hex(seed: &[u8; 32]) -> String {
    seed.iter().map(|b| format!("{:02x}", b)).collect()
}

fn parse_seed_hex(hex: &str) -> [u8; 32] {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut seed = [0u8; 32];

    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        if i >= 32 {
            break;
        }
        seed[i] = std::str::from_utf8(chunk)
            .ok()
            .and_then(|byte_str| u8::from_str_radix(byte_str, 16).ok())
            .unwrap_or_else(|| {
                eprintln!("Invalid hex seed: {}", hex);
                std::process::exit(1);
            });
    }

    seed
}
