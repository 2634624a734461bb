// Forbid unwrap() in production code to prevent panics from corrupt data.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use nestree::config::Config;
use nestree::registry::TreeRegistry;
use nestree::simulation::{Simulator, SimulatorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nestree=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: data_directory={}, tree_name={}, seed={}, steps={}",
        config.data_directory.display(),
        config.tree_name,
        config.simulation_seed,
        config.simulation_steps
    );

    if let Err(e) = std::fs::create_dir_all(&config.data_directory) {
        tracing::error!("Failed to create data directory: {e}");
        std::process::exit(1);
    }

    let registry = TreeRegistry::new(config.data_directory.clone());
    let tree = match registry.get_or_create(&config.tree_name) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::error!("Failed to open tree '{}': {e}", config.tree_name);
            std::process::exit(1);
        }
    };

    let Ok(mut tree) = tree.write() else {
        tracing::error!("Tree lock poisoned");
        std::process::exit(1);
    };

    let mut simulator = Simulator::new(SimulatorConfig::new(config.simulation_seed));
    let result = simulator.run(&mut tree, config.simulation_steps);

    if let Err(e) = tree.store_mut().checkpoint() {
        tracing::error!("Checkpoint failed: {e}");
        std::process::exit(1);
    }
    drop(tree);

    for violation in &result.invariant_violations {
        tracing::error!("{violation}");
    }
    if let Some(error) = &result.error {
        tracing::error!("Simulation stopped: {error}");
    }

    tracing::info!(
        "Seed {}: {} operations, {} succeeded, {} rejected, {} nodes, {} violations",
        result.seed,
        result.operations_processed,
        result.successful_operations,
        result.rejected_operations,
        result.final_node_count,
        result.invariant_violations.len()
    );

    if !result.passed() {
        std::process::exit(1);
    }
}
