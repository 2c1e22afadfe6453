use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use lattice_core::AccountId;
use lattice_node::{generate_sample_config, Node, NodeConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { output } => {
            init_config(output)?;
        }
        Commands::Simulate {
            config,
            transfers,
            amount,
            show_blocks,
            canonical,
            show_certs,
            capacity_limit,
        } => {
            let options = SimulateOptions {
                transfers,
                amount,
                show_blocks,
                canonical,
                show_certs,
                capacity_limit,
            };
            simulate(config, options)?;
        }
    }

    Ok(())
}

/// Initialize a new configuration file
fn init_config(output: PathBuf) -> Result<()> {
    info!("Generating sample configuration");

    let config = generate_sample_config();
    config.save(&output)?;

    info!("Configuration saved to {:?}", output);

    println!("\nConfiguration file created: {}", output.display());
    println!("Edit the file to customize genesis balances and committee settings.");
    println!("\nTo run a simulation:");
    println!("  lattice simulate --config {}", output.display());

    Ok(())
}

struct SimulateOptions {
    transfers: u64,
    amount: u128,
    show_blocks: bool,
    canonical: bool,
    show_certs: bool,
    capacity_limit: u64,
}

/// Drive `transfers` transfers from account i to account i+1, wrapping
fn simulate(config_path: PathBuf, options: SimulateOptions) -> Result<()> {
    info!("Loading configuration from {:?}", config_path);

    if !config_path.exists() {
        bail!(
            "Configuration file not found: {}. Run 'lattice init' to create one.",
            config_path.display()
        );
    }
    let config = NodeConfig::load(&config_path)?;

    let accounts: Vec<AccountId> = config
        .genesis
        .initial_balances
        .iter()
        .map(|entry| AccountId::new(entry.account_id.as_str()))
        .collect();
    if accounts.len() < 2 {
        bail!("Simulation needs at least two genesis accounts");
    }

    let mut node = Node::new(config)?;
    let supply_before = node.ledger().total_supply();

    let mut committed = 0u64;
    let mut rejected = 0u64;
    for i in 0..options.transfers {
        let from = &accounts[(i as usize) % accounts.len()];
        let to = &accounts[(i as usize + 1) % accounts.len()];
        match node.submit_transfer(from, to, options.amount) {
            Ok(_) => committed += 1,
            Err(reason) => {
                rejected += 1;
                warn!("[{:?}] {}", reason.category(), reason);
            }
        }
    }

    if node.ledger().total_supply() != supply_before {
        bail!("Total supply changed during simulation");
    }

    info!(
        "Simulation finished: {} committed, {} rejected, epoch {}, state root {}",
        committed,
        rejected,
        node.epoch(),
        node.state_root()
    );

    if options.show_blocks {
        let blocks = node.list_blocks(options.canonical);
        println!("{}", serde_json::to_string_pretty(&blocks)?);
    }
    if options.show_certs {
        println!(
            "{}",
            serde_json::to_string_pretty(node.list_certificates())?
        );
    }

    let balances: Vec<serde_json::Value> = node
        .balances(&accounts)?
        .into_iter()
        .map(|(id, balance)| {
            serde_json::json!({
                "account_id": id,
                "balance": balance.to_string(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&balances)?);

    let snapshot = node.metrics_snapshot(options.capacity_limit);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
