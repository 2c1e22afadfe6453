use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Lattice - a block-lattice ledger simulator
#[derive(Parser)]
#[command(name = "lattice")]
#[command(about = "Lattice node simulator and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new node configuration
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "lattice.json")]
        output: PathBuf,
    },

    /// Run round-robin transfers between genesis accounts
    Simulate {
        /// Path to configuration file
        #[arg(short, long, default_value = "lattice.json")]
        config: PathBuf,

        /// Number of transfers to submit
        #[arg(short, long, default_value = "10")]
        transfers: u64,

        /// Amount moved by each transfer
        #[arg(short, long, default_value = "1")]
        amount: u128,

        /// Print committed blocks
        #[arg(long, default_value = "false")]
        show_blocks: bool,

        /// Print blocks as canonical JSON strings
        #[arg(long, default_value = "false")]
        canonical: bool,

        /// Print quorum certificates
        #[arg(long, default_value = "false")]
        show_certs: bool,

        /// Byte budget for the capacity projection
        #[arg(long, default_value = "67108864")]
        capacity_limit: u64,
    },
}
