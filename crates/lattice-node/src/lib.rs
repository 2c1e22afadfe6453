//! Lattice Node - Transfer orchestration
//!
//! The composition root: admits a transfer, builds the paired debit and
//! credit blocks, certifies each through a sampled committee, and applies
//! them to the ledger as one unit.

pub mod config;
pub mod error;
pub mod metrics;
pub mod node;
pub mod shared;

pub use config::{generate_sample_config, BalanceEntry, GenesisConfig, NodeConfig};
pub use error::{ConfigError, RejectionCategory, RejectionReason};
pub use metrics::{CapacityProjection, MetricsSnapshot, NodeMetrics};
pub use node::{BlockListing, Node, TransferReceipt};
pub use shared::SharedNode;
