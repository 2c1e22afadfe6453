//! Lattice State - Account state store
//!
//! This crate owns every account's balance, head, and nonce. Applying a
//! send or receive block is the only way any of them change.

pub mod error;
pub mod ledger;

pub use error::StateError;
pub use ledger::Ledger;
