//! Lattice Admission - Per-account token bucket gate
//!
//! Throttles how often an account may initiate a state-changing operation.

pub mod limiter;

pub use limiter::{AdmissionLimiter, LimiterConfig, TokenBucket};
