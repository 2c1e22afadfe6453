use std::time::{Duration, Instant};

use serde::Serialize;

/// Counters owned by the node. Only successful transfers are recorded.
#[derive(Debug, Clone)]
pub struct NodeMetrics {
    started_at: Instant,
    total_transfers: u64,
    total_latency: Duration,
    last_latency: Option<Duration>,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeMetrics {
    pub fn new() -> Self {
        NodeMetrics {
            started_at: Instant::now(),
            total_transfers: 0,
            total_latency: Duration::ZERO,
            last_latency: None,
        }
    }

    pub fn record_transfer(&mut self, latency: Duration) {
        self.total_transfers += 1;
        self.total_latency += latency;
        self.last_latency = Some(latency);
    }

    pub fn total_transfers(&self) -> u64 {
        self.total_transfers
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Derive a snapshot. `memory_estimate_bytes` is the node's current
    /// record footprint; `capacity_limit_bytes` is the budget to project against.
    pub fn snapshot(&self, memory_estimate_bytes: u64, capacity_limit_bytes: u64) -> MetricsSnapshot {
        let uptime = self.uptime();
        let uptime_secs = uptime.as_secs_f64();

        let avg_latency_ms = if self.total_transfers > 0 {
            self.total_latency.as_secs_f64() * 1000.0 / self.total_transfers as f64
        } else {
            0.0
        };

        let throughput_tps = if uptime_secs > 0.0 {
            self.total_transfers as f64 / uptime_secs
        } else {
            0.0
        };

        MetricsSnapshot {
            total_transfers: self.total_transfers,
            avg_latency_ms,
            last_latency_ms: self.last_latency.map(|d| d.as_secs_f64() * 1000.0),
            uptime_secs,
            throughput_tps,
            memory_estimate_bytes,
            capacity_projection: CapacityProjection::project(
                capacity_limit_bytes,
                memory_estimate_bytes,
                self.total_transfers,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_transfers: u64,
    pub avg_latency_ms: f64,
    pub last_latency_ms: Option<f64>,
    pub uptime_secs: f64,
    pub throughput_tps: f64,
    pub memory_estimate_bytes: u64,
    pub capacity_projection: CapacityProjection,
}

/// How many more transfers fit under a byte budget at the observed footprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityProjection {
    pub limit_bytes: u64,
    /// `None` until at least one transfer has been recorded
    pub bytes_per_transfer: Option<u64>,
    pub transfers_remaining: Option<u64>,
}

impl CapacityProjection {
    pub fn project(limit_bytes: u64, used_bytes: u64, transfers: u64) -> Self {
        if transfers == 0 || used_bytes == 0 {
            return CapacityProjection {
                limit_bytes,
                bytes_per_transfer: None,
                transfers_remaining: None,
            };
        }

        let per_transfer = used_bytes.div_ceil(transfers).max(1);
        CapacityProjection {
            limit_bytes,
            bytes_per_transfer: Some(per_transfer),
            transfers_remaining: Some(limit_bytes.saturating_sub(used_bytes) / per_transfer),
        }
    }
}
