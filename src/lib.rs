pub mod actors;
pub mod bus;
pub mod config;
pub mod probe;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::probe::{PingAttempt, PingOutput};

/// Packet loss reported when nothing better is known
pub const FULL_LOSS_PCT: u8 = 100;

/// Outcome of probing one target in one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    /// Target as configured, not necessarily what it resolved to
    pub target: String,
    pub responding_address: Option<String>,
    pub average_latency_ms: Option<f64>,
    pub packet_loss_pct: u8,
    pub attempts: Vec<PingAttempt>,
    pub measured_at: DateTime<Utc>,
}

impl MetricsRecord {
    /// Record for a target that could not be probed or never answered
    pub fn unreachable(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            responding_address: None,
            average_latency_ms: None,
            packet_loss_pct: FULL_LOSS_PCT,
            attempts: Vec::new(),
            measured_at: Utc::now(),
        }
    }

    pub fn from_output(target: impl Into<String>, output: &PingOutput) -> Self {
        Self {
            target: target.into(),
            responding_address: output.ip.clone(),
            average_latency_ms: output.rtt.map(|rtt| rtt.avg),
            packet_loss_pct: output.stats.map_or(FULL_LOSS_PCT, |s| s.loss_pct),
            attempts: output.attempts.clone(),
            measured_at: Utc::now(),
        }
    }

    /// A target is reachable exactly when an average latency was measured
    pub fn reachable(&self) -> bool {
        self.average_latency_ms.is_some()
    }

    /// JSON form used when tracing finished measurements
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
