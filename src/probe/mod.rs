//! Probe-and-parse pipeline for a single target
//!
//! [`measure`] is the only entry point the scheduler needs: it runs one probe,
//! turns the output into a [`MetricsRecord`] and converts every failure into
//! an unreachable record, so a caller always has something to publish.

pub mod executor;
pub mod parser;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{trace, warn};

use crate::MetricsRecord;

pub use executor::{PingCommand, ProbeError, ProbeResult, Prober};
pub use parser::{PacketStats, PingAttempt, PingOutput, RttSummary, parse};

/// `0 received` as a whole count. A plain substring test would also match
/// `10 received` and report a healthy target as unreachable.
static NO_REPLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d])0 received").expect("valid no-reply pattern"));

/// Probe `target` with `count` echo requests and build its metrics record.
pub async fn measure(prober: &dyn Prober, target: &str, count: u32) -> MetricsRecord {
    match prober.probe(target, count).await.and_then(reject_no_reply) {
        Ok(output) => {
            trace!("{target}: raw output:\n{output}");
            MetricsRecord::from_output(target, &parse(&output))
        }
        Err(e) => {
            warn!("{target}: {e}");
            MetricsRecord::unreachable(target)
        }
    }
}

/// Skip parsing entirely when the output already says nothing came back
fn reject_no_reply(output: String) -> ProbeResult<String> {
    if NO_REPLY.is_match(&output) {
        Err(ProbeError::NoReply)
    } else {
        Ok(output)
    }
}
