//! Message types for the probe scheduler
//!
//! Commands are sent to the scheduler actor over an mpsc channel, answers
//! come back on oneshot channels.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

/// Commands that can be sent to a ProbeSchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run one extra cycle right away
    ///
    /// The regular cadence is not shifted. Used for testing and manual refresh.
    RunNow {
        respond_to: oneshot::Sender<CycleReport>,
    },

    /// Stop before the next cycle starts
    ///
    /// A cycle already in flight runs to completion first. The actor answers
    /// with the number of cycles it completed.
    Shutdown { respond_to: oneshot::Sender<u64> },
}

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Sequence number, starting at 1
    pub cycle: u64,

    pub started_at: DateTime<Utc>,

    /// Number of targets probed
    pub targets: usize,

    /// Targets whose four messages were all published
    pub published: usize,

    /// Targets whose publish failed or whose task panicked
    pub failed: usize,

    /// Wall time from the first spawn until the last task finished
    pub elapsed: Duration,
}
