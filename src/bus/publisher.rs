//! Publishing of metrics records
//!
//! [`Publisher`] owns the bus client and is the one place that serializes
//! access to it. Each record becomes four messages under
//! `<prefix>/<target>/`:
//!
//! | topic         | payload                                 |
//! |---------------|-----------------------------------------|
//! | `latency`     | average latency in ms, `-1` if unreachable |
//! | `packet_loss` | loss in percent, `100` if unknown       |
//! | `from`        | responding address, empty if unknown    |
//! | `reachable`   | `True` / `False`                        |

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::backend::{MessageBus, Payload, Qos};
use super::error::BusResult;
use crate::MetricsRecord;

/// Latency published for targets that did not answer
pub const UNREACHABLE_LATENCY: f64 = -1.0;

/// Shared, serialized access to a message bus
///
/// Cloning is cheap and every clone publishes through the same client.
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<Mutex<Box<dyn MessageBus>>>,
    prefix: Arc<str>,
    qos: Qos,
}

impl Publisher {
    pub fn new(bus: Box<dyn MessageBus>, prefix: &str) -> Self {
        Self {
            bus: Arc::new(Mutex::new(bus)),
            prefix: Arc::from(prefix.trim_end_matches('/')),
            qos: Qos::AtLeastOnce,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn topic_base(&self, target: &str) -> String {
        format!("{}/{}", self.prefix, target)
    }

    pub async fn connect(&self) -> BusResult<()> {
        self.bus.lock().await.connect().await
    }

    pub async fn disconnect(&self) -> BusResult<()> {
        self.bus.lock().await.disconnect().await
    }

    /// Publish the four values of `record` as one unit.
    ///
    /// No other record is published in between. The first failing message
    /// aborts the rest of the group.
    pub async fn publish_record(&self, record: &MetricsRecord) -> BusResult<()> {
        let base = self.topic_base(&record.target);
        let reachable = record.reachable();

        let latency = record.average_latency_ms.unwrap_or(UNREACHABLE_LATENCY);
        let from = record
            .responding_address
            .clone()
            .map_or(Payload::Empty, Payload::Text);

        let messages = [
            ("latency", Payload::Float(latency)),
            ("packet_loss", Payload::Integer(record.packet_loss_pct.into())),
            ("from", from),
            ("reachable", Payload::Bool(reachable)),
        ];

        let mut bus = self.bus.lock().await;
        debug!(
            "publishing results for {}: latency={latency}, packet_loss={}, from={:?}, reachable={reachable}",
            record.target, record.packet_loss_pct, record.responding_address
        );

        for (suffix, payload) in messages {
            bus.publish(&format!("{base}/{suffix}"), payload, self.qos)
                .await?;
        }

        Ok(())
    }
}
