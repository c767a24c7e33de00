//! In-memory message bus (no broker)
//!
//! Records every message instead of sending it, so tests can observe the
//! published values. The record is never trimmed; a long-running process
//! should use [`LogBus`](super::LogBus) instead.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, trace};

use super::backend::{MessageBus, Payload, Qos};
use super::error::{BusError, BusResult};

/// A message accepted by [`MemoryBus`]
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Payload,
    pub qos: Qos,
}

#[derive(Debug, Default)]
struct State {
    connected: bool,
    messages: Vec<PublishedMessage>,
}

/// Message bus that keeps published messages in memory
///
/// Clones share the same storage, so a clone kept by the caller can inspect
/// what was published through the one handed to a
/// [`Publisher`](super::Publisher).
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<State>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Snapshot of all messages published so far
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.state().messages.clone()
    }

    /// Messages whose topic starts with `prefix`
    pub fn messages_under(&self, prefix: &str) -> Vec<PublishedMessage> {
        self.state()
            .messages
            .iter()
            .filter(|m| m.topic.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn connect(&mut self) -> BusResult<()> {
        self.state().connected = true;
        debug!("in-memory bus connected");
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Payload, qos: Qos) -> BusResult<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(BusError::NotConnected);
        }

        trace!("{topic} = {payload}");
        state.messages.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            qos,
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> BusResult<()> {
        self.state().connected = false;
        debug!("in-memory bus disconnected");
        Ok(())
    }
}
