//! Message bus that only logs (`--dry-run`)
//!
//! Nothing is kept, so a dry run can go on for as long as a real one.

use async_trait::async_trait;
use tracing::{debug, info};

use super::backend::{MessageBus, Payload, Qos};
use super::error::{BusError, BusResult};

#[derive(Debug, Default)]
pub struct LogBus {
    connected: bool,
}

impl LogBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageBus for LogBus {
    async fn connect(&mut self) -> BusResult<()> {
        self.connected = true;
        info!("dry run, messages are only logged");
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Payload, _qos: Qos) -> BusResult<()> {
        if !self.connected {
            return Err(BusError::NotConnected);
        }

        info!("{topic} = {payload}");
        Ok(())
    }

    async fn disconnect(&mut self) -> BusResult<()> {
        self.connected = false;
        debug!("log bus disconnected");
        Ok(())
    }
}
