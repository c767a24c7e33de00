//! Message bus for publishing probe results
//!
//! ## Design
//!
//! - **Trait-based**: `MessageBus` lets the MQTT client be swapped for a test double
//! - **Serialized**: `Publisher` wraps the client in a lock, since clients are
//!   not assumed to be safe for concurrent use
//!
//! ## Backends
//!
//! - **MQTT** (default): rumqttc client with a background event loop
//! - **Log**: only logs messages, for `--dry-run`
//! - **In-Memory**: records messages, for tests

pub mod backend;
pub mod error;
pub mod log;
pub mod memory;
pub mod mqtt;
pub mod publisher;

pub use backend::{MessageBus, Payload, Qos};
pub use error::{BusError, BusResult};
pub use log::LogBus;
pub use memory::{MemoryBus, PublishedMessage};
pub use mqtt::MqttBus;
pub use publisher::{Publisher, UNREACHABLE_LATENCY};
