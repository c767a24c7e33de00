//! Message bus trait definition
//!
//! This module defines the `MessageBus` trait that the probe scheduler
//! publishes through, together with the value and delivery types it takes.

use std::fmt;

use async_trait::async_trait;

use super::error::BusResult;

/// Delivery guarantee requested for a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Qos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Scalar value carried by one message
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Float(f64),
    Integer(i64),
    Text(String),
    Bool(bool),
    /// Zero-length message, used where a value is unknown
    Empty,
}

impl Payload {
    /// Bytes as they go over the wire
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Float(value) => write!(f, "{}", value),
            Payload::Integer(value) => write!(f, "{}", value),
            Payload::Text(value) => f.write_str(value),
            // dashboards consuming these topics expect capitalized booleans
            Payload::Bool(true) => f.write_str("True"),
            Payload::Bool(false) => f.write_str("False"),
            Payload::Empty => Ok(()),
        }
    }
}

/// Publish side of a message bus client
///
/// All methods take `&mut self`: clients are not assumed to be safe for
/// concurrent use, callers share them behind a lock (see
/// [`Publisher`](super::Publisher)).
#[async_trait]
pub trait MessageBus: Send {
    /// Open the connection. Reconnects after this are the client's concern.
    async fn connect(&mut self) -> BusResult<()>;

    /// Send one message, returning once the client has accepted it
    async fn publish(&mut self, topic: &str, payload: Payload, qos: Qos) -> BusResult<()>;

    /// Flush what is pending and close the connection
    async fn disconnect(&mut self) -> BusResult<()>;
}
