//! MQTT message bus backed by rumqttc
//!
//! rumqttc splits a connection into an [`AsyncClient`] used to queue requests
//! and an [`EventLoop`] that performs the network I/O. The event loop runs in
//! its own task for as long as the bus is connected:
//!
//! ```text
//! publish() ──▶ AsyncClient ──▶ request queue ──▶ EventLoop task ──▶ broker
//!                                                      │
//!                                                      └─ reconnects on error
//! ```
//!
//! The queue is only read while the broker is reachable. Requests are
//! therefore queued without waiting, and a full queue is reported as an error
//! instead of stalling the caller until the broker comes back.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use super::backend::{MessageBus, Payload, Qos};
use super::error::{BusError, BusResult};
use crate::config::BrokerConfig;

/// Capacity of the request queue between client and event loop
const REQUEST_CAPACITY: usize = 100;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Pause before the event loop retries after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long `connect` waits for the broker's CONNACK by default
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `disconnect` waits for queued messages to be written
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MqttBus {
    options: MqttOptions,
    broker: String,
    connect_timeout: Duration,
    client: Option<AsyncClient>,
    event_loop: Option<JoinHandle<()>>,
}

impl MqttBus {
    pub fn new(config: &BrokerConfig) -> Self {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(generate_client_id);

        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(KEEP_ALIVE);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        Self {
            options,
            broker: format!("{}:{}", config.host, config.port),
            connect_timeout: CONNECT_TIMEOUT,
            client: None,
            event_loop: None,
        }
    }

    /// How long `connect` waits for the broker's CONNACK before carrying on
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    pub fn client_id(&self) -> String {
        self.options.client_id()
    }
}

fn generate_client_id() -> String {
    format!(
        "pingping-{}-{}",
        std::process::id(),
        Utc::now().timestamp_millis() % 100_000
    )
}

/// Drive the connection until our own DISCONNECT has been sent
#[instrument(skip_all, fields(broker = %broker))]
async fn drive(mut event_loop: EventLoop, connected: watch::Sender<bool>, broker: String) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to broker");
                connected.send_replace(true);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("disconnect sent");
                break;
            }
            Ok(event) => trace!("{event:?}"),
            Err(e) => {
                if connected.send_replace(false) {
                    warn!("lost connection to broker: {e}");
                } else {
                    error!("cannot reach broker: {e}");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl MessageBus for MqttBus {
    async fn connect(&mut self) -> BusResult<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let (client, event_loop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        let (connected_tx, mut connected_rx) = watch::channel(false);

        self.event_loop = Some(tokio::spawn(drive(
            event_loop,
            connected_tx,
            self.broker.clone(),
        )));
        self.client = Some(client);

        // the event loop keeps retrying on its own, so a slow broker is not fatal
        let acked = matches!(
            tokio::time::timeout(self.connect_timeout, connected_rx.wait_for(|c| *c)).await,
            Ok(Ok(_))
        );
        if !acked {
            warn!(
                "no answer from broker {} within {:.1}s, publishing will resume once it is reachable",
                self.broker,
                self.connect_timeout.as_secs_f64()
            );
        }

        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Payload, qos: Qos) -> BusResult<()> {
        let client = self.client.as_ref().ok_or(BusError::NotConnected)?;

        client.try_publish(topic, qos.into(), false, payload.to_bytes())?;

        Ok(())
    }

    async fn disconnect(&mut self) -> BusResult<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };

        let requested = client.try_disconnect();

        if let Some(mut event_loop) = self.event_loop.take() {
            if requested.is_err() {
                // the DISCONNECT could not be queued, so the loop would never stop
                warn!("request queue for {} is full, dropping connection", self.broker);
                event_loop.abort();
            } else {
                match tokio::time::timeout(DISCONNECT_TIMEOUT, &mut event_loop).await {
                    Ok(_) => debug!("event loop for {} stopped", self.broker),
                    Err(_) => {
                        warn!("event loop for {} did not stop in time, aborting", self.broker);
                        event_loop.abort();
                    }
                }
            }
        }

        requested.map_err(|e| BusError::Disconnect(e.to_string()))
    }
}
