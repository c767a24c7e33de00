//! Test doubles for probers and message buses
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pingping::{
    actors::scheduler::{SchedulerHandle, SchedulerSettings},
    bus::{BusError, BusResult, MemoryBus, MessageBus, Payload, Publisher, Qos},
    probe::{ProbeError, ProbeResult, Prober},
};
use tokio::time::Instant;

/// What a scripted target answers
#[derive(Debug, Clone)]
pub enum Reply {
    Output(String),
    Fail,
    Panic,
}

/// Prober answering from a script, recording when each probe started
#[derive(Default)]
pub struct ScriptedProber {
    replies: HashMap<String, (Reply, Duration)>,
    calls: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, target: &str, reply: Reply) -> Self {
        self.reply_after(target, reply, Duration::ZERO)
    }

    pub fn reply_after(mut self, target: &str, reply: Reply, delay: Duration) -> Self {
        self.replies.insert(target.to_string(), (reply, delay));
        self
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn starts_for(&self, target: &str) -> Vec<Instant> {
        self.calls()
            .into_iter()
            .filter(|(t, _)| t == target)
            .map(|(_, at)| at)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &str, _count: u32) -> ProbeResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((target.to_string(), Instant::now()));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let (reply, delay) = self
            .replies
            .get(target)
            .cloned()
            .unwrap_or((Reply::Fail, Duration::ZERO));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Output(output) => Ok(output),
            Reply::Fail => Err(ProbeError::Exited {
                code: Some(2),
                stderr: format!("ping: {target}: Name or service not known"),
            }),
            Reply::Panic => panic!("scripted panic for {target}"),
        }
    }
}

/// `ping` output of a target answering a single echo request
pub fn healthy_output(target: &str, ip: &str, latency_ms: f64) -> String {
    format!(
        "PING {target} ({ip}) 56(84) bytes of data.\n\
         64 bytes from {ip}: icmp_seq=1 ttl=57 time={latency_ms} ms\n\
         \n\
         --- {target} ping statistics ---\n\
         1 packets transmitted, 1 received, 0% packet loss, time 0ms\n\
         rtt min/avg/max/mdev = {latency_ms}/{latency_ms}/{latency_ms}/0.000 ms\n"
    )
}

/// `ping` output of a target that never answered
pub fn silent_output(target: &str, ip: &str) -> String {
    format!(
        "PING {target} ({ip}) 56(84) bytes of data.\n\
         \n\
         --- {target} ping statistics ---\n\
         1 packets transmitted, 0 received, 100% packet loss, time 0ms\n"
    )
}

/// Bus failing every publish whose topic contains a marker
#[derive(Clone)]
pub struct FlakyBus {
    pub inner: MemoryBus,
    fail_on: String,
}

impl FlakyBus {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            inner: MemoryBus::new(),
            fail_on: marker.to_string(),
        }
    }
}

#[async_trait]
impl MessageBus for FlakyBus {
    async fn connect(&mut self) -> BusResult<()> {
        self.inner.connect().await
    }

    async fn publish(&mut self, topic: &str, payload: Payload, qos: Qos) -> BusResult<()> {
        if topic.contains(&self.fail_on) {
            return Err(BusError::Client(format!("refused {topic}")));
        }
        self.inner.publish(topic, payload, qos).await
    }

    async fn disconnect(&mut self) -> BusResult<()> {
        self.inner.disconnect().await
    }
}

pub async fn connected_publisher(bus: Box<dyn MessageBus>) -> Publisher {
    let publisher = Publisher::new(bus, "pingping");
    publisher.connect().await.unwrap();
    publisher
}

/// Spawn a scheduler; its first cycle starts right away
pub async fn spawn_scheduler(
    targets: &[&str],
    interval: Duration,
    prober: Arc<ScriptedProber>,
    bus: Box<dyn MessageBus>,
) -> (SchedulerHandle, Publisher) {
    let publisher = connected_publisher(bus).await;
    let settings = SchedulerSettings {
        targets: targets.iter().map(|t| t.to_string()).collect(),
        count: 1,
        interval,
    };

    let handle = SchedulerHandle::spawn(settings, prober, publisher.clone());
    (handle, publisher)
}

/// Rendered payloads published under `<prefix>/<target>/`, in order
pub fn payloads_for(bus: &MemoryBus, target: &str) -> Vec<(String, String)> {
    bus.messages_under(&format!("pingping/{target}/"))
        .into_iter()
        .map(|m| {
            let suffix = m.topic.rsplit('/').next().unwrap_or_default().to_string();
            (suffix, m.payload.to_string())
        })
        .collect()
}
