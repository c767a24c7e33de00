//! Stopping the scheduler

use std::sync::Arc;
use std::time::Duration;

use pingping::bus::MemoryBus;

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_inflight_cycle_finish() {
    let prober = Arc::new(ScriptedProber::new().reply_after(
        "slow",
        Reply::Output(healthy_output("slow", "10.0.0.1", 5000.0)),
        Duration::from_secs(5),
    ));
    let bus = MemoryBus::new();
    let (handle, _) = spawn_scheduler(
        &["slow"],
        Duration::from_secs(60),
        prober.clone(),
        Box::new(bus.clone()),
    )
    .await;

    // the first cycle is still waiting for its probe
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(bus.messages().is_empty());

    let cycles = handle.shutdown().await.unwrap();

    assert_eq!(cycles, 1);
    assert_eq!(bus.messages_under("pingping/slow/").len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_no_cycle_starts_after_shutdown() {
    let prober = Arc::new(
        ScriptedProber::new().reply("gw", Reply::Output(healthy_output("gw", "10.0.0.1", 1.0))),
    );
    let bus = MemoryBus::new();
    let (handle, publisher) = spawn_scheduler(
        &["gw"],
        Duration::from_secs(10),
        prober.clone(),
        Box::new(bus.clone()),
    )
    .await;

    tokio::time::sleep(Duration::from_secs(15)).await;
    let cycles = handle.shutdown().await.unwrap();
    assert_eq!(cycles, 2);

    publisher.disconnect().await.unwrap();
    assert!(!bus.is_connected());

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(prober.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_stops_scheduler() {
    let prober = Arc::new(
        ScriptedProber::new().reply("gw", Reply::Output(healthy_output("gw", "10.0.0.1", 1.0))),
    );
    let bus = MemoryBus::new();
    let (handle, _) = spawn_scheduler(
        &["gw"],
        Duration::from_secs(10),
        prober.clone(),
        Box::new(bus.clone()),
    )
    .await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(handle);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(prober.calls().len(), 1);
}
