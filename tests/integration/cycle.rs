//! Cycle behaviour: fan-out, publishing, cadence

use std::sync::Arc;
use std::time::Duration;

use pingping::bus::MemoryBus;
use pretty_assertions::assert_eq;

use crate::helpers::*;

const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test(start_paused = true)]
async fn test_cycle_publishes_one_group_per_target() {
    let prober = Arc::new(
        ScriptedProber::new()
            .reply("example.com", Reply::Output(healthy_output("example.com", "93.184.216.34", 12.5)))
            .reply("gw", Reply::Output(healthy_output("gw", "192.168.1.1", 0.4)))
            .reply("dns", Reply::Output(healthy_output("dns", "1.1.1.1", 8.0))),
    );
    let bus = MemoryBus::new();

    let (handle, _) = spawn_scheduler(
        &["example.com", "gw", "dns"],
        HOUR,
        prober.clone(),
        Box::new(bus.clone()),
    )
    .await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let cycles = handle.shutdown().await.unwrap();

    assert_eq!(cycles, 1);
    assert_eq!(bus.messages().len(), 12);
    assert_eq!(
        payloads_for(&bus, "example.com"),
        vec![
            ("latency".to_string(), "12.5".to_string()),
            ("packet_loss".to_string(), "0".to_string()),
            ("from".to_string(), "93.184.216.34".to_string()),
            ("reachable".to_string(), "True".to_string()),
        ]
    );
    assert_eq!(payloads_for(&bus, "gw")[0].1, "0.4");
    assert_eq!(payloads_for(&bus, "dns")[2].1, "1.1.1.1");
}

#[tokio::test(start_paused = true)]
async fn test_run_now_reports_cycle() {
    let prober = Arc::new(
        ScriptedProber::new().reply("gw", Reply::Output(healthy_output("gw", "192.168.1.1", 0.4))),
    );
    let bus = MemoryBus::new();
    let (handle, _) =
        spawn_scheduler(&["gw", "missing"], HOUR, prober.clone(), Box::new(bus.clone())).await;

    // let the scheduled first cycle finish
    tokio::time::sleep(Duration::from_secs(1)).await;

    let report = handle.run_now().await.unwrap();

    assert_eq!(report.cycle, 2);
    assert_eq!(report.targets, 2);
    assert_eq!(report.published, 2);
    assert_eq!(report.failed, 0);

    assert_eq!(handle.shutdown().await.unwrap(), 2);
    assert_eq!(bus.messages().len(), 16);
}

#[tokio::test(start_paused = true)]
async fn test_targets_are_probed_concurrently() {
    let targets = ["t1", "t2", "t3", "t4", "t5"];
    let prober = targets.iter().fold(ScriptedProber::new(), |prober, target| {
        prober.reply_after(
            target,
            Reply::Output(healthy_output(target, "10.0.0.1", 1.0)),
            Duration::from_millis(100),
        )
    });
    let prober = Arc::new(prober);
    let bus = MemoryBus::new();
    let (handle, _) = spawn_scheduler(&targets, HOUR, prober.clone(), Box::new(bus.clone())).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let report = handle.run_now().await.unwrap();
    handle.shutdown().await.unwrap();

    assert_eq!(prober.max_in_flight(), 5);
    assert_eq!(report.published, 5);
    assert!(
        report.elapsed < Duration::from_millis(200),
        "five 100ms probes took {:?}",
        report.elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn test_results_are_published_in_completion_order() {
    let prober = Arc::new(
        ScriptedProber::new()
            .reply_after(
                "slow",
                Reply::Output(healthy_output("slow", "10.0.0.1", 300.0)),
                Duration::from_millis(300),
            )
            .reply_after(
                "fast",
                Reply::Output(healthy_output("fast", "10.0.0.2", 10.0)),
                Duration::from_millis(10),
            ),
    );
    let bus = MemoryBus::new();
    let (handle, _) =
        spawn_scheduler(&["slow", "fast"], HOUR, prober.clone(), Box::new(bus.clone())).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.shutdown().await.unwrap();

    let topics: Vec<String> = bus.messages().into_iter().map(|m| m.topic).collect();
    assert_eq!(
        topics,
        vec![
            "pingping/fast/latency",
            "pingping/fast/packet_loss",
            "pingping/fast/from",
            "pingping/fast/reachable",
            "pingping/slow/latency",
            "pingping/slow/packet_loss",
            "pingping/slow/from",
            "pingping/slow/reachable",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cycles_keep_cadence() {
    let interval = Duration::from_secs(1);
    let prober = Arc::new(ScriptedProber::new().reply_after(
        "gw",
        Reply::Output(healthy_output("gw", "192.168.1.1", 0.4)),
        Duration::from_millis(100),
    ));
    let bus = MemoryBus::new();
    let (handle, _) = spawn_scheduler(&["gw"], interval, prober.clone(), Box::new(bus.clone())).await;

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let cycles = handle.shutdown().await.unwrap();

    // cycles start at 0s, 1s, 2s and 3s
    assert_eq!(cycles, 4);

    let starts = prober.starts_for("gw");
    assert_eq!(starts.len(), 4);
    for pair in starts.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= interval && gap < interval + Duration::from_millis(5),
            "cycle gap was {gap:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_cycle_is_followed_immediately() {
    let interval = Duration::from_millis(100);
    let probe_time = Duration::from_millis(250);
    let prober = Arc::new(ScriptedProber::new().reply_after(
        "far",
        Reply::Output(healthy_output("far", "203.0.113.9", 250.0)),
        probe_time,
    ));
    let bus = MemoryBus::new();
    let (handle, _) = spawn_scheduler(&["far"], interval, prober.clone(), Box::new(bus.clone())).await;

    tokio::time::sleep(Duration::from_millis(900)).await;
    let cycles = handle.shutdown().await.unwrap();

    // back to back at 0, 250, 500 and 750ms; none skipped
    assert_eq!(cycles, 4);
    assert_eq!(bus.messages_under("pingping/far/").len(), 16);

    let starts = prober.starts_for("far");
    for pair in starts.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= probe_time && gap < probe_time + Duration::from_millis(5),
            "cycle gap was {gap:?}"
        );
    }
}
