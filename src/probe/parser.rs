//! Extraction of structured data from raw `ping` output
//!
//! `ping` prints prose, and how much of it appears depends on whether the
//! target answered. Instead of one grammar for the whole text, each section
//! has its own matcher:
//!
//! ```text
//! PING example.com (93.184.216.34) 56(84) bytes of data.          <- header
//! 64 bytes from 93.184.216.34: icmp_seq=1 ttl=56 time=12.1 ms     <- attempts
//! 5 packets transmitted, 5 received, 0% packet loss, time 4006ms  <- stats
//! rtt min/avg/max/mdev = 10.0/12.5/15.0/1.2 ms                    <- rtt
//! ```
//!
//! A missing section only leaves the corresponding field empty.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PING (\S+) \(([\d.]+)\)").expect("valid header pattern"));

static STATS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d+) packets transmitted, (\d+) (?:packets )?received,(?: \+\d+ \w+,)* (\d+(?:\.\d+)?)% packet loss, time (\d+)ms",
    )
    .expect("valid stats pattern")
});

static RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:rtt|round-trip) min/avg/max/(?:mdev|stddev) = ([\d.]+)/([\d.]+)/([\d.]+)/([\d.]+) ms",
    )
    .expect("valid rtt pattern")
});

static ATTEMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"icmp_seq=(\d+) ttl=(\d+) time=([\d.]+) ms").expect("valid attempt pattern")
});

/// Everything that could be recognized in one `ping` run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingOutput {
    /// Target as echoed by `ping` in its header line
    pub target: Option<String>,

    /// Address `ping` resolved the target to
    pub ip: Option<String>,

    pub stats: Option<PacketStats>,

    pub rtt: Option<RttSummary>,

    /// Individual replies, in the order they were printed
    pub attempts: Vec<PingAttempt>,
}

/// Aggregate line: `5 packets transmitted, 4 received, 20% packet loss, time 4005ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketStats {
    pub transmitted: u32,
    pub received: u32,
    /// Always within `0..=100`
    pub loss_pct: u8,
    pub time_ms: u64,
}

/// Round-trip summary in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttSummary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub mdev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PingAttempt {
    pub icmp_seq: u32,
    pub ttl: u32,
    pub time_ms: f64,
}

/// Parse raw `ping` output.
///
/// Never fails: unrecognized or empty input yields [`PingOutput::default`].
pub fn parse(raw: &str) -> PingOutput {
    if raw.trim().is_empty() {
        return PingOutput::default();
    }

    let (target, ip) = parse_header(raw).unzip();

    PingOutput {
        target,
        ip,
        stats: parse_stats(raw),
        rtt: parse_rtt(raw),
        attempts: parse_attempts(raw),
    }
}

fn parse_header(raw: &str) -> Option<(String, String)> {
    let caps = HEADER.captures(raw)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

fn parse_stats(raw: &str) -> Option<PacketStats> {
    let caps = STATS.captures(raw)?;
    let loss: f64 = caps[3].parse().ok()?;

    Some(PacketStats {
        transmitted: caps[1].parse().ok()?,
        received: caps[2].parse().ok()?,
        loss_pct: loss.round().min(100.0) as u8,
        time_ms: caps[4].parse().ok()?,
    })
}

fn parse_rtt(raw: &str) -> Option<RttSummary> {
    let caps = RTT.captures(raw)?;

    Some(RttSummary {
        min: caps[1].parse().ok()?,
        avg: caps[2].parse().ok()?,
        max: caps[3].parse().ok()?,
        mdev: caps[4].parse().ok()?,
    })
}

fn parse_attempts(raw: &str) -> Vec<PingAttempt> {
    ATTEMPT
        .captures_iter(raw)
        .filter_map(|caps| {
            Some(PingAttempt {
                icmp_seq: caps[1].parse().ok()?,
                ttl: caps[2].parse().ok()?,
                time_ms: caps[3].parse().ok()?,
            })
        })
        .collect()
}
