//! lantern-scan — command-line host for the lantern discovery engine.
//!
//! `scan` broadcasts discovery requests and lists the peers that
//! answered, `serve` advertises this host until killed, `addrs` prints
//! the broadcast addresses a request would target.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

use lantern_core::DiscoveryConfig;
use lantern_discovery::{DiscoveryEngine, PeerRecord};

/// Tick cadence while driving the engine.
const TICK: Duration = Duration::from_millis(50);

/// Re-broadcast interval during a scan. UDP is lossy; reliability here
/// is periodic re-request, not retries.
const REBROADCAST: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = DiscoveryConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = DiscoveryConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        DiscoveryConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("scan") => cmd_scan(config, &args[1..]),
        Some("serve") => cmd_serve(config),
        Some("addrs") => cmd_addrs(),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            anyhow::bail!("unknown command: {other}");
        }
    }
}

fn print_usage() {
    eprintln!("usage: lantern-scan <command>");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  scan [--timeout <secs>] [--json]   broadcast and list discovered peers");
    eprintln!("  serve                              advertise this host until killed");
    eprintln!("  addrs                              list resolvable broadcast addresses");
}

// ── scan ──────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PeerReport {
    source: String,
    advertised_port: Option<u16>,
    age_secs: f64,
    fields: BTreeMap<String, String>,
}

impl PeerReport {
    fn from_record(record: &PeerRecord) -> Self {
        Self {
            source: record.source().to_string(),
            advertised_port: record.try_advertised_port(),
            age_secs: record.elapsed().as_secs_f64(),
            fields: record
                .fields()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

fn cmd_scan(config: DiscoveryConfig, args: &[String]) -> Result<()> {
    let mut timeout = Duration::from_secs(3);
    let mut json = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--timeout" => {
                let value = iter.next().context("--timeout needs a value in seconds")?;
                let secs: u64 = value.parse().context("--timeout must be an integer")?;
                timeout = Duration::from_secs(secs);
            }
            "--json" => json = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    if !DiscoveryEngine::supported() {
        anyhow::bail!("network broadcast is not supported on this platform");
    }

    let mut engine = DiscoveryEngine::new(config);

    // Collect every notification; de-duplication by source address is
    // this layer's job, not the engine's.
    let discovered: Rc<RefCell<Vec<PeerRecord>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&discovered);
    engine.on_peer_discovered(move |record| sink.borrow_mut().push(record.clone()));

    let started = Instant::now();
    let mut last_broadcast: Option<Instant> = None;
    while started.elapsed() < timeout {
        if last_broadcast.map_or(true, |at| at.elapsed() >= REBROADCAST) {
            let sent = engine
                .send_broadcast()
                .context("failed to broadcast discovery request")?;
            tracing::debug!(sent, "discovery request sent");
            last_broadcast = Some(Instant::now());
        }
        engine.tick().context("discovery tick failed")?;
        std::thread::sleep(TICK);
    }
    engine.shutdown();

    // keep the freshest record per source address
    let mut latest: BTreeMap<String, PeerReport> = BTreeMap::new();
    for record in discovered.borrow().iter() {
        latest.insert(record.source().to_string(), PeerReport::from_record(record));
    }

    if json {
        let reports: Vec<&PeerReport> = latest.values().collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if latest.is_empty() {
        println!("no peers found");
        return Ok(());
    }
    for report in latest.values() {
        let port = report
            .advertised_port
            .map_or_else(|| "?".to_string(), |p| p.to_string());
        let map = report.fields.get("Map").map(String::as_str).unwrap_or("-");
        println!("{}  port {}  map {}", report.source, port, map);
    }
    Ok(())
}

// ── serve ─────────────────────────────────────────────────────────────────────

fn cmd_serve(config: DiscoveryConfig) -> Result<()> {
    if !DiscoveryEngine::supported() {
        anyhow::bail!("network broadcast is not supported on this platform");
    }

    let mut engine = DiscoveryEngine::new(config);
    engine
        .ensure_advertiser()
        .context("failed to start advertiser")?;

    if let Some(addr) = engine.advertiser_addr() {
        tracing::info!(%addr, "advertising");
    }

    loop {
        engine.tick().context("discovery tick failed")?;
        std::thread::sleep(TICK);
    }
}

// ── addrs ─────────────────────────────────────────────────────────────────────

fn cmd_addrs() -> Result<()> {
    for addr in DiscoveryEngine::broadcast_addresses() {
        println!("{addr}");
    }
    Ok(())
}
