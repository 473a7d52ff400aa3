//! lantern integration test harness.
//!
//! Two engines talk over real UDP sockets on loopback. Requests go via
//! send_direct so the tests need no broadcast-capable network and no
//! special privileges. Each test picks its own discovery port; tests
//! must not share ports.

#![allow(dead_code)]

use std::cell::RefCell;
use std::net::{SocketAddr, UdpSocket};
use std::rc::Rc;
use std::time::Duration;

use lantern_core::config::DiscoveryConfig;
use lantern_core::signature::AppIdentity;
use lantern_discovery::{DiscoveryEngine, PeerRecord};

mod discovery;

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn identity(publisher: &str) -> AppIdentity {
    AppIdentity {
        publisher: publisher.to_string(),
        application: "integration".to_string(),
        version: "1.0".to_string(),
    }
}

pub fn config_for(
    discovery_port: u16,
    advertised_port: u16,
    label: &str,
    identity: AppIdentity,
) -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default();
    config.network.discovery_port = discovery_port;
    config.network.advertised_port = advertised_port;
    config.label = label.to_string();
    config.identity = identity;
    config
}

/// Grab an ephemeral port and release it for an engine to bind.
pub fn free_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .expect("bind probe socket")
        .local_addr()
        .expect("probe local addr")
        .port()
}

/// Subscribe an engine to collect every discovered-peer notification.
pub fn collect_discoveries(engine: &mut DiscoveryEngine) -> Rc<RefCell<Vec<PeerRecord>>> {
    let discovered = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&discovered);
    engine.on_peer_discovered(move |record: &PeerRecord| sink.borrow_mut().push(record.clone()));
    discovered
}

/// Tick both engines until the condition holds or the tick budget runs
/// out. Returns whether the condition held.
pub fn pump_until(
    a: &mut DiscoveryEngine,
    b: &mut DiscoveryEngine,
    mut done: impl FnMut() -> bool,
    max_ticks: usize,
) -> bool {
    for _ in 0..max_ticks {
        a.tick().expect("engine A tick");
        b.tick().expect("engine B tick");
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}
