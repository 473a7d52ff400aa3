//! Broadcast address resolution.
//!
//! A datagram sent to 255.255.255.255 only leaves the interface the
//! socket happens to be bound to, so a discovery request must be sent
//! once per interface, to that interface's subnet broadcast address.
//!
//! Resolution degrades through three steps, each tried only when the
//! previous one yielded nothing:
//!   1. interface enumeration with real subnet masks,
//!   2. hostname resolution with class-based default masks (pre-CIDR
//!      heuristic, low confidence on modern subnetted networks),
//!   3. the limited-broadcast address alone.
//!
//! The result is recomputed on every call. Interface state changes
//! between calls (Wi-Fi reconnects, cables pulled), so caching would
//! hand out stale addresses.

use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};

use if_addrs::IfAddr;

/// Resolve every IPv4 broadcast address reachable from this host.
///
/// Never fails and never returns an empty list: when everything else
/// goes wrong the limited-broadcast address 255.255.255.255 is returned
/// alone. Errors inside the fallback chain are logged, not propagated.
pub fn resolve_broadcast_addresses() -> Vec<Ipv4Addr> {
    match from_interfaces() {
        Ok(addrs) if !addrs.is_empty() => return addrs,
        Ok(_) => tracing::debug!("no broadcast-capable interface found"),
        Err(e) => tracing::debug!(error = %e, "interface enumeration failed"),
    }

    match from_host_entry() {
        Ok(addrs) if !addrs.is_empty() => return addrs,
        Ok(_) => tracing::debug!("hostname resolved to no usable IPv4 address"),
        Err(e) => tracing::debug!(error = %e, "hostname resolution failed"),
    }

    vec![Ipv4Addr::BROADCAST]
}

/// Step 1: enumerate interfaces and compute each subnet's broadcast
/// address from the real netmask. Loopback is excluded; the enumeration
/// crate exposes no wired/wireless distinction, so any other up
/// interface with an IPv4 address counts.
fn from_interfaces() -> std::io::Result<Vec<Ipv4Addr>> {
    let mut addrs = Vec::new();
    for interface in if_addrs::get_if_addrs()? {
        if interface.is_loopback() {
            continue;
        }
        if let IfAddr::V4(v4) = interface.addr {
            addrs.push(broadcast_address(v4.ip, v4.netmask));
        }
    }
    Ok(addrs)
}

/// Step 2: resolve the local hostname and infer a class-based default
/// mask per address. When anything was produced this way, the
/// limited-broadcast address is appended as a safety net against a
/// wrongly inferred mask.
fn from_host_entry() -> std::io::Result<Vec<Ipv4Addr>> {
    let host = hostname::get()?;
    let host = host.to_string_lossy();

    let mut addrs = Vec::new();
    for resolved in (host.as_ref(), 0u16).to_socket_addrs()? {
        if let SocketAddr::V4(v4) = resolved {
            if let Some(mask) = class_mask(*v4.ip()) {
                addrs.push(broadcast_address(*v4.ip(), mask));
            }
        }
    }

    if !addrs.is_empty() {
        addrs.push(Ipv4Addr::BROADCAST);
    }
    Ok(addrs)
}

/// Subnet broadcast address: mask bits keep the address, inverted mask
/// bits force ones.
fn broadcast_address(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr) | !u32::from(mask))
}

/// Classful default mask by first octet. Obsolete heuristic, kept only
/// as the step-2 fallback. Class D/E addresses yield nothing.
fn class_mask(addr: Ipv4Addr) -> Option<Ipv4Addr> {
    match addr.octets()[0] {
        0..=127 => Some(Ipv4Addr::new(255, 0, 0, 0)),
        128..=191 => Some(Ipv4Addr::new(255, 255, 0, 0)),
        192..=223 => Some(Ipv4Addr::new(255, 255, 255, 0)),
        _ => None,
    }
}
