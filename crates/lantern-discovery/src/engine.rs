//! The discovery engine — socket lifecycle, tick loop, and filtering.
//!
//! Two independent UDP sockets: the advertiser is bound to the
//! well-known discovery port and answers matching requests with the
//! registration data; the requester is bound to an ephemeral port,
//! sends requests, and receives responses. Each is created lazily and
//! can be closed and later rebound.
//!
//! All work happens inside [`DiscoveryEngine::tick`], driven by the
//! host. Reads are nonblocking; a tick with nothing pending costs a
//! failed recv per bound socket and returns immediately.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use lantern_core::config::DiscoveryConfig;
use lantern_core::fields::FieldMap;
use lantern_core::wire::{self, MAP_KEY, MAX_DATAGRAM, PORT_KEY, SIGNATURE_KEY};

use crate::record::PeerRecord;
use crate::registration::RegistrationStore;
use crate::resolver;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that escape the engine. Transient per-address send failures
/// and malformed inbound traffic never surface here.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Socket creation or bind failed, e.g. the discovery port is
    /// already in use. The slot stays unbound and may be retried.
    #[error("failed to bind discovery socket on port {port}: {source}")]
    Bind { port: u16, source: io::Error },

    #[error("failed to send discovery datagram: {0}")]
    Send(io::Error),

    #[error("failed to receive discovery datagram: {0}")]
    Recv(io::Error),
}

// ── Socket lifecycle ──────────────────────────────────────────────────────────

/// Explicit socket lifecycle. Polling and sending are defined only in
/// the Bound state; everything else treats the slot as absent. Closing
/// a bound slot moves it to Closed, from where a later ensure may
/// rebind.
enum SocketSlot {
    Uninitialized,
    Bound(UdpSocket),
    Closed,
}

impl SocketSlot {
    fn socket(&self) -> Option<&UdpSocket> {
        match self {
            SocketSlot::Bound(socket) => Some(socket),
            SocketSlot::Uninitialized | SocketSlot::Closed => None,
        }
    }

    /// Bind if not already bound. Port 0 requests an OS-assigned
    /// ephemeral port.
    fn ensure_bound(&mut self, port: u16) -> Result<&UdpSocket, DiscoveryError> {
        if !matches!(self, SocketSlot::Bound(_)) {
            *self = SocketSlot::Bound(bind_discovery_socket(port)?);
        }
        match self {
            SocketSlot::Bound(socket) => Ok(socket),
            _ => unreachable!("slot was just bound"),
        }
    }

    fn close(&mut self) {
        if matches!(self, SocketSlot::Bound(_)) {
            *self = SocketSlot::Closed;
        }
    }
}

/// Build a nonblocking IPv4 UDP socket for discovery traffic.
///
/// Bind failure is fatal to the caller. The broadcast-enable and
/// loopback-disable flags are each best-effort: some platforms refuse
/// them, and discovery should degrade rather than abort.
fn bind_discovery_socket(port: u16) -> Result<UdpSocket, DiscoveryError> {
    let setup = |port: u16| -> io::Result<Socket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    };

    let socket = setup(port).map_err(|source| DiscoveryError::Bind { port, source })?;

    if let Err(e) = socket.set_broadcast(true) {
        tracing::warn!(error = %e, port, "could not enable broadcast on discovery socket");
    }
    // do not receive our own broadcasts back
    if let Err(e) = socket.set_multicast_loop_v4(false) {
        tracing::warn!(error = %e, port, "could not disable multicast loopback");
    }

    Ok(socket.into())
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// One discovery engine per host application. Construct it once, hand
/// references to the collaborators that need it, and drive it with
/// [`tick`](Self::tick).
pub struct DiscoveryEngine {
    discovery_port: u16,
    /// Computed once from the configured identity; immutable afterwards.
    signature: String,
    registration: RegistrationStore,
    advertiser: SocketSlot,
    requester: SocketSlot,
    observers: Vec<Box<dyn FnMut(&PeerRecord)>>,
}

impl DiscoveryEngine {
    /// Build an engine from config. Seeds the registration store with
    /// the reserved Signature, Port, and Map fields. No sockets are
    /// opened yet.
    pub fn new(config: DiscoveryConfig) -> Self {
        let signature = config.identity.signature();

        let mut registration = RegistrationStore::new();
        registration.set(SIGNATURE_KEY, signature.clone());
        registration.set(PORT_KEY, config.network.advertised_port.to_string());
        registration.set(MAP_KEY, config.label);

        Self {
            discovery_port: config.network.discovery_port,
            signature,
            registration,
            advertiser: SocketSlot::Uninitialized,
            requester: SocketSlot::Uninitialized,
            observers: Vec::new(),
        }
    }

    /// Whether this platform can send network broadcasts at all. On
    /// unsupported targets every send operation is a no-op.
    pub fn supported() -> bool {
        !cfg!(target_family = "wasm")
    }

    /// The local compatibility signature carried in every packet.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Diagnostic listing of the broadcast addresses a request would
    /// currently target.
    pub fn broadcast_addresses() -> Vec<Ipv4Addr> {
        resolver::resolve_broadcast_addresses()
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Register a field included in every subsequent response.
    pub fn register_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.registration.set(key, value);
    }

    /// Remove a field from subsequent responses.
    pub fn unregister_field(&mut self, key: &str) {
        self.registration.unset(key);
    }

    // ── Notifications ─────────────────────────────────────────────────────────

    /// Subscribe to discovered-peer notifications. Fires synchronously
    /// inside the tick that received the response, once per valid
    /// response. Duplicate peers are delivered as-is; de-duplication is
    /// the consumer's concern.
    pub fn on_peer_discovered(&mut self, observer: impl FnMut(&PeerRecord) + 'static) {
        self.observers.push(Box::new(observer));
    }

    // ── Socket lifecycle ──────────────────────────────────────────────────────

    /// Bind the advertiser socket if it is not already bound. Hosts that
    /// only advertise call this once at startup; requesting hosts never
    /// need it.
    pub fn ensure_advertiser(&mut self) -> Result<(), DiscoveryError> {
        if !Self::supported() {
            return Ok(());
        }
        self.advertiser.ensure_bound(self.discovery_port)?;
        tracing::debug!(port = self.discovery_port, "advertiser socket bound");
        Ok(())
    }

    pub fn advertiser_addr(&self) -> Option<SocketAddr> {
        self.advertiser.socket().and_then(|s| s.local_addr().ok())
    }

    pub fn requester_addr(&self) -> Option<SocketAddr> {
        self.requester.socket().and_then(|s| s.local_addr().ok())
    }

    pub fn close_advertiser(&mut self) {
        self.advertiser.close();
    }

    pub fn close_requester(&mut self) {
        self.requester.close();
    }

    /// Close both sockets. The engine may be reused afterwards; sockets
    /// rebind lazily.
    pub fn shutdown(&mut self) {
        self.close_advertiser();
        self.close_requester();
    }

    // ── Tick ──────────────────────────────────────────────────────────────────

    /// One cooperative tick: poll the advertiser, then the requester.
    /// Never blocks waiting for network data.
    pub fn tick(&mut self) -> Result<(), DiscoveryError> {
        self.poll_advertiser()?;
        self.poll_requester()
    }

    fn poll_advertiser(&mut self) -> Result<(), DiscoveryError> {
        let Some(socket) = self.advertiser.socket() else {
            return Ok(());
        };
        let Some(record) = poll_datagram(socket)? else {
            return Ok(());
        };

        // Unrelated broadcast traffic on a shared port is expected;
        // anything without our signature is dropped without logging.
        if record.fields().get(SIGNATURE_KEY) != Some(self.signature.as_str()) {
            return Ok(());
        }

        let response = wire::encode(self.registration.fields());
        socket
            .send_to(&response, record.source())
            .map_err(DiscoveryError::Send)?;
        tracing::trace!(peer = %record.source(), "answered discovery request");
        Ok(())
    }

    fn poll_requester(&mut self) -> Result<(), DiscoveryError> {
        let record = match self.requester.socket() {
            Some(socket) => poll_datagram(socket)?,
            None => return Ok(()),
        };
        let Some(record) = record else {
            return Ok(());
        };

        if !self.is_valid_response(&record) {
            return Ok(());
        }

        tracing::debug!(peer = %record.source(), "peer discovered");
        for observer in &mut self.observers {
            observer(&record);
        }
        Ok(())
    }

    /// A response counts only when its signature matches and it carries
    /// the reserved port field. The port value is not parsed here; the
    /// record's accessors deal with that independently.
    fn is_valid_response(&self, record: &PeerRecord) -> bool {
        record.fields().get(SIGNATURE_KEY) == Some(self.signature.as_str())
            && record.fields().contains_key(PORT_KEY)
    }

    // ── Requests ──────────────────────────────────────────────────────────────

    /// Broadcast a discovery request to every resolvable broadcast
    /// address, all at the discovery port. Returns how many datagrams
    /// were sent; addresses with no route are skipped.
    pub fn send_broadcast(&mut self) -> Result<usize, DiscoveryError> {
        if !Self::supported() {
            return Ok(0);
        }

        let packet = self.request_packet();
        let port = self.discovery_port;
        let socket = self.requester.ensure_bound(0)?;
        let addresses = resolver::resolve_broadcast_addresses();

        send_to_each(&addresses, port, |target| {
            socket.send_to(&packet, target).map(|_| ())
        })
    }

    /// Send a discovery request straight to one known address,
    /// bypassing broadcast address resolution.
    pub fn send_direct(&mut self, target: SocketAddr) -> Result<(), DiscoveryError> {
        if !Self::supported() {
            return Ok(());
        }

        let packet = self.request_packet();
        let socket = self.requester.ensure_bound(0)?;
        match socket.send_to(&packet, target) {
            Ok(_) => Ok(()),
            Err(e) if is_network_unreachable(&e) => {
                tracing::debug!(addr = %target, "network unreachable, request dropped");
                Ok(())
            }
            Err(e) => Err(DiscoveryError::Send(e)),
        }
    }

    /// Requests carry only the signature. The responder's identity is
    /// all that needs verifying; everything else travels in the
    /// response.
    fn request_packet(&self) -> Vec<u8> {
        let mut fields = FieldMap::new();
        fields.set(SIGNATURE_KEY, self.signature.clone());
        wire::encode(&fields)
    }
}

/// Send one packet per target address. ENETUNREACH on an individual
/// target means that interface has no route and the loop moves on; any
/// other error aborts and propagates.
fn send_to_each(
    addresses: &[Ipv4Addr],
    port: u16,
    mut send: impl FnMut(SocketAddr) -> io::Result<()>,
) -> Result<usize, DiscoveryError> {
    let mut sent = 0;
    for address in addresses {
        let target = SocketAddr::from((*address, port));
        match send(target) {
            Ok(()) => sent += 1,
            Err(e) if is_network_unreachable(&e) => {
                tracing::debug!(addr = %target, "network unreachable, skipping broadcast address");
            }
            Err(e) => return Err(DiscoveryError::Send(e)),
        }
    }
    tracing::debug!(targets = addresses.len(), sent, "discovery request broadcast");
    Ok(sent)
}

// ── Datagram polling ──────────────────────────────────────────────────────────

/// Nonblocking read of at most one pending datagram. WouldBlock means
/// nothing is pending; a zero-length datagram carries no record.
fn poll_datagram(socket: &UdpSocket) -> Result<Option<PeerRecord>, DiscoveryError> {
    let mut buf = [0u8; MAX_DATAGRAM];
    match socket.recv_from(&mut buf) {
        Ok((0, _)) => Ok(None),
        Ok((len, source)) => Ok(Some(PeerRecord::new(source, wire::decode(&buf[..len])))),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(DiscoveryError::Recv(e)),
    }
}

fn is_network_unreachable(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::ENETUNREACH)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
