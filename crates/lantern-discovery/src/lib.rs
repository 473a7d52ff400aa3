//! lantern-discovery — UDP broadcast peer discovery for local networks.
//!
//! A host advertises itself on a well-known UDP port; requesters send a
//! signature-only request to every resolvable broadcast address; matching
//! hosts answer with their full registration data and the requester
//! surfaces each valid answer as a discovered-peer notification.
//!
//! Everything is single-threaded and tick-driven: the host application
//! owns a [`DiscoveryEngine`] and calls [`DiscoveryEngine::tick`]
//! periodically. No background threads, no internal queues.

pub mod engine;
pub mod record;
pub mod registration;
pub mod resolver;

pub use engine::{DiscoveryEngine, DiscoveryError};
pub use record::{PeerRecord, PortFieldError};
pub use registration::RegistrationStore;
