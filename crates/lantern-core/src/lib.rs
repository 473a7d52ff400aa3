//! lantern-core — shared types, wire format, and configuration.
//! All other lantern crates depend on this one.

pub mod config;
pub mod fields;
pub mod signature;
pub mod wire;

pub use config::DiscoveryConfig;
pub use fields::FieldMap;
pub use signature::AppIdentity;
