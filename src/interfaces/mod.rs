//! # Collaborator interfaces
//!
//! The discovery core talks to the rest of the runtime only through the
//! traits in this module:
//!
//! ```text
//! LocalCapabilitiesDirectory
//!   ├── MessageRouter               (add/remove next hops for participants)
//!   ├── GlobalAddressProvider       (own transport address, readiness)
//!   │     └── TransportReadyListener
//!   ├── GlobalCapabilitiesDirectory (remote service behind the client)
//!   └── CapabilityListener          (observers of local add/remove)
//!
//! Arbitrator / AccessController
//!   └── DiscoveryLookup             (implemented by the directory)
//! ```
//!
//! Transports, serialization and generated proxies live outside this crate
//! and plug in by implementing these traits.

pub mod discovery;
pub mod global_directory;
pub mod router;

pub use discovery::{CapabilityListener, DiscoveryLookup};
pub use global_directory::{CallContext, GlobalCapabilitiesDirectory, GBID_HEADER};
pub use router::{GlobalAddressProvider, MessageRouter, TransportReadyListener};
