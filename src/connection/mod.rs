// src/connection/mod.rs

//! Tracks live client connections and their logical identities.

// Declare the private sub-modules of the `connection` module.
mod registry;
mod session;

// Publicly re-export the primary types from the sub-modules.
// This creates a clean public API for the `connection` module, hiding the
// internal file structure from the rest of the crate.
pub use registry::{Disconnection, SessionRegistry};
pub use session::Session;

/// An opaque identifier for a single live transport connection, assigned by
/// the transport layer.
pub type ConnectionId = u64;
