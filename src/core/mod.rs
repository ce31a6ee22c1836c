// src/core/mod.rs

//! The central module containing the core logic and data structures of the
//! messaging gateway.

pub mod errors;
pub mod language_cache;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod presence;
pub mod rooms;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod translation;

pub use errors::GatewayError;
pub use message::{Message, ParticipantId, SendAck, SendStatus, Translation};
