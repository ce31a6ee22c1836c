// src/core/state/mod.rs

//! The shared gateway state and its sub-state structs.

pub mod core;
pub mod stats;

pub use self::core::{GatewayInit, GatewayState, StatsReport};
pub use self::stats::{StatsSnapshot, StatsState};
