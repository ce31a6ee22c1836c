// src/core/tasks/mod.rs

//! Long-running background maintenance tasks. Each task is a struct with a
//! `run` method that loops on an interval until the shutdown signal fires.

pub mod cache_purger;
pub mod presence_sweeper;
pub mod room_purger;

pub use cache_purger::LanguageCachePurgerTask;
pub use presence_sweeper::PresenceSweeperTask;
pub use room_purger::RoomPurgerTask;
