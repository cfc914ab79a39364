//! Plan and apply orchestration for netform environments.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod engine;
pub mod executor;
pub mod provider;
pub mod target;

pub use engine::{ApplyReport, Engine, Operation};
pub use provider::{OfflineProvider, Provider};
pub use target::Target;
