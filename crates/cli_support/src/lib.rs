//! Shared CLI helpers for the bed-making tools.

pub mod common;

pub use common::{init_tracing, BatchInputArgs, LogArgs, TargetArgs};
