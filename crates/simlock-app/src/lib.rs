//! # simlock-app
//!
//! Orchestration for the SimLock unlock flow: serializes inputs into
//! the state machine, executes the produced actions against the ports,
//! and owns the confirmation timer.

pub mod config;
pub mod orchestrator;

pub use config::SimlockConfig;
pub use orchestrator::{UnlockError, UnlockOrchestrator};
