//! # simlock-core
//!
//! Core domain models and unlock flow logic for SimLock.
//!
//! This crate contains pure business logic without any infrastructure
//! dependencies. Telephony access, prompt display, and screen dismissal
//! are reached through the port traits in [`ports`].

// Public module exports
pub mod ids;
pub mod policy;
pub mod ports;
pub mod prompt;
pub mod secret;
pub mod sim;
pub mod unlock;
pub mod validate;

// Re-export commonly used types at the crate root
pub use ids::SlotId;
pub use policy::UnlockPolicy;
pub use prompt::Prompt;
pub use secret::SecretDigits;
pub use sim::{LockKind, MeCategory, MeVerifyResult, RetryCount, RetryKind, SlotRecord};
pub use unlock::{EntryState, UnlockAction, UnlockEvent, UnlockStateMachine};
