//! Port interfaces for the unlock flow.
//!
//! Ports define the contract between the domain logic and the
//! platform: the telephony verification service, the prompt display,
//! and the surrounding screen shell. The core stays independent of how
//! any of them is implemented.

pub mod prompt_sink;
pub mod unlock_callback;
pub mod verification;

pub use prompt_sink::PromptSinkPort;
pub use unlock_callback::UnlockCallbackPort;
pub use verification::SimVerificationPort;
