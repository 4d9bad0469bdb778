//! Unlock flow domain module.
//!
//! Defines the entry states, the events that drive them, the actions
//! produced by transitions, and the state machine itself.

pub mod action;
pub mod event;
pub mod state;
pub mod state_machine;

pub use action::UnlockAction;
pub use event::UnlockEvent;
pub use state::EntryState;
pub use state_machine::UnlockStateMachine;
