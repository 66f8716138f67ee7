//! Public call API
//!
//! [`CallController`] is the only entry point applications need: start or
//! accept a call, watch its state, subscribe to [`CallEvent`]s and hang up.

pub mod controller;
pub mod events;

pub use controller::{CallController, CallEngines};
pub use events::CallEvent;
