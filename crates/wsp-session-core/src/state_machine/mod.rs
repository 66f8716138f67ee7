pub mod actions;
pub mod dispatch;
pub mod events;
pub mod executor;
pub mod guards;

pub use actions::ActionContext;
pub use events::SessionEvent;
pub use executor::{EventOutcome, ProcessEventResult, StateMachine};
