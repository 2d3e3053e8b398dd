//! Study session state machine
//!
//! Pure transitions in the Elm style: `transition(state, context, event)`
//! returns the next state and the effects the runtime must execute.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;
mod view;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{Answer, PendingRequest, Phase, SessionContext, SessionState};
pub use transition::{transition, TransitionError, TransitionResult};
pub use view::SessionView;
