//! Session identity and the token-driven state machine

mod controller;
mod state;

pub use controller::SessionController;
pub use state::{SessionState, SessionStatus, SharedSession};
