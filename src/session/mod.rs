mod coordinator;
mod reader;
mod state;


pub use coordinator::{ChangeListener, SessionCoordinator};
pub use state::{SendError, SessionSnapshot, SessionState, SessionView};
