//! Chat session: status machine, discovery, connection and conversation

pub mod global;
pub mod manager;
pub mod snapshot;
pub mod state;

pub use manager::{SessionBuilder, SessionManager};
pub use snapshot::SessionSnapshot;
pub use state::SessionStatus;
