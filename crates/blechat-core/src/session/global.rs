//! Process-wide session handle
//!
//! Presentation code that cannot thread a [`SessionManager`] through its call
//! graph installs one here at start-up and looks it up afterwards.

use std::sync::OnceLock;

use crate::errors::{BlechatError, BlechatResult};
use crate::session::manager::SessionManager;

static SESSION: OnceLock<SessionManager> = OnceLock::new();

/// Install the process-wide session; fails if one is already installed
pub fn init(session: SessionManager) -> BlechatResult<&'static SessionManager> {
    SESSION
        .set(session)
        .map_err(|_| BlechatError::AlreadyInitialized)?;
    SESSION.get().ok_or(BlechatError::AlreadyInitialized)
}

pub fn get() -> Option<&'static SessionManager> {
    SESSION.get()
}
