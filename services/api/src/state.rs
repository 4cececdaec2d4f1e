//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources: the profile library, the session engine, and the one
//! player session this server hosts.

use crate::config::Config;
use std::sync::Arc;
use tokio::sync::Mutex;
use watai_core::nav::SessionEngine;
use watai_core::session::SessionState;
use watai_core::store::Library;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<Library>,
    pub engine: Arc<SessionEngine>,
    /// The single player session. Mutating requests take this lock without
    /// waiting and answer 409 when it is already held.
    pub session: Arc<Mutex<SessionState>>,
    pub config: Arc<Config>,
}
