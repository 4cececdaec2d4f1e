//! WATAI API Library Crate
//!
//! This library contains all the core logic for the WATAI web service,
//! including the application state, API handlers, models and routing. The
//! `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
