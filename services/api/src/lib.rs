//! Avatar API Library Crate
//!
//! The credential proxy that hands short-lived streaming tokens to session
//! clients without exposing the provider API key. The `api` binary is a thin
//! wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
