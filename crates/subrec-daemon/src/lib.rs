//! subrec-daemon library target.
//!
//! Exposes the router, state and remote client for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod remote;
pub mod routes;
pub mod state;
