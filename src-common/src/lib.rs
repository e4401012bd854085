//! Cheddar Common Library
//!
//! Shared types and IPC protocol for communication between the Cheddar
//! presentation clients and the background service.

pub mod ipc;
pub mod logging;
pub mod types;
pub mod validation;

pub use types::*;
