//! IPC server for the Cheddar service.

mod handlers;
mod server;

pub use server::run_server;
