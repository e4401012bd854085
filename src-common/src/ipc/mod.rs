//! IPC protocol between presentation clients and the Cheddar service.

mod protocol;
mod requests;
mod responses;

pub use protocol::*;
pub use requests::Request;
pub use responses::{EventType, Response};
