//! Transports for PaddleOCR-json style engines.
mod args;
mod process;
mod socket;

pub use args::{ArgValue, EngineArgs};
pub use process::ProcessEngine;
pub use socket::SocketEngine;
