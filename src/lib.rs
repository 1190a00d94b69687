pub mod config;
mod connection;
pub mod error;
pub(crate) mod network;
pub mod protocol;
pub(crate) mod session;

pub use config::{GmpConfig, LocalColor, MAX_SIZE};
pub use connection::Connection;
pub use error::GmpError;
pub use network::sanitize_talk;
pub use protocol::{Color, Move};
pub use session::SessionState;

pub(crate) const CHANNEL_SIZE: usize = 5;
