//! Network Infrastructure
//!
//! The two long-lived I/O workers of a GMP connection: a receiver task
//! draining the inbound byte stream and a transmitter task owning the
//! outbound one.
pub(crate) mod receiver;
pub(crate) mod transmitter;

pub(crate) use receiver::retrieve_bytes;
pub use transmitter::sanitize_talk;
pub(crate) use transmitter::{start_transmitter, Outbound, ResendInterval, Transmitter};
