mod machine;
mod messages;
mod session_impl;
mod state;

pub(crate) use messages::Request;
pub(crate) use session_impl::new_session;
pub use state::SessionState;
