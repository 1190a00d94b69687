use crate::error::GmpError;
use crate::protocol::{Command, CommandKind};
use crate::session::SessionState;
use async_std::channel::Receiver;
use futures::channel::oneshot;
use futures::stream::{self, Stream};
use futures::{future, stream_select, StreamExt};
use std::fmt::{Debug, Formatter};

/// requests sent from the connection handle to the session
pub(crate) enum Request {
    /// send a command and reply once it is acknowledged or rejected
    Send {
        command: Command,
        reply: oneshot::Sender<Result<(), GmpError>>,
    },
    /// reply with the value of the next queued `kind` command
    /// whose value matches `expected` under `mask`
    Wait {
        kind: CommandKind,
        mask: u16,
        expected: u16,
        reply: oneshot::Sender<Result<u16, GmpError>>,
    },
    Talk(String),
    GetTalk(oneshot::Sender<String>),
    Queue(oneshot::Sender<Vec<String>>),
    State(oneshot::Sender<SessionState>),
    Interrupt,
}

/// everything the session task reacts to
pub(crate) enum SessionMessage {
    Bytes(Vec<u8>),
    /// the inbound stream ended
    Closed,
    Request(Request),
    /// all connection handles were dropped
    Released,
}

/// Fuse inbound bytes and caller requests into one stream.
///
/// Each source ends with a marker message, so the session can tell
/// end-of-input apart from all handles being dropped.
pub(crate) fn message_receiver(
    bytes: Receiver<Vec<u8>>,
    requests: Receiver<Request>,
) -> impl Stream<Item = SessionMessage> + Unpin {
    let bytes = bytes
        .map(SessionMessage::Bytes)
        .chain(stream::once(future::ready(SessionMessage::Closed)))
        .fuse();
    let requests = requests
        .map(SessionMessage::Request)
        .chain(stream::once(future::ready(SessionMessage::Released)))
        .fuse();
    stream_select!(bytes, requests)
}

impl Debug for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Send { command, .. } => write!(f, "Request::Send({:?})", command),
            Request::Wait { kind, .. } => write!(f, "Request::Wait({})", kind),
            Request::Talk(_) => f.write_str("Request::Talk"),
            Request::GetTalk(_) => f.write_str("Request::GetTalk"),
            Request::Queue(_) => f.write_str("Request::Queue"),
            Request::State(_) => f.write_str("Request::State"),
            Request::Interrupt => f.write_str("Request::Interrupt"),
        }
    }
}

impl Debug for SessionMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMessage::Bytes(b) => write!(f, "SessionMessage::Bytes({})", b.len()),
            SessionMessage::Closed => f.write_str("SessionMessage::Closed"),
            SessionMessage::Request(r) => r.fmt(f),
            SessionMessage::Released => f.write_str("SessionMessage::Released"),
        }
    }
}
