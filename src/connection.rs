use crate::config::GmpConfig;
use crate::error::GmpError;
use crate::protocol::{Color, Command, CommandKind, Move, MOVE_COLOR_MASK};
use crate::session::{new_session, Request, SessionState};
use async_std::channel::Sender;
use futures::channel::oneshot;
use futures::{AsyncRead, AsyncWrite};

/// Public API of a GMP connection.
///
/// All operations wait for the protocol to finish them. The handle is
/// cheap to clone; use a clone to call [`Connection::interrupt_command`]
/// from another task while an operation is blocked.
#[derive(Clone)]
pub struct Connection {
    size: u8,
    requests: Sender<Request>,
}

impl Connection {
    /// Start a GMP connection over a byte stream.
    ///
    /// `reader` and `writer` are usually the two halves of one serial line
    /// or socket. Both are dropped when the connection ends, and dropping
    /// both must close the transport so the peer sees end-of-input (true for
    /// the two clones of an `async_std::net::TcpStream`). Fails only if
    /// `config` is invalid.
    pub fn new<R, W>(reader: R, writer: W, config: GmpConfig) -> Result<Connection, GmpError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;
        Ok(Connection {
            size: config.size,
            requests: new_session(reader, writer, &config),
        })
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    /// Send NEWGAME and wait for it to be acknowledged.
    ///
    /// `size` must be the size the connection was created with.
    pub async fn new_game(&self, size: u8) -> Result<(), GmpError> {
        self.check_size(size)?;
        self.send(Command::new_game()).await
    }

    /// Send a move and wait for it to be acknowledged.
    ///
    /// Coordinates start at 0; `-1` for x or y is a pass.
    pub async fn play(&self, color: Color, x: i32, y: i32) -> Result<(), GmpError> {
        let size = self.size as i32;
        if x >= size || y >= size || x < -1 || y < -1 {
            Err(GmpError::InvalidCoordinates)?
        }
        let mv = if x < 0 || y < 0 {
            Move::pass(color)
        } else {
            Move::new(color, x, y)
        };
        self.send(Command::play(mv, self.size)).await
    }

    /// take back one move
    pub async fn undo(&self) -> Result<(), GmpError> {
        self.send(Command::undo(1)).await
    }

    /// Wait for a move of `color` from the peer.
    ///
    /// Returns immediately if a move was already queued, and fails if the
    /// next queued command is anything else.
    pub async fn wait_move(&self, color: Color) -> Result<Move, GmpError> {
        let value = self
            .wait(CommandKind::Move, MOVE_COLOR_MASK, color.move_bits())
            .await?;
        Ok(Move::unpack(value, self.size))
    }

    /// Wait for a NEWGAME from the peer.
    pub async fn wait_new_game(&self, size: u8) -> Result<(), GmpError> {
        self.check_size(size)?;
        self.wait(CommandKind::NewGame, 0, 0).await.map(|_| ())
    }

    pub async fn send_talk(&self, text: &str) -> Result<(), GmpError> {
        self.requests
            .send(Request::Talk(text.to_string()))
            .await
            .map_err(|_| GmpError::Disconnected)
    }

    /// all talk received since the last call
    pub async fn get_talk(&self) -> Result<String, GmpError> {
        self.request(Request::GetTalk).await
    }

    /// queued commands from the peer, oldest first, in readable form
    pub async fn queue(&self) -> Result<Vec<String>, GmpError> {
        self.request(Request::Queue).await
    }

    pub async fn state(&self) -> Result<SessionState, GmpError> {
        self.request(Request::State).await
    }

    /// Fail every blocked operation and close the connection for good.
    pub async fn interrupt_command(&self) {
        let _ = self.requests.send(Request::Interrupt).await;
    }

    async fn send(&self, command: Command) -> Result<(), GmpError> {
        self.request(|reply| Request::Send { command, reply })
            .await?
    }

    async fn wait(&self, kind: CommandKind, mask: u16, expected: u16) -> Result<u16, GmpError> {
        self.request(|reply| Request::Wait {
            kind,
            mask,
            expected,
            reply,
        })
        .await?
    }

    /// send a request and wait for the session's reply
    async fn request<T, F>(&self, make_request: F) -> Result<T, GmpError>
    where
        F: FnOnce(oneshot::Sender<T>) -> Request,
    {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(make_request(reply))
            .await
            .map_err(|_| GmpError::Disconnected)?;
        response.await.map_err(|_| GmpError::Disconnected)
    }

    fn check_size(&self, size: u8) -> Result<(), GmpError> {
        if size != self.size {
            Err(GmpError::WrongSize(self.size))?
        }
        Ok(())
    }
}
