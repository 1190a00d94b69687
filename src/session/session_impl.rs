use crate::config::GmpConfig;
use crate::error::GmpError;
use crate::network::{retrieve_bytes, start_transmitter, Outbound, ResendInterval, Transmitter};
use crate::protocol::{Command, CommandKind};
use crate::session::machine::{Machine, SendStart};
use crate::session::messages::{message_receiver, Request, SessionMessage};
use crate::CHANNEL_SIZE;
use async_std::channel::{bounded, Sender};
use async_std::task;
use futures::channel::oneshot;
use futures::{AsyncRead, AsyncWrite, StreamExt};
use log::{info, trace, warn};
use std::collections::VecDeque;

/// Start a GMP session on a byte stream.
///
/// Spawns the receiver, the transmitter and the session task, and returns
/// the channel the connection handle uses to talk to the session. The
/// three tasks stop together on end-of-input, on interrupt, or when every
/// request sender is dropped. The reader and the writer are dropped when
/// they stop.
pub(crate) fn new_session<R, W>(reader: R, writer: W, config: &GmpConfig) -> Sender<Request>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (requests, request_receiver) = bounded(CHANNEL_SIZE);
    let interval = ResendInterval {
        min: config.resend_min,
        max: config.resend_max,
    };
    let (transmitter, _) = start_transmitter(writer, interval);
    let (bytes, stopper) = retrieve_bytes(reader);
    let mut session = Session::new(Machine::new(config), transmitter);
    let size = config.size;
    task::spawn(async move {
        info!("GMP session started, board size {}", size);
        let mut messages = message_receiver(bytes, request_receiver);
        while let Some(message) = messages.next().await {
            #[cfg(debug_assertions)]
            trace!("message {:?} received by session", message);
            if let Flow::Stop = session.handle_message(message).await {
                break;
            }
        }
        // both halves of the transport are dropped once the two workers stop
        drop(stopper);
        drop(session);
        info!("GMP session stopped");
    });
    requests
}

enum Flow {
    Continue,
    Stop,
}

struct Waiter {
    kind: CommandKind,
    mask: u16,
    expected: u16,
    reply: oneshot::Sender<Result<u16, GmpError>>,
}

type SendReply = oneshot::Sender<Result<(), GmpError>>;

/// Session task state: the protocol machine plus the callers waiting on it.
struct Session {
    machine: Machine,
    transmitter: Transmitter,
    /// caller whose command is on the line
    pending: Option<SendReply>,
    /// sends issued during a query/answer exchange
    deferred: VecDeque<(Command, SendReply)>,
    waiters: VecDeque<Waiter>,
}

impl Session {
    fn new(machine: Machine, transmitter: Transmitter) -> Self {
        Session {
            machine,
            transmitter,
            pending: None,
            deferred: VecDeque::new(),
            waiters: VecDeque::new(),
        }
    }

    async fn handle_message(&mut self, message: SessionMessage) -> Flow {
        match message {
            SessionMessage::Bytes(bytes) => {
                for byte in bytes {
                    if self.machine.handle_byte(byte) {
                        self.settle();
                    }
                }
                self.flush().await;
                Flow::Continue
            }
            SessionMessage::Request(request) => self.handle_request(request).await,
            SessionMessage::Closed => {
                self.machine.disconnect();
                self.fail_all(GmpError::Disconnected);
                Flow::Stop
            }
            SessionMessage::Released => {
                self.fail_all(GmpError::Disconnected);
                Flow::Stop
            }
        }
    }

    async fn handle_request(&mut self, request: Request) -> Flow {
        match request {
            Request::Send { command, reply } => {
                if self.pending.is_some() {
                    let _ = reply.send(Err(GmpError::CommandInProgress));
                } else {
                    self.deferred.push_back((command, reply));
                    self.settle();
                    self.flush().await;
                }
            }
            Request::Wait {
                kind,
                mask,
                expected,
                reply,
            } => {
                trace!("waiting for {}", kind);
                self.waiters.push_back(Waiter {
                    kind,
                    mask,
                    expected,
                    reply,
                });
                self.settle();
                self.flush().await;
            }
            Request::Talk(text) => {
                if self.transmitter.send(Outbound::Talk(text)).await.is_err() {
                    warn!("transmitter stopped, talk dropped");
                }
            }
            Request::GetTalk(reply) => {
                let _ = reply.send(self.machine.take_talk());
            }
            Request::Queue(reply) => {
                let _ = reply.send(self.machine.describe_queue());
            }
            Request::State(reply) => {
                let _ = reply.send(self.machine.state());
            }
            Request::Interrupt => {
                info!("command interrupted, closing GMP connection");
                self.machine.interrupt();
                self.fail_all(GmpError::Interrupted);
                self.machine.disconnect();
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Wake every caller whose condition the current state satisfies.
    fn settle(&mut self) {
        if self.pending.is_some() {
            if let Some(outcome) = self.machine.send_outcome() {
                if let Some(reply) = self.pending.take() {
                    let _ = reply.send(outcome);
                }
            }
        }
        while !self.machine.state().in_answer_cycle() {
            let (command, reply) = match self.deferred.pop_front() {
                Some(next) => next,
                None => break,
            };
            if self.pending.is_some() {
                let _ = reply.send(Err(GmpError::CommandInProgress));
                continue;
            }
            match self.machine.begin_send(command) {
                SendStart::Transmitted => self.pending = Some(reply),
                SendStart::Agreed => {
                    let _ = reply.send(Ok(()));
                }
                SendStart::Rejected(e) => {
                    let _ = reply.send(Err(e));
                }
            }
        }
        let mut still_waiting = VecDeque::with_capacity(self.waiters.len());
        while let Some(waiter) = self.waiters.pop_front() {
            // the caller gave up, do not consume a command for it
            if waiter.reply.is_canceled() {
                continue;
            }
            match self
                .machine
                .take_matching(waiter.kind, waiter.mask, waiter.expected)
            {
                Some(result) => {
                    let _ = waiter.reply.send(result);
                }
                None => still_waiting.push_back(waiter),
            }
        }
        self.waiters = still_waiting;
    }

    fn fail_all(&mut self, error: GmpError) {
        if let Some(reply) = self.pending.take() {
            let _ = reply.send(Err(error.clone()));
        }
        for (_, reply) in self.deferred.drain(..) {
            let _ = reply.send(Err(error.clone()));
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.reply.send(Err(error.clone()));
        }
    }

    /// hand the machine's outbox to the transmitter
    async fn flush(&mut self) {
        for outbound in self.machine.take_outbound() {
            if self.transmitter.send(outbound).await.is_err() {
                warn!("transmitter stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod test_session {
    use super::*;
    use crate::network::transmitter::test_transmitter::ChannelWriter;
    use crate::protocol::{Color, Move, Packet, Query};
    use async_std::channel::{unbounded, Receiver};
    use futures::executor::block_on;
    use std::time::Duration;

    /// session whose transmitter writes every chunk into the returned channel
    fn session(simple: bool) -> (Session, Receiver<Vec<u8>>) {
        let (s, written) = unbounded();
        let interval = ResendInterval {
            min: Duration::from_secs(20),
            max: Duration::from_secs(30),
        };
        let (transmitter, _) = start_transmitter(ChannelWriter(s), interval);
        let config = GmpConfig {
            simple,
            ..GmpConfig::new(9)
        };
        (Session::new(Machine::new(&config), transmitter), written)
    }

    async fn receive(session: &mut Session, packet: Packet) {
        let bytes = packet.encode().to_vec();
        session.handle_message(SessionMessage::Bytes(bytes)).await;
    }

    async fn send(
        session: &mut Session,
        command: Command,
    ) -> oneshot::Receiver<Result<(), GmpError>> {
        let (reply, response) = oneshot::channel();
        let request = Request::Send { command, reply };
        session.handle_message(SessionMessage::Request(request)).await;
        response
    }

    async fn next_sent(written: &mut Receiver<Vec<u8>>) -> Command {
        let chunk = written.next().await.unwrap();
        let bytes: [u8; 4] = chunk.as_slice().try_into().unwrap();
        Packet::decode(&bytes).unwrap().command
    }

    #[test]
    fn test_send_deferred_until_negotiation_ends() {
        block_on(async {
            let (mut b, mut written) = session(true);
            receive(&mut b, Packet::new(true, false, Command::new_game())).await;
            assert_eq!(next_sent(&mut written).await, Command::query(Query::Color));

            let play = Command::play(Move::new(Color::White, 4, 4), 9);
            let mut played = send(&mut b, play).await;
            assert!(matches!(played.try_recv(), Ok(None)));

            receive(&mut b, Packet::new(false, true, Command::answer(2))).await;
            assert_eq!(next_sent(&mut written).await, Command::query(Query::Handicap));
            assert!(matches!(played.try_recv(), Ok(None)));

            receive(&mut b, Packet::new(true, false, Command::answer(1))).await;
            assert_eq!(next_sent(&mut written).await, Command::ok());
            // the negotiated NEWGAME is still at the queue head
            assert_eq!(
                played.await.unwrap(),
                Err(GmpError::Unexpected("NEWGAME".to_string()))
            );
            assert_eq!(b.machine.describe_queue(), vec!["NEWGAME".to_string()]);
        });
    }

    #[test]
    fn test_send_deferred_until_answer_acknowledged() {
        block_on(async {
            let (mut b, mut written) = session(false);
            receive(&mut b, Packet::new(true, false, Command::query(Query::Size))).await;
            assert_eq!(next_sent(&mut written).await, Command::answer(9));

            let mut undo = send(&mut b, Command::undo(1)).await;
            let mut new_game = send(&mut b, Command::new_game()).await;
            assert!(matches!(undo.try_recv(), Ok(None)));
            assert!(matches!(new_game.try_recv(), Ok(None)));

            // the peer acknowledges our answer, the first deferred send goes out
            receive(&mut b, Packet::new(true, true, Command::ok())).await;
            assert_eq!(next_sent(&mut written).await, Command::undo(1));
            assert_eq!(new_game.await.unwrap(), Err(GmpError::CommandInProgress));
            assert!(matches!(undo.try_recv(), Ok(None)));

            receive(&mut b, Packet::new(true, false, Command::ok())).await;
            assert_eq!(undo.await.unwrap(), Ok(()));
        });
    }
}
