//! The GMP state machine.
//!
//! `Machine` is plain data: it consumes inbound bytes, updates the state,
//! sequence bits, command queue and talk buffer, and collects the
//! instructions for the transmitter in an outbox. The session task owns
//! one `Machine` and drains the outbox after every event.
use crate::config::{GmpConfig, LocalColor};
use crate::error::GmpError;
use crate::network::Outbound;
use crate::protocol::{ByteEvent, Command, CommandKind, FrameAssembler, Packet, Query};
use crate::session::state::SessionState;
use log::{debug, info, trace, warn};
use std::collections::VecDeque;

/// queries sent before a NEWGAME is accepted in simple mode
const NEGOTIATION: [Query; 2] = [Query::Color, Query::Handicap];

/// what happened to a command the local side wants to send
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SendStart {
    /// packet handed to the transmitter, wait for the acknowledgement
    Transmitted,
    /// the peer already sent the same command; it was consumed instead
    Agreed,
    Rejected(GmpError),
}

pub(crate) struct Machine {
    size: u8,
    color: LocalColor,
    simple: bool,
    state: SessionState,
    /// sequence bit of our last non-OK packet
    my_last_seq: bool,
    /// sequence bit of the last command accepted from the peer
    his_last_seq: bool,
    last_query: Option<Query>,
    query_count: usize,
    assembler: FrameAssembler,
    queue: VecDeque<Command>,
    talk_buffer: String,
    talk_line: String,
    outbox: Vec<Outbound>,
}

impl Machine {
    pub(crate) fn new(config: &GmpConfig) -> Self {
        Machine {
            size: config.size,
            color: config.color,
            simple: config.simple,
            state: SessionState::Idle,
            my_last_seq: false,
            his_last_seq: false,
            last_query: None,
            query_count: 0,
            assembler: FrameAssembler::new(),
            queue: VecDeque::with_capacity(32),
            talk_buffer: String::new(),
            talk_line: String::new(),
            outbox: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn take_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Feed one inbound byte.
    ///
    /// Returns `true` if the byte completed a valid packet, in which case
    /// the state or the command queue may have changed.
    pub(crate) fn handle_byte(&mut self, byte: u8) -> bool {
        trace!("recv {:08b}", byte);
        match self.assembler.push(byte) {
            ByteEvent::Talk(c) => {
                self.on_talk(c);
                false
            }
            ByteEvent::Partial => false,
            ByteEvent::Restart => {
                debug!("new start byte, discarding old bytes");
                false
            }
            ByteEvent::Noise => {
                debug!("discarding command byte");
                false
            }
            ByteEvent::Frame(Err(e)) => {
                debug!("dropping packet: {}", e);
                false
            }
            ByteEvent::Frame(Ok(packet)) => {
                self.handle_packet(packet);
                true
            }
        }
    }

    fn on_talk(&mut self, c: char) {
        match c {
            '\r' => {}
            '\n' => {
                info!("talk: {}", self.talk_line);
                self.talk_line.clear();
            }
            c => {
                self.talk_line.push(c);
                self.talk_buffer.push(c);
            }
        }
    }

    fn handle_packet(&mut self, packet: Packet) {
        let Packet { seq, ack, command } = packet;
        let previous = self.state;
        if self.state.awaits_peer() {
            if command.is_ok() {
                if ack != self.my_last_seq {
                    debug!("sequence error");
                    return;
                }
                debug!("received OK");
                self.state = SessionState::Idle;
                self.outbox.push(Outbound::StopSend);
                return;
            }
            if seq == self.his_last_seq {
                debug!("old command, resending OK");
                self.send_ok();
                return;
            }
            if ack == self.my_last_seq {
                // the peer saw our packet and answers with a command of its own
                self.state = SessionState::Idle;
                self.outbox.push(Outbound::StopSend);
                self.his_last_seq = seq;
                self.handle_command(command, previous);
                return;
            }
            // Strict GMP abandons the command here. Our packet may already
            // have been resent and accepted by the peer, so keep it alive.
            debug!("ignoring conflict");
            self.outbox.push(Outbound::Resend);
        } else {
            if command.is_ok() {
                debug!("ignoring unexpected OK");
                return;
            }
            if ack != self.my_last_seq {
                debug!("ignoring old command");
                return;
            }
            if seq == self.his_last_seq {
                debug!("old command, resending OK");
                self.send_ok();
                return;
            }
            self.his_last_seq = seq;
            self.handle_command(command, previous);
        }
    }

    /// `previous` is the state before the packet carrying `command` arrived
    fn handle_command(&mut self, command: Command, previous: SessionState) {
        debug!("received {}", self.describe(&command));
        match command.kind {
            CommandKind::Query => self.answer_query(command.value),
            CommandKind::Answer => {
                if previous != SessionState::WaitAnswer {
                    warn!("unexpected {}", self.describe(&command));
                    self.send_ok();
                    self.state = SessionState::Idle;
                } else if self.query_count + 1 < NEGOTIATION.len() {
                    self.query_count += 1;
                    self.send_query(NEGOTIATION[self.query_count]);
                } else {
                    self.send_ok();
                    self.state = SessionState::Idle;
                }
            }
            CommandKind::NewGame if self.simple => {
                self.queue.push_back(command);
                self.query_count = 0;
                self.send_query(NEGOTIATION[0]);
            }
            CommandKind::Deny => {
                self.send_ok();
                if previous == SessionState::WaitAnswerOk {
                    self.state = SessionState::Idle;
                } else {
                    self.state = SessionState::Deny;
                }
            }
            CommandKind::Ok
            | CommandKind::NewGame
            | CommandKind::Move
            | CommandKind::Undo
            | CommandKind::Extended => {
                self.send_ok();
                self.queue.push_back(command);
                self.state = SessionState::Idle;
            }
        }
    }

    fn answer_query(&mut self, value: u16) {
        let query = Query::from_value(value);
        self.last_query = Some(query);
        let answer = match query {
            Query::Color => self.color.index(),
            Query::Size => self.size as u16,
            // no handicap
            Query::Handicap => 1,
            _ => 0,
        };
        self.send_command(Command::answer(answer));
    }

    fn send_query(&mut self, query: Query) {
        self.last_query = Some(query);
        self.send_command(Command::query(query));
    }

    fn send_ok(&mut self) {
        self.send_command(Command::ok());
    }

    /// Put a packet for `command` into the outbox.
    ///
    /// Every command except OK toggles our sequence bit and is resent
    /// until acknowledged; OK is written once.
    pub(crate) fn send_command(&mut self, command: Command) {
        debug!("send {}", self.describe(&command));
        let once = command.is_ok();
        if !once {
            self.my_last_seq = !self.my_last_seq;
        }
        let bytes = Packet::new(self.my_last_seq, self.his_last_seq, command).encode();
        self.outbox.push(Outbound::Packet { bytes, once });
        if !once {
            self.state = match command.kind {
                CommandKind::Answer => SessionState::WaitAnswerOk,
                CommandKind::Query => SessionState::WaitAnswer,
                _ => SessionState::WaitOk,
            };
        }
    }

    /// Start sending a command on behalf of a caller.
    ///
    /// Must not be called during an answer cycle.
    pub(crate) fn begin_send(&mut self, command: Command) -> SendStart {
        debug_assert!(!self.state.in_answer_cycle());
        match self.state {
            SessionState::WaitOk => return SendStart::Rejected(GmpError::CommandInProgress),
            SessionState::Disconnected | SessionState::Interrupted => {
                return SendStart::Rejected(GmpError::Disconnected)
            }
            _ => {}
        }
        match self.queue.front() {
            Some(head) if *head == command => {
                // both sides sent the same command
                self.queue.pop_front();
                SendStart::Agreed
            }
            Some(head) => SendStart::Rejected(GmpError::Unexpected(self.describe(head))),
            None => {
                self.send_command(command);
                SendStart::Transmitted
            }
        }
    }

    /// Result of the command started by `begin_send`, once there is one.
    pub(crate) fn send_outcome(&mut self) -> Option<Result<(), GmpError>> {
        match self.state {
            SessionState::Idle => Some(Ok(())),
            SessionState::Deny => {
                self.state = SessionState::Idle;
                Some(Err(GmpError::Denied))
            }
            SessionState::Interrupted => Some(Err(GmpError::Interrupted)),
            SessionState::Disconnected => Some(Err(GmpError::Disconnected)),
            SessionState::WaitOk | SessionState::WaitAnswerOk | SessionState::WaitAnswer => None,
        }
    }

    /// Take the queue head if it is a `kind` command whose value matches
    /// `expected` under `mask`.
    ///
    /// `None` means keep waiting. A different command at the head is an
    /// error and stays queued.
    pub(crate) fn take_matching(
        &mut self,
        kind: CommandKind,
        mask: u16,
        expected: u16,
    ) -> Option<Result<u16, GmpError>> {
        if self.state.in_answer_cycle() {
            return None;
        }
        match self.queue.front() {
            Some(head) if head.kind == kind && head.value & mask == expected => {
                let value = head.value;
                self.queue.pop_front();
                Some(Ok(value))
            }
            Some(head) => {
                let received = self.describe(head);
                warn!("waiting for {} but received {}", kind, received);
                Some(Err(GmpError::Unexpected(received)))
            }
            None => match self.state {
                SessionState::Disconnected => Some(Err(GmpError::Disconnected)),
                SessionState::Interrupted => Some(Err(GmpError::Interrupted)),
                _ => None,
            },
        }
    }

    pub(crate) fn interrupt(&mut self) {
        self.state = SessionState::Interrupted;
    }

    pub(crate) fn disconnect(&mut self) {
        self.state = SessionState::Disconnected;
    }

    /// drain the talk received so far
    pub(crate) fn take_talk(&mut self) -> String {
        std::mem::take(&mut self.talk_buffer)
    }

    pub(crate) fn describe_queue(&self) -> Vec<String> {
        self.queue.iter().map(|c| self.describe(c)).collect()
    }

    pub(crate) fn describe(&self, command: &Command) -> String {
        command.describe(self.size, self.last_query)
    }
}
