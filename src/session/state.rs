/// States of the GMP session.
///
/// ```text
///  IDLE ──send──▶ WAIT_OK ──OK──▶ IDLE
///   │               └──DENY──▶ DENY ──caller notified──▶ IDLE
///   ├──QUERY rcvd──▶ WAIT_ANSWER_OK ──OK──▶ IDLE
///   └──NEWGAME rcvd (simple)──▶ WAIT_ANSWER ──ANSWER…──▶ IDLE
///
///  any ──interrupt──▶ INTERRUPTED ──▶ DISCONNECTED
///  any ──end of input──▶ DISCONNECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// no command of ours is outstanding
    Idle,
    Disconnected,
    /// waiting for the peer to acknowledge our command
    WaitOk,
    /// the peer rejected our last command
    Deny,
    Interrupted,
    /// we answered a query and wait for the acknowledgement
    WaitAnswerOk,
    /// we sent a query and wait for the answer
    WaitAnswer,
}

impl SessionState {
    /// waiting for the peer to respond to a packet of ours
    pub fn awaits_peer(&self) -> bool {
        matches!(
            self,
            SessionState::WaitOk | SessionState::WaitAnswerOk | SessionState::WaitAnswer
        )
    }

    /// in the middle of a query/answer exchange
    pub fn in_answer_cycle(&self) -> bool {
        matches!(self, SessionState::WaitAnswerOk | SessionState::WaitAnswer)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
