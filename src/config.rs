use crate::error::GmpError;
use std::time::Duration;

/// largest board whose points fit into the 9 point bits of a MOVE value
pub const MAX_SIZE: u8 = 22;

/// Color of the local program as reported to a peer's COLOR query.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LocalColor {
    Unknown,
    White,
    Black,
}

impl LocalColor {
    /// index sent in an ANSWER to QUERY COLOR
    pub fn index(&self) -> u16 {
        match self {
            LocalColor::Unknown => 0,
            LocalColor::White => 1,
            LocalColor::Black => 2,
        }
    }
}

/// Parameters of one GMP connection.
#[derive(Clone, PartialEq, Debug)]
pub struct GmpConfig {
    /// board size, fixed for the connection's lifetime
    pub size: u8,
    pub color: LocalColor,
    /// use the simple protocol variant: NEWGAME is only accepted
    /// after querying the peer's color and handicap
    pub simple: bool,
    /// the pending packet is resent after a uniformly random delay
    /// between `resend_min` and `resend_max`
    pub resend_min: Duration,
    pub resend_max: Duration,
}

impl Default for GmpConfig {
    fn default() -> Self {
        GmpConfig {
            size: 19,
            color: LocalColor::Unknown,
            simple: false,
            resend_min: Duration::from_secs(20),
            resend_max: Duration::from_secs(30),
        }
    }
}

impl GmpConfig {
    pub fn new(size: u8) -> Self {
        GmpConfig {
            size,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), GmpError> {
        if self.size < 1 || self.size > MAX_SIZE {
            Err(GmpError::UnsupportedSize(self.size))?
        }
        // the resend timer has millisecond resolution
        if self.resend_min.as_millis() < 1 {
            Err(GmpError::InvalidResendInterval(
                "minimum must be at least 1ms".to_string(),
            ))?
        }
        if self.resend_min > self.resend_max {
            Err(GmpError::InvalidResendInterval(format!(
                "minimum {:?} exceeds maximum {:?}",
                self.resend_min, self.resend_max
            )))?
        }
        Ok(())
    }
}
