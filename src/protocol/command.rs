use std::fmt::{Display, Formatter};

/// mask of the 10-bit command value
pub const VALUE_MASK: u16 = 0x3ff;
/// set in a MOVE value for white moves
pub const MOVE_COLOR_MASK: u16 = 0x200;
/// point bits of a MOVE value, 0 means pass
pub const MOVE_POINT_MASK: u16 = 0x1ff;

/// the eight GMP command kinds, encoded as 3 bits on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ok,
    Deny,
    NewGame,
    Query,
    Answer,
    Move,
    Undo,
    Extended,
}

impl CommandKind {
    pub const ALL: [CommandKind; 8] = [
        CommandKind::Ok,
        CommandKind::Deny,
        CommandKind::NewGame,
        CommandKind::Query,
        CommandKind::Answer,
        CommandKind::Move,
        CommandKind::Undo,
        CommandKind::Extended,
    ];

    pub fn code(&self) -> u8 {
        match self {
            CommandKind::Ok => 0,
            CommandKind::Deny => 1,
            CommandKind::NewGame => 2,
            CommandKind::Query => 3,
            CommandKind::Answer => 4,
            CommandKind::Move => 5,
            CommandKind::Undo => 6,
            CommandKind::Extended => 7,
        }
    }

    /// only the lowest 3 bits are used
    pub fn from_code(code: u8) -> Self {
        CommandKind::ALL[(code & 0x07) as usize]
    }
}

impl Display for CommandKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Ok => f.write_str("OK"),
            CommandKind::Deny => f.write_str("DENY"),
            CommandKind::NewGame => f.write_str("NEWGAME"),
            CommandKind::Query => f.write_str("QUERY"),
            CommandKind::Answer => f.write_str("ANSWER"),
            CommandKind::Move => f.write_str("MOVE"),
            CommandKind::Undo => f.write_str("UNDO"),
            CommandKind::Extended => f.write_str("EXTENDED"),
        }
    }
}

/// queries a peer may send, carried in the value of a QUERY command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Game,
    BufSize,
    Version,
    NumStones,
    TimeBlack,
    TimeWhite,
    CharSet,
    Rules,
    Handicap,
    Size,
    TimeLimit,
    Color,
    Who,
    Unknown(u16),
}

impl Query {
    pub fn from_value(value: u16) -> Self {
        match value {
            0 => Query::Game,
            1 => Query::BufSize,
            2 => Query::Version,
            3 => Query::NumStones,
            4 => Query::TimeBlack,
            5 => Query::TimeWhite,
            6 => Query::CharSet,
            7 => Query::Rules,
            8 => Query::Handicap,
            9 => Query::Size,
            10 => Query::TimeLimit,
            11 => Query::Color,
            12 => Query::Who,
            v => Query::Unknown(v),
        }
    }

    pub fn value(&self) -> u16 {
        match self {
            Query::Game => 0,
            Query::BufSize => 1,
            Query::Version => 2,
            Query::NumStones => 3,
            Query::TimeBlack => 4,
            Query::TimeWhite => 5,
            Query::CharSet => 6,
            Query::Rules => 7,
            Query::Handicap => 8,
            Query::Size => 9,
            Query::TimeLimit => 10,
            Query::Color => 11,
            Query::Who => 12,
            Query::Unknown(v) => *v,
        }
    }

    /// human-readable form of an ANSWER value to this query
    fn describe_answer(&self, value: u16) -> String {
        let known = match (self, value) {
            (Query::Game, 1) => Some("GO"),
            (Query::Game, 2) => Some("CHESS"),
            (Query::Game, 3) => Some("OTHELLO"),
            (Query::BufSize, v) => return format!("{} BYTES", 4 + v as u32 * 16),
            (Query::Version, v) => return v.to_string(),
            (Query::CharSet, 1) => Some("ASCII"),
            (Query::CharSet, 2) => Some("JAPANESE"),
            (Query::Rules, 1) => Some("JAPANESE"),
            (Query::Rules, 2) => Some("CHINESE (SST)"),
            (Query::Handicap, 1) => Some("NONE"),
            (Query::Color, 1) => Some("WHITE"),
            (Query::Color, 2) => Some("BLACK"),
            (Query::Who, 1) => Some("NEMESIS"),
            (Query::Who, 2) => Some("MANY FACES OF GO"),
            (Query::Who, 3) => Some("SMART GO BOARD"),
            (Query::Who, 4) => Some("GOLIATH"),
            (Query::Who, 5) => Some("GO INTELLECT"),
            (Query::Who, 6) => Some("STAR OF POLAND"),
            (_, 0) => Some("UNKNOWN"),
            _ => None,
        };
        match known {
            Some(s) => s.to_string(),
            None => value.to_string(),
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::Game => f.write_str("GAME"),
            Query::BufSize => f.write_str("BUFSIZE"),
            Query::Version => f.write_str("VERSION"),
            Query::NumStones => f.write_str("NUMSTONES"),
            Query::TimeBlack => f.write_str("TIMEBLACK"),
            Query::TimeWhite => f.write_str("TIMEWHITE"),
            Query::CharSet => f.write_str("CHARSET"),
            Query::Rules => f.write_str("RULES"),
            Query::Handicap => f.write_str("HANDICAP"),
            Query::Size => f.write_str("SIZE"),
            Query::TimeLimit => f.write_str("TIMELIMIT"),
            Query::Color => f.write_str("COLOR"),
            Query::Who => f.write_str("WHO"),
            Query::Unknown(v) => write!(f, "? ({})", v),
        }
    }
}

/// One GMP command: a kind and a 10-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub kind: CommandKind,
    pub value: u16,
}

impl Command {
    /// the value is truncated to 10 bits
    pub fn new(kind: CommandKind, value: u16) -> Self {
        Command {
            kind,
            value: value & VALUE_MASK,
        }
    }

    pub fn ok() -> Self {
        Command::new(CommandKind::Ok, 0)
    }

    pub fn deny() -> Self {
        Command::new(CommandKind::Deny, 0)
    }

    pub fn new_game() -> Self {
        Command::new(CommandKind::NewGame, 0)
    }

    pub fn query(query: Query) -> Self {
        Command::new(CommandKind::Query, query.value())
    }

    pub fn answer(value: u16) -> Self {
        Command::new(CommandKind::Answer, value)
    }

    pub fn play(mv: Move, size: u8) -> Self {
        Command::new(CommandKind::Move, mv.pack(size))
    }

    /// undo `moves` moves
    pub fn undo(moves: u16) -> Self {
        Command::new(CommandKind::Undo, moves)
    }

    pub fn is_ok(&self) -> bool {
        self.kind == CommandKind::Ok
    }

    /// Render the command the way it shows up in logs and queue listings.
    ///
    /// ANSWER values can only be decoded relative to the query they answer,
    /// and MOVE values relative to the board size.
    pub fn describe(&self, size: u8, last_query: Option<Query>) -> String {
        match self.kind {
            CommandKind::Ok | CommandKind::Deny | CommandKind::NewGame => self.kind.to_string(),
            CommandKind::Query => format!("QUERY {}", Query::from_value(self.value)),
            CommandKind::Answer => match last_query {
                Some(query) => format!("ANSWER {}", query.describe_answer(self.value)),
                None => format!("ANSWER {}", self.value),
            },
            CommandKind::Move => format!("MOVE {}", Move::unpack(self.value, size)),
            CommandKind::Undo | CommandKind::Extended => format!("{} {}", self.kind, self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// the color bit of a MOVE value
    pub fn move_bits(&self) -> u16 {
        match self {
            Color::Black => 0,
            Color::White => MOVE_COLOR_MASK,
        }
    }
}

/// A move as exchanged over GMP: coordinates start at 0, `(-1, -1)` is a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub color: Color,
    pub x: i32,
    pub y: i32,
}

impl Move {
    pub fn new(color: Color, x: i32, y: i32) -> Self {
        Move { color, x, y }
    }

    pub fn pass(color: Color) -> Self {
        Move { color, x: -1, y: -1 }
    }

    pub fn is_pass(&self) -> bool {
        self.x < 0 || self.y < 0
    }

    /// Pack into a MOVE value: `color bit | (1 + x + y * size)`, or just the
    /// color bit for a pass. Coordinates must already be on the board.
    pub fn pack(&self, size: u8) -> u16 {
        let mut value = self.color.move_bits();
        if !self.is_pass() {
            value |= (1 + self.x + self.y * size as i32) as u16;
        }
        value
    }

    pub fn unpack(value: u16, size: u8) -> Self {
        let color = if value & MOVE_COLOR_MASK == 0 {
            Color::Black
        } else {
            Color::White
        };
        let point = value & MOVE_POINT_MASK;
        if point == 0 || size == 0 {
            return Move::pass(color);
        }
        let point = (point - 1) as i32;
        let size = size as i32;
        Move {
            color,
            x: point % size,
            y: point / size,
        }
    }
}

/// `B D4`, `W PASS`; columns skip the letter I
impl Display for Move {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.color {
            Color::Black => f.write_str("B ")?,
            Color::White => f.write_str("W ")?,
        }
        if self.is_pass() {
            return f.write_str("PASS");
        }
        let mut column = b'A' + self.x as u8;
        if column >= b'I' {
            column += 1;
        }
        write!(f, "{}{}", column as char, self.y + 1)
    }
}

#[cfg(test)]
mod test_command {
    use super::*;

    #[test]
    fn test_move_packing() {
        for size in 1..=22u8 {
            for x in -1..size as i32 {
                for y in -1..size as i32 {
                    for color in [Color::Black, Color::White] {
                        let mv = Move::new(color, x, y);
                        let unpacked = Move::unpack(mv.pack(size), size);
                        if mv.is_pass() {
                            assert_eq!(unpacked, Move::pass(color));
                        } else {
                            assert_eq!(unpacked, mv);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_pass_is_zero() {
        for size in 1..=22u8 {
            assert_eq!(Move::pass(Color::Black).pack(size), 0);
            assert_eq!(Move::pass(Color::White).pack(size) & MOVE_POINT_MASK, 0);
        }
    }

    #[test]
    fn test_largest_board_fits() {
        let corner = Move::new(Color::White, 21, 21);
        assert!(corner.pack(22) <= VALUE_MASK);
        assert_eq!(Move::unpack(corner.pack(22), 22), corner);
    }

    #[test]
    fn test_value_truncated() {
        assert_eq!(Command::new(CommandKind::Undo, 0xffff).value, 0x3ff);
    }

    #[test]
    fn test_describe() {
        assert_eq!(Command::new_game().describe(9, None), "NEWGAME");
        assert_eq!(
            Command::query(Query::Handicap).describe(9, None),
            "QUERY HANDICAP"
        );
        assert_eq!(
            Command::answer(2).describe(9, Some(Query::Color)),
            "ANSWER BLACK"
        );
        assert_eq!(
            Command::answer(0).describe(9, Some(Query::Rules)),
            "ANSWER UNKNOWN"
        );
        assert_eq!(
            Command::answer(1).describe(9, Some(Query::BufSize)),
            "ANSWER 20 BYTES"
        );
        assert_eq!(
            Command::play(Move::new(Color::Black, 3, 3), 9).describe(9, None),
            "MOVE B D4"
        );
        assert_eq!(
            Command::play(Move::new(Color::White, 8, 0), 9).describe(9, None),
            "MOVE W J1"
        );
        assert_eq!(
            Command::play(Move::pass(Color::White), 9).describe(9, None),
            "MOVE W PASS"
        );
        assert_eq!(Command::undo(1).describe(9, None), "UNDO 1");
    }

    #[test]
    fn test_kind_codes() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_code(kind.code()), kind);
        }
    }
}
