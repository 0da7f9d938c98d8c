//! Wire vocabulary: single ASCII bytes, no framing.

use std::fmt;
use std::str::FromStr;

/// Host → device commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Steer/alert left.
    Left,
    /// Steer/alert right.
    Right,
    /// Stop / neutral.
    Stop,
    /// Begin calibration; always sent as a burst.
    Calibrate,
    /// Obstacle below.
    Down,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Left,
        Command::Right,
        Command::Stop,
        Command::Calibrate,
        Command::Down,
    ];

    #[inline]
    pub const fn as_byte(self) -> u8 {
        match self {
            Command::Left => b'L',
            Command::Right => b'R',
            Command::Stop => b'F',
            Command::Calibrate => b'C',
            Command::Down => b'D',
        }
    }

    #[inline]
    pub const fn as_char(self) -> char {
        self.as_byte() as char
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_byte() == b)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Command {
    type Err = String;

    /// Accepts the wire character (`L`) or a name (`left`, `stop`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if let [b] = t.as_bytes()
            && let Some(c) = Command::from_byte(b.to_ascii_uppercase())
        {
            return Ok(c);
        }
        match t.to_ascii_lowercase().as_str() {
            "left" => Ok(Command::Left),
            "right" => Ok(Command::Right),
            "stop" | "front" => Ok(Command::Stop),
            "calibrate" | "calib" => Ok(Command::Calibrate),
            "down" | "below" => Ok(Command::Down),
            _ => Err(format!("unknown command {s:?} (expected L, R, F, C or D)")),
        }
    }
}

/// A small set of acknowledgment characters, e.g. `"123456"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AckSet {
    chars: Vec<char>,
}

impl AckSet {
    pub fn new(chars: impl AsRef<str>) -> Self {
        let mut v: Vec<char> = chars.as_ref().chars().collect();
        v.sort_unstable();
        v.dedup();
        Self { chars: v }
    }

    #[inline]
    pub fn contains(&self, c: char) -> bool {
        self.chars.binary_search(&c).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.chars.iter().copied()
    }
}

impl From<&str> for AckSet {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for AckSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.chars {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("L", Command::Left)]
    #[case("r", Command::Right)]
    #[case("stop", Command::Stop)]
    #[case("C", Command::Calibrate)]
    #[case("below", Command::Down)]
    fn parses_commands(#[case] s: &str, #[case] want: Command) {
        assert_eq!(s.parse::<Command>().unwrap(), want);
    }

    #[test]
    fn rejects_unknown_command() {
        assert!("X".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    #[test]
    fn wire_bytes_round_trip() {
        for c in Command::ALL {
            assert_eq!(Command::from_byte(c.as_byte()), Some(c));
        }
        assert_eq!(Command::Stop.as_char(), 'F');
    }

    #[test]
    fn ack_set_membership() {
        let s = AckSet::new("6543215");
        assert!(s.contains('5'));
        assert!(!s.contains('7'));
        assert_eq!(s.to_string(), "123456");
        assert!(AckSet::default().is_empty());
    }
}
