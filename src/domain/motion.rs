//! Motion event kinds.

use std::fmt;

/// Motion state transition reported by the camera subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Motion began.
    Start,
    /// Motion ended.
    Stop,
}

impl EventKind {
    /// Parse the `type:` token of a log line.
    ///
    /// Only the exact lowercase tokens `start` and `stop` are recognised;
    /// anything else is an unmatched line.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }

    /// The literal token as it appears in the log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
