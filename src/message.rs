//! Log message representation handed over by the host.
//!
//! A `LogMessage` carries one line captured from a container stream along
//! with the stream it came from and the time it was read.

use std::fmt;
use std::time::SystemTime;

/// Container stream a line was captured from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Source {
    #[default]
    Stdout,
    Stderr,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Stdout => "stdout",
            Source::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct LogMessage {
    /// Raw line content without the trailing newline.
    pub line: Vec<u8>,
    /// Stream the line was read from.
    pub source: Source,
    /// Time the host captured the line.
    pub timestamp: SystemTime,
    /// Set when the host split an over-long line.
    pub partial: bool,
}

impl LogMessage {
    /// Construct a message captured now from `source`.
    pub fn new(line: impl Into<Vec<u8>>, source: Source) -> Self {
        Self {
            line: line.into(),
            source,
            timestamp: SystemTime::now(),
            partial: false,
        }
    }

    /// Shorthand for a stdout line.
    pub fn stdout(line: impl Into<Vec<u8>>) -> Self {
        Self::new(line, Source::Stdout)
    }

    /// Shorthand for a stderr line.
    pub fn stderr(line: impl Into<Vec<u8>>) -> Self {
        Self::new(line, Source::Stderr)
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.source, String::from_utf8_lossy(&self.line))
    }
}
