//! Rate-limited single-line status display
//!
//! Each update rewrites the same terminal line: the message is written, padded
//! with spaces to the length of the previous message, and followed by a
//! carriage return. Updates more frequent than the refresh period are dropped
//! unless forced.

use crate::util::clock::SharedClock;
use std::io::{self, Write};
use std::time::Duration;

pub struct StatusLine<W: Write> {
    out: W,
    clock: SharedClock,
    period: Duration,
    last_update: Duration,
    last_len: usize,
}

impl<W: Write> StatusLine<W> {
    /// The first unforced update is due one period after creation
    pub fn new(out: W, clock: SharedClock, period: Duration) -> Self {
        let last_update = clock.now();
        Self {
            out,
            clock,
            period,
            last_update,
            last_len: 0,
        }
    }

    /// Whether an unforced update would be written now
    #[inline]
    pub fn is_due(&self) -> bool {
        self.clock.now() > self.last_update + self.period
    }

    /// Write `message` unconditionally
    pub fn force_write(&mut self, message: &str) -> io::Result<()> {
        let width = self.last_len;
        write!(self.out, "{:<width$}\r", message, width = width)?;
        self.out.flush()?;

        self.last_len = message.len();
        self.last_update = self.clock.now();
        Ok(())
    }

    /// Write `message` if the refresh period has passed; returns whether it was written
    pub fn write_maybe(&mut self, message: &str) -> io::Result<bool> {
        if !self.is_due() {
            return Ok(false);
        }
        self.force_write(message)?;
        Ok(true)
    }

    /// Move past the status line so later output starts on a fresh line
    pub fn finish(&mut self) -> io::Result<()> {
        if self.last_len > 0 {
            writeln!(self.out)?;
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::clock::ManualClock;

    fn status(clock: &ManualClock) -> StatusLine<Vec<u8>> {
        StatusLine::new(Vec::new(), clock.shared(), Duration::from_secs(1))
    }

    fn text(line: StatusLine<Vec<u8>>) -> String {
        String::from_utf8(line.into_inner()).unwrap()
    }

    #[test]
    fn test_shorter_message_is_padded() {
        let clock = ManualClock::new();
        let mut line = status(&clock);

        line.force_write("gathering data 10.0%").unwrap();
        line.force_write("short").unwrap();

        let expected = format!("gathering data 10.0%\r{:<20}\r", "short");
        assert_eq!(text(line), expected);
    }

    #[test]
    fn test_longer_message_is_not_truncated() {
        let clock = ManualClock::new();
        let mut line = status(&clock);

        line.force_write("ab").unwrap();
        line.force_write("abcdef").unwrap();

        assert_eq!(text(line), "ab\rabcdef\r");
    }

    #[test]
    fn test_write_maybe_is_rate_limited() {
        let clock = ManualClock::new();
        let mut line = status(&clock);

        assert!(!line.write_maybe("too early").unwrap());

        clock.advance(Duration::from_millis(1001));
        assert!(line.write_maybe("first").unwrap());

        clock.advance(Duration::from_millis(500));
        assert!(!line.write_maybe("dropped").unwrap());

        clock.advance(Duration::from_millis(501));
        assert!(line.write_maybe("second").unwrap());

        assert_eq!(text(line), "first\rsecond\r");
    }

    #[test]
    fn test_force_resets_period() {
        let clock = ManualClock::new();
        let mut line = status(&clock);

        clock.advance(Duration::from_secs(5));
        line.force_write("forced").unwrap();
        assert!(!line.is_due());

        clock.advance(Duration::from_millis(1001));
        assert!(line.is_due());
    }

    #[test]
    fn test_finish_ends_line_only_after_output() {
        let clock = ManualClock::new();
        let mut line = status(&clock);
        line.finish().unwrap();
        assert_eq!(text(line), "");

        let mut line = status(&clock);
        line.force_write("done").unwrap();
        line.finish().unwrap();
        assert_eq!(text(line), "done\r\n");
    }
}
