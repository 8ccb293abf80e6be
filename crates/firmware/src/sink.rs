//! Line-buffered report output.
//!
//! The backtrace session writes its report through [`core::fmt::Write`] in
//! small pieces. Transports such as defmt frame output per call, so the
//! pieces are collected into whole lines before being handed on.

use core::fmt::{self, Write};

use heapless::String;

/// Longest line the hardware sink buffers before wrapping.
///
/// Wide enough for the `addr2line` hint of a full 16-entry call stack, which
/// must stay on one line for host tooling to pick it up.
pub const LINE_CAPACITY: usize = 256;

/// Capacity of the panic message passed to the session as the assert
/// expression.
pub const PANIC_MESSAGE_CAPACITY: usize = 128;

/// [`fmt::Write`] adapter that emits one callback per line.
///
/// Lines longer than `N` characters are split. A trailing partial line is
/// held until [`flush`](Self::flush) or the next newline.
pub struct LineSink<const N: usize, F> {
    line: String<N>,
    emit: F,
}

impl<const N: usize, F> LineSink<N, F>
where
    F: FnMut(&str),
{
    /// Sink passing every completed line to `emit`, without the newline.
    pub const fn new(emit: F) -> Self {
        Self {
            line: String::new(),
            emit,
        }
    }

    /// Text buffered since the last emitted line.
    pub fn pending(&self) -> &str {
        self.line.as_str()
    }

    /// Emit the buffered partial line, if any.
    pub fn flush(&mut self) {
        if !self.line.is_empty() {
            self.end_line();
        }
    }

    fn end_line(&mut self) {
        (self.emit)(self.line.as_str());
        self.line.clear();
    }
}

impl<const N: usize, F> Write for LineSink<N, F>
where
    F: FnMut(&str),
{
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if c == '\n' {
                self.end_line();
                continue;
            }
            if self.line.push(c).is_err() {
                self.end_line();
                // A fresh buffer always has room for one char unless N is 0.
                let _ = self.line.push(c);
            }
        }
        Ok(())
    }
}

impl<const N: usize, F> fmt::Debug for LineSink<N, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineSink")
            .field("pending", &self.line.as_str())
            .finish_non_exhaustive()
    }
}

/// Render `value` into a fixed-capacity string, cutting it at capacity.
///
/// Used for panic messages, which must be formatted without allocation
/// before the session is entered.
pub fn capture<const N: usize>(value: &dyn fmt::Display) -> String<N> {
    let mut out = Truncating(String::new());
    // Err only signals truncation; the prefix is kept.
    let _ = write!(out, "{value}");
    out.0
}

struct Truncating<const N: usize>(String<N>);

impl<const N: usize> Write for Truncating<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            self.0.push(c).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::string::ToString;
    use std::vec::Vec;

    fn collect<const N: usize>(text: &str) -> Vec<std::string::String> {
        let mut lines = Vec::new();
        let mut sink = LineSink::<N, _>::new(|line: &str| lines.push(line.to_string()));
        sink.write_str(text).unwrap();
        sink.flush();
        drop(sink);
        lines
    }

    #[test]
    fn test_lines_are_split_on_newline() {
        assert_eq!(collect::<16>("one\ntwo\n"), ["one", "two"]);
    }

    #[test]
    fn test_blank_line_is_emitted() {
        assert_eq!(collect::<16>("\nheader\n"), ["", "header"]);
    }

    #[test]
    fn test_partial_line_waits_for_flush() {
        let mut lines = Vec::new();
        let mut sink = LineSink::<16, _>::new(|line: &str| lines.push(line.to_string()));
        write!(sink, "addr: {:08x}", 0x2000_0000u32).unwrap();
        assert_eq!(sink.pending(), "addr: 20000000");
        sink.flush();
        sink.flush();
        drop(sink);
        assert_eq!(lines, ["addr: 20000000"]);
    }

    #[test]
    fn test_long_line_wraps_at_capacity() {
        assert_eq!(collect::<4>("abcdefghij\n"), ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_pieces_join_into_one_line() {
        let mut lines = Vec::new();
        let mut sink = LineSink::<32, _>::new(|line: &str| lines.push(line.to_string()));
        sink.write_str("R0 : ").unwrap();
        sink.write_str("00000000").unwrap();
        sink.write_str("\n").unwrap();
        drop(sink);
        assert_eq!(lines, ["R0 : 00000000"]);
    }

    #[test]
    fn test_capture_truncates_at_capacity() {
        let message: String<8> = capture(&"index out of bounds");
        assert_eq!(message.as_str(), "index ou");
    }

    #[test]
    fn test_capture_keeps_short_messages() {
        let message: String<PANIC_MESSAGE_CAPACITY> = capture(&format_args!("len {} > {}", 3, 2));
        assert_eq!(message.as_str(), "len 3 > 2");
    }
}
