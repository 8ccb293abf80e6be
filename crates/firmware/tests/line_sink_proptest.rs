//! Property-based tests for the line-framed report sink.
//! Whatever the report text and however it is split into writes, RTT sees
//! bounded lines without newlines that join back into the text.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use core::fmt::Write;

use firmware::sink::capture;
use firmware::LineSink;
use proptest::prelude::*;

const WIDTH: usize = 16;

/// Report-like text, including multi-byte characters and blank lines.
fn report_text() -> impl Strategy<Value = String> {
    "[a-f0-9 :*()\"é→\n]{0,300}"
}

fn lines_of(pieces: &[&str]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut sink = LineSink::<WIDTH, _>::new(|line: &str| lines.push(line.to_string()));
    for piece in pieces {
        sink.write_str(piece).unwrap();
    }
    sink.flush();
    drop(sink);
    lines
}

/// Split `text` at the given byte offsets, moved back to char boundaries.
fn split_at_chars(text: &str, mut cuts: Vec<usize>) -> Vec<&str> {
    cuts.push(text.len());
    cuts.sort_unstable();
    let mut pieces = Vec::new();
    let mut from = 0;
    for mut cut in cuts {
        cut = cut.min(text.len());
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut > from {
            pieces.push(&text[from..cut]);
            from = cut;
        }
    }
    pieces
}

proptest! {
    /// No emitted line is wider than the buffer or carries a newline.
    #[test]
    fn lines_are_bounded_and_single(text in report_text()) {
        for line in lines_of(&[&text]) {
            prop_assert!(line.len() <= WIDTH);
            prop_assert!(!line.contains('\n'));
        }
    }

    /// Joining the lines gives back the text minus its newlines.
    #[test]
    fn no_text_is_lost(text in report_text()) {
        let lines = lines_of(&[&text]);
        prop_assert_eq!(lines.concat(), text.replace('\n', ""));
        prop_assert!(lines.len() >= text.matches('\n').count());
    }

    /// The session writes in small pieces; framing must not depend on them.
    #[test]
    fn framing_ignores_write_boundaries(
        text in report_text(),
        cuts in proptest::collection::vec(0usize..300, 0..8),
    ) {
        let pieces = split_at_chars(&text, cuts);
        prop_assert_eq!(pieces.concat(), text.clone());
        prop_assert_eq!(lines_of(&pieces), lines_of(&[&text]));
    }

    /// A captured panic message is a bounded prefix of the full message.
    #[test]
    fn capture_keeps_a_bounded_prefix(text in report_text()) {
        let captured = capture::<WIDTH>(&text);
        prop_assert!(captured.len() <= WIDTH);
        prop_assert!(text.starts_with(captured.as_str()));
    }
}
