//! Parsing of the oracle's emphasis markers into styled segments.
//!
//! The corrector is prompted to flag the right answer of a multiple-choice
//! question with `<<ALT_CORRETA_INICIO>>…<<ALT_CORRETA_FIM>>` and light
//! emphasis with single-asterisk `*italic*`. This module turns a corrected
//! string into the flat segment list the run builder consumes.
//!
//! Two layers, outside-in, no recursion:
//!
//! 1. Correct-answer callouts become one **bold** segment each. The inner
//!    text is taken verbatim — an asterisk inside a callout is literal.
//! 2. Remaining stretches are scanned for `*italic*` spans. Only a lone
//!    asterisk delimits; `**` is never a delimiter, so Markdown-style
//!    `**bold**` leaking out of a model stays visible rather than silently
//!    becoming emphasis we never asked for.
//!
//! Anything malformed degrades to literal text: an unterminated callout, an
//! unpaired asterisk, a closing marker with no opener. Empty segments are
//! dropped.

use crate::docx::build::RunStyle;

pub const CALLOUT_OPEN: &str = "<<ALT_CORRETA_INICIO>>";
pub const CALLOUT_CLOSE: &str = "<<ALT_CORRETA_FIM>>";

/// One stretch of uniformly-styled text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: RunStyle,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: RunStyle::Plain,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: RunStyle::Bold,
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: RunStyle::Italic,
        }
    }
}

/// Split `text` into styled segments.
pub fn parse_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;

    loop {
        match rest.find(CALLOUT_OPEN) {
            Some(open) => {
                let after_open = &rest[open + CALLOUT_OPEN.len()..];
                match after_open.find(CALLOUT_CLOSE) {
                    Some(close) => {
                        parse_italic_into(&rest[..open], &mut segments);
                        push_nonempty(&mut segments, Segment::bold(&after_open[..close]));
                        rest = &after_open[close + CALLOUT_CLOSE.len()..];
                    }
                    None => {
                        // Unterminated: the marker itself is literal text.
                        parse_italic_into(rest, &mut segments);
                        return segments;
                    }
                }
            }
            None => {
                parse_italic_into(rest, &mut segments);
                return segments;
            }
        }
    }
}

/// Layer 2: scan one callout-free stretch for `*italic*` spans.
fn parse_italic_into(text: &str, out: &mut Vec<Segment>) {
    let stars = single_star_positions(text);
    let mut cursor = 0;
    let mut i = 0;
    while i + 1 < stars.len() {
        let (open, close) = (stars[i], stars[i + 1]);
        push_nonempty(out, Segment::plain(&text[cursor..open]));
        push_nonempty(out, Segment::italic(&text[open + 1..close]));
        cursor = close + 1;
        i += 2;
    }
    push_nonempty(out, Segment::plain(&text[cursor..]));
}

/// Byte offsets of asterisks not adjacent to another asterisk.
fn single_star_positions(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'*' {
            let prev_star = i > 0 && bytes[i - 1] == b'*';
            let next_star = i + 1 < bytes.len() && bytes[i + 1] == b'*';
            if !prev_star && !next_star {
                out.push(i);
            }
        }
    }
    out
}

fn push_nonempty(out: &mut Vec<Segment>, segment: Segment) {
    if !segment.text.is_empty() {
        out.push(segment);
    }
}
