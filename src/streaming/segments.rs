//! Splits the raw stream buffer into prose and thought segments.
//!
//! A thought opens with `<think>` and runs until `</think>` or the end of the
//! buffer. Everything else is prose. The splitter is a pure function of the
//! buffer, so it can be re-run on every increment: segments that have been
//! closed never change, only the trailing segment may grow, and at most one
//! new segment appears per call.

use serde::{Deserialize, Serialize};

pub const THINK_START: &str = "<think>";
pub const THINK_END: &str = "</think>";

/// A top-level slice of the stream buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// User-facing answer text
    Prose { text: String },
    /// Reasoning commentary, kept verbatim.
    /// `closed` is false while the end marker has not arrived yet.
    Thought { text: String, closed: bool },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Prose { text } | Segment::Thought { text, .. } => text,
        }
    }

    pub fn is_thought(&self) -> bool {
        matches!(self, Segment::Thought { .. })
    }
}

/// Split `buffer` into ordered segments.
///
/// While the stream is still running (`finished == false`) a trailing
/// fragment that could grow into the next marker (for example `"<thi"`) is
/// withheld, so a marker cut across chunks never shows up as text. Once the
/// session is finished such fragments are literal text. An open thought is
/// finalized as-is; no end marker is invented.
pub fn split_segments(buffer: &str, finished: bool) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pos = 0;
    let mut in_thought = false;

    while pos <= buffer.len() {
        let marker = if in_thought { THINK_END } else { THINK_START };
        let rest = &buffer[pos..];

        match rest.find(marker) {
            Some(offset) => {
                push_segment(&mut segments, &rest[..offset], in_thought, true);
                pos += offset + marker.len();
                in_thought = !in_thought;
            }
            None => {
                let visible = if finished {
                    rest
                } else {
                    &rest[..rest.len() - partial_marker_len(rest, marker)]
                };
                push_segment(&mut segments, visible, in_thought, false);
                break;
            }
        }
    }

    segments
}

fn push_segment(segments: &mut Vec<Segment>, text: &str, in_thought: bool, closed: bool) {
    if in_thought {
        segments.push(Segment::Thought {
            text: text.to_string(),
            closed,
        });
    } else if !text.is_empty() {
        segments.push(Segment::Prose {
            text: text.to_string(),
        });
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`
fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|&len| text.ends_with(&marker[..len]))
        .unwrap_or(0)
}
