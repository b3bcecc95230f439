//! Turning the raw stream buffer into transcript-ready segments

mod blocks;
mod segments;

#[cfg(test)]
mod segments_tests;
#[cfg(test)]
pub(crate) mod test_utils;

pub use blocks::{parse_inline, Block, BlockParser, Line, Span};
pub use segments::{split_segments, Segment, THINK_END, THINK_START};

use crate::artifacts::collapse_declarations;
use serde::{Deserialize, Serialize};

/// What the chat transcript shows for one segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedSegment {
    Thought { text: String, closed: bool },
    Prose { blocks: Vec<Block> },
}

/// Render the segments of a buffer for the transcript.
///
/// Prose is optionally stripped of file declarations before block parsing;
/// thoughts are passed through untouched.
pub fn render_segments(
    segments: &[Segment],
    parser: &BlockParser,
    collapse_artifacts: bool,
) -> Vec<RenderedSegment> {
    segments
        .iter()
        .filter_map(|segment| match segment {
            Segment::Thought { text, closed } => Some(RenderedSegment::Thought {
                text: text.clone(),
                closed: *closed,
            }),
            Segment::Prose { text } => {
                let blocks = if collapse_artifacts {
                    parser.parse_blocks(&collapse_declarations(text))
                } else {
                    parser.parse_blocks(text)
                };
                (!blocks.is_empty()).then_some(RenderedSegment::Prose { blocks })
            }
        })
        .collect()
}
