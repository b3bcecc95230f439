//! Display-level parsing of prose segments.
//!
//! Prose is split into text and fenced code blocks, and text blocks are
//! further broken into lines (headings, list items, paragraphs) carrying
//! inline spans. This is deliberately small: only the rules the transcript
//! needs, not a markdown implementation.

use regex::Regex;
use serde::{Deserialize, Serialize};

const FENCE: &str = "```";

/// A sub-segment of a prose segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Text { text: String },
    /// Verbatim code; escaping is left to the renderer
    Code { language: String, text: String },
}

/// Inline span within a single line of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Span {
    Text(String),
    Code(String),
    Bold(String),
}

/// Block-level classification of a single line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Line {
    Heading { level: u8, spans: Vec<Span> },
    Bullet { spans: Vec<Span> },
    Numbered { number: u32, spans: Vec<Span> },
    Paragraph { spans: Vec<Span> },
    Blank,
}

pub struct BlockParser {
    default_language: String,
    heading_regex: Regex,
    bullet_regex: Regex,
    numbered_regex: Regex,
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::new("text")
    }
}

impl BlockParser {
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
            heading_regex: Regex::new(r"^(#{1,3})\s+(.*)$").expect("heading pattern is valid"),
            bullet_regex: Regex::new(r"^[-*]\s+(.*)$").expect("bullet pattern is valid"),
            numbered_regex: Regex::new(r"^(\d+)\.\s+(.*)$").expect("numbered pattern is valid"),
        }
    }

    /// Split prose into text and code blocks.
    ///
    /// A fence only becomes a code block once both its language line and its
    /// closing fence are present. Until then everything from the opening
    /// fence on stays plain text, so a half-streamed block never renders as
    /// a malformed code block.
    pub fn parse_blocks(&self, text: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut text_start = 0;
        let mut pos = 0;

        while let Some(offset) = text[pos..].find(FENCE) {
            let open = pos + offset;
            let info_start = open + FENCE.len();

            // The language line must be complete
            let Some(newline) = text[info_start..].find('\n') else {
                break;
            };
            let content_start = info_start + newline + 1;

            let Some(close_offset) = text[content_start..].find(FENCE) else {
                break;
            };
            let close = content_start + close_offset;

            if open > text_start {
                blocks.push(Block::Text {
                    text: text[text_start..open].to_string(),
                });
            }

            let language = text[info_start..info_start + newline]
                .split_whitespace()
                .next()
                .unwrap_or(&self.default_language);
            blocks.push(Block::Code {
                language: language.to_string(),
                text: text[content_start..close].to_string(),
            });

            pos = close + FENCE.len();
            // The newline ending the closing fence line belongs to the fence
            if text[pos..].starts_with('\n') {
                pos += 1;
            }
            text_start = pos;
        }

        if text_start < text.len() {
            blocks.push(Block::Text {
                text: text[text_start..].to_string(),
            });
        }

        blocks
    }

    /// Classify every line of a text block
    pub fn parse_lines(&self, text: &str) -> Vec<Line> {
        text.lines().map(|line| self.parse_line(line)).collect()
    }

    fn parse_line(&self, line: &str) -> Line {
        if line.trim().is_empty() {
            return Line::Blank;
        }

        let trimmed = line.trim_start();

        if let Some(caps) = self.heading_regex.captures(trimmed) {
            return Line::Heading {
                level: caps[1].len() as u8,
                spans: parse_inline(&caps[2]),
            };
        }

        if let Some(caps) = self.numbered_regex.captures(trimmed) {
            if let Ok(number) = caps[1].parse() {
                return Line::Numbered {
                    number,
                    spans: parse_inline(&caps[2]),
                };
            }
        }

        if let Some(caps) = self.bullet_regex.captures(trimmed) {
            return Line::Bullet {
                spans: parse_inline(&caps[1]),
            };
        }

        Line::Paragraph {
            spans: parse_inline(line),
        }
    }
}

/// Tokenize one line into inline spans.
///
/// Inline code is resolved first, then bold inside the remaining text.
/// Unmatched delimiters are kept literally.
pub fn parse_inline(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();

    for (is_code, piece) in split_delimited(line, "`") {
        if is_code {
            spans.push(Span::Code(piece.to_string()));
            continue;
        }
        for (is_bold, inner) in split_delimited(piece, "**") {
            if is_bold {
                spans.push(Span::Bold(inner.to_string()));
            } else {
                push_text(&mut spans, inner);
            }
        }
    }

    spans
}

/// Split `text` into alternating plain and delimited pieces.
///
/// Only non-empty pairs count; a lone or empty delimiter pair stays in the
/// plain piece.
fn split_delimited<'a>(text: &'a str, delimiter: &str) -> Vec<(bool, &'a str)> {
    let mut pieces = Vec::new();
    let mut plain_start = 0;
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(delimiter) {
        let open = pos + offset;
        let inner_start = open + delimiter.len();

        match text[inner_start..].find(delimiter) {
            Some(len) if len > 0 => {
                if open > plain_start {
                    pieces.push((false, &text[plain_start..open]));
                }
                pieces.push((true, &text[inner_start..inner_start + len]));
                pos = inner_start + len + delimiter.len();
                plain_start = pos;
            }
            Some(_) => pos = inner_start + delimiter.len(),
            None => break,
        }
    }

    if plain_start < text.len() {
        pieces.push((false, &text[plain_start..]));
    }

    pieces
}

fn push_text(spans: &mut Vec<Span>, text: &str) {
    if let Some(Span::Text(last)) = spans.last_mut() {
        last.push_str(text);
    } else if !text.is_empty() {
        spans.push(Span::Text(text.to_string()));
    }
}
