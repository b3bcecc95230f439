//! Extraction of `<file path="...">...</file>` declarations from stream text.
//!
//! Only complete declarations produce artifacts. An opening tag that is still
//! being written, or whose closing tag has not arrived, is left pending and
//! picked up again on a later call once more text is available.

use super::Artifact;
use tracing::{debug, trace};

const OPEN_PREFIX: &str = "<file";
const CLOSE_TAG: &str = "</file>";

/// A complete declaration located in a text
#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    start: usize,
    end: usize,
    path: String,
    content: String,
}

/// A declaration that has started but is not complete yet
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    start: usize,
    /// Known once the opening tag itself is complete
    path: Option<String>,
}

enum OpenTag {
    Complete { path: String, len: usize },
    Incomplete,
    Invalid,
}

/// Incremental extractor that never re-emits a settled declaration.
///
/// The cursor sits right after the last `</file>` that produced an artifact,
/// so each call only looks at text that could still hold new declarations.
#[derive(Debug, Default)]
pub struct ArtifactExtractor {
    cursor: usize,
}

impl ArtifactExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset up to which the buffer has been settled
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Return the declarations completed since the previous call
    pub fn scan(&mut self, buffer: &str) -> Vec<Artifact> {
        let Some(unsettled) = buffer.get(self.cursor..) else {
            // The buffer is append-only; a shorter buffer means a new stream
            debug!(
                "Extractor cursor {} outside buffer of length {}, rescanning",
                self.cursor,
                buffer.len()
            );
            self.cursor = 0;
            return self.scan(buffer);
        };

        let (declarations, _) = scan_declarations(unsettled);
        if let Some(last) = declarations.last() {
            self.cursor += last.end;
        }

        declarations
            .into_iter()
            .map(|declaration| {
                trace!("Settled artifact declaration for {}", declaration.path);
                Artifact::new(declaration.path, declaration.content)
            })
            .collect()
    }
}

/// Extract every complete declaration in `buffer`, in order of appearance
pub fn extract_all(buffer: &str) -> Vec<Artifact> {
    scan_declarations(buffer)
        .0
        .into_iter()
        .map(|declaration| Artifact::new(declaration.path, declaration.content))
        .collect()
}

/// Replace file declarations in transcript text with short placeholders.
///
/// A declaration whose body is still streaming becomes `[writing file: PATH…]`
/// and an opening tag that is itself still incomplete is withheld.
pub fn collapse_declarations(text: &str) -> String {
    let (declarations, pending) = scan_declarations(text);
    if declarations.is_empty() && pending.is_none() {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut pos = 0;
    for declaration in &declarations {
        result.push_str(&text[pos..declaration.start]);
        result.push_str(&format!("[file: {}]", declaration.path));
        pos = declaration.end;
    }

    match pending {
        Some(Pending { start, path }) => {
            result.push_str(&text[pos..start]);
            if let Some(path) = path {
                result.push_str(&format!("[writing file: {path}…]"));
            }
        }
        None => result.push_str(&text[pos..]),
    }

    result
}

fn scan_declarations(text: &str) -> (Vec<Declaration>, Option<Pending>) {
    let mut declarations = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(OPEN_PREFIX) {
        let start = pos + offset;

        let (path, tag_len) = match parse_open_tag(&text[start..]) {
            OpenTag::Complete { path, len } => (path, len),
            OpenTag::Incomplete => return (declarations, Some(Pending { start, path: None })),
            OpenTag::Invalid => {
                pos = start + 1;
                continue;
            }
        };

        let body_start = start + tag_len;
        let Some(body_len) = text[body_start..].find(CLOSE_TAG) else {
            return (
                declarations,
                Some(Pending {
                    start,
                    path: Some(path),
                }),
            );
        };

        let body = &text[body_start..body_start + body_len];
        let content = body.strip_prefix('\n').unwrap_or(body);
        let end = body_start + body_len + CLOSE_TAG.len();

        declarations.push(Declaration {
            start,
            end,
            path,
            content: content.to_string(),
        });
        pos = end;
    }

    (declarations, None)
}

/// Parse an opening tag at the start of `text`, which begins with `<file`.
///
/// Attribute values may use single or double quotes. The tag is only
/// invalid when no amount of further input could make it valid.
fn parse_open_tag(text: &str) -> OpenTag {
    let bytes = text.as_bytes();
    let mut pos = OPEN_PREFIX.len();

    match bytes.get(pos) {
        None => return OpenTag::Incomplete,
        Some(b) if b.is_ascii_whitespace() => {}
        Some(_) => return OpenTag::Invalid,
    }

    let mut path: Option<String> = None;
    loop {
        while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
        match bytes.get(pos) {
            None => return OpenTag::Incomplete,
            Some(b'>') => {
                return match path {
                    Some(path) if !path.is_empty() => OpenTag::Complete { path, len: pos + 1 },
                    _ => OpenTag::Invalid,
                };
            }
            Some(_) => {}
        }

        let name_start = pos;
        while bytes
            .get(pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
        {
            pos += 1;
        }
        if pos == bytes.len() {
            return OpenTag::Incomplete;
        }
        if pos == name_start {
            return OpenTag::Invalid;
        }
        let name = &text[name_start..pos];

        while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
        match bytes.get(pos) {
            None => return OpenTag::Incomplete,
            Some(b'=') => pos += 1,
            Some(_) => return OpenTag::Invalid,
        }
        while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }

        let quote = match bytes.get(pos) {
            None => return OpenTag::Incomplete,
            Some(&q) if q == b'"' || q == b'\'' => q as char,
            Some(_) => return OpenTag::Invalid,
        };
        let value_start = pos + 1;
        let value_end = match text[value_start..].find([quote, '\n']) {
            None => return OpenTag::Incomplete,
            Some(len) if text[value_start + len..].starts_with(quote) => value_start + len,
            // Attribute values never span lines
            Some(_) => return OpenTag::Invalid,
        };

        if name == "path" {
            path = Some(text[value_start..value_end].to_string());
        }
        pos = value_end + 1;
    }
}
