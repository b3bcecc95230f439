use super::{StreamObserver, UIError};
use crate::artifacts::{FileTreeNode, StoreSnapshot};
use crate::flow::{FlowEdge, FlowNode};
use crate::session::SessionState;
use crate::streaming::{Block, BlockParser, Line, RenderedSegment, Span};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Mutex;

// ANSI color codes for terminal formatting
struct Colors {
    reset: &'static str,
    dim: &'static str,
    bold: &'static str,
    italic: &'static str,
    green: &'static str,
    yellow: &'static str,
    red: &'static str,
    cyan: &'static str,
}

impl Colors {
    fn new() -> Self {
        Colors {
            reset: "\x1b[0m",
            dim: "\x1b[2m",
            bold: "\x1b[1m",
            italic: "\x1b[3m",
            green: "\x1b[32m",
            yellow: "\x1b[33m",
            red: "\x1b[31m",
            cyan: "\x1b[36m",
        }
    }

    fn plain() -> Self {
        Colors {
            reset: "",
            dim: "",
            bold: "",
            italic: "",
            green: "",
            yellow: "",
            red: "",
            cyan: "",
        }
    }
}

#[derive(Default)]
struct PrintState {
    // Number of segments already written out
    printed_segments: usize,
    // Latest rendered segments, flushed when the session ends
    last_segments: Vec<RenderedSegment>,
    // Last reported content per artifact path, to report only real changes
    reported_artifacts: HashMap<String, String>,
}

/// Prints the transcript to a terminal as segments settle.
///
/// A segment is written once it can no longer change: every segment but the
/// last, or the last one when it is a closed thought. The remainder is
/// written when the session reaches a terminal state.
pub struct TerminalObserver {
    colors: Colors,
    parser: BlockParser,
    writer: Mutex<Box<dyn Write + Send>>,
    state: Mutex<PrintState>,
}

impl TerminalObserver {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()), true)
    }

    pub fn with_writer(writer: Box<dyn Write + Send>, use_colors: bool) -> Self {
        Self {
            colors: if use_colors {
                Colors::new()
            } else {
                Colors::plain()
            },
            parser: BlockParser::default(),
            writer: Mutex::new(writer),
            state: Mutex::new(PrintState::default()),
        }
    }

    fn write(&self, text: &str) -> Result<(), UIError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| UIError::Rejected("terminal writer poisoned".to_string()))?;
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn format_segment(&self, segment: &RenderedSegment) -> String {
        let c = &self.colors;
        let mut out = String::new();
        match segment {
            RenderedSegment::Thought { text, .. } => {
                for line in text.trim().lines() {
                    out.push_str(&format!("{}{}│ {}{}\n", c.dim, c.italic, line, c.reset));
                }
            }
            RenderedSegment::Prose { blocks } => {
                for block in blocks {
                    match block {
                        Block::Text { text } => {
                            for line in self.parser.parse_lines(text) {
                                out.push_str(&self.format_line(&line));
                                out.push('\n');
                            }
                        }
                        Block::Code { language, text } => {
                            out.push_str(&format!("{}```{}{}\n", c.dim, language, c.reset));
                            out.push_str(&format!("{}{}{}", c.cyan, text, c.reset));
                            if !text.ends_with('\n') {
                                out.push('\n');
                            }
                            out.push_str(&format!("{}```{}\n", c.dim, c.reset));
                        }
                    }
                }
            }
        }
        out
    }

    fn format_line(&self, line: &Line) -> String {
        let c = &self.colors;
        match line {
            Line::Heading { spans, .. } => {
                format!("{}{}{}", c.bold, self.format_spans(spans), c.reset)
            }
            Line::Bullet { spans } => format!("  • {}", self.format_spans(spans)),
            Line::Numbered { number, spans } => {
                format!("  {number}. {}", self.format_spans(spans))
            }
            Line::Paragraph { spans } => self.format_spans(spans),
            Line::Blank => String::new(),
        }
    }

    fn format_spans(&self, spans: &[Span]) -> String {
        let c = &self.colors;
        spans
            .iter()
            .map(|span| match span {
                Span::Text(text) => text.clone(),
                Span::Code(text) => format!("{}{}{}", c.cyan, text, c.reset),
                Span::Bold(text) => format!("{}{}{}", c.bold, text, c.reset),
            })
            .collect()
    }
}

impl Default for TerminalObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamObserver for TerminalObserver {
    fn on_rendered_text_update(&self, segments: &[RenderedSegment]) -> Result<(), UIError> {
        let output = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| UIError::Rejected("terminal state poisoned".to_string()))?;

            let settled = match segments.last() {
                Some(RenderedSegment::Thought { closed: true, .. }) => segments.len(),
                Some(_) => segments.len() - 1,
                None => 0,
            };

            let mut output = String::new();
            for segment in segments.iter().take(settled).skip(state.printed_segments) {
                output.push_str(&self.format_segment(segment));
            }
            state.printed_segments = state.printed_segments.max(settled);
            state.last_segments = segments.to_vec();
            output
        };

        if !output.is_empty() {
            self.write(&output)?;
        }
        Ok(())
    }

    fn on_artifacts_changed(&self, artifacts: &StoreSnapshot) -> Result<(), UIError> {
        let c = &self.colors;
        let output = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| UIError::Rejected("terminal state poisoned".to_string()))?;

            let mut output = String::new();
            for artifact in artifacts.iter() {
                if state.reported_artifacts.get(&artifact.path) != Some(&artifact.content) {
                    output.push_str(&format!(
                        "{}✓ {}{} ({} bytes, {})\n",
                        c.green,
                        artifact.path,
                        c.reset,
                        artifact.content.len(),
                        artifact.language
                    ));
                    state
                        .reported_artifacts
                        .insert(artifact.path.clone(), artifact.content.clone());
                }
            }
            output
        };

        if !output.is_empty() {
            self.write(&output)?;
        }
        Ok(())
    }

    fn on_tree_changed(&self, _tree: &FileTreeNode) -> Result<(), UIError> {
        // The tree is printed once at the end by the caller
        Ok(())
    }

    fn on_graph_changed(&self, _nodes: &[FlowNode], _edges: &[FlowEdge]) -> Result<(), UIError> {
        Ok(())
    }

    fn on_session_state(&self, _session_id: u64, state: SessionState) -> Result<(), UIError> {
        if !state.is_terminal() {
            return Ok(());
        }

        let c = &self.colors;
        let output = {
            let mut print_state = self
                .state
                .lock()
                .map_err(|_| UIError::Rejected("terminal state poisoned".to_string()))?;

            let mut output = String::new();
            let segments = std::mem::take(&mut print_state.last_segments);
            for segment in segments.iter().skip(print_state.printed_segments) {
                output.push_str(&self.format_segment(segment));
            }
            print_state.printed_segments = 0;

            match state {
                SessionState::Cancelled => {
                    output.push_str(&format!("{}[cancelled]{}\n", c.yellow, c.reset))
                }
                SessionState::Failed => {
                    output.push_str(&format!("{}[failed]{}\n", c.red, c.reset))
                }
                _ => {}
            }
            output
        };

        self.write(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn prose(text: &str) -> RenderedSegment {
        RenderedSegment::Prose {
            blocks: vec![Block::Text {
                text: text.to_string(),
            }],
        }
    }

    #[test]
    fn test_prints_segments_once_settled() {
        let buffer = SharedBuffer::default();
        let observer = TerminalObserver::with_writer(Box::new(buffer.clone()), false);

        observer
            .on_rendered_text_update(&[RenderedSegment::Thought {
                text: "hmm".to_string(),
                closed: false,
            }])
            .unwrap();
        assert_eq!(buffer.contents(), "");

        let thought = RenderedSegment::Thought {
            text: "hmm".to_string(),
            closed: true,
        };
        observer
            .on_rendered_text_update(&[thought.clone(), prose("Hel")])
            .unwrap();
        assert_eq!(buffer.contents(), "│ hmm\n");

        observer
            .on_rendered_text_update(&[thought, prose("Hello **world**\n- item")])
            .unwrap();
        assert_eq!(buffer.contents(), "│ hmm\n");

        observer
            .on_session_state(1, SessionState::Completed)
            .unwrap();
        assert_eq!(buffer.contents(), "│ hmm\nHello world\n  • item\n");
    }

    #[test]
    fn test_reports_changed_artifacts_only() {
        let buffer = SharedBuffer::default();
        let observer = TerminalObserver::with_writer(Box::new(buffer.clone()), false);
        let first: StoreSnapshot = vec![crate::artifacts::Artifact::new("a.js", "1")].into();
        observer.on_artifacts_changed(&first).unwrap();
        observer.on_artifacts_changed(&first).unwrap();

        assert_eq!(buffer.contents(), "✓ a.js (1 bytes, javascript)\n");
    }

    #[test]
    fn test_reports_rewrite_with_same_length() {
        let buffer = SharedBuffer::default();
        let observer = TerminalObserver::with_writer(Box::new(buffer.clone()), false);
        let first: StoreSnapshot = vec![crate::artifacts::Artifact::new("a.css", "p {}")].into();
        let second: StoreSnapshot = vec![crate::artifacts::Artifact::new("a.css", "b {}")].into();
        observer.on_artifacts_changed(&first).unwrap();
        observer.on_artifacts_changed(&second).unwrap();

        assert_eq!(
            buffer.contents(),
            "✓ a.css (4 bytes, css)\n✓ a.css (4 bytes, css)\n"
        );
    }

    #[test]
    fn test_cancelled_session_is_marked() {
        let buffer = SharedBuffer::default();
        let observer = TerminalObserver::with_writer(Box::new(buffer.clone()), false);
        observer.on_rendered_text_update(&[prose("partial")]).unwrap();
        observer
            .on_session_state(1, SessionState::Cancelled)
            .unwrap();
        assert_eq!(buffer.contents(), "partial\n[cancelled]\n");
    }
}
