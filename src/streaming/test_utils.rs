//! Common test utilities for the streaming pipeline
//!
//! Shared helpers used by the segment and block tests as well as the
//! coordinator integration tests.
use crate::artifacts::{Artifact, FileTreeNode, StoreSnapshot};
use crate::flow::{FlowEdge, FlowNode};
use crate::session::SessionState;
use crate::streaming::RenderedSegment;
use crate::ui::{StreamObserver, UIError};
use std::sync::{Arc, Mutex};

/// Everything an observer was told, in arrival order per callback
#[derive(Default)]
struct Observed {
    rendered: Vec<Vec<RenderedSegment>>,
    artifacts: Vec<Vec<Artifact>>,
    trees: Vec<FileTreeNode>,
    graphs: Vec<(Vec<FlowNode>, Vec<FlowEdge>)>,
    states: Vec<(u64, SessionState)>,
}

/// A test observer that records every update it receives
#[derive(Clone, Default)]
pub struct RecordingObserver {
    observed: Arc<Mutex<Observed>>,
    // Callback name that should fail, to test error isolation
    fail_on: Option<&'static str>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// An observer whose named callback always returns an error
    pub fn failing_on(callback: &'static str) -> Self {
        Self {
            fail_on: Some(callback),
            ..Self::default()
        }
    }

    pub fn rendered_updates(&self) -> Vec<Vec<RenderedSegment>> {
        self.observed.lock().unwrap().rendered.clone()
    }

    pub fn artifact_updates(&self) -> Vec<Vec<Artifact>> {
        self.observed.lock().unwrap().artifacts.clone()
    }

    pub fn tree_updates(&self) -> Vec<FileTreeNode> {
        self.observed.lock().unwrap().trees.clone()
    }

    pub fn graph_updates(&self) -> Vec<(Vec<FlowNode>, Vec<FlowEdge>)> {
        self.observed.lock().unwrap().graphs.clone()
    }

    pub fn states(&self) -> Vec<(u64, SessionState)> {
        self.observed.lock().unwrap().states.clone()
    }

    fn check(&self, callback: &str) -> Result<(), UIError> {
        if self.fail_on == Some(callback) {
            return Err(UIError::Rejected(format!("{callback} failed on purpose")));
        }
        Ok(())
    }
}

impl StreamObserver for RecordingObserver {
    fn on_rendered_text_update(&self, segments: &[RenderedSegment]) -> Result<(), UIError> {
        self.observed.lock().unwrap().rendered.push(segments.to_vec());
        self.check("rendered")
    }

    fn on_artifacts_changed(&self, artifacts: &StoreSnapshot) -> Result<(), UIError> {
        self.observed
            .lock()
            .unwrap()
            .artifacts
            .push(artifacts.to_vec());
        self.check("artifacts")
    }

    fn on_tree_changed(&self, tree: &FileTreeNode) -> Result<(), UIError> {
        self.observed.lock().unwrap().trees.push(tree.clone());
        self.check("tree")
    }

    fn on_graph_changed(&self, nodes: &[FlowNode], edges: &[FlowEdge]) -> Result<(), UIError> {
        self.observed
            .lock()
            .unwrap()
            .graphs
            .push((nodes.to_vec(), edges.to_vec()));
        self.check("graph")
    }

    fn on_session_state(&self, session_id: u64, state: SessionState) -> Result<(), UIError> {
        self.observed
            .lock()
            .unwrap()
            .states
            .push((session_id, state));
        self.check("state")
    }
}

/// Helper function to split text into chunks of `chunk_size` characters
pub fn chunk_str(s: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut chunks = Vec::new();

    for chunk in chars.chunks(chunk_size) {
        chunks.push(chunk.iter().collect::<String>());
    }

    chunks
}

/// Every prefix of `s` that ends on a chunk boundary
pub fn growing_prefixes(s: &str, chunk_size: usize) -> Vec<String> {
    let mut buffer = String::new();
    chunk_str(s, chunk_size)
        .into_iter()
        .map(|chunk| {
            buffer.push_str(&chunk);
            buffer.clone()
        })
        .collect()
}
