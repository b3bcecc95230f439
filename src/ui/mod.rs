pub mod terminal;

use crate::artifacts::{FileTreeNode, StoreSnapshot};
use crate::flow::{FlowEdge, FlowNode};
use crate::session::SessionState;
use crate::streaming::RenderedSegment;
use thiserror::Error;

pub use terminal::TerminalObserver;

#[derive(Error, Debug)]
pub enum UIError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Update rejected: {0}")]
    Rejected(String),
}

/// Presentation layers that follow a streaming session.
///
/// Each callback fires at most once per processed chunk and always carries the
/// complete current state, so delivering the same update twice is harmless.
pub trait StreamObserver: Send + Sync {
    /// The transcript segments of the current buffer
    fn on_rendered_text_update(&self, segments: &[RenderedSegment]) -> Result<(), UIError>;

    /// The artifact store changed
    fn on_artifacts_changed(&self, artifacts: &StoreSnapshot) -> Result<(), UIError>;

    /// The project tree was rebuilt
    fn on_tree_changed(&self, tree: &FileTreeNode) -> Result<(), UIError>;

    /// The flow graph changed
    fn on_graph_changed(&self, nodes: &[FlowNode], edges: &[FlowEdge]) -> Result<(), UIError>;

    /// A session changed state
    fn on_session_state(&self, _session_id: u64, _state: SessionState) -> Result<(), UIError> {
        Ok(())
    }
}

/// Observer that ignores every update
pub struct NullObserver;

impl StreamObserver for NullObserver {
    fn on_rendered_text_update(&self, _segments: &[RenderedSegment]) -> Result<(), UIError> {
        Ok(())
    }

    fn on_artifacts_changed(&self, _artifacts: &StoreSnapshot) -> Result<(), UIError> {
        Ok(())
    }

    fn on_tree_changed(&self, _tree: &FileTreeNode) -> Result<(), UIError> {
        Ok(())
    }

    fn on_graph_changed(&self, _nodes: &[FlowNode], _edges: &[FlowEdge]) -> Result<(), UIError> {
        Ok(())
    }
}
