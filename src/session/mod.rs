//! Streaming session lifecycle and the coordinator that drives it

mod coordinator;

pub use coordinator::{ChunkOutcome, CoordinatorError, SessionHandle, StreamCoordinator};

use crate::artifacts::ArtifactExtractor;
use crate::types::Usage;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    /// No further buffer mutation is allowed in a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }
}

/// One generation turn: its append-only buffer and where it is in its lifecycle
#[derive(Debug)]
pub struct StreamSession {
    id: u64,
    prompt: String,
    buffer: String,
    state: SessionState,
    cancel: CancellationToken,
    extractor: ArtifactExtractor,
    usage: Option<Usage>,
    error: Option<String>,
    chunks_processed: usize,
}

impl StreamSession {
    fn new(id: u64, prompt: String) -> Self {
        Self {
            id,
            prompt,
            buffer: String::new(),
            state: SessionState::Streaming,
            cancel: CancellationToken::new(),
            extractor: ArtifactExtractor::new(),
            usage: None,
            error: None,
            chunks_processed: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Everything received so far
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Latest token counters reported for this session
    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Transport error message, if the session failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn chunks_processed(&self) -> usize {
        self.chunks_processed
    }
}
