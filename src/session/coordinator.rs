use super::{SessionState, StreamSession};
use crate::artifacts::{build_tree, ArtifactStore, FileTreeNode};
use crate::flow::{FlowGraph, FlowGraphProjector, GraphError, TurnOutcome};
use crate::settings::EngineSettings;
use crate::streaming::{render_segments, split_segments, BlockParser, RenderedSegment};
use crate::types::{ChunkMetadata, StreamEvent};
use crate::ui::{StreamObserver, UIError};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Session {active} is still streaming")]
    SessionActive { active: u64 },
    #[error("No session has been started")]
    NoActiveSession,
    #[error("Session is already {state:?}")]
    SessionTerminal { state: SessionState },
    #[error("Transport failed: {0}")]
    Transport(String),
}

/// What happened to an inbound chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Processed { new_artifacts: usize },
    /// The session was cancelled; the chunk was dropped
    Cancelled,
}

/// Handle given to the caller that started a session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: u64,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Request cooperative cancellation. Takes effect before the next chunk.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Owns one streaming session at a time and keeps every derived view in step
/// with its buffer.
///
/// Chunks are applied strictly in order: buffer, segments, artifacts, store,
/// tree, graph, then observer callbacks. Starting a session while another one
/// is streaming is rejected with [`CoordinatorError::SessionActive`]; nothing
/// is queued and the running session is not touched.
pub struct StreamCoordinator {
    settings: EngineSettings,
    parser: BlockParser,
    observer: Arc<dyn StreamObserver>,
    store: ArtifactStore,
    projector: FlowGraphProjector,
    tree: FileTreeNode,
    segments: Vec<RenderedSegment>,
    session: Option<StreamSession>,
    next_session_id: u64,
}

impl StreamCoordinator {
    pub fn new(settings: EngineSettings, observer: Arc<dyn StreamObserver>) -> Self {
        Self {
            parser: BlockParser::new(settings.default_code_language.clone()),
            projector: FlowGraphProjector::new(settings.layout),
            tree: build_tree(&[]),
            settings,
            observer,
            store: ArtifactStore::new(),
            segments: Vec::new(),
            session: None,
            next_session_id: 1,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn graph(&self) -> &FlowGraph {
        self.projector.graph()
    }

    pub fn tree(&self) -> &FileTreeNode {
        &self.tree
    }

    /// Transcript segments as last delivered to the observer
    pub fn rendered_segments(&self) -> &[RenderedSegment] {
        &self.segments
    }

    /// The current or most recent session
    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, StreamSession::state)
    }

    /// Begin a new turn. Fails if a session is still streaming.
    pub fn start_session(&mut self, prompt: &str) -> Result<SessionHandle, CoordinatorError> {
        self.apply_pending_cancel();
        if let Some(session) = &self.session {
            if session.state == SessionState::Streaming {
                return Err(CoordinatorError::SessionActive { active: session.id });
            }
        }

        let id = self.next_session_id;
        self.next_session_id += 1;

        let session = StreamSession::new(id, prompt.to_string());
        let handle = SessionHandle {
            id,
            cancel: session.cancel.clone(),
        };
        self.session = Some(session);
        self.segments.clear();

        info!("Session {} started", id);
        match self.projector.begin_turn(id, prompt) {
            Ok(true) => self.notify_graph(),
            Ok(false) => {}
            Err(e) => warn!("Flow graph rejected turn {}: {}", id, e),
        }
        self.notify("session state", |o| {
            o.on_session_state(id, SessionState::Streaming)
        });

        Ok(handle)
    }

    /// Apply one inbound chunk
    pub fn on_chunk(
        &mut self,
        text: &str,
        metadata: &ChunkMetadata,
    ) -> Result<ChunkOutcome, CoordinatorError> {
        self.active_session()?;
        if self.apply_pending_cancel().is_some() {
            debug!("Session cancelled, dropping chunk");
            return Ok(ChunkOutcome::Cancelled);
        }

        let session = self.active_session()?;
        session.buffer.push_str(text);
        session.chunks_processed += 1;
        let id = session.id;
        let settled = session.extractor.scan(&session.buffer);
        if let Some(usage) = metadata.usage {
            session.usage = Some(usage);
        }
        debug!(
            "Session {}: chunk {} ({} bytes, {} buffered, {} artifacts settled)",
            id,
            session.chunks_processed,
            text.len(),
            session.buffer.len(),
            settled.len()
        );

        self.update_rendered_text(false);

        let mut store_changed = false;
        let mut graph_changed = false;
        for artifact in &settled {
            graph_changed |= applied(self.projector.record_artifact(id, artifact));
            store_changed |= self.store.upsert(artifact.clone()).changed();
        }
        if let Some(grounding) = &metadata.grounding {
            graph_changed |= applied(self.projector.record_grounding(id, grounding));
        }
        if let Some(usage) = metadata.usage {
            graph_changed |= applied(self.projector.record_usage(id, usage));
        }

        if store_changed {
            self.notify_store();
        }
        if graph_changed {
            self.notify_graph();
        }

        Ok(ChunkOutcome::Processed {
            new_artifacts: settled.len(),
        })
    }

    /// The source finished normally. A cancellation requested before this
    /// point wins.
    pub fn on_complete(&mut self) -> Result<SessionState, CoordinatorError> {
        self.active_session()?;
        if let Some(state) = self.apply_pending_cancel() {
            return Ok(state);
        }
        Ok(self.finish(SessionState::Completed))
    }

    /// The transport failed. Partial buffer and artifacts are kept.
    /// A cancellation requested before this point wins.
    pub fn on_error(&mut self, message: &str) -> Result<SessionState, CoordinatorError> {
        self.active_session()?;
        if let Some(state) = self.apply_pending_cancel() {
            debug!("Ignoring transport error after cancellation: {}", message);
            return Ok(state);
        }
        let session = self.active_session()?;
        session.error = Some(message.to_string());
        warn!("Session {} failed: {}", session.id, message);
        Ok(self.finish(SessionState::Failed))
    }

    /// Cancel the streaming session. Nothing computed so far is rolled back.
    /// Cancelling a session that already ended is a no-op.
    pub fn cancel(&mut self) -> Result<SessionState, CoordinatorError> {
        let session = self
            .session
            .as_ref()
            .ok_or(CoordinatorError::NoActiveSession)?;
        if session.state.is_terminal() {
            return Ok(session.state);
        }
        session.cancel.cancel();
        Ok(self.finish(SessionState::Cancelled))
    }

    /// Remove an artifact on explicit user request
    pub fn remove_artifact(&mut self, path: &str) -> bool {
        if self.store.remove(path).is_none() {
            return false;
        }
        info!("Removed artifact {}", path);
        self.notify_store();
        true
    }

    /// Consume a stream of events for the current session until it ends.
    ///
    /// The cancellation token is checked between events and while waiting
    /// for the next one. A source that ends without a terminal event counts as
    /// completion. Transport failures are returned as errors after the session
    /// has moved to `Failed`.
    pub async fn drive<S>(&mut self, events: S) -> Result<SessionState, CoordinatorError>
    where
        S: Stream<Item = StreamEvent>,
    {
        let token = self
            .active_session()?
            .cancel
            .clone();
        let mut events = std::pin::pin!(events);

        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => return self.cancel(),
                event = events.next() => event,
            };

            match event {
                Some(StreamEvent::Chunk { text, metadata }) => {
                    if self.on_chunk(&text, &metadata)? == ChunkOutcome::Cancelled {
                        return Ok(SessionState::Cancelled);
                    }
                }
                Some(StreamEvent::Complete) | None => return self.on_complete(),
                Some(StreamEvent::Failed(message)) => {
                    if self.on_error(&message)? == SessionState::Cancelled {
                        return Ok(SessionState::Cancelled);
                    }
                    return Err(CoordinatorError::Transport(message));
                }
            }
        }
    }

    fn active_session(&mut self) -> Result<&mut StreamSession, CoordinatorError> {
        let session = self
            .session
            .as_mut()
            .ok_or(CoordinatorError::NoActiveSession)?;
        if session.state.is_terminal() {
            return Err(CoordinatorError::SessionTerminal {
                state: session.state,
            });
        }
        Ok(session)
    }

    /// Settle a cancellation requested through a [`SessionHandle`] since the
    /// last event. Returns the terminal state if one was applied.
    fn apply_pending_cancel(&mut self) -> Option<SessionState> {
        let session = self.session.as_ref()?;
        if session.state.is_terminal() || !session.cancel.is_cancelled() {
            return None;
        }
        Some(self.finish(SessionState::Cancelled))
    }

    fn finish(&mut self, state: SessionState) -> SessionState {
        let Some(session) = self.session.as_mut() else {
            return state;
        };
        if session.state.is_terminal() {
            return session.state;
        }
        session.state = state;
        let id = session.id;
        info!(
            "Session {} {:?} after {} chunks",
            id, state, session.chunks_processed
        );

        self.update_rendered_text(true);

        let outcome = match state {
            SessionState::Completed => TurnOutcome::Complete,
            _ => TurnOutcome::Error,
        };
        if applied(self.projector.finish_turn(id, outcome)) {
            self.notify_graph();
        }
        self.notify("session state", |o| o.on_session_state(id, state));
        state
    }

    fn update_rendered_text(&mut self, finished: bool) {
        let Some(session) = &self.session else {
            return;
        };
        let segments = split_segments(&session.buffer, finished);
        let rendered = render_segments(
            &segments,
            &self.parser,
            self.settings.collapse_artifacts_in_transcript,
        );
        if rendered != self.segments {
            self.segments = rendered;
            let segments = &self.segments;
            self.notify("rendered text", |o| o.on_rendered_text_update(segments));
        }
    }

    fn notify_store(&mut self) {
        let snapshot = self.store.snapshot();
        self.notify("artifacts", |o| o.on_artifacts_changed(&snapshot));

        let tree = build_tree(&snapshot);
        if tree != self.tree {
            self.tree = tree;
            let tree = &self.tree;
            self.notify("tree", |o| o.on_tree_changed(tree));
        }
    }

    fn notify_graph(&self) {
        let graph = self.projector.graph();
        let nodes = graph.nodes();
        self.notify("graph", |o| o.on_graph_changed(&nodes, graph.edges()));
    }

    fn notify(&self, what: &str, f: impl FnOnce(&dyn StreamObserver) -> Result<(), UIError>) {
        if let Err(e) = f(self.observer.as_ref()) {
            warn!("Observer failed to apply {} update: {}", what, e);
        }
    }
}

/// Whether a graph update changed anything. Rejected updates are logged and
/// leave the graph as it was.
fn applied(result: Result<bool, GraphError>) -> bool {
    match result {
        Ok(changed) => changed,
        Err(e) => {
            warn!("Flow graph update rejected: {}", e);
            false
        }
    }
}
