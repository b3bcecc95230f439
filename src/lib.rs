//! Incremental extraction and projection for streamed model output.
//!
//! Text arrives chunk by chunk. Each chunk is folded into the session buffer,
//! which is split into thought and prose segments for the transcript while
//! `<file path="...">` declarations are extracted into an artifact store. The
//! store feeds a project tree, and every turn is projected onto a flow graph.

pub mod artifacts;
pub mod cli;
pub mod flow;
pub mod logging;
pub mod recording;
pub mod session;
pub mod settings;
pub mod streaming;
pub mod types;
pub mod ui;


pub use artifacts::{Artifact, ArtifactExtractor, ArtifactStore, FileTreeNode};
pub use flow::{FlowEdge, FlowGraph, FlowGraphProjector, FlowNode};
pub use session::{SessionState, StreamCoordinator};
pub use settings::EngineSettings;
pub use types::{ChunkMetadata, StreamEvent};
