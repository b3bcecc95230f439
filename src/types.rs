use serde::{Deserialize, Serialize};

/// Token counters reported by the backend for the current turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the input (prompt)
    pub input_tokens: u32,
    /// Number of tokens in the output (completion)
    pub output_tokens: u32,
}

impl Usage {
    pub fn zero() -> Self {
        Usage {
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

/// A single source the backend consulted while grounding its answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// Grounding / tool-use information attached to a chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grounding {
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub sources: Vec<GroundingSource>,
}

/// Structured data that may accompany a text increment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding: Option<Grounding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChunkMetadata {
    pub fn is_empty(&self) -> bool {
        self.grounding.is_none() && self.usage.is_none()
    }
}

/// Events delivered by the stream source, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A text increment with optional metadata
    Chunk {
        text: String,
        metadata: ChunkMetadata,
    },
    /// The backend finished the generation normally
    Complete,
    /// The transport failed; the message is surfaced verbatim
    Failed(String),
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        StreamEvent::Chunk {
            text: text.into(),
            metadata: ChunkMetadata::default(),
        }
    }
}
