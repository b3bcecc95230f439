use crate::artifacts::Artifact;
use crate::settings::LayoutSettings;
use crate::types::{Grounding, Usage};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Identifier of one request/response cycle
pub type TurnId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Edge {edge} references unknown node {missing}")]
    DanglingEdge { edge: String, missing: String },
    #[error("Unknown turn {0}")]
    UnknownTurn(TurnId),
    #[error("Node {0} is not in the graph")]
    MissingNode(String),
    #[error("Failed to serialize payload for {node}: {message}")]
    Payload { node: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowNodeKind {
    User,
    Agent,
    Tool,
    Artifact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Pending,
    Active,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub kind: FlowNodeKind,
    pub label: String,
    pub status: FlowStatus,
    pub position: Position,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub animated: bool,
}

/// Node and edge set. Every edge references nodes that exist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    nodes: IndexMap<String, FlowNode>,
    edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn nodes(&self) -> Vec<FlowNode> {
        self.nodes.values().cloned().collect()
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn add_node(&mut self, node: FlowNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut FlowNode> {
        self.nodes.get_mut(id)
    }

    /// Add an edge, rejecting it when either endpoint is missing
    pub fn add_edge(
        &mut self,
        source_id: &str,
        target_id: &str,
        animated: bool,
    ) -> Result<(), GraphError> {
        let id = format!("edge-{source_id}-{target_id}");
        for endpoint in [source_id, target_id] {
            if !self.nodes.contains_key(endpoint) {
                warn!("Rejecting edge {} to missing node {}", id, endpoint);
                return Err(GraphError::DanglingEdge {
                    edge: id,
                    missing: endpoint.to_string(),
                });
            }
        }

        if self.edges.iter().any(|edge| edge.id == id) {
            return Ok(());
        }
        self.edges.push(FlowEdge {
            id,
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            animated,
        });
        Ok(())
    }
}

/// How a turn ended, as far as the graph is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Complete,
    Error,
}

#[derive(Debug)]
struct TurnNodes {
    /// Vertical offset of the turn's first row
    top: f32,
    user_id: String,
    agent_id: String,
    tool_id: Option<String>,
    /// Artifact node id per path, in first-seen order
    artifacts: IndexMap<String, String>,
    finished: bool,
}

/// Keeps the flow graph in step with the stream, one turn at a time.
///
/// Per turn there is exactly one user node, one agent node, at most one tool
/// node, and one artifact node per distinct path.
pub struct FlowGraphProjector {
    graph: FlowGraph,
    turns: IndexMap<TurnId, TurnNodes>,
    layout: LayoutSettings,
}

impl FlowGraphProjector {
    pub fn new(layout: LayoutSettings) -> Self {
        Self {
            graph: FlowGraph::default(),
            turns: IndexMap::new(),
            layout,
        }
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    /// Create the user and agent nodes for a new turn.
    /// Returns false if the turn was already known.
    pub fn begin_turn(&mut self, turn: TurnId, prompt: &str) -> Result<bool, GraphError> {
        if self.turns.contains_key(&turn) {
            return Ok(false);
        }

        let top = self.next_turn_top();
        let user_id = format!("user-{turn}");
        let agent_id = format!("agent-{turn}");

        self.graph.add_node(FlowNode {
            id: user_id.clone(),
            kind: FlowNodeKind::User,
            label: request_label(prompt),
            status: FlowStatus::Complete,
            position: self.position(top, 0),
            payload: json!({ "prompt": prompt }),
        });
        self.graph.add_node(FlowNode {
            id: agent_id.clone(),
            kind: FlowNodeKind::Agent,
            label: "Agent".to_string(),
            status: FlowStatus::Active,
            position: self.position(top, 1),
            payload: json!({ "turn": turn }),
        });
        self.graph.add_edge(&user_id, &agent_id, true)?;

        debug!("Flow graph: started turn {}", turn);
        self.turns.insert(
            turn,
            TurnNodes {
                top,
                user_id,
                agent_id,
                tool_id: None,
                artifacts: IndexMap::new(),
                finished: false,
            },
        );
        Ok(true)
    }

    /// The first grounding event of a turn creates the tool node,
    /// later ones replace its payload.
    pub fn record_grounding(
        &mut self,
        turn: TurnId,
        grounding: &Grounding,
    ) -> Result<bool, GraphError> {
        let payload = serde_json::to_value(grounding).map_err(|e| GraphError::Payload {
            node: format!("tool-{turn}"),
            message: e.to_string(),
        })?;
        let position = self.position(self.turn(turn)?.top, 2);
        let nodes = self.turns.get_mut(&turn).ok_or(GraphError::UnknownTurn(turn))?;

        if let Some(tool_id) = &nodes.tool_id {
            let node = self
                .graph
                .node_mut(tool_id)
                .ok_or_else(|| GraphError::MissingNode(tool_id.clone()))?;
            if node.payload == payload {
                return Ok(false);
            }
            node.payload = payload;
            return Ok(true);
        }

        let tool_id = format!("tool-{turn}");
        self.graph.add_node(FlowNode {
            id: tool_id.clone(),
            kind: FlowNodeKind::Tool,
            label: "Grounding".to_string(),
            status: FlowStatus::Active,
            position,
            payload,
        });
        self.graph.add_edge(&nodes.agent_id, &tool_id, !nodes.finished)?;
        nodes.tool_id = Some(tool_id);
        Ok(true)
    }

    /// Write the latest token counters to the agent node
    pub fn record_usage(&mut self, turn: TurnId, usage: Usage) -> Result<bool, GraphError> {
        let agent_id = self.turn(turn)?.agent_id.clone();
        let Some(agent) = self.graph.node_mut(&agent_id) else {
            return Err(GraphError::MissingNode(agent_id));
        };

        let usage = json!({
            "input_tokens": usage.input_tokens,
            "output_tokens": usage.output_tokens,
        });
        if agent.payload.get("usage") == Some(&usage) {
            return Ok(false);
        }
        agent.payload["usage"] = usage;
        Ok(true)
    }

    /// Add or refresh the artifact node for `artifact.path` in this turn
    pub fn record_artifact(
        &mut self,
        turn: TurnId,
        artifact: &Artifact,
    ) -> Result<bool, GraphError> {
        let payload = json!({
            "path": artifact.path,
            "language": artifact.language,
            "bytes": artifact.content.len(),
        });
        let nodes = self.turns.get_mut(&turn).ok_or(GraphError::UnknownTurn(turn))?;

        if let Some(node_id) = nodes.artifacts.get(&artifact.path) {
            let node = self
                .graph
                .node_mut(node_id)
                .ok_or_else(|| GraphError::MissingNode(node_id.clone()))?;
            if node.payload == payload {
                return Ok(false);
            }
            node.payload = payload;
            return Ok(true);
        }

        let index = nodes.artifacts.len();
        let node_id = format!("artifact-{turn}-{}", index + 1);
        let position = Position {
            x: self.layout.column_spacing * 3.0,
            y: nodes.top + (index + 1) as f32 * self.layout.row_spacing,
        };

        self.graph.add_node(FlowNode {
            id: node_id.clone(),
            kind: FlowNodeKind::Artifact,
            label: file_label(&artifact.path),
            status: FlowStatus::Complete,
            position,
            payload,
        });
        self.graph.add_edge(&nodes.agent_id, &node_id, !nodes.finished)?;
        nodes.artifacts.insert(artifact.path.clone(), node_id);
        Ok(true)
    }

    /// Settle the turn: the agent (and an active tool) become complete or
    /// failed, and the turn's edges stop animating.
    pub fn finish_turn(
        &mut self,
        turn: TurnId,
        outcome: TurnOutcome,
    ) -> Result<bool, GraphError> {
        let nodes = self.turns.get_mut(&turn).ok_or(GraphError::UnknownTurn(turn))?;
        if nodes.finished {
            return Ok(false);
        }
        nodes.finished = true;

        let status = match outcome {
            TurnOutcome::Complete => FlowStatus::Complete,
            TurnOutcome::Error => FlowStatus::Error,
        };
        for id in std::iter::once(&nodes.agent_id).chain(nodes.tool_id.as_ref()) {
            if let Some(node) = self.graph.node_mut(id) {
                if node.status == FlowStatus::Active {
                    node.status = status;
                }
            }
        }

        let turn_ids: Vec<&String> = std::iter::once(&nodes.user_id)
            .chain(std::iter::once(&nodes.agent_id))
            .collect();
        for edge in &mut self.graph.edges {
            if turn_ids.contains(&&edge.source_id) {
                edge.animated = false;
            }
        }

        debug!("Flow graph: finished turn {} as {:?}", turn, status);
        Ok(true)
    }

    fn turn(&self, turn: TurnId) -> Result<&TurnNodes, GraphError> {
        self.turns.get(&turn).ok_or(GraphError::UnknownTurn(turn))
    }

    /// Turns start at least `turn_spacing` apart and always below the
    /// artifact stack of the turn before
    fn next_turn_top(&self) -> f32 {
        self.turns
            .values()
            .map(|nodes| {
                let stack = (nodes.artifacts.len() + 1) as f32 * self.layout.row_spacing;
                nodes.top + self.layout.turn_spacing.max(stack)
            })
            .fold(0.0, f32::max)
    }

    fn position(&self, top: f32, column: usize) -> Position {
        Position {
            x: column as f32 * self.layout.column_spacing,
            y: top,
        }
    }
}

fn request_label(prompt: &str) -> String {
    const MAX_CHARS: usize = 40;
    let first_line = prompt.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return "Request".to_string();
    }
    if first_line.chars().count() > MAX_CHARS {
        let truncated: String = first_line.chars().take(MAX_CHARS).collect();
        format!("{truncated}…")
    } else {
        first_line.to_string()
    }
}

fn file_label(path: &str) -> String {
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}
