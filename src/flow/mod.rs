//! Node-and-edge view of each turn: request, agent, tool use and artifacts

mod graph;

pub use graph::{
    FlowEdge, FlowGraph, FlowGraphProjector, FlowNode, FlowNodeKind, FlowStatus, GraphError,
    Position, TurnId, TurnOutcome,
};
