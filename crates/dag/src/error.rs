//! Graph validation errors.

use thiserror::Error;

/// Errors raised by graph validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// The edge set contains at least one cycle
    #[error("dependency cycle detected involving: {}", .members.join(", "))]
    Cycle {
        /// Renderings of the vertices trapped in the cycle
        members: Vec<String>,
    },

    /// After root insertion the graph must converge on a single sink
    #[error("graph has {count} sinks, expected a single root: {}", .members.join(", "))]
    MultipleSinks {
        /// How many sinks were found
        count: usize,
        /// Renderings of the sink vertices
        members: Vec<String>,
    },

    /// A vertex id that is not present in the graph was used
    #[error("unknown vertex id {0}")]
    UnknownVertex(usize),
}

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
