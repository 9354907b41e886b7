//! # Dag
//!
//! A directed graph tuned for dependency ordering. Vertices live in
//! id-addressed slots owned by the graph; everything else refers to them
//! through [`VertexId`], so index-holding structures never outlive or
//! alias the vertex storage.
//!
//! An edge `(a, b)` records that `a` depends on `b`: `a` must run after
//! `b`. Traversal helpers follow that orientation, so
//! [`Graph::ancestors`] walks dependencies and [`Graph::up_edges`]
//! lists dependants.
//!
//! [`walk::walk`] executes a graph rank by rank, running vertices of the
//! same rank in parallel and skipping the dependants of failed vertices.

pub mod error;
pub mod graph;
pub mod walk;

pub use error::{GraphError, Result};
pub use graph::{Graph, VertexId};
pub use walk::{WalkOutcome, WalkSignals, WalkStatus, walk};
