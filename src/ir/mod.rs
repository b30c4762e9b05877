//! Node-graph intermediate representation.
//!
//! - [`node`] - node kinds and the per-node record
//! - [`graph`] - per-function arena of nodes and blocks
//! - [`optimize`] - rewrite hook run on every new node
//! - [`ssa`] - AST to graph translation

pub mod graph;
pub mod node;
pub mod optimize;
pub mod ssa;

pub use graph::{Block, Graph};
pub use node::{BlockId, Node, NodeId, NodeKind, ProjectionKind};
pub use optimize::{fold_binary, LocalOptimizer, NoOptimizer, Optimizer};
pub use ssa::{GraphConstructor, SsaTranslation};
