// This module implements the per-function node graph. Nodes and blocks live in two arenas
// (plain vectors) and refer to each other by index, which keeps identity comparisons cheap
// (index equality) and lets cyclic structures such as loop phis exist without reference
// counting. A block records its control predecessors and the nodes it owns in creation
// order; the graph additionally records which block each control node transfers to so the
// code generator can walk edges forwards. The SSA builder mostly appends: phi operands are
// filled in at sealing time, return nodes are linked to the end block as they are created,
// and a phi that turns out trivial is detached after its uses are redirected.

//! Arena-backed IR graph for one function.

use super::node::{BlockId, Node, NodeId, NodeKind, ProjectionKind};
use hashbrown::HashMap;
use std::fmt;

/// A control-flow region.
#[derive(Debug, Clone, Default)]
pub struct Block {
    predecessors: Vec<NodeId>,
    nodes: Vec<NodeId>,
}

impl Block {
    /// Control nodes transferring into this block, in edge order.
    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    /// Nodes owned by this block, in creation order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

/// The computation of one function.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    nodes: Vec<Node>,
    blocks: Vec<Block>,
    start_block: BlockId,
    end_block: BlockId,
    /// Control node -> block it transfers to.
    targets: HashMap<NodeId, BlockId>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        let mut graph = Self {
            name: name.into(),
            nodes: Vec::new(),
            blocks: Vec::new(),
            start_block: BlockId(0),
            end_block: BlockId(0),
            targets: HashMap::new(),
        };
        graph.start_block = graph.add_block();
        graph.end_block = graph.add_block();
        graph
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_block(&self) -> BlockId {
        self.start_block
    }

    pub fn end_block(&self) -> BlockId {
        self.end_block
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::default());
        id
    }

    /// Insert a node into the arena and append it to its block.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.blocks[node.block.index()].nodes.push(id);
        self.nodes.push(node);
        id
    }

    /// Remove a node nothing uses any more from its block's node list.
    ///
    /// The arena slot stays allocated so ids remain stable.
    pub fn detach(&mut self, id: NodeId) {
        let block = self.nodes[id.index()].block;
        let nodes = &mut self.blocks[block.index()].nodes;
        if let Some(position) = nodes.iter().rposition(|&n| n == id) {
            nodes.remove(position);
        }
    }

    /// Link a control node as the next predecessor of `block`.
    pub fn add_predecessor(&mut self, block: BlockId, control: NodeId) {
        self.blocks[block.index()].predecessors.push(control);
        self.targets.insert(control, block);
    }

    pub(crate) fn append_operand(&mut self, node: NodeId, operand: NodeId) {
        self.nodes[node.index()].operands.push(operand);
    }

    /// Point every use of `old` by a node still in some block at `new`.
    /// Returns the nodes that changed.
    pub(crate) fn replace_uses(&mut self, old: NodeId, new: NodeId) -> Vec<NodeId> {
        let mut users = Vec::new();
        for block in &self.blocks {
            for &id in &block.nodes {
                if id == old {
                    continue;
                }
                let mut changed = false;
                for operand in &mut self.nodes[id.index()].operands {
                    if *operand == old {
                        *operand = new;
                        changed = true;
                    }
                }
                if changed {
                    users.push(id);
                }
            }
        }
        users
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn operands(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].operands
    }

    pub fn block_of(&self, id: NodeId) -> BlockId {
        self.nodes[id.index()].block
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn predecessors(&self, block: BlockId) -> &[NodeId] {
        &self.blocks[block.index()].predecessors
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Block a control node transfers to, if it has been linked.
    pub fn target(&self, control: NodeId) -> Option<BlockId> {
        self.targets.get(&control).copied()
    }

    /// The node that ends `block`, if any.
    pub fn terminator(&self, block: BlockId) -> Option<NodeId> {
        self.blocks[block.index()]
            .nodes
            .iter()
            .rev()
            .copied()
            .find(|&n| self.kind(n).is_terminator())
    }

    /// Skip a `Result` projection to the node that actually holds the value.
    pub fn value_source(&self, id: NodeId) -> NodeId {
        match self.kind(id) {
            NodeKind::Projection(ProjectionKind::Result) => self.operands(id)[0],
            _ => id,
        }
    }

    /// Projection of `source` with the given kind, if one was created.
    pub fn projection(&self, source: NodeId, kind: ProjectionKind) -> Option<NodeId> {
        let block = self.block_of(source);
        self.blocks[block.index()].nodes.iter().copied().find(|&n| {
            *self.kind(n) == NodeKind::Projection(kind) && self.operands(n)[0] == source
        })
    }

    /// Value (not side-effect) phis of `block`.
    pub fn value_phis(&self, block: BlockId) -> impl Iterator<Item = NodeId> + '_ {
        self.blocks[block.index()]
            .nodes
            .iter()
            .copied()
            .filter(|&n| *self.kind(n) == NodeKind::Phi { side_effect: false })
    }

    pub fn phi_count(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| b.nodes.iter())
            .filter(|&&n| matches!(self.kind(n), NodeKind::Phi { .. }))
            .count()
    }

    /// Whether control can reach `block`. Blocks created for code after a
    /// `return`/`break`/`continue` never receive predecessors.
    pub fn is_reachable(&self, block: BlockId) -> bool {
        block == self.start_block || !self.blocks[block.index()].predecessors.is_empty()
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph {} {{", self.name)?;
        for block in self.block_ids() {
            let data = self.block(block);
            write!(f, "  {block}:")?;
            if !data.predecessors.is_empty() {
                write!(f, " preds(")?;
                for (i, pred) in data.predecessors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{pred}")?;
                }
                write!(f, ")")?;
            }
            writeln!(f)?;
            for &node in &data.nodes {
                write!(f, "    {node} = {}", self.kind(node))?;
                for operand in self.operands(node) {
                    write!(f, " {operand}")?;
                }
                if let Some(target) = self.target(node) {
                    write!(f, " -> {target}")?;
                }
                writeln!(f)?;
            }
        }
        writeln!(f, "}}")
    }
}
