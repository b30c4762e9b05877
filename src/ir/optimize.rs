// This module holds the optimizer hook the SSA builder runs on every node it creates. The
// hook sees a node right after it was inserted, before anything uses it, and returns the node
// callers should use instead: the node itself, an existing equivalent node, or a simplified
// replacement. LocalOptimizer folds constants with 32-bit wraparound, canonicalizes operand
// order, applies a handful of algebraic identities and numbers pure values per block so
// duplicates collapse. Div and Mod are left untouched because their result hangs off the
// side-effect chain. All state lives in the optimizer instance, which is owned by exactly one
// graph construction.

//! Per-node rewrite hook and the default local optimizer.

use super::graph::Graph;
use super::node::{BlockId, Node, NodeId, NodeKind};
use hashbrown::HashMap;
use log::trace;

/// Rewrite step applied to each newly created node.
///
/// `node` has just been inserted into `graph` and has no users. Implementations
/// must be idempotent: transforming a returned node again yields that node.
pub trait Optimizer {
    fn transform(&mut self, graph: &mut Graph, node: NodeId) -> NodeId;
}

/// Leaves every node as constructed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOptimizer;

impl Optimizer for NoOptimizer {
    fn transform(&mut self, _graph: &mut Graph, node: NodeId) -> NodeId {
        node
    }
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn transform(&mut self, graph: &mut Graph, node: NodeId) -> NodeId {
        (**self).transform(graph, node)
    }
}

type ValueKey = (NodeKind, BlockId, Vec<NodeId>);

/// Constant folding, algebraic simplification and local value numbering.
#[derive(Debug, Default)]
pub struct LocalOptimizer {
    values: HashMap<ValueKey, NodeId>,
}

impl LocalOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn number(&mut self, graph: &mut Graph, node: NodeId) -> NodeId {
        let data = graph.node(node);
        let key = (data.kind.clone(), data.block, data.operands.clone());
        match self.values.get(&key) {
            Some(&existing) if existing != node => {
                trace!("{node} deduplicated to {existing}");
                graph.detach(node);
                existing
            }
            Some(_) => node,
            None => {
                self.values.insert(key, node);
                node
            }
        }
    }

    fn constant(&mut self, graph: &mut Graph, kind: NodeKind) -> NodeId {
        let start = graph.start_block();
        let node = graph.add_node(Node::new(kind, start, Vec::new()));
        self.number(graph, node)
    }

    /// Replace `node` by a rebuilt node with different kind/operands.
    fn rebuild(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        kind: NodeKind,
        operands: Vec<NodeId>,
    ) -> NodeId {
        let block = graph.block_of(node);
        graph.detach(node);
        let rebuilt = graph.add_node(Node::new(kind, block, operands));
        self.transform(graph, rebuilt)
    }

    fn simplify(&mut self, graph: &mut Graph, node: NodeId) -> Option<NodeId> {
        let kind = graph.kind(node).clone();
        if kind == NodeKind::LogicalNot {
            return self.simplify_not(graph, node);
        }
        if !kind.is_pure_binary() {
            return None;
        }

        let left = graph.operands(node)[Node::LEFT];
        let right = graph.operands(node)[Node::RIGHT];
        let left_const = graph.node(left).const_value();
        let right_const = graph.node(right).const_value();

        if let (Some(a), Some(b)) = (left_const, right_const) {
            let folded = fold_binary(&kind, a, b)?;
            trace!("{node} folded to {folded}");
            graph.detach(node);
            return Some(self.constant(graph, folded));
        }

        // Constants go to the right so the code generator can use immediates.
        if left_const.is_some() {
            if kind.is_commutative() {
                return Some(self.rebuild(graph, node, kind, vec![right, left]));
            }
            if let Some(swapped) = kind.swapped_comparison() {
                return Some(self.rebuild(graph, node, swapped, vec![right, left]));
            }
        }

        if left == right {
            match kind {
                NodeKind::Sub | NodeKind::BitXor => {
                    graph.detach(node);
                    return Some(self.constant(graph, NodeKind::ConstInt(0)));
                }
                NodeKind::BitAnd | NodeKind::BitOr | NodeKind::LogicalAnd | NodeKind::LogicalOr => {
                    graph.detach(node);
                    return Some(left);
                }
                _ => {}
            }
        }

        // 0 - (0 - x) => x
        if kind == NodeKind::Sub && left_const == Some(0) {
            let inner = graph.node(right);
            if inner.kind == NodeKind::Sub && graph.node(inner.operands[Node::LEFT]).const_int() == Some(0) {
                let x = inner.operands[Node::RIGHT];
                graph.detach(node);
                return Some(x);
            }
        }

        let value = right_const?;
        let identity = match (&kind, value) {
            (
                NodeKind::Add
                | NodeKind::Sub
                | NodeKind::BitOr
                | NodeKind::BitXor
                | NodeKind::ShiftLeft
                | NodeKind::ShiftRight,
                0,
            )
            | (NodeKind::Mul, 1)
            | (NodeKind::BitAnd, -1) => Some(left),
            (NodeKind::Mul | NodeKind::BitAnd, 0) => Some(right),
            (NodeKind::LogicalAnd, 0) | (NodeKind::LogicalOr, 1) => Some(right),
            (NodeKind::LogicalAnd, 1) | (NodeKind::LogicalOr, 0) => Some(left),
            _ => None,
        }?;
        graph.detach(node);
        Some(identity)
    }

    fn simplify_not(&mut self, graph: &mut Graph, node: NodeId) -> Option<NodeId> {
        let operand = graph.operands(node)[0];
        if let Some(value) = graph.node(operand).const_value() {
            graph.detach(node);
            return Some(self.constant(graph, NodeKind::ConstBool(value == 0)));
        }
        if *graph.kind(operand) == NodeKind::LogicalNot {
            let inner = graph.operands(operand)[0];
            graph.detach(node);
            return Some(inner);
        }
        None
    }
}

impl Optimizer for LocalOptimizer {
    fn transform(&mut self, graph: &mut Graph, node: NodeId) -> NodeId {
        if !graph.kind(node).is_pure() {
            return node;
        }
        match self.simplify(graph, node) {
            Some(replacement) => replacement,
            None => self.number(graph, node),
        }
    }
}

/// Evaluate a pure binary operator on constant operands with x86-64 32-bit
/// semantics: wraparound arithmetic, shift counts masked to five bits and an
/// arithmetic right shift. Booleans are passed as `0`/`1`.
pub fn fold_binary(kind: &NodeKind, a: i32, b: i32) -> Option<NodeKind> {
    Some(match kind {
        NodeKind::Add => NodeKind::ConstInt(a.wrapping_add(b)),
        NodeKind::Sub => NodeKind::ConstInt(a.wrapping_sub(b)),
        NodeKind::Mul => NodeKind::ConstInt(a.wrapping_mul(b)),
        NodeKind::BitAnd => NodeKind::ConstInt(a & b),
        NodeKind::BitOr => NodeKind::ConstInt(a | b),
        NodeKind::BitXor => NodeKind::ConstInt(a ^ b),
        NodeKind::ShiftLeft => NodeKind::ConstInt(a.wrapping_shl(b as u32)),
        NodeKind::ShiftRight => NodeKind::ConstInt(a.wrapping_shr(b as u32)),
        NodeKind::Less => NodeKind::ConstBool(a < b),
        NodeKind::LessEqual => NodeKind::ConstBool(a <= b),
        NodeKind::Greater => NodeKind::ConstBool(a > b),
        NodeKind::GreaterEqual => NodeKind::ConstBool(a >= b),
        NodeKind::Equal => NodeKind::ConstBool(a == b),
        NodeKind::NotEqual => NodeKind::ConstBool(a != b),
        NodeKind::LogicalAnd => NodeKind::ConstBool(a != 0 && b != 0),
        NodeKind::LogicalOr => NodeKind::ConstBool(a != 0 || b != 0),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(graph: &mut Graph, opt: &mut LocalOptimizer, kind: NodeKind) -> NodeId {
        let start = graph.start_block();
        let node = graph.add_node(Node::new(kind, start, vec![]));
        opt.transform(graph, node)
    }

    fn binary(
        graph: &mut Graph,
        opt: &mut LocalOptimizer,
        kind: NodeKind,
        left: NodeId,
        right: NodeId,
    ) -> NodeId {
        let start = graph.start_block();
        let node = graph.add_node(Node::new(kind, start, vec![left, right]));
        opt.transform(graph, node)
    }

    fn parameter(graph: &mut Graph, index: u32) -> NodeId {
        let start = graph.start_block();
        graph.add_node(Node::new(NodeKind::Parameter(index), start, vec![]))
    }

    #[test]
    fn folding_wraps_at_32_bits() {
        let mut graph = Graph::new("f");
        let mut opt = LocalOptimizer::new();
        let max = leaf(&mut graph, &mut opt, NodeKind::ConstInt(i32::MAX));
        let one = leaf(&mut graph, &mut opt, NodeKind::ConstInt(1));
        let sum = binary(&mut graph, &mut opt, NodeKind::Add, max, one);
        assert_eq!(*graph.kind(sum), NodeKind::ConstInt(i32::MIN));
    }

    #[test]
    fn constants_are_deduplicated() {
        let mut graph = Graph::new("f");
        let mut opt = LocalOptimizer::new();
        let a = leaf(&mut graph, &mut opt, NodeKind::ConstInt(7));
        let b = leaf(&mut graph, &mut opt, NodeKind::ConstInt(7));
        assert_eq!(a, b);
        assert_eq!(graph.block(graph.start_block()).nodes(), &[a]);
    }

    #[test]
    fn pure_nodes_are_value_numbered() {
        let mut graph = Graph::new("f");
        let mut opt = LocalOptimizer::new();
        let x = parameter(&mut graph, 0);
        let y = parameter(&mut graph, 1);
        let first = binary(&mut graph, &mut opt, NodeKind::Add, x, y);
        let second = binary(&mut graph, &mut opt, NodeKind::Add, x, y);
        assert_eq!(first, second);
    }

    #[test]
    fn division_is_never_folded() {
        let mut graph = Graph::new("f");
        let mut opt = LocalOptimizer::new();
        let ten = leaf(&mut graph, &mut opt, NodeKind::ConstInt(10));
        let two = leaf(&mut graph, &mut opt, NodeKind::ConstInt(2));
        let start = graph.start_block();
        let div = graph.add_node(Node::new(NodeKind::Div, start, vec![ten, two, ten]));
        assert_eq!(opt.transform(&mut graph, div), div);
        assert_eq!(*graph.kind(div), NodeKind::Div);
    }

    #[test]
    fn transform_is_idempotent() {
        let mut graph = Graph::new("f");
        let mut opt = LocalOptimizer::new();
        let x = parameter(&mut graph, 0);
        let two = leaf(&mut graph, &mut opt, NodeKind::ConstInt(2));
        let three = leaf(&mut graph, &mut opt, NodeKind::ConstInt(3));
        let outputs = [
            binary(&mut graph, &mut opt, NodeKind::Mul, two, three),
            binary(&mut graph, &mut opt, NodeKind::Add, two, x),
            binary(&mut graph, &mut opt, NodeKind::Add, x, two),
            binary(&mut graph, &mut opt, NodeKind::Less, two, x),
        ];
        for output in outputs {
            assert_eq!(opt.transform(&mut graph, output), output);
        }
    }

    #[test]
    fn constants_move_to_the_right() {
        let mut graph = Graph::new("f");
        let mut opt = LocalOptimizer::new();
        let x = parameter(&mut graph, 0);
        let two = leaf(&mut graph, &mut opt, NodeKind::ConstInt(2));
        let sum = binary(&mut graph, &mut opt, NodeKind::Add, two, x);
        assert_eq!(graph.operands(sum), &[x, two]);

        let less = binary(&mut graph, &mut opt, NodeKind::Less, two, x);
        assert_eq!(*graph.kind(less), NodeKind::Greater);
        assert_eq!(graph.operands(less), &[x, two]);
    }

    #[test]
    fn double_negation_cancels() {
        let mut graph = Graph::new("f");
        let mut opt = LocalOptimizer::new();
        let x = parameter(&mut graph, 0);
        let zero = leaf(&mut graph, &mut opt, NodeKind::ConstInt(0));
        let neg = binary(&mut graph, &mut opt, NodeKind::Sub, zero, x);
        assert_eq!(*graph.kind(neg), NodeKind::Sub);
        let back = binary(&mut graph, &mut opt, NodeKind::Sub, zero, neg);
        assert_eq!(back, x);
    }

    #[test]
    fn identities_return_the_operand() {
        let mut graph = Graph::new("f");
        let mut opt = LocalOptimizer::new();
        let x = parameter(&mut graph, 0);
        let zero = leaf(&mut graph, &mut opt, NodeKind::ConstInt(0));
        let one = leaf(&mut graph, &mut opt, NodeKind::ConstInt(1));
        assert_eq!(binary(&mut graph, &mut opt, NodeKind::Add, x, zero), x);
        assert_eq!(binary(&mut graph, &mut opt, NodeKind::Mul, x, one), x);
        assert_eq!(binary(&mut graph, &mut opt, NodeKind::Mul, x, zero), zero);
        let diff = binary(&mut graph, &mut opt, NodeKind::Sub, x, x);
        assert_eq!(*graph.kind(diff), NodeKind::ConstInt(0));
    }

    #[test]
    fn comparisons_fold_to_booleans() {
        let mut graph = Graph::new("f");
        let mut opt = LocalOptimizer::new();
        let one = leaf(&mut graph, &mut opt, NodeKind::ConstInt(1));
        let two = leaf(&mut graph, &mut opt, NodeKind::ConstInt(2));
        let less = binary(&mut graph, &mut opt, NodeKind::Less, one, two);
        assert_eq!(*graph.kind(less), NodeKind::ConstBool(true));
        let and = binary(&mut graph, &mut opt, NodeKind::LogicalAnd, less, less);
        assert_eq!(*graph.kind(and), NodeKind::ConstBool(true));
    }

    #[test]
    fn shifts_mask_the_count() {
        assert_eq!(fold_binary(&NodeKind::ShiftLeft, 1, 33), Some(NodeKind::ConstInt(2)));
        assert_eq!(fold_binary(&NodeKind::ShiftRight, -8, 1), Some(NodeKind::ConstInt(-4)));
        assert_eq!(fold_binary(&NodeKind::Div, 8, 2), None);
    }
}
