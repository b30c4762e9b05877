// This module owns the graph while one function is being built and implements the
// variable renaming half of SSA construction. Definitions are tracked per (variable, block),
// and the current side-effect token is tracked per block exactly like a variable, so effectful
// operations form one total order that merges through phis at control-flow joins. A block may
// be read from before all of its predecessors are known: reads in an unsealed block create a
// placeholder phi that is completed when the block is sealed. A completed phi whose operands
// all agree is replaced by that value, as in Braun et al. Every node factory routes the
// fresh node through the optimizer and returns whatever the optimizer hands back, so callers
// must always continue with the returned id.

//! Braun et al. style SSA construction state for one function.

use crate::ast::Var;
use crate::ir::graph::Graph;
use crate::ir::node::{BlockId, Node, NodeId, NodeKind, ProjectionKind};
use crate::ir::optimize::Optimizer;
use hashbrown::{HashMap, HashSet};
use log::{debug, trace};

/// What a definition map entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot<'a> {
    Variable(Var<'a>),
    /// The ordering token; one per block.
    SideEffect,
}

impl Slot<'_> {
    fn is_side_effect(self) -> bool {
        matches!(self, Slot::SideEffect)
    }
}

pub struct GraphConstructor<'a, O: Optimizer> {
    graph: Graph,
    optimizer: O,
    definitions: HashMap<(Slot<'a>, BlockId), NodeId>,
    incomplete_phis: HashMap<BlockId, Vec<(Slot<'a>, NodeId)>>,
    /// Removed trivial phi -> the value that replaced it.
    replaced_phis: HashMap<NodeId, NodeId>,
    sealed: HashSet<BlockId>,
    current_block: BlockId,
    start: NodeId,
    initial_side_effect: NodeId,
}

impl<'a, O: Optimizer> GraphConstructor<'a, O> {
    pub fn new(name: impl Into<String>, optimizer: O) -> Self {
        let mut graph = Graph::new(name);
        let start_block = graph.start_block();
        let start = graph.add_node(Node::new(NodeKind::Start, start_block, Vec::new()));
        let initial_side_effect = graph.add_node(Node::new(
            NodeKind::Projection(ProjectionKind::SideEffect),
            start_block,
            vec![start],
        ));

        let mut constructor = Self {
            graph,
            optimizer,
            definitions: HashMap::new(),
            incomplete_phis: HashMap::new(),
            replaced_phis: HashMap::new(),
            sealed: HashSet::new(),
            current_block: start_block,
            start,
            initial_side_effect,
        };
        constructor.seal_block(start_block);
        constructor.write_slot(Slot::SideEffect, start_block, initial_side_effect);
        constructor
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    pub fn set_current_block(&mut self, block: BlockId) {
        self.current_block = block;
    }

    pub fn new_block(&mut self) -> BlockId {
        self.graph.add_block()
    }

    /// Whether control can reach the block currently being filled.
    pub fn is_current_reachable(&self) -> bool {
        self.graph.is_reachable(self.current_block)
    }

    pub fn add_predecessor(&mut self, block: BlockId, control: NodeId) {
        debug_assert!(!self.is_sealed(block), "{block} is already sealed");
        self.graph.add_predecessor(block, control);
    }

    pub fn is_sealed(&self, block: BlockId) -> bool {
        self.sealed.contains(&block)
    }

    /// Declare that all predecessors of `block` are known and complete the
    /// phis that were created while they were not.
    pub fn seal_block(&mut self, block: BlockId) {
        debug_assert!(!self.is_sealed(block), "{block} sealed twice");
        let pending = self.incomplete_phis.remove(&block).unwrap_or_default();
        trace!("sealing {block} with {} pending phis", pending.len());
        for (slot, phi) in pending {
            self.add_phi_operands(slot, phi);
        }
        self.sealed.insert(block);
    }

    pub fn write_variable(&mut self, var: Var<'a>, block: BlockId, value: NodeId) {
        self.write_slot(Slot::Variable(var), block, value);
    }

    pub fn read_variable(&mut self, var: Var<'a>, block: BlockId) -> NodeId {
        self.read_slot(Slot::Variable(var), block)
    }

    pub fn write_side_effect(&mut self, value: NodeId) {
        let block = self.current_block;
        self.write_slot(Slot::SideEffect, block, value);
    }

    pub fn read_side_effect(&mut self) -> NodeId {
        let block = self.current_block;
        self.read_slot(Slot::SideEffect, block)
    }

    fn write_slot(&mut self, slot: Slot<'a>, block: BlockId, value: NodeId) {
        self.definitions.insert((slot, block), value);
    }

    fn read_slot(&mut self, slot: Slot<'a>, block: BlockId) -> NodeId {
        match self.definitions.get(&(slot, block)) {
            Some(&value) => value,
            None => self.read_slot_recursive(slot, block),
        }
    }

    fn read_slot_recursive(&mut self, slot: Slot<'a>, block: BlockId) -> NodeId {
        let value = if !self.is_sealed(block) {
            let phi = self.new_phi(block, slot.is_side_effect());
            self.incomplete_phis
                .entry(block)
                .or_default()
                .push((slot, phi));
            phi
        } else {
            match self.graph.predecessors(block).len() {
                // Only unreachable code reads in a sealed block without predecessors.
                0 => match slot {
                    Slot::SideEffect => self.initial_side_effect,
                    Slot::Variable(_) => self.new_const_int(0),
                },
                1 => {
                    let pred_block = self.graph.block_of(self.graph.predecessors(block)[0]);
                    self.read_slot(slot, pred_block)
                }
                _ => {
                    let phi = self.new_phi(block, slot.is_side_effect());
                    self.write_slot(slot, block, phi);
                    self.add_phi_operands(slot, phi)
                }
            }
        };
        self.write_slot(slot, block, value);
        value
    }

    fn add_phi_operands(&mut self, slot: Slot<'a>, phi: NodeId) -> NodeId {
        let block = self.graph.block_of(phi);
        let predecessors = self.graph.predecessors(block).to_vec();
        for pred in predecessors {
            let pred_block = self.graph.block_of(pred);
            let operand = self.read_slot(slot, pred_block);
            self.graph.append_operand(phi, operand);
        }
        self.try_remove_trivial_phi(phi)
    }

    /// A phi whose operands are all one value or the phi itself is replaced
    /// by that value. Phis that used it may become trivial in turn.
    fn try_remove_trivial_phi(&mut self, phi: NodeId) -> NodeId {
        let mut same = None;
        for &operand in self.graph.operands(phi) {
            if operand == phi || Some(operand) == same {
                continue;
            }
            if same.is_some() {
                return phi;
            }
            same = Some(operand);
        }
        // No operands: the block is never entered.
        let Some(same) = same else {
            return phi;
        };

        trace!("{phi} is trivial, replaced by {same}");
        let users = self.graph.replace_uses(phi, same);
        self.graph.detach(phi);
        self.replaced_phis.insert(phi, same);
        for value in self.definitions.values_mut() {
            if *value == phi {
                *value = same;
            }
        }

        for user in users {
            if self.replaced_phis.contains_key(&user) {
                continue;
            }
            let complete = self.graph.operands(user).len()
                == self.graph.predecessors(self.graph.block_of(user)).len();
            if matches!(self.graph.kind(user), NodeKind::Phi { .. }) && complete {
                self.try_remove_trivial_phi(user);
            }
        }
        // `same` may itself have been removed by the loop above.
        self.resolve(same)
    }

    fn resolve(&self, mut node: NodeId) -> NodeId {
        while let Some(&next) = self.replaced_phis.get(&node) {
            node = next;
        }
        node
    }

    fn new_phi(&mut self, block: BlockId, side_effect: bool) -> NodeId {
        let phi = self
            .graph
            .add_node(Node::new(NodeKind::Phi { side_effect }, block, Vec::new()));
        trace!("{phi} = {} in {block}", self.graph.kind(phi));
        phi
    }

    /// A value phi in `block` with operands already known, one per predecessor.
    pub fn new_value_phi(&mut self, block: BlockId, operands: Vec<NodeId>) -> NodeId {
        debug_assert_eq!(operands.len(), self.graph.predecessors(block).len());
        let phi = self.graph.add_node(Node::new(
            NodeKind::Phi { side_effect: false },
            block,
            operands,
        ));
        trace!("{phi} = Phi in {block} (explicit)");
        phi
    }

    fn create(&mut self, kind: NodeKind, block: BlockId, operands: Vec<NodeId>) -> NodeId {
        let node = self.graph.add_node(Node::new(kind, block, operands));
        self.optimizer.transform(&mut self.graph, node)
    }

    fn create_here(&mut self, kind: NodeKind, operands: Vec<NodeId>) -> NodeId {
        let block = self.current_block;
        self.create(kind, block, operands)
    }

    /// Constants always live in the start block so every block can use them.
    pub fn new_const_int(&mut self, value: i32) -> NodeId {
        let start = self.graph.start_block();
        self.create(NodeKind::ConstInt(value), start, Vec::new())
    }

    pub fn new_const_bool(&mut self, value: bool) -> NodeId {
        let start = self.graph.start_block();
        self.create(NodeKind::ConstBool(value), start, Vec::new())
    }

    pub fn new_binary(&mut self, kind: NodeKind, left: NodeId, right: NodeId) -> NodeId {
        debug_assert!(kind.is_pure_binary(), "{kind} is not a pure binary operator");
        self.create_here(kind, vec![left, right])
    }

    pub fn new_logical_not(&mut self, operand: NodeId) -> NodeId {
        self.create_here(NodeKind::LogicalNot, vec![operand])
    }

    pub fn new_div(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.new_effectful_binary(NodeKind::Div, left, right)
    }

    pub fn new_mod(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.new_effectful_binary(NodeKind::Mod, left, right)
    }

    /// Division may trap, so it is ordered on the side-effect chain and its
    /// value is only reachable through a `Result` projection.
    fn new_effectful_binary(&mut self, kind: NodeKind, left: NodeId, right: NodeId) -> NodeId {
        let side_effect = self.read_side_effect();
        let node = self.create_here(kind, vec![left, right, side_effect]);
        self.thread_side_effect(node)
    }

    pub fn new_call(&mut self, callee: &str, arguments: &[NodeId]) -> NodeId {
        let mut operands = Vec::with_capacity(arguments.len() + 1);
        operands.push(self.read_side_effect());
        operands.extend_from_slice(arguments);
        let node = self.create_here(NodeKind::Call(callee.to_string()), operands);
        self.thread_side_effect(node)
    }

    fn thread_side_effect(&mut self, node: NodeId) -> NodeId {
        let effect = self.new_projection(node, ProjectionKind::SideEffect);
        self.write_side_effect(effect);
        self.new_projection(node, ProjectionKind::Result)
    }

    pub fn new_projection(&mut self, source: NodeId, kind: ProjectionKind) -> NodeId {
        let block = self.graph.block_of(source);
        self.create(NodeKind::Projection(kind), block, vec![source])
    }

    pub fn new_parameter(&mut self, index: u32) -> NodeId {
        let start_block = self.graph.start_block();
        let start = self.start;
        self.create(NodeKind::Parameter(index), start_block, vec![start])
    }

    /// A return of `value`, linked as a predecessor of the end block.
    pub fn new_return(&mut self, value: NodeId) -> NodeId {
        let side_effect = self.read_side_effect();
        let node = self.create_here(NodeKind::Return, vec![side_effect, value]);
        let end = self.graph.end_block();
        self.graph.add_predecessor(end, node);
        node
    }

    pub fn new_jump(&mut self) -> NodeId {
        self.create_here(NodeKind::Jump, Vec::new())
    }

    pub fn new_break(&mut self) -> NodeId {
        self.create_here(NodeKind::Break, Vec::new())
    }

    pub fn new_continue(&mut self) -> NodeId {
        self.create_here(NodeKind::Continue, Vec::new())
    }

    pub fn new_if(&mut self, condition: NodeId) -> NodeId {
        self.create_here(NodeKind::If, vec![condition])
    }

    pub fn new_while(&mut self, condition: NodeId) -> NodeId {
        self.create_here(NodeKind::While, vec![condition])
    }

    /// Hand out the finished graph.
    pub fn finish(self) -> Graph {
        debug_assert!(
            self.incomplete_phis.is_empty(),
            "graph {} finished with unsealed blocks",
            self.graph.name()
        );
        debug!(
            "built {}: {} nodes, {} blocks, {} phis",
            self.graph.name(),
            self.graph.node_count(),
            self.graph.block_count(),
            self.graph.phi_count()
        );
        trace!("{}", self.graph);
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ScopeId;
    use crate::ir::optimize::{LocalOptimizer, NoOptimizer};

    fn var(name: &str) -> Var<'_> {
        Var {
            name,
            scope: ScopeId(0),
        }
    }

    #[test]
    fn read_after_write_needs_no_phi() {
        let mut c = GraphConstructor::new("f", NoOptimizer);
        let block = c.current_block();
        let five = c.new_const_int(5);
        c.write_variable(var("x"), block, five);
        assert_eq!(c.read_variable(var("x"), block), five);
        assert_eq!(c.graph().phi_count(), 0);
    }

    #[test]
    fn single_predecessor_reads_through() {
        let mut c = GraphConstructor::new("f", NoOptimizer);
        let entry = c.current_block();
        let one = c.new_const_int(1);
        c.write_variable(var("x"), entry, one);
        let jump = c.new_jump();
        let next = c.new_block();
        c.add_predecessor(next, jump);
        c.seal_block(next);
        assert_eq!(c.read_variable(var("x"), next), one);
        assert_eq!(c.graph().phi_count(), 0);
    }

    #[test]
    fn join_creates_one_phi_in_predecessor_order() {
        let mut c = GraphConstructor::new("f", LocalOptimizer::new());
        let cond = c.new_const_bool(true);
        let branch = c.new_if(cond);
        let on_true = c.new_projection(branch, ProjectionKind::True);
        let on_false = c.new_projection(branch, ProjectionKind::False);

        let mut jumps = Vec::new();
        let mut values = Vec::new();
        for (projection, value) in [(on_true, 10), (on_false, 20)] {
            let block = c.new_block();
            c.add_predecessor(block, projection);
            c.seal_block(block);
            c.set_current_block(block);
            let constant = c.new_const_int(value);
            c.write_variable(var("x"), block, constant);
            values.push(constant);
            jumps.push(c.new_jump());
        }

        let join = c.new_block();
        for jump in &jumps {
            c.add_predecessor(join, *jump);
        }
        c.seal_block(join);
        let merged = c.read_variable(var("x"), join);

        let graph = c.graph();
        assert_eq!(*graph.kind(merged), NodeKind::Phi { side_effect: false });
        assert_eq!(graph.operands(merged), values.as_slice());
        assert_eq!(graph.value_phis(join).count(), 1);
    }

    #[test]
    fn unsealed_reads_complete_on_seal() {
        let mut c = GraphConstructor::new("f", NoOptimizer);
        let entry = c.current_block();
        let zero = c.new_const_int(0);
        c.write_variable(var("i"), entry, zero);
        let enter = c.new_jump();

        let header = c.new_block();
        c.add_predecessor(header, enter);
        c.set_current_block(header);
        let phi = c.read_variable(var("i"), header);
        assert!(c.graph().operands(phi).is_empty());

        let one = c.new_const_int(1);
        let next = c.new_binary(NodeKind::Add, phi, one);
        c.write_variable(var("i"), header, next);
        let back = c.new_jump();
        c.add_predecessor(header, back);
        c.seal_block(header);

        assert_eq!(c.graph().operands(phi), &[zero, next]);
    }

    #[test]
    fn loop_invariant_phi_is_removed_on_seal() {
        let mut c = GraphConstructor::new("f", NoOptimizer);
        let entry = c.current_block();
        let seven = c.new_const_int(7);
        c.write_variable(var("k"), entry, seven);
        let enter = c.new_jump();

        let header = c.new_block();
        c.add_predecessor(header, enter);
        c.set_current_block(header);
        let placeholder = c.read_variable(var("k"), header);
        let one = c.new_const_int(1);
        let sum = c.new_binary(NodeKind::Add, placeholder, one);
        let back = c.new_jump();
        c.add_predecessor(header, back);
        c.seal_block(header);

        assert_eq!(c.graph().operands(sum), &[seven, one]);
        assert_eq!(c.read_variable(var("k"), header), seven);
        assert_eq!(c.graph().value_phis(header).count(), 0);
    }

    #[test]
    fn division_threads_the_side_effect() {
        let mut c = GraphConstructor::new("f", LocalOptimizer::new());
        let before = c.read_side_effect();
        let ten = c.new_const_int(10);
        let two = c.new_const_int(2);
        let quotient = c.new_div(ten, two);

        let graph = c.graph();
        assert_eq!(
            *graph.kind(quotient),
            NodeKind::Projection(ProjectionKind::Result)
        );
        let div = graph.value_source(quotient);
        assert_eq!(*graph.kind(div), NodeKind::Div);
        assert_eq!(graph.operands(div)[Node::DIV_SIDE_EFFECT], before);
        let after = c.read_side_effect();
        assert_ne!(after, before);
        assert_eq!(c.graph().operands(after), &[div]);
    }

    #[test]
    fn returns_link_to_the_end_block() {
        let mut c = GraphConstructor::new("f", NoOptimizer);
        let seven = c.new_const_int(7);
        let ret = c.new_return(seven);
        let graph = c.finish();
        assert_eq!(graph.predecessors(graph.end_block()), &[ret]);
        assert_eq!(graph.operands(ret)[Node::RETURN_RESULT], seven);
    }
}
