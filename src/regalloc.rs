// This module assigns registers to the values of one finished graph. A single iterative
// depth-first walk starts at the returns feeding the end block; a node's inputs are its
// operands followed by the control predecessors of its block, so everything a return depends
// on, including branch conditions and loop back edges, is visited before the node itself.
// Value-producing nodes receive virtual registers in post-order from a monotonically
// increasing counter. There is no liveness analysis and no reuse. The physical view is chosen
// by RegisterStrategy: Dedicated hands every non-constant value its own pool register and fails
// once the pool is exhausted; Modulo wraps the virtual index around the pool, which can alias
// values that are live at the same time. Constants never occupy a physical register because
// instruction selection encodes them as immediates at every use.

//! Virtual and physical register assignment.

use crate::core::error::{CompileError, CompileResult};
use crate::core::register_file::{AsmReg, RegisterFile};
use crate::ir::{Graph, NodeId, NodeKind, ProjectionKind};
use crate::x64::registers::ALLOCATION_POOL;
use hashbrown::{HashMap, HashSet};
use log::debug;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Allocator-internal register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualRegister(pub u32);

impl fmt::Display for VirtualRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// How virtual registers map onto the physical pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterStrategy {
    /// One pool register per value; running out is fatal.
    #[default]
    Dedicated,
    /// Rotate through the pool in virtual register order. Constants hold a
    /// virtual register but are skipped here, so the `i`-th value that needs
    /// a register takes `pool[i % pool.len()]`. Values may share a register.
    Modulo,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown register strategy `{0}` (expected `dedicated` or `modulo`)")]
pub struct UnknownStrategy(pub String);

impl FromStr for RegisterStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dedicated" => Ok(RegisterStrategy::Dedicated),
            "modulo" => Ok(RegisterStrategy::Modulo),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Register assignment of one graph.
#[derive(Debug, Clone, Default)]
pub struct RegisterMap {
    virtuals: HashMap<NodeId, VirtualRegister>,
    physical: HashMap<NodeId, AsmReg>,
    used: Vec<AsmReg>,
    virtual_count: u32,
}

impl RegisterMap {
    pub fn virtual_register(&self, node: NodeId) -> Option<VirtualRegister> {
        self.virtuals.get(&node).copied()
    }

    pub fn physical(&self, node: NodeId) -> Option<AsmReg> {
        self.physical.get(&node).copied()
    }

    /// Number of virtual registers handed out.
    pub fn virtual_count(&self) -> u32 {
        self.virtual_count
    }

    /// Pool registers the function touches, in pool order.
    pub fn used_registers(&self) -> &[AsmReg] {
        &self.used
    }
}

pub struct RegisterAllocator {
    strategy: RegisterStrategy,
    pool: &'static [AsmReg],
}

impl RegisterAllocator {
    pub fn new(strategy: RegisterStrategy) -> Self {
        Self::with_pool(strategy, &ALLOCATION_POOL)
    }

    pub fn with_pool(strategy: RegisterStrategy, pool: &'static [AsmReg]) -> Self {
        Self { strategy, pool }
    }

    pub fn allocate(&self, graph: &Graph) -> CompileResult<RegisterMap> {
        let order = post_order(graph);
        let mut map = RegisterMap::default();
        let mut needs_physical = Vec::new();

        for &node in &order {
            let kind = graph.kind(node);
            if kind.has_value() {
                let register = VirtualRegister(map.virtual_count);
                map.virtual_count += 1;
                map.virtuals.insert(node, register);
                if graph.node(node).const_value().is_none() {
                    needs_physical.push(node);
                }
            } else if *kind == NodeKind::Projection(ProjectionKind::Result) {
                let source = graph.value_source(node);
                if let Some(&register) = map.virtuals.get(&source) {
                    map.virtuals.insert(node, register);
                }
            }
        }

        let mut file = RegisterFile::new(self.pool);
        for (index, &node) in needs_physical.iter().enumerate() {
            let reg = match self.strategy {
                RegisterStrategy::Dedicated => {
                    file.allocate_reg()
                        .map_err(|_| CompileError::OutOfRegisters {
                            function: graph.name().to_string(),
                            required: needs_physical.len(),
                            available: self.pool.len(),
                        })?
                }
                RegisterStrategy::Modulo => {
                    let reg = self.pool[index % self.pool.len()];
                    file.claim(reg).map_err(|error| CompileError::RegisterPool {
                        function: graph.name().to_string(),
                        error,
                    })?;
                    reg
                }
            };
            map.physical.insert(node, reg);
        }
        for &node in &order {
            if *graph.kind(node) == NodeKind::Projection(ProjectionKind::Result) {
                if let Some(reg) = map.physical(graph.value_source(node)) {
                    map.physical.insert(node, reg);
                }
            }
        }
        map.used = file.clobbered_regs();

        debug!(
            "allocated {}: {} virtual, {} physical ({:?})",
            graph.name(),
            map.virtual_count,
            map.used.len(),
            self.strategy
        );
        Ok(map)
    }
}

/// The `index`-th input of `node`: operands first, then the control
/// predecessors of its block.
fn input(graph: &Graph, node: NodeId, index: usize) -> Option<NodeId> {
    let operands = graph.operands(node);
    match operands.get(index) {
        Some(&operand) => Some(operand),
        None => graph
            .predecessors(graph.block_of(node))
            .get(index - operands.len())
            .copied(),
    }
}

/// Depth-first post-order from the end block.
fn post_order(graph: &Graph) -> Vec<NodeId> {
    let mut visited = HashSet::new();
    let mut order = Vec::with_capacity(graph.node_count());
    let mut stack: Vec<(NodeId, usize)> = Vec::new();

    for &root in graph.predecessors(graph.end_block()) {
        if !visited.insert(root) {
            continue;
        }
        stack.push((root, 0));
        while let Some(top) = stack.last_mut() {
            let (node, cursor) = *top;
            match input(graph, node, cursor) {
                Some(next) => {
                    top.1 += 1;
                    if visited.insert(next) {
                        stack.push((next, 0));
                    }
                }
                None => {
                    stack.pop();
                    order.push(node);
                }
            }
        }
    }
    order
}
