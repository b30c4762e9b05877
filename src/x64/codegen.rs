// This module lowers one graph plus its register map to x86-64 AT&T text. Blocks are laid out
// in creation order, skipping blocks control never reaches. Inside a block nodes are scheduled
// by a post-order scan over same-block operands rooted at the block's nodes in creation order,
// with the terminator last, so every operand is computed before its user and effectful nodes
// keep their side-effect order. Constants are never materialized on their own; every use site
// encodes them as immediates or loads them into a scratch register. Phis produce no code at
// their definition. Instead each control edge into a block with value phis copies the edge's
// operands into the phi registers as one parallel copy, and the false edge of a conditional
// branch that needs such copies is routed through a stub emitted after the function's blocks.
// Every function owns a frame: rbp is saved, the pool registers it uses are pushed in the
// prologue, and all returns leave through one shared epilogue.

//! Instruction selection and control-flow lowering for one function.

use super::emitter::{Condition, Emitter, Operand};
use super::program::DIV_BY_ZERO_LABEL;
use super::registers::{
    gp32, gp64, widen, ACCUMULATOR, ACCUMULATOR_LOW, COUNTER, COUNTER_LOW, DATA, FRAME_POINTER,
    STACK_POINTER,
};
use crate::core::error::{CompileError, CompileResult};
use crate::ir::{fold_binary, BlockId, Graph, Node, NodeId, NodeKind, ProjectionKind};
use crate::regalloc::RegisterMap;
use hashbrown::HashSet;
use iced_x86::Register;
use log::{debug, trace};

/// Offset of the first stack-passed argument from the frame pointer.
const FIRST_ARGUMENT_OFFSET: i32 = 16;
const STACK_SLOT: i32 = 8;

/// Assembly text of one function.
#[derive(Debug, Clone)]
pub struct FunctionAsm {
    pub name: String,
    pub text: String,
    pub instructions: usize,
}

/// A conditional branch's false edge that needs phi copies on the way.
struct EdgeStub {
    label: String,
    control: NodeId,
    target: BlockId,
}

pub struct CodeGenerator<'g> {
    graph: &'g Graph,
    registers: &'g RegisterMap,
    guard_division: bool,
    emitter: Emitter,
    next_block: Option<BlockId>,
    stubs: Vec<EdgeStub>,
}

impl<'g> CodeGenerator<'g> {
    pub fn new(graph: &'g Graph, registers: &'g RegisterMap) -> Self {
        Self {
            graph,
            registers,
            guard_division: true,
            emitter: Emitter::new(),
            next_block: None,
            stubs: Vec::new(),
        }
    }

    /// Check divisors against zero before dividing (on by default).
    pub fn with_division_guard(mut self, guard: bool) -> Self {
        self.guard_division = guard;
        self
    }

    pub fn generate(mut self) -> CompileResult<FunctionAsm> {
        let name = self.graph.name().to_string();
        self.emitter.label(&function_label(&name))?;
        self.prologue()?;

        let layout: Vec<BlockId> = self
            .graph
            .block_ids()
            .filter(|&block| block != self.graph.end_block() && self.graph.is_reachable(block))
            .collect();
        for (position, &block) in layout.iter().enumerate() {
            self.next_block = layout.get(position + 1).copied();
            self.block(block)?;
        }

        self.next_block = None;
        let stubs = std::mem::take(&mut self.stubs);
        for stub in &stubs {
            self.emitter.label(&stub.label)?;
            self.edge_moves(stub.control, stub.target)?;
            self.emitter.jmp(&self.block_label(stub.target))?;
        }

        self.epilogue()?;
        let instructions = self.emitter.instruction_count();
        debug!("generated {name}: {} blocks, {instructions} instructions", layout.len());
        Ok(FunctionAsm {
            name,
            text: self.emitter.finish(),
            instructions,
        })
    }

    fn prologue(&mut self) -> CompileResult<()> {
        self.emitter.push(Operand::Reg(FRAME_POINTER))?;
        self.emitter.mov(Operand::Reg(STACK_POINTER), FRAME_POINTER)?;
        for &reg in self.registers.used_registers() {
            if let Some(reg) = gp64(reg) {
                self.emitter.push(Operand::Reg(reg))?;
            }
        }
        Ok(())
    }

    fn epilogue(&mut self) -> CompileResult<()> {
        self.emitter.label(&self.epilogue_label())?;
        for &reg in self.registers.used_registers().iter().rev() {
            if let Some(reg) = gp64(reg) {
                self.emitter.pop(reg)?;
            }
        }
        self.emitter.pop(FRAME_POINTER)?;
        self.emitter.ret()?;
        Ok(())
    }

    fn block_label(&self, block: BlockId) -> String {
        format!(".L{}_{block}", self.graph.name())
    }

    fn epilogue_label(&self) -> String {
        format!(".L{}_epilogue", self.graph.name())
    }

    fn block(&mut self, block: BlockId) -> CompileResult<()> {
        if block != self.graph.start_block() {
            self.emitter.label(&self.block_label(block))?;
        }
        let terminator = self
            .graph
            .terminator(block)
            .ok_or_else(|| CompileError::MissingTerminator {
                function: self.graph.name().to_string(),
                block,
            })?;

        for node in self.schedule(block, terminator) {
            self.node(node)?;
        }
        Ok(())
    }

    /// Post-order over same-block operands, terminator last.
    fn schedule(&self, block: BlockId, terminator: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let roots = self
            .graph
            .block(block)
            .nodes()
            .iter()
            .copied()
            .filter(|&node| node != terminator)
            .chain(std::iter::once(terminator));
        for root in roots {
            self.visit(block, root, &mut visited, &mut order);
        }
        order
    }

    fn visit(
        &self,
        block: BlockId,
        node: NodeId,
        visited: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) {
        if !visited.insert(node) {
            return;
        }
        for &operand in self.graph.operands(node) {
            let local = self.graph.block_of(operand) == block;
            if local && !matches!(self.graph.kind(operand), NodeKind::Phi { .. }) {
                self.visit(block, operand, visited, order);
            }
        }
        order.push(node);
    }

    fn missing_register(&self, node: NodeId) -> CompileError {
        CompileError::MissingRegister {
            function: self.graph.name().to_string(),
            node,
        }
    }

    /// Destination register of a value node; `None` if the value is dead.
    fn dest(&self, node: NodeId) -> Option<Register> {
        self.registers.physical(node).and_then(gp32)
    }

    /// Where the value of `node` can be read.
    fn operand(&self, node: NodeId) -> CompileResult<Operand> {
        let source = self.graph.value_source(node);
        if let Some(value) = self.graph.node(source).const_value() {
            return Ok(Operand::Imm(value));
        }
        self.dest(source)
            .map(Operand::Reg)
            .ok_or_else(|| self.missing_register(source))
    }

    fn binary_operands(&self, node: NodeId) -> CompileResult<(Operand, Operand)> {
        let operands = self.graph.operands(node);
        Ok((
            self.operand(operands[Node::LEFT])?,
            self.operand(operands[Node::RIGHT])?,
        ))
    }

    /// `value` as a register, loading immediates into `scratch`.
    fn in_register(&mut self, value: Operand, scratch: Register) -> CompileResult<Register> {
        match value {
            Operand::Reg(reg) => Ok(reg),
            other => {
                self.emitter.mov(other, scratch)?;
                Ok(scratch)
            }
        }
    }

    fn node(&mut self, node: NodeId) -> CompileResult<()> {
        let kind = self.graph.kind(node).clone();
        trace!("emit {node} = {kind}");
        match kind {
            NodeKind::Start
            | NodeKind::ConstInt(_)
            | NodeKind::ConstBool(_)
            | NodeKind::Projection(_)
            | NodeKind::Phi { .. } => Ok(()),
            NodeKind::Parameter(index) => {
                let Some(dest) = self.dest(node) else {
                    return Ok(());
                };
                let offset = FIRST_ARGUMENT_OFFSET + STACK_SLOT * index as i32;
                self.emitter.mov(
                    Operand::Mem {
                        base: FRAME_POINTER,
                        offset,
                    },
                    dest,
                )?;
                Ok(())
            }
            NodeKind::Add => self.arithmetic(node, &kind, "add"),
            NodeKind::Sub => self.arithmetic(node, &kind, "sub"),
            NodeKind::BitAnd => self.arithmetic(node, &kind, "and"),
            NodeKind::BitOr => self.arithmetic(node, &kind, "or"),
            NodeKind::BitXor => self.arithmetic(node, &kind, "xor"),
            NodeKind::Mul => self.multiply(node),
            NodeKind::ShiftLeft => self.shift(node, &kind, "sal"),
            NodeKind::ShiftRight => self.shift(node, &kind, "sar"),
            NodeKind::Div => self.divide(node, ACCUMULATOR),
            NodeKind::Mod => self.divide(node, DATA),
            NodeKind::Less => self.compare(node, &kind, Condition::Less),
            NodeKind::LessEqual => self.compare(node, &kind, Condition::LessEqual),
            NodeKind::Greater => self.compare(node, &kind, Condition::Greater),
            NodeKind::GreaterEqual => self.compare(node, &kind, Condition::GreaterEqual),
            NodeKind::Equal => self.compare(node, &kind, Condition::Equal),
            NodeKind::NotEqual => self.compare(node, &kind, Condition::NotEqual),
            NodeKind::LogicalAnd => self.logical(node, &kind, "and"),
            NodeKind::LogicalOr => self.logical(node, &kind, "or"),
            NodeKind::LogicalNot => self.logical_not(node),
            NodeKind::Call(callee) => self.call(node, &callee),
            NodeKind::Return => self.ret(node),
            NodeKind::Jump | NodeKind::Break | NodeKind::Continue => {
                let target = self.target(node)?;
                self.edge_moves(node, target)?;
                self.jump_to(target)
            }
            NodeKind::If | NodeKind::While => self.branch(node),
        }
    }

    /// Both operands constant: the value is known at emission time.
    fn fold(&mut self, kind: &NodeKind, left: Operand, right: Operand, dest: Register) -> CompileResult<bool> {
        if let (Operand::Imm(a), Operand::Imm(b)) = (left, right) {
            if let Some(folded) = fold_binary(kind, a, b) {
                let value = match folded {
                    NodeKind::ConstInt(value) => value,
                    NodeKind::ConstBool(value) => value as i32,
                    _ => return Ok(false),
                };
                self.emitter.mov(Operand::Imm(value), dest)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn arithmetic(&mut self, node: NodeId, kind: &NodeKind, mnemonic: &str) -> CompileResult<()> {
        let Some(dest) = self.dest(node) else {
            return Ok(());
        };
        let (left, right) = self.binary_operands(node)?;
        if self.fold(kind, left, right, dest)? {
            return Ok(());
        }
        if *kind == NodeKind::Sub && left == Operand::Imm(0) {
            self.emitter.mov_if_needed(right, dest)?;
            self.emitter.neg(dest)?;
            return Ok(());
        }
        let right = self.protect(left, right, dest)?;
        self.emitter.mov_if_needed(left, dest)?;
        self.emitter.alu(mnemonic, right, dest)?;
        Ok(())
    }

    /// Move `right` out of the way if loading `left` into `dest` would clobber it.
    fn protect(&mut self, left: Operand, right: Operand, dest: Register) -> CompileResult<Operand> {
        if right.is_reg(dest) && !left.is_reg(dest) {
            self.emitter.mov(right, COUNTER)?;
            return Ok(Operand::Reg(COUNTER));
        }
        Ok(right)
    }

    fn multiply(&mut self, node: NodeId) -> CompileResult<()> {
        let Some(dest) = self.dest(node) else {
            return Ok(());
        };
        let (left, right) = self.binary_operands(node)?;
        if self.fold(&NodeKind::Mul, left, right, dest)? {
            return Ok(());
        }
        self.emitter.mov(left, ACCUMULATOR)?;
        self.emitter.imul(right, ACCUMULATOR)?;
        self.emitter.mov(Operand::Reg(ACCUMULATOR), dest)?;
        Ok(())
    }

    fn shift(&mut self, node: NodeId, kind: &NodeKind, mnemonic: &str) -> CompileResult<()> {
        let Some(dest) = self.dest(node) else {
            return Ok(());
        };
        let (left, right) = self.binary_operands(node)?;
        if self.fold(kind, left, right, dest)? {
            return Ok(());
        }
        let count = match right {
            Operand::Imm(value) => Operand::Imm(value & 31),
            other => {
                self.emitter.mov(other, COUNTER)?;
                Operand::Reg(COUNTER_LOW)
            }
        };
        self.emitter.mov_if_needed(left, dest)?;
        self.emitter.shift(mnemonic, count, dest)?;
        Ok(())
    }

    /// Signed division through `%edx:%eax`; `result` picks quotient or remainder.
    fn divide(&mut self, node: NodeId, result: Register) -> CompileResult<()> {
        let (left, right) = self.binary_operands(node)?;
        self.emitter.mov(right, COUNTER)?;
        let nonzero_literal = matches!(right, Operand::Imm(value) if value != 0);
        if self.guard_division && !nonzero_literal {
            self.emitter.cmp(Operand::Imm(0), COUNTER)?;
            self.emitter.jcc(Condition::Equal, DIV_BY_ZERO_LABEL)?;
        }
        self.emitter.mov(left, ACCUMULATOR)?;
        self.emitter.cltd()?;
        self.emitter.idiv(COUNTER)?;
        if let Some(dest) = self.dest(node) {
            self.emitter.mov(Operand::Reg(result), dest)?;
        }
        Ok(())
    }

    fn compare(&mut self, node: NodeId, kind: &NodeKind, condition: Condition) -> CompileResult<()> {
        let Some(dest) = self.dest(node) else {
            return Ok(());
        };
        let (left, right) = self.binary_operands(node)?;
        if self.fold(kind, left, right, dest)? {
            return Ok(());
        }
        let left = self.in_register(left, COUNTER)?;
        self.emitter.cmp(right, left)?;
        self.emitter.set(condition, ACCUMULATOR_LOW)?;
        self.emitter.movzbl(ACCUMULATOR_LOW, dest)?;
        Ok(())
    }

    /// Set `byte` to 1 if `value` is non-zero, else 0.
    fn normalize(&mut self, value: Operand, byte: Register) -> CompileResult<()> {
        let reg = self.in_register(value, DATA)?;
        self.emitter.cmp(Operand::Imm(0), reg)?;
        self.emitter.set(Condition::NotEqual, byte)?;
        Ok(())
    }

    fn logical(&mut self, node: NodeId, kind: &NodeKind, mnemonic: &str) -> CompileResult<()> {
        let Some(dest) = self.dest(node) else {
            return Ok(());
        };
        let (left, right) = self.binary_operands(node)?;
        if self.fold(kind, left, right, dest)? {
            return Ok(());
        }
        self.normalize(left, ACCUMULATOR_LOW)?;
        self.normalize(right, COUNTER_LOW)?;
        self.emitter.alu(mnemonic, Operand::Reg(COUNTER_LOW), ACCUMULATOR_LOW)?;
        self.emitter.movzbl(ACCUMULATOR_LOW, dest)?;
        Ok(())
    }

    fn logical_not(&mut self, node: NodeId) -> CompileResult<()> {
        let Some(dest) = self.dest(node) else {
            return Ok(());
        };
        let value = self.operand(self.graph.operands(node)[0])?;
        let reg = self.in_register(value, DATA)?;
        self.emitter.cmp(Operand::Imm(0), reg)?;
        self.emitter.set(Condition::Equal, ACCUMULATOR_LOW)?;
        self.emitter.movzbl(ACCUMULATOR_LOW, dest)?;
        Ok(())
    }

    /// Arguments go on the stack right to left, the caller pops them.
    fn call(&mut self, node: NodeId, callee: &str) -> CompileResult<()> {
        let arguments = &self.graph.operands(node)[Node::SIDE_EFFECT + 1..];
        let mut pushed = Vec::with_capacity(arguments.len());
        for &argument in arguments.iter().rev() {
            pushed.push(match self.operand(argument)? {
                Operand::Reg(reg) => Operand::Reg(widen(reg)),
                other => other,
            });
        }
        for value in pushed {
            self.emitter.push(value)?;
        }
        self.emitter.call(&function_label(callee))?;
        if !arguments.is_empty() {
            let bytes = STACK_SLOT * arguments.len() as i32;
            self.emitter.alu("add", Operand::Imm(bytes), STACK_POINTER)?;
        }
        if let Some(dest) = self.dest(node) {
            self.emitter.mov(Operand::Reg(ACCUMULATOR), dest)?;
        }
        Ok(())
    }

    fn ret(&mut self, node: NodeId) -> CompileResult<()> {
        let value = self.operand(self.graph.operands(node)[Node::RETURN_RESULT])?;
        self.emitter.mov_if_needed(value, ACCUMULATOR)?;
        if self.next_block.is_none() && self.stubs.is_empty() {
            return Ok(());
        }
        self.emitter.jmp(&self.epilogue_label())?;
        Ok(())
    }

    fn target(&self, control: NodeId) -> CompileResult<BlockId> {
        self.graph
            .target(control)
            .ok_or_else(|| CompileError::DanglingControl {
                function: self.graph.name().to_string(),
                node: control,
            })
    }

    fn projection(&self, branch: NodeId, kind: ProjectionKind) -> CompileResult<NodeId> {
        self.graph
            .projection(branch, kind)
            .ok_or_else(|| CompileError::DanglingControl {
                function: self.graph.name().to_string(),
                node: branch,
            })
    }

    fn jump_to(&mut self, target: BlockId) -> CompileResult<()> {
        if self.next_block == Some(target) {
            return Ok(());
        }
        self.emitter.jmp(&self.block_label(target))?;
        Ok(())
    }

    fn branch(&mut self, node: NodeId) -> CompileResult<()> {
        let on_true = self.projection(node, ProjectionKind::True)?;
        let on_false = self.projection(node, ProjectionKind::False)?;
        let true_target = self.target(on_true)?;
        let false_target = self.target(on_false)?;

        let false_label = if self.graph.value_phis(false_target).next().is_some() {
            let label = format!(".L{}_edge{}", self.graph.name(), self.stubs.len());
            self.stubs.push(EdgeStub {
                label: label.clone(),
                control: on_false,
                target: false_target,
            });
            label
        } else {
            self.block_label(false_target)
        };

        let condition = self.operand(self.graph.operands(node)[Node::CONDITION])?;
        let condition = self.in_register(condition, DATA)?;
        self.emitter.cmp(Operand::Imm(0), condition)?;
        self.emitter.jcc(Condition::Equal, &false_label)?;
        self.edge_moves(on_true, true_target)?;
        self.jump_to(true_target)
    }

    /// Copy the operands flowing along `control` into the phis of `target`.
    fn edge_moves(&mut self, control: NodeId, target: BlockId) -> CompileResult<()> {
        let predecessors = self.graph.predecessors(target);
        let Some(index) = predecessors.iter().position(|&p| p == control) else {
            return Err(CompileError::DanglingControl {
                function: self.graph.name().to_string(),
                node: control,
            });
        };

        let mut moves = Vec::new();
        for phi in self.graph.value_phis(target) {
            let operands = self.graph.operands(phi);
            if operands.len() != predecessors.len() {
                return Err(CompileError::MalformedPhi {
                    function: self.graph.name().to_string(),
                    phi,
                    operands: operands.len(),
                    predecessors: predecessors.len(),
                });
            }
            let Some(dest) = self.dest(phi) else {
                continue;
            };
            let source = self.operand(operands[index])?;
            if !source.is_reg(dest) {
                moves.push((source, dest));
            }
        }
        self.parallel_copy(&moves)
    }

    /// Perform all moves as if simultaneously.
    fn parallel_copy(&mut self, moves: &[(Operand, Register)]) -> CompileResult<()> {
        let overlapping = moves.iter().any(|&(source, _)| {
            moves
                .iter()
                .any(|&(_, dest)| source.is_reg(dest))
        });
        if !overlapping {
            for &(source, dest) in moves {
                self.emitter.mov(source, dest)?;
            }
            return Ok(());
        }

        trace!("staging {} phi copies through the stack", moves.len());
        for &(source, _) in moves {
            let source = match source {
                Operand::Reg(reg) => Operand::Reg(widen(reg)),
                other => other,
            };
            self.emitter.push(source)?;
        }
        for &(_, dest) in moves.iter().rev() {
            self.emitter.pop(widen(dest))?;
        }
        Ok(())
    }
}

/// Assembly symbol of a source-level function.
pub fn function_label(name: &str) -> String {
    format!("_{name}")
}
