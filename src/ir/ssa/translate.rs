// This module walks one function of the validated AST and drives the GraphConstructor. Every
// control construct gets explicit blocks: if/else and the ternary operator branch into arms
// that meet in a join block, while and for loops get a header that stays unsealed until the
// back edges are known, and every loop records where break and continue go on a small target
// stack. Code that follows a return, break or continue in the same statement list is never
// translated. Values that merge at joins become phis through ordinary variable reads, except
// for the ternary whose two arm values are merged with an explicit phi.

//! AST to graph translation for a single function.

use super::constructor::GraphConstructor;
use crate::ast::{BinaryOp, Expr, Function, Stmt};
use crate::ir::graph::Graph;
use crate::ir::node::{BlockId, NodeId, NodeKind, ProjectionKind};
use crate::ir::optimize::Optimizer;
use log::debug;

/// Where `break` and `continue` of the innermost loop transfer control.
#[derive(Debug, Clone, Copy)]
struct LoopTargets {
    continue_target: BlockId,
    break_target: BlockId,
}

/// Translation of one function into its graph.
pub struct SsaTranslation<'f, 'a, O: Optimizer> {
    function: &'f Function<'a>,
    optimizer: O,
}

impl<'f, 'a, O: Optimizer> SsaTranslation<'f, 'a, O> {
    pub fn new(function: &'f Function<'a>, optimizer: O) -> Self {
        Self {
            function,
            optimizer,
        }
    }

    pub fn translate(self) -> Graph {
        debug!("translating {}", self.function.name);
        let mut walker = Walker {
            builder: GraphConstructor::new(self.function.name, self.optimizer),
            loops: Vec::new(),
        };
        walker.function(self.function);
        walker.builder.finish()
    }
}

struct Walker<'a, O: Optimizer> {
    builder: GraphConstructor<'a, O>,
    loops: Vec<LoopTargets>,
}

impl<'a, O: Optimizer> Walker<'a, O> {
    fn function(&mut self, function: &Function<'a>) {
        let start = self.builder.current_block();
        for (index, parameter) in function.parameters.iter().enumerate() {
            let value = self.builder.new_parameter(index as u32);
            self.builder.write_variable(parameter.var, start, value);
        }

        self.statements(function.body);

        // Paths that fall off the end return 0.
        if self.builder.is_current_reachable() {
            let zero = self.builder.new_const_int(0);
            self.builder.new_return(zero);
        }
    }

    fn statements(&mut self, statements: &[&Stmt<'a>]) {
        for statement in statements {
            if !self.builder.is_current_reachable() {
                break;
            }
            self.statement(statement);
        }
    }

    /// Continue in a fresh block nothing jumps to.
    fn enter_unreachable(&mut self) {
        let block = self.builder.new_block();
        self.builder.seal_block(block);
        self.builder.set_current_block(block);
    }

    /// Create a sealed block entered only through `control`.
    fn enter_block_from(&mut self, control: NodeId) -> BlockId {
        let block = self.builder.new_block();
        self.builder.add_predecessor(block, control);
        self.builder.seal_block(block);
        self.builder.set_current_block(block);
        block
    }

    /// End the current block with a jump to `target` if control reaches it.
    fn jump_to(&mut self, target: BlockId) {
        if self.builder.is_current_reachable() {
            let jump = self.builder.new_jump();
            self.builder.add_predecessor(target, jump);
        }
    }

    fn statement(&mut self, statement: &Stmt<'a>) {
        match *statement {
            Stmt::Declare { var, init, .. } => {
                if let Some(init) = init {
                    let value = self.expression(init);
                    let block = self.builder.current_block();
                    self.builder.write_variable(var, block, value);
                }
            }
            Stmt::Assign { target, op, value } => {
                let value = match op.binary_op() {
                    Some(op) => {
                        let block = self.builder.current_block();
                        let current = self.builder.read_variable(target, block);
                        let rhs = self.expression(value);
                        self.binary(op, current, rhs)
                    }
                    None => self.expression(value),
                };
                let block = self.builder.current_block();
                self.builder.write_variable(target, block, value);
            }
            Stmt::Block(statements) => self.statements(statements),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => self.if_statement(condition, then_branch, else_branch),
            Stmt::While { condition, body } => self.loop_statement(condition, body, None),
            Stmt::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.statement(init);
                }
                self.loop_statement(condition, body, Some(step));
            }
            Stmt::Break => {
                if let Some(targets) = self.loops.last().copied() {
                    let node = self.builder.new_break();
                    self.builder.add_predecessor(targets.break_target, node);
                }
                self.enter_unreachable();
            }
            Stmt::Continue => {
                if let Some(targets) = self.loops.last().copied() {
                    let node = self.builder.new_continue();
                    self.builder.add_predecessor(targets.continue_target, node);
                }
                self.enter_unreachable();
            }
            Stmt::Return(value) => {
                let value = self.expression(value);
                self.builder.new_return(value);
                self.enter_unreachable();
            }
            Stmt::Expr(expr) => {
                self.expression(expr);
            }
        }
    }

    fn if_statement(
        &mut self,
        condition: &Expr<'a>,
        then_branch: &Stmt<'a>,
        else_branch: Option<&Stmt<'a>>,
    ) {
        let condition = self.expression(condition);
        let branch = self.builder.new_if(condition);
        let on_true = self.builder.new_projection(branch, ProjectionKind::True);
        let on_false = self.builder.new_projection(branch, ProjectionKind::False);
        let join = self.builder.new_block();

        self.enter_block_from(on_true);
        self.statement(then_branch);
        self.jump_to(join);

        match else_branch {
            Some(else_branch) => {
                self.enter_block_from(on_false);
                self.statement(else_branch);
                self.jump_to(join);
            }
            None => self.builder.add_predecessor(join, on_false),
        }

        self.builder.seal_block(join);
        self.builder.set_current_block(join);
    }

    /// `while` when `step` is `None`, otherwise `for` whose step may be empty.
    fn loop_statement(
        &mut self,
        condition: &Expr<'a>,
        body: &Stmt<'a>,
        step: Option<Option<&Stmt<'a>>>,
    ) {
        let header = self.builder.new_block();
        self.jump_to(header);
        self.builder.set_current_block(header);

        let condition = self.expression(condition);
        let branch = self.builder.new_while(condition);
        let on_true = self.builder.new_projection(branch, ProjectionKind::True);
        let on_false = self.builder.new_projection(branch, ProjectionKind::False);

        let exit = self.builder.new_block();
        self.builder.add_predecessor(exit, on_false);
        let latch = step.map(|_| self.builder.new_block());

        self.loops.push(LoopTargets {
            continue_target: latch.unwrap_or(header),
            break_target: exit,
        });
        self.enter_block_from(on_true);
        self.statement(body);
        self.jump_to(latch.unwrap_or(header));
        self.loops.pop();

        if let Some(latch) = latch {
            self.builder.seal_block(latch);
            self.builder.set_current_block(latch);
            if let Some(Some(step)) = step {
                if self.builder.is_current_reachable() {
                    self.statement(step);
                }
            }
            self.jump_to(header);
        }

        self.builder.seal_block(header);
        self.builder.seal_block(exit);
        self.builder.set_current_block(exit);
    }

    fn expression(&mut self, expr: &Expr<'a>) -> NodeId {
        match *expr {
            Expr::IntLiteral(value) => self.builder.new_const_int(value),
            Expr::BoolLiteral(value) => self.builder.new_const_bool(value),
            Expr::Var(var) => {
                let block = self.builder.current_block();
                self.builder.read_variable(var, block)
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.expression(lhs);
                let rhs = self.expression(rhs);
                self.binary(op, lhs, rhs)
            }
            Expr::Negate(operand) => {
                let zero = self.builder.new_const_int(0);
                let operand = self.expression(operand);
                self.builder.new_binary(NodeKind::Sub, zero, operand)
            }
            Expr::BitNot(operand) => {
                let operand = self.expression(operand);
                let all_ones = self.builder.new_const_int(-1);
                self.builder.new_binary(NodeKind::BitXor, operand, all_ones)
            }
            Expr::LogicalNot(operand) => {
                let operand = self.expression(operand);
                self.builder.new_logical_not(operand)
            }
            Expr::Ternary {
                condition,
                then_value,
                else_value,
            } => self.ternary(condition, then_value, else_value),
            Expr::Call { callee, args } => {
                let arguments: Vec<NodeId> = args.iter().map(|arg| self.expression(arg)).collect();
                self.builder.new_call(callee, &arguments)
            }
        }
    }

    fn ternary(
        &mut self,
        condition: &Expr<'a>,
        then_value: &Expr<'a>,
        else_value: &Expr<'a>,
    ) -> NodeId {
        let condition = self.expression(condition);
        let branch = self.builder.new_if(condition);
        let on_true = self.builder.new_projection(branch, ProjectionKind::True);
        let on_false = self.builder.new_projection(branch, ProjectionKind::False);
        let join = self.builder.new_block();

        let mut values = Vec::with_capacity(2);
        for (projection, value) in [(on_true, then_value), (on_false, else_value)] {
            self.enter_block_from(projection);
            values.push(self.expression(value));
            self.jump_to(join);
        }

        self.builder.seal_block(join);
        self.builder.set_current_block(join);
        if values[0] == values[1] {
            return values[0];
        }
        self.builder.new_value_phi(join, values)
    }

    fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        match op {
            BinaryOp::Div => self.builder.new_div(lhs, rhs),
            BinaryOp::Mod => self.builder.new_mod(lhs, rhs),
            _ => self.builder.new_binary(binary_kind(op), lhs, rhs),
        }
    }
}

fn binary_kind(op: BinaryOp) -> NodeKind {
    match op {
        BinaryOp::Add => NodeKind::Add,
        BinaryOp::Sub => NodeKind::Sub,
        BinaryOp::Mul => NodeKind::Mul,
        BinaryOp::Div => NodeKind::Div,
        BinaryOp::Mod => NodeKind::Mod,
        BinaryOp::BitAnd => NodeKind::BitAnd,
        BinaryOp::BitOr => NodeKind::BitOr,
        BinaryOp::BitXor => NodeKind::BitXor,
        BinaryOp::ShiftLeft => NodeKind::ShiftLeft,
        BinaryOp::ShiftRight => NodeKind::ShiftRight,
        BinaryOp::Less => NodeKind::Less,
        BinaryOp::LessEqual => NodeKind::LessEqual,
        BinaryOp::Greater => NodeKind::Greater,
        BinaryOp::GreaterEqual => NodeKind::GreaterEqual,
        BinaryOp::Equal => NodeKind::Equal,
        BinaryOp::NotEqual => NodeKind::NotEqual,
        BinaryOp::LogicalAnd => NodeKind::LogicalAnd,
        BinaryOp::LogicalOr => NodeKind::LogicalOr,
    }
}
