//! Arena-backed construction helpers for [`super::Program`] trees.
//!
//! ```ignore
//! let arena = Bump::new();
//! let ast = AstBuilder::new(&arena);
//! let sum = ast.binary(BinaryOp::Add, ast.int(1), ast.int(2));
//! let main = ast.function("main", &[], &[ast.ret(sum)]);
//! let program = ast.program(&[main]);
//! ```

use super::{
    AssignOp, BinaryOp, Expr, Function, Parameter, Program, ScopeId, Stmt, Type, Var,
};
use bumpalo::Bump;

/// Allocates AST nodes in a borrowed arena.
#[derive(Clone, Copy)]
pub struct AstBuilder<'a> {
    arena: &'a Bump,
}

impl<'a> AstBuilder<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }

    fn expr(&self, expr: Expr<'a>) -> &'a Expr<'a> {
        self.arena.alloc(expr)
    }

    fn stmt(&self, stmt: Stmt<'a>) -> &'a Stmt<'a> {
        self.arena.alloc(stmt)
    }

    /// A variable reference resolved in `scope`.
    pub fn var_ref(&self, name: &str, scope: u32) -> Var<'a> {
        Var {
            name: self.arena.alloc_str(name),
            scope: ScopeId(scope),
        }
    }

    pub fn int(&self, value: i32) -> &'a Expr<'a> {
        self.expr(Expr::IntLiteral(value))
    }

    pub fn boolean(&self, value: bool) -> &'a Expr<'a> {
        self.expr(Expr::BoolLiteral(value))
    }

    pub fn var(&self, name: &str, scope: u32) -> &'a Expr<'a> {
        let var = self.var_ref(name, scope);
        self.expr(Expr::Var(var))
    }

    pub fn binary(&self, op: BinaryOp, lhs: &'a Expr<'a>, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.expr(Expr::Binary { op, lhs, rhs })
    }

    pub fn negate(&self, operand: &'a Expr<'a>) -> &'a Expr<'a> {
        self.expr(Expr::Negate(operand))
    }

    pub fn bit_not(&self, operand: &'a Expr<'a>) -> &'a Expr<'a> {
        self.expr(Expr::BitNot(operand))
    }

    pub fn not(&self, operand: &'a Expr<'a>) -> &'a Expr<'a> {
        self.expr(Expr::LogicalNot(operand))
    }

    pub fn ternary(
        &self,
        condition: &'a Expr<'a>,
        then_value: &'a Expr<'a>,
        else_value: &'a Expr<'a>,
    ) -> &'a Expr<'a> {
        self.expr(Expr::Ternary {
            condition,
            then_value,
            else_value,
        })
    }

    pub fn call(&self, callee: &str, args: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        self.expr(Expr::Call {
            callee: self.arena.alloc_str(callee),
            args: self.arena.alloc_slice_copy(args),
        })
    }

    pub fn declare(
        &self,
        name: &str,
        scope: u32,
        ty: Type,
        init: Option<&'a Expr<'a>>,
    ) -> &'a Stmt<'a> {
        let var = self.var_ref(name, scope);
        self.stmt(Stmt::Declare { var, ty, init })
    }

    pub fn assign(&self, name: &str, scope: u32, value: &'a Expr<'a>) -> &'a Stmt<'a> {
        self.compound_assign(name, scope, AssignOp::Assign, value)
    }

    pub fn compound_assign(
        &self,
        name: &str,
        scope: u32,
        op: AssignOp,
        value: &'a Expr<'a>,
    ) -> &'a Stmt<'a> {
        let target = self.var_ref(name, scope);
        self.stmt(Stmt::Assign { target, op, value })
    }

    pub fn block(&self, stmts: &[&'a Stmt<'a>]) -> &'a Stmt<'a> {
        self.stmt(Stmt::Block(self.arena.alloc_slice_copy(stmts)))
    }

    pub fn if_else(
        &self,
        condition: &'a Expr<'a>,
        then_branch: &'a Stmt<'a>,
        else_branch: Option<&'a Stmt<'a>>,
    ) -> &'a Stmt<'a> {
        self.stmt(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn while_loop(&self, condition: &'a Expr<'a>, body: &'a Stmt<'a>) -> &'a Stmt<'a> {
        self.stmt(Stmt::While { condition, body })
    }

    pub fn for_loop(
        &self,
        init: Option<&'a Stmt<'a>>,
        condition: &'a Expr<'a>,
        step: Option<&'a Stmt<'a>>,
        body: &'a Stmt<'a>,
    ) -> &'a Stmt<'a> {
        self.stmt(Stmt::For {
            init,
            condition,
            step,
            body,
        })
    }

    pub fn break_stmt(&self) -> &'a Stmt<'a> {
        self.stmt(Stmt::Break)
    }

    pub fn continue_stmt(&self) -> &'a Stmt<'a> {
        self.stmt(Stmt::Continue)
    }

    pub fn ret(&self, value: &'a Expr<'a>) -> &'a Stmt<'a> {
        self.stmt(Stmt::Return(value))
    }

    pub fn expr_stmt(&self, expr: &'a Expr<'a>) -> &'a Stmt<'a> {
        self.stmt(Stmt::Expr(expr))
    }

    pub fn param(&self, name: &str, scope: u32, ty: Type) -> Parameter<'a> {
        Parameter {
            var: self.var_ref(name, scope),
            ty,
        }
    }

    /// An `int`-returning function.
    pub fn function(
        &self,
        name: &str,
        parameters: &[Parameter<'a>],
        body: &[&'a Stmt<'a>],
    ) -> Function<'a> {
        Function {
            name: self.arena.alloc_str(name),
            return_type: Type::Int,
            parameters: self.arena.alloc_slice_copy(parameters),
            body: self.arena.alloc_slice_copy(body),
        }
    }

    pub fn program(&self, functions: &[Function<'a>]) -> Program<'a> {
        Program {
            functions: self.arena.alloc_slice_copy(functions),
        }
    }
}
