// This module defines the abstract syntax tree the backend consumes. The front-end (lexer,
// parser, semantic analysis) is an external collaborator: by the time a Program reaches this
// crate every identifier has been resolved to a scope, every expression is well typed, and
// break/continue only appear inside loops. Trees are allocated in a bumpalo arena and hold
// plain shared references to their children, so they are Copy and cheap to walk. The
// builder submodule offers a small construction API used by tests and the sample programs.

//! Validated AST input.
//!
//! Nothing in here is checked again by the backend; see the crate docs for the
//! guarantees the front-end has to provide.

pub mod builder;

pub use builder::AstBuilder;

/// Identifier of the lexical scope a name was resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

/// A resolved variable reference.
///
/// Two references denote the same variable exactly when name and scope match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var<'a> {
    pub name: &'a str,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    LogicalAnd,
    LogicalOr,
}

/// Assignment operators. Compound forms desugar to the matching [`BinaryOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, `None` for plain `=`.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
            AssignOp::ShiftLeft => Some(BinaryOp::ShiftLeft),
            AssignOp::ShiftRight => Some(BinaryOp::ShiftRight),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Expr<'a> {
    /// Integer literal, already range checked and wrapped to 32 bits.
    IntLiteral(i32),
    BoolLiteral(bool),
    Var(Var<'a>),
    Binary {
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    },
    /// Arithmetic negation `-e`.
    Negate(&'a Expr<'a>),
    /// Bitwise complement `~e`.
    BitNot(&'a Expr<'a>),
    /// Logical negation `!e`.
    LogicalNot(&'a Expr<'a>),
    Ternary {
        condition: &'a Expr<'a>,
        then_value: &'a Expr<'a>,
        else_value: &'a Expr<'a>,
    },
    Call {
        callee: &'a str,
        args: &'a [&'a Expr<'a>],
    },
}

#[derive(Debug, Clone, Copy)]
pub enum Stmt<'a> {
    Declare {
        var: Var<'a>,
        ty: Type,
        init: Option<&'a Expr<'a>>,
    },
    Assign {
        target: Var<'a>,
        op: AssignOp,
        value: &'a Expr<'a>,
    },
    Block(&'a [&'a Stmt<'a>]),
    If {
        condition: &'a Expr<'a>,
        then_branch: &'a Stmt<'a>,
        else_branch: Option<&'a Stmt<'a>>,
    },
    While {
        condition: &'a Expr<'a>,
        body: &'a Stmt<'a>,
    },
    For {
        init: Option<&'a Stmt<'a>>,
        condition: &'a Expr<'a>,
        step: Option<&'a Stmt<'a>>,
        body: &'a Stmt<'a>,
    },
    Break,
    Continue,
    Return(&'a Expr<'a>),
    /// Expression evaluated for its side effects, e.g. a call.
    Expr(&'a Expr<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct Parameter<'a> {
    pub var: Var<'a>,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy)]
pub struct Function<'a> {
    pub name: &'a str,
    pub return_type: Type,
    pub parameters: &'a [Parameter<'a>],
    pub body: &'a [&'a Stmt<'a>],
}

#[derive(Debug, Clone, Copy)]
pub struct Program<'a> {
    pub functions: &'a [Function<'a>],
}

impl<'a> Program<'a> {
    pub fn function(&self, name: &str) -> Option<&Function<'a>> {
        self.functions.iter().find(|f| f.name == name)
    }
}
