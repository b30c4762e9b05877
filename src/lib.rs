//! minic-backend - SSA compilation of a small C-like language to x86-64.
//!
//! The backend takes a front-end validated AST, builds a per-function node
//! graph in SSA form (Braun et al.), optionally rewrites every node through a
//! local optimizer while it is built, assigns registers and prints GNU
//! assembler (AT&T syntax) for the whole program.
//!
//! # Primary Usage
//!
//! ```ignore
//! use minic_backend::{ast::AstBuilder, BackendConfig, CompilationSession, Compiler};
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let ast = AstBuilder::new(&arena);
//! let program = ast.program(&[ast.function("main", &[], &[ast.ret(ast.int(7))])]);
//!
//! let session = CompilationSession::new(&arena);
//! let asm = Compiler::new(&session, BackendConfig::default()).compile_program(&program)?;
//! ```
//!
//! # Front-end guarantees
//!
//! Nothing the front-end already checked is checked again: names are
//! resolved to scopes, every variable is declared before use, expressions are
//! well typed, `break`/`continue` only appear inside loops and literals fit
//! in 32 bits.
//!
//! # Architecture
//!
//! - [`ast`] - validated input trees
//! - [`ir`] - node graph, optimizer hook, SSA construction
//! - [`regalloc`] - virtual and physical register assignment
//! - [`x64`] - instruction selection and assembly text
//! - [`core`] - session, configuration, errors, the pipeline driver
//! - [`samples`] - bundled programs with known exit codes

pub mod ast;
pub mod core;
pub mod ir;
pub mod regalloc;
pub mod samples;
pub mod x64;

pub use core::{
    BackendConfig, CompilationSession, CompileError, CompileResult, Compiler, FunctionStats,
    SessionStats,
};
pub use ir::{Graph, LocalOptimizer, NoOptimizer, Optimizer};
pub use regalloc::{RegisterAllocator, RegisterMap, RegisterStrategy};
pub use x64::{CodeGenerator, FunctionAsm};
