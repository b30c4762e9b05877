// This module defines error types for the backend using the thiserror crate. CompileError
// covers every way compiling a function can fail: the dedicated register strategy running out
// of physical registers, phis whose operand count does not match their block, reachable blocks
// without a terminator, values reaching code generation without a register, control nodes that
// were never linked to a target, calls to functions the program does not define, and
// formatting failures while writing assembly text. Every variant carries the function name and
// the ids involved so a failure can be traced back to a graph dump. All of these are internal
// invariant violations or resource exhaustion; none is retried.

//! Error types for the backend.

use crate::core::register_file::RegAllocError;
use crate::ir::{BlockId, NodeId};
use thiserror::Error;

/// Main error type for compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Out of physical registers in {function}: {required} values, {available} registers")]
    OutOfRegisters {
        function: String,
        required: usize,
        available: usize,
    },

    #[error("Malformed phi {phi} in {function}: {operands} operands for {predecessors} predecessors")]
    MalformedPhi {
        function: String,
        phi: NodeId,
        operands: usize,
        predecessors: usize,
    },

    #[error("Block {block} in {function} has no terminator")]
    MissingTerminator { function: String, block: BlockId },

    #[error("Value {node} in {function} has no register")]
    MissingRegister { function: String, node: NodeId },

    #[error("Control node {node} in {function} has no target block")]
    DanglingControl { function: String, node: NodeId },

    #[error("Call to unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Register pool error in {function}: {error}")]
    RegisterPool {
        function: String,
        error: RegAllocError,
    },

    #[error("Failed to write assembly text")]
    Format(#[from] std::fmt::Error),
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
