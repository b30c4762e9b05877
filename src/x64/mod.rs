//! x86-64 architecture-specific components.
//!
//! This module contains all x86-64 specific code:
//! - Register model and allocation pool on top of iced-x86
//! - AT&T text emission
//! - Instruction selection and control-flow lowering per function
//! - Program layout (entry trampoline, fatal stubs)

pub mod codegen;
pub mod emitter;
pub mod program;
pub mod registers;

pub use codegen::{function_label, CodeGenerator, FunctionAsm};
pub use emitter::{Condition, Emitter, Operand};
pub use program::{assemble, ProgramLayout, DIV_BY_ZERO_LABEL, DIV_BY_ZERO_STATUS};
pub use registers::ALLOCATION_POOL;
