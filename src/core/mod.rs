// This module groups the infrastructure shared by every stage of the backend: the arena-backed
// compilation session with its statistics, backend configuration, the error taxonomy, the
// physical register bookkeeping used by the allocator, and the driver that runs SSA
// construction, register allocation and code generation for each function of a program.

//! Core backend infrastructure.
//!
//! # Key Components
//!
//! ## Session Management (`session`)
//! - Arena-based memory allocation using `bumpalo`
//! - Compilation statistics
//!
//! ## Register Bookkeeping (`register_file`)
//! - Ordered allocation pool with bitset tracking
//! - Clobber tracking for callee saves
//!
//! ## Driver (`compiler`)
//! - Per-function build, allocate, generate
//! - Program layout around the generated functions

pub mod compiler;
pub mod config;
pub mod error;
pub mod register_file;
pub mod session;
pub mod test_utils;

pub use compiler::Compiler;
pub use config::BackendConfig;
pub use error::{CompileError, CompileResult};
pub use register_file::{AsmReg, RegAllocError, RegBitSet, RegisterFile};
pub use session::{CompilationSession, FunctionStats, SessionStats};
