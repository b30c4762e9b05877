// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession borrows the arena that outlives every AST node of one compilation and
// accumulates statistics across the pipeline: graph sizes after SSA construction, phi counts, virtual and physical
// register usage after allocation, and instruction counts after code generation. Statistics
// live behind a RefCell so the pipeline can record them through a shared reference.

//! Arena-based compilation session management.
//!
//! All AST nodes share the session lifetime, so the pipeline can pass plain
//! references around without lifetime juggling.

use bumpalo::Bump;
use std::cell::RefCell;
use std::fmt;

/// Per-function numbers reported to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionStats {
    pub nodes: usize,
    pub blocks: usize,
    pub phis: usize,
    pub virtual_registers: usize,
    pub physical_registers: usize,
    pub instructions: usize,
}

/// Arena-based compilation session.
pub struct CompilationSession<'arena> {
    /// Arena allocator for compilation objects.
    arena: &'arena Bump,

    /// Session statistics for debugging and optimization.
    stats: RefCell<SessionStats>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
        }
    }

    /// Arena the program's AST is built in.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Record that a function was compiled.
    pub fn record_function_compiled(&self, name: &str, function: FunctionStats) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_compiled += 1;
        stats.nodes_built += function.nodes;
        stats.blocks_built += function.blocks;
        stats.phis_created += function.phis;
        stats.virtual_registers += function.virtual_registers;
        stats.physical_registers += function.physical_registers;
        stats.instructions_emitted += function.instructions;

        if stats.largest_function_size < function.instructions {
            stats.largest_function_size = function.instructions;
            stats.largest_function_name = name.to_string();
        }
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of functions compiled.
    pub functions_compiled: usize,

    /// Graph nodes created, including ones the optimizer replaced.
    pub nodes_built: usize,

    pub blocks_built: usize,

    /// Value and side-effect phis.
    pub phis_created: usize,

    pub virtual_registers: usize,

    /// Pool registers used, summed over functions.
    pub physical_registers: usize,

    pub instructions_emitted: usize,

    /// Largest function compiled, in instructions.
    pub largest_function_size: usize,

    /// Name of largest function.
    pub largest_function_name: String,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Functions compiled: {}", self.functions_compiled)?;
        writeln!(f, "  Nodes built: {}", self.nodes_built)?;
        writeln!(f, "  Blocks built: {}", self.blocks_built)?;
        writeln!(f, "  Phis created: {}", self.phis_created)?;
        writeln!(f, "  Virtual registers: {}", self.virtual_registers)?;
        writeln!(f, "  Physical registers: {}", self.physical_registers)?;
        writeln!(f, "  Instructions emitted: {}", self.instructions_emitted)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} instructions)",
                self.largest_function_name, self.largest_function_size
            )?;
        }

        Ok(())
    }
}
