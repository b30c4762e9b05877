// This module defines the pipeline driver. Compiler takes a validated program and, for each
// function in source order, builds its graph with the configured optimizer, checks that every
// call targets a function of the program, allocates registers, and generates the function's
// assembly. The per-function texts are then wrapped by the program layout: the optional entry
// trampoline and, when division guarding is on, the shared fatal stub. Functions are
// independent of each other; the first error aborts the whole compilation.

//! Pipeline driver.
//!
//! ```ignore
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let program = /* built with ast::AstBuilder over `arena` */;
//! let asm = Compiler::new(&session, BackendConfig::default()).compile_program(&program)?;
//! ```

use super::config::BackendConfig;
use super::error::{CompileError, CompileResult};
use super::session::{CompilationSession, FunctionStats};
use crate::ast::{Function, Program};
use crate::ir::{Graph, LocalOptimizer, NoOptimizer, NodeKind, Optimizer, SsaTranslation};
use crate::regalloc::RegisterAllocator;
use crate::x64::{assemble, CodeGenerator, FunctionAsm, ProgramLayout};
use hashbrown::HashSet;
use log::{debug, info};

pub struct Compiler<'s, 'arena> {
    session: &'s CompilationSession<'arena>,
    config: BackendConfig,
}

impl<'s, 'arena> Compiler<'s, 'arena> {
    pub fn new(session: &'s CompilationSession<'arena>, config: BackendConfig) -> Self {
        Self { session, config }
    }

    /// Assembly text for the whole program.
    pub fn compile_program(&self, program: &Program<'_>) -> CompileResult<String> {
        if self.config.entry_trampoline && program.function("main").is_none() {
            return Err(CompileError::UnknownFunction {
                name: "main".to_string(),
            });
        }

        let known: HashSet<&str> = program.functions.iter().map(|f| f.name).collect();
        let functions = program
            .functions
            .iter()
            .map(|function| self.compile_function(function, &known))
            .collect::<CompileResult<Vec<FunctionAsm>>>()?;

        let layout = ProgramLayout {
            entry_trampoline: self.config.entry_trampoline,
            division_stub: self.config.guard_division,
        };
        let text = assemble(&functions, layout)?;
        info!(
            "compiled {} functions, {} instructions",
            functions.len(),
            functions.iter().map(|f| f.instructions).sum::<usize>()
        );
        Ok(text)
    }

    /// The optimizer selected by the configuration, fresh for one function.
    fn optimizer(&self) -> Box<dyn Optimizer> {
        if self.config.optimize {
            Box::new(LocalOptimizer::new())
        } else {
            Box::new(NoOptimizer)
        }
    }

    /// SSA construction for one function.
    pub fn build_graph(&self, function: &Function<'_>) -> Graph {
        SsaTranslation::new(function, self.optimizer()).translate()
    }

    /// Build, allocate and generate one function. `known` holds the names
    /// calls may target.
    pub fn compile_function(
        &self,
        function: &Function<'_>,
        known: &HashSet<&str>,
    ) -> CompileResult<FunctionAsm> {
        let graph = self.build_graph(function);
        check_calls(&graph, known)?;

        let registers = RegisterAllocator::new(self.config.register_strategy).allocate(&graph)?;
        let asm = CodeGenerator::new(&graph, &registers)
            .with_division_guard(self.config.guard_division)
            .generate()?;

        let stats = FunctionStats {
            nodes: graph.node_count(),
            blocks: graph.block_count(),
            phis: graph.phi_count(),
            virtual_registers: registers.virtual_count() as usize,
            physical_registers: registers.used_registers().len(),
            instructions: asm.instructions,
        };
        debug!("{}: {stats:?}", function.name);
        self.session.record_function_compiled(function.name, stats);
        Ok(asm)
    }
}

fn check_calls(graph: &Graph, known: &HashSet<&str>) -> CompileResult<()> {
    for block in graph.block_ids() {
        for &node in graph.block(block).nodes() {
            if let NodeKind::Call(callee) = graph.kind(node) {
                if !known.contains(callee.as_str()) {
                    return Err(CompileError::UnknownFunction {
                        name: callee.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
