//! Prints the assembly of the bundled sample programs.
//!
//! ```text
//! emit_samples --list
//! emit_samples while --strategy modulo -o while.s
//! ```

use bumpalo::Bump;
use clap::Parser;
use minic_backend::ast::AstBuilder;
use minic_backend::{samples, BackendConfig, CompilationSession, Compiler, RegisterStrategy};
use std::fs;

#[derive(Parser)]
#[command(about = "Compile a bundled sample program to x86-64 assembly")]
struct Cli {
    /// Sample to compile.
    #[arg(required_unless_present = "list")]
    sample: Option<String>,

    /// List the samples with their expected exit codes.
    #[arg(long)]
    list: bool,

    /// Physical register strategy (`dedicated` or `modulo`).
    #[arg(long)]
    strategy: Option<RegisterStrategy>,

    /// Divide without checking for a zero divisor.
    #[arg(long)]
    no_div_guard: bool,

    /// Build graphs without the local optimizer.
    #[arg(long)]
    no_optimize: bool,

    /// Omit the `main` entry trampoline.
    #[arg(long)]
    no_entry: bool,

    /// Print each function's graph to stderr.
    #[arg(long)]
    dump_ir: bool,

    /// Print session statistics to stderr.
    #[arg(long)]
    stats: bool,

    /// Write the assembly here instead of stdout.
    #[arg(short, long)]
    output: Option<String>,
}

impl Cli {
    fn config(&self) -> BackendConfig {
        let mut config = BackendConfig::from_env();
        if let Some(strategy) = self.strategy {
            config = config.with_register_strategy(strategy);
        }
        if self.no_div_guard {
            config = config.with_division_guard(false);
        }
        if self.no_optimize {
            config = config.with_optimizer(false);
        }
        if self.no_entry {
            config = config.with_entry_trampoline(false);
        }
        config
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list {
        for sample in samples::all() {
            println!("{:<16} exit {:>3}  {}", sample.name, sample.expected_exit, sample.source);
        }
        return Ok(());
    }

    let name = cli.sample.as_deref().unwrap_or_default();
    let Some(sample) = samples::find(name) else {
        eprintln!("Error: unknown sample `{name}` (see --list)");
        std::process::exit(1);
    };

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let program = sample.program(AstBuilder::new(session.arena()));
    let compiler = Compiler::new(&session, cli.config());

    if cli.dump_ir {
        for function in program.functions {
            eprintln!("{}", compiler.build_graph(function));
        }
    }

    let asm = match compiler.compile_program(&program) {
        Ok(asm) => asm,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match &cli.output {
        Some(path) => fs::write(path, &asm)?,
        None => print!("{asm}"),
    }
    if cli.stats {
        eprint!("{}", session.stats());
    }
    Ok(())
}
