//! Program-level assembly layout.
//!
//! Wraps the per-function text in the section header, the optional process
//! entry trampoline and the shared division-by-zero stub.

use super::codegen::{function_label, FunctionAsm};
use super::emitter::{Emitter, Operand};
use super::registers::ACCUMULATOR;
use iced_x86::Register;
use std::fmt;

/// Shared target of every division guard.
pub const DIV_BY_ZERO_LABEL: &str = ".Lfatal_div_by_zero";

/// Exit status of a program that divided by zero. Matches the status a shell
/// reports for a process killed by SIGFPE (128 + 8).
pub const DIV_BY_ZERO_STATUS: i32 = 136;

const SYS_EXIT: i32 = 60;

/// What surrounds the functions in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramLayout {
    pub entry_trampoline: bool,
    pub division_stub: bool,
}

/// Concatenate `functions` into one assembly file.
pub fn assemble(functions: &[FunctionAsm], layout: ProgramLayout) -> Result<String, fmt::Error> {
    let mut out = Emitter::new();
    out.directive(".section .text")?;
    if layout.entry_trampoline {
        out.directive(".global main")?;
        out.label("main")?;
        out.call(&function_label("main"))?;
        out.mov(Operand::Reg(ACCUMULATOR), Register::EDI)?;
        exit(&mut out)?;
    } else {
        for function in functions {
            out.directive(&format!(".global {}", function_label(&function.name)))?;
        }
    }

    let mut text = out.finish();
    for function in functions {
        text.push('\n');
        text.push_str(&function.text);
    }

    if layout.division_stub {
        let mut stub = Emitter::new();
        stub.label(DIV_BY_ZERO_LABEL)?;
        stub.mov(Operand::Imm(DIV_BY_ZERO_STATUS), Register::EDI)?;
        exit(&mut stub)?;
        text.push('\n');
        text.push_str(&stub.finish());
    }
    Ok(text)
}

/// `exit(%edi)` via the raw system call.
fn exit(out: &mut Emitter) -> fmt::Result {
    out.mov(Operand::Imm(SYS_EXIT), ACCUMULATOR)?;
    out.syscall()
}
