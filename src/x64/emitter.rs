// This module renders x86-64 instructions as AT&T assembly text. Emitter keeps the output
// buffer and an instruction counter, and offers one method per instruction form the code
// generator uses: moves, two-operand ALU ops, negation, multiply and divide helpers, shifts,
// compare and setcc, stack traffic, calls, jumps and returns. Operand sizes come from the
// iced-x86 register model so 32-bit values print with the `l` suffix and stack traffic with
// `q`. Labels and directives are written unindented, instructions with four spaces.

//! AT&T syntax text emission.

use super::registers::{att_name, size_suffix};
use iced_x86::Register;
use std::fmt::{self, Write};

/// Source or destination of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Register),
    Imm(i32),
    /// `offset(base)`
    Mem { base: Register, offset: i32 },
}

impl Operand {
    pub fn is_reg(self, reg: Register) -> bool {
        self == Operand::Reg(reg)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operand::Reg(reg) => write!(f, "%{}", att_name(reg)),
            Operand::Imm(value) => write!(f, "${value}"),
            Operand::Mem { base, offset } => write!(f, "{offset}(%{})", att_name(base)),
        }
    }
}

/// Condition codes for `setcc` and `jcc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Condition {
    pub fn suffix(self) -> &'static str {
        match self {
            Condition::Equal => "e",
            Condition::NotEqual => "ne",
            Condition::Less => "l",
            Condition::LessEqual => "le",
            Condition::Greater => "g",
            Condition::GreaterEqual => "ge",
        }
    }
}

/// Assembly text builder.
#[derive(Debug, Default)]
pub struct Emitter {
    text: String,
    instructions: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions written so far.
    pub fn instruction_count(&self) -> usize {
        self.instructions
    }

    pub fn finish(self) -> String {
        self.text
    }

    pub fn label(&mut self, label: &str) -> fmt::Result {
        writeln!(self.text, "{label}:")
    }

    pub fn directive(&mut self, directive: &str) -> fmt::Result {
        writeln!(self.text, "{directive}")
    }

    fn instruction(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        self.instructions += 1;
        writeln!(self.text, "    {args}")
    }

    /// `op src, dst` with the size suffix of `dst`.
    pub fn alu(&mut self, mnemonic: &str, src: Operand, dst: Register) -> fmt::Result {
        let suffix = size_suffix(dst);
        self.instruction(format_args!("{mnemonic}{suffix} {src}, {}", Operand::Reg(dst)))
    }

    pub fn mov(&mut self, src: Operand, dst: Register) -> fmt::Result {
        self.alu("mov", src, dst)
    }

    /// `mov` unless `src` already is `dst`.
    pub fn mov_if_needed(&mut self, src: Operand, dst: Register) -> fmt::Result {
        if src.is_reg(dst) {
            return Ok(());
        }
        self.mov(src, dst)
    }

    pub fn neg(&mut self, dst: Register) -> fmt::Result {
        let suffix = size_suffix(dst);
        self.instruction(format_args!("neg{suffix} {}", Operand::Reg(dst)))
    }

    /// `imul src, dst`; immediates use the three-operand form.
    pub fn imul(&mut self, src: Operand, dst: Register) -> fmt::Result {
        let suffix = size_suffix(dst);
        let dst = Operand::Reg(dst);
        match src {
            Operand::Imm(_) => self.instruction(format_args!("imul{suffix} {src}, {dst}, {dst}")),
            _ => self.instruction(format_args!("imul{suffix} {src}, {dst}")),
        }
    }

    /// Sign-extend `%eax` into `%edx:%eax`.
    pub fn cltd(&mut self) -> fmt::Result {
        self.instruction(format_args!("cltd"))
    }

    pub fn idiv(&mut self, divisor: Register) -> fmt::Result {
        let suffix = size_suffix(divisor);
        self.instruction(format_args!("idiv{suffix} {}", Operand::Reg(divisor)))
    }

    /// Shift `dst` by an immediate or by `%cl`.
    pub fn shift(&mut self, mnemonic: &str, count: Operand, dst: Register) -> fmt::Result {
        self.alu(mnemonic, count, dst)
    }

    /// `cmp src, dst`, i.e. flags of `dst - src`.
    pub fn cmp(&mut self, src: Operand, dst: Register) -> fmt::Result {
        self.alu("cmp", src, dst)
    }

    pub fn set(&mut self, condition: Condition, dst: Register) -> fmt::Result {
        let suffix = condition.suffix();
        self.instruction(format_args!("set{suffix} {}", Operand::Reg(dst)))
    }

    /// Zero-extend a byte register into a 32-bit register.
    pub fn movzbl(&mut self, src: Register, dst: Register) -> fmt::Result {
        self.instruction(format_args!(
            "movzbl {}, {}",
            Operand::Reg(src),
            Operand::Reg(dst)
        ))
    }

    pub fn push(&mut self, src: Operand) -> fmt::Result {
        self.instruction(format_args!("pushq {src}"))
    }

    pub fn pop(&mut self, dst: Register) -> fmt::Result {
        self.instruction(format_args!("popq {}", Operand::Reg(dst)))
    }

    pub fn call(&mut self, label: &str) -> fmt::Result {
        self.instruction(format_args!("call {label}"))
    }

    pub fn jmp(&mut self, label: &str) -> fmt::Result {
        self.instruction(format_args!("jmp {label}"))
    }

    pub fn jcc(&mut self, condition: Condition, label: &str) -> fmt::Result {
        let suffix = condition.suffix();
        self.instruction(format_args!("j{suffix} {label}"))
    }

    pub fn ret(&mut self) -> fmt::Result {
        self.instruction(format_args!("ret"))
    }

    pub fn syscall(&mut self) -> fmt::Result {
        self.instruction(format_args!("syscall"))
    }
}
