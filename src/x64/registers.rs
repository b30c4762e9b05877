// This module connects the backend's AsmReg ids to iced-x86's register model and to AT&T
// register names. Values are 32-bit, so codegen works with the 32-bit views (ebx, r8d, ...)
// and widens to the 64-bit view for stack traffic (pushq/popq). The allocation pool is every
// general purpose register except the stack and frame pointers and the three scratch registers
// eax, ecx and edx, which instruction selection needs for multiply, divide, shifts and
// condition-code materialization.

//! x86-64 general purpose registers for the code generator.

use crate::core::register_file::{AsmReg, GP_BANK};
use iced_x86::Register;

const GP64_REGS: [Register; 16] = [
    Register::RAX, Register::RCX, Register::RDX, Register::RBX,
    Register::RSP, Register::RBP, Register::RSI, Register::RDI,
    Register::R8, Register::R9, Register::R10, Register::R11,
    Register::R12, Register::R13, Register::R14, Register::R15,
];

const GP32_REGS: [Register; 16] = [
    Register::EAX, Register::ECX, Register::EDX, Register::EBX,
    Register::ESP, Register::EBP, Register::ESI, Register::EDI,
    Register::R8D, Register::R9D, Register::R10D, Register::R11D,
    Register::R12D, Register::R13D, Register::R14D, Register::R15D,
];

const GP64_NAMES: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi",
    "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
];

const GP32_NAMES: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi",
    "r8d", "r9d", "r10d", "r11d", "r12d", "r13d", "r14d", "r15d",
];

const GP8_REGS: [Register; 4] = [Register::AL, Register::CL, Register::DL, Register::BL];
const GP8_NAMES: [&str; 4] = ["al", "cl", "dl", "bl"];

/// Registers handed out to values, in allocation order.
pub static ALLOCATION_POOL: [AsmReg; 11] = [
    AsmReg::gp(3),  // rbx
    AsmReg::gp(6),  // rsi
    AsmReg::gp(7),  // rdi
    AsmReg::gp(8),  // r8
    AsmReg::gp(9),  // r9
    AsmReg::gp(10), // r10
    AsmReg::gp(11), // r11
    AsmReg::gp(12), // r12
    AsmReg::gp(13), // r13
    AsmReg::gp(14), // r14
    AsmReg::gp(15), // r15
];

/// Scratch registers used by instruction selection; never allocated.
pub const ACCUMULATOR: Register = Register::EAX;
pub const COUNTER: Register = Register::ECX;
pub const DATA: Register = Register::EDX;

/// Low byte views used for `setcc`.
pub const ACCUMULATOR_LOW: Register = Register::AL;
pub const COUNTER_LOW: Register = Register::CL;

pub const STACK_POINTER: Register = Register::RSP;
pub const FRAME_POINTER: Register = Register::RBP;

/// 32-bit view of an allocated register.
pub fn gp32(reg: AsmReg) -> Option<Register> {
    if reg.bank != GP_BANK {
        return None;
    }
    GP32_REGS.get(reg.id as usize).copied()
}

/// 64-bit view of an allocated register.
pub fn gp64(reg: AsmReg) -> Option<Register> {
    if reg.bank != GP_BANK {
        return None;
    }
    GP64_REGS.get(reg.id as usize).copied()
}

/// Widen any GP register to its 64-bit view.
pub fn widen(reg: Register) -> Register {
    reg.full_register()
}

/// AT&T name without the `%` sigil.
pub fn att_name(reg: Register) -> &'static str {
    let tables: [(&[Register], &[&'static str]); 3] = [
        (&GP32_REGS, &GP32_NAMES),
        (&GP64_REGS, &GP64_NAMES),
        (&GP8_REGS, &GP8_NAMES),
    ];
    tables
        .iter()
        .find_map(|(regs, names)| regs.iter().position(|&r| r == reg).map(|i| names[i]))
        .unwrap_or("?")
}

/// Instruction size suffix for an operation whose destination is `reg`.
pub fn size_suffix(reg: Register) -> char {
    match reg.size() {
        1 => 'b',
        2 => 'w',
        4 => 'l',
        _ => 'q',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_excludes_scratch_and_frame_registers() {
        for reg in ALLOCATION_POOL {
            let name = att_name(gp32(reg).unwrap());
            assert!(!["eax", "ecx", "edx", "esp", "ebp"].contains(&name));
        }
        assert_eq!(att_name(gp32(ALLOCATION_POOL[0]).unwrap()), "ebx");
        assert_eq!(att_name(gp32(ALLOCATION_POOL[10]).unwrap()), "r15d");
    }

    #[test]
    fn views_and_suffixes() {
        let r8 = AsmReg::gp(8);
        assert_eq!(att_name(gp32(r8).unwrap()), "r8d");
        assert_eq!(att_name(gp64(r8).unwrap()), "r8");
        assert_eq!(widen(Register::ESI), Register::RSI);
        assert_eq!(size_suffix(Register::EBX), 'l');
        assert_eq!(size_suffix(Register::RBX), 'q');
        assert_eq!(size_suffix(Register::AL), 'b');
        assert_eq!(att_name(ACCUMULATOR_LOW), "al");
    }
}
