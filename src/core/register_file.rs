//! Physical register bookkeeping.
//!
//! This module tracks which hardware registers of a fixed, ordered allocation
//! pool are handed out for one function, so the frame prologue knows what to
//! save. Registers are never freed and never spilled: once the pool is
//! exhausted, allocation fails.

use thiserror::Error;

/// Maximum number of register banks supported (GP only for now).
pub const MAX_REGISTER_BANKS: usize = 1;

/// Type for register bank indices.
pub type RegBank = u8;

/// Type for register IDs within a bank.
pub type RegId = u8;

/// General purpose bank.
pub const GP_BANK: RegBank = 0;

/// Combined register identifier. GP ids follow the x86-64 encoding
/// (0 = rax ... 15 = r15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AsmReg {
    pub bank: RegBank,
    pub id: RegId,
}

impl AsmReg {
    pub const fn new(bank: RegBank, id: RegId) -> Self {
        Self { bank, id }
    }

    pub const fn gp(id: RegId) -> Self {
        Self::new(GP_BANK, id)
    }
}

/// Bit set for efficiently tracking register sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegBitSet {
    banks: [u64; MAX_REGISTER_BANKS],
}

impl RegBitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, reg: AsmReg) -> bool {
        match self.banks.get(reg.bank as usize) {
            Some(bits) => reg.id < 64 && bits & (1u64 << reg.id) != 0,
            None => false,
        }
    }

    pub fn set(&mut self, reg: AsmReg) {
        if let Some(bits) = self.banks.get_mut(reg.bank as usize) {
            if reg.id < 64 {
                *bits |= 1u64 << reg.id;
            }
        }
    }

    pub fn count(&self) -> u32 {
        self.banks.iter().map(|bits| bits.count_ones()).sum()
    }
}

/// Error types for register allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegAllocError {
    /// Every register of the pool is already handed out.
    #[error("no registers available")]
    NoRegistersAvailable,
    /// Register is not part of the allocation pool.
    #[error("register is not part of the allocation pool")]
    InvalidRegister,
}

/// Register state for a single function.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    /// Allocation order.
    pool: &'static [AsmReg],
    /// Registers available for allocation (everything in the pool).
    allocatable: RegBitSet,
    /// Registers handed out; these need saving.
    used: RegBitSet,
}

impl RegisterFile {
    pub fn new(pool: &'static [AsmReg]) -> Self {
        let mut allocatable = RegBitSet::new();
        for &reg in pool {
            allocatable.set(reg);
        }
        Self {
            pool,
            allocatable,
            used: RegBitSet::new(),
        }
    }

    /// Allocate the first free register in pool order.
    pub fn allocate_reg(&mut self) -> Result<AsmReg, RegAllocError> {
        let reg = self
            .pool
            .iter()
            .copied()
            .find(|&reg| !self.used.contains(reg))
            .ok_or(RegAllocError::NoRegistersAvailable)?;
        self.claim(reg)?;
        Ok(reg)
    }

    /// Mark a specific pool register as taken, even if it already is.
    pub fn claim(&mut self, reg: AsmReg) -> Result<(), RegAllocError> {
        if !self.allocatable.contains(reg) {
            return Err(RegAllocError::InvalidRegister);
        }
        self.used.set(reg);
        Ok(())
    }

    /// Pool registers touched so far, in pool order.
    pub fn clobbered_regs(&self) -> Vec<AsmReg> {
        self.pool
            .iter()
            .copied()
            .filter(|&reg| self.used.contains(reg))
            .collect()
    }

    /// `(used, total)` for the pool.
    pub fn usage(&self) -> (u32, u32) {
        (self.used.count(), self.allocatable.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static POOL: [AsmReg; 3] = [AsmReg::gp(3), AsmReg::gp(6), AsmReg::gp(8)];

    #[test]
    fn test_regbitset_operations() {
        let mut set = RegBitSet::new();
        let reg = AsmReg::gp(5);

        assert!(!set.contains(reg));
        set.set(reg);
        assert!(set.contains(reg));
        assert!(!set.contains(AsmReg::gp(6)));
        assert!(!set.contains(AsmReg::new(1, 5)));
    }

    #[test]
    fn test_allocation_follows_pool_order() {
        let mut regfile = RegisterFile::new(&POOL);
        assert_eq!(regfile.allocate_reg(), Ok(AsmReg::gp(3)));
        assert_eq!(regfile.allocate_reg(), Ok(AsmReg::gp(6)));
        assert_eq!(regfile.allocate_reg(), Ok(AsmReg::gp(8)));
        assert_eq!(
            regfile.allocate_reg(),
            Err(RegAllocError::NoRegistersAvailable)
        );
        assert_eq!(regfile.clobbered_regs(), POOL.to_vec());
    }

    #[test]
    fn test_claim_outside_pool_fails() {
        let mut regfile = RegisterFile::new(&POOL);
        assert_eq!(
            regfile.claim(AsmReg::gp(0)),
            Err(RegAllocError::InvalidRegister)
        );
        regfile.claim(AsmReg::gp(8)).unwrap();
        regfile.claim(AsmReg::gp(8)).unwrap();
        assert_eq!(regfile.clobbered_regs(), vec![AsmReg::gp(8)]);
        assert_eq!(regfile.allocate_reg(), Ok(AsmReg::gp(3)));
        assert_eq!(regfile.clobbered_regs(), vec![AsmReg::gp(3), AsmReg::gp(8)]);
    }
}
