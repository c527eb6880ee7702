use crate::condition::Flags;
use crate::symbol::{Register, SymbolTable};

/// Index used for the CPSR in the change log, one past R15.
pub const CPSR_INDEX: usize = 16;

/// Copy of the register file, handed out to front-ends.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RegisterSnapshot {
    pub regs: [u32; 16],
    pub cpsr: u32,
}

impl RegisterSnapshot {
    pub fn flags(&self) -> Flags {
        Flags::from_cpsr(self.cpsr)
    }
}

/// 16 general-purpose registers plus the CPSR.
///
/// Besides N/Z/C/V the CPSR carries the J/E/A/I/F/T bits, which no instruction
/// here reads. Every write is recorded in a change log until [`Self::clear_changes`]
/// so that front-ends can highlight what the last step touched.
///
/// The symbol table lives here too so `Target`s can be resolved from the same
/// borrow as the registers.
#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    regs: [u32; 16],
    cpsr: u32,
    changed: Vec<usize>,
    symbols: SymbolTable,
}

impl RegisterFile {
    pub const J_BIT: u32 = 0x0200_0000;
    pub const E_BIT: u32 = 0x0000_0200;
    pub const A_BIT: u32 = 0x0000_0100;
    pub const I_BIT: u32 = 0x0000_0080;
    pub const F_BIT: u32 = 0x0000_0040;
    pub const T_BIT: u32 = 0x0000_0020;

    pub fn new() -> Self {
        Self::default()
    }

    /// Zero all registers and flags. Symbols are kept.
    pub fn reset(&mut self) {
        self.regs = [0; 16];
        self.cpsr = 0;
        self.changed.clear();
    }

    pub fn get(&self, reg: Register) -> u32 {
        self.regs[reg.index()]
    }

    pub fn set(&mut self, reg: Register, value: u32) {
        let idx = reg.index();
        if self.regs[idx] != value {
            self.regs[idx] = value;
            self.mark_changed(idx);
        }
    }

    pub fn pc(&self) -> u32 {
        self.get(Register::PC)
    }

    pub fn set_pc(&mut self, value: u32) {
        self.set(Register::PC, value)
    }

    pub fn cpsr(&self) -> u32 {
        self.cpsr
    }

    pub fn set_cpsr(&mut self, value: u32) {
        if self.cpsr != value {
            self.cpsr = value;
            self.mark_changed(CPSR_INDEX);
        }
    }

    pub fn flags(&self) -> Flags {
        Flags::from_cpsr(self.cpsr)
    }

    pub fn flag(&self, mask: u32) -> bool {
        self.cpsr & mask != 0
    }

    pub fn set_flag(&mut self, mask: u32, value: bool) {
        let cpsr = if value {
            self.cpsr | mask
        } else {
            self.cpsr & !mask
        };
        self.set_cpsr(cpsr);
    }

    pub fn carry(&self) -> bool {
        self.flag(Flags::C_BIT)
    }

    pub fn set_carry(&mut self, value: bool) {
        self.set_flag(Flags::C_BIT, value)
    }

    pub fn set_overflow(&mut self, value: bool) {
        self.set_flag(Flags::V_BIT, value)
    }

    /// N from bit 31, Z from the whole word.
    pub fn set_nz(&mut self, result: u32) {
        self.set_flag(Flags::N_BIT, result & 0x8000_0000 != 0);
        self.set_flag(Flags::Z_BIT, result == 0);
    }

    /// Indices written since the last clear, in first-write order.
    pub fn changed(&self) -> &[usize] {
        &self.changed
    }

    pub fn clear_changes(&mut self) {
        self.changed.clear();
    }

    fn mark_changed(&mut self, idx: usize) {
        if !self.changed.contains(&idx) {
            self.changed.push(idx);
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            regs: self.regs,
            cpsr: self.cpsr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_logged_once() {
        let mut regs = RegisterFile::new();
        regs.set(Register::R3, 7);
        regs.set(Register::R3, 8);
        regs.set(Register::R1, 0); // unchanged value
        regs.set_carry(true);
        assert_eq!(regs.changed(), &[3, CPSR_INDEX]);
        regs.clear_changes();
        assert!(regs.changed().is_empty());
        assert_eq!(regs.get(Register::R3), 8);
    }

    #[test]
    fn nz_flags() {
        let mut regs = RegisterFile::new();
        regs.set_nz(0);
        assert!(regs.flags().z && !regs.flags().n);
        regs.set_nz(0x8000_0000);
        assert!(!regs.flags().z && regs.flags().n);
    }

    #[test]
    fn reset_keeps_symbols() {
        let mut regs = RegisterFile::new();
        regs.symbols_mut().insert("main", 0).unwrap();
        regs.set(Register::R0, 1);
        regs.set_flag(RegisterFile::T_BIT, true);
        regs.reset();
        assert_eq!(regs.snapshot().regs, [0; 16]);
        assert_eq!(regs.cpsr(), 0);
        assert_eq!(regs.symbols().get("main"), Some(0));
    }
}
