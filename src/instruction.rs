//! The executable instruction set.
//!
//! One variant per mnemonic. Instructions are immutable once built; the only
//! thing they do is [`Instruction::execute`] against a register file and memory.

use std::fmt;

use crate::condition::{Condition, Flags};
use crate::error::{BuildError, ExecError, Width};
use crate::memory::Memory;
use crate::operand::{AddressingMode, ShifterOperand, Target};
use crate::program::StepOutcome;
use crate::registers::RegisterFile;
use crate::symbol::Register;

/// `OP{cond}{S} Rd, Rn, <shifter_operand>`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DataOp {
    pub cond: Condition,
    pub s: bool,
    pub rd: Register,
    pub rn: Register,
    pub op: ShifterOperand,
}

/// `MOV/MVN{cond}{S} Rd, <shifter_operand>`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MoveOp {
    pub cond: Condition,
    pub s: bool,
    pub rd: Register,
    pub op: ShifterOperand,
}

/// `CMP/CMN/TST/TEQ{cond} Rn, <shifter_operand>`. Flags are always written.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CompareOp {
    pub cond: Condition,
    pub rn: Register,
    pub op: ShifterOperand,
}

/// `OP{cond}{S} RdLo, RdHi, Rm, Rs`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LongMultiply {
    pub cond: Condition,
    pub s: bool,
    pub rdlo: Register,
    pub rdhi: Register,
    pub rm: Register,
    pub rs: Register,
}

/// `LDR/STR{cond} Rd, <addressing_mode>`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Transfer {
    pub cond: Condition,
    pub rd: Register,
    pub addr: AddressingMode,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadKind {
    Word,
    Byte,
    Halfword,
    SignedByte,
    SignedHalfword,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StoreKind {
    Word,
    Byte,
    Halfword,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Instruction {
    Adc(DataOp),
    Add(DataOp),
    And(DataOp),
    Bic(DataOp),
    Eor(DataOp),
    Orr(DataOp),
    Rsb(DataOp),
    Rsc(DataOp),
    Sbc(DataOp),
    Sub(DataOp),
    Mov(MoveOp),
    Mvn(MoveOp),
    Cmn(CompareOp),
    Cmp(CompareOp),
    Teq(CompareOp),
    Tst(CompareOp),
    Mul {
        cond: Condition,
        s: bool,
        rd: Register,
        rm: Register,
        rs: Register,
    },
    Mla {
        cond: Condition,
        s: bool,
        rd: Register,
        rm: Register,
        rs: Register,
        rn: Register,
    },
    Smull(LongMultiply),
    Smlal(LongMultiply),
    Umull(LongMultiply),
    Umlal(LongMultiply),
    /// `B{L}{cond} target`
    B {
        cond: Condition,
        link: bool,
        target: Target,
    },
    /// `BX{cond} Rm`
    Bx { cond: Condition, rm: Register },
    /// Software breakpoint. Has no condition.
    Bkpt,
    Ldr(Transfer),
    Ldrb(Transfer),
    Ldrh(Transfer),
    Ldsb(Transfer),
    Ldsh(Transfer),
    Str(Transfer),
    Strb(Transfer),
    Strh(Transfer),
}

impl Instruction {
    /// Build a load, rejecting the `=value` form on everything but plain `LDR`.
    pub fn load(
        kind: LoadKind,
        cond: Condition,
        rd: Register,
        addr: AddressingMode,
    ) -> Result<Instruction, BuildError> {
        let transfer = Transfer { cond, rd, addr };
        let ins = match kind {
            LoadKind::Word => Instruction::Ldr(transfer),
            LoadKind::Byte => Instruction::Ldrb(transfer),
            LoadKind::Halfword => Instruction::Ldrh(transfer),
            LoadKind::SignedByte => Instruction::Ldsb(transfer),
            LoadKind::SignedHalfword => Instruction::Ldsh(transfer),
        };
        ins.check_target()?;
        Ok(ins)
    }

    /// Build a store. Stores never accept the `=value` form.
    pub fn store(
        kind: StoreKind,
        cond: Condition,
        rd: Register,
        addr: AddressingMode,
    ) -> Result<Instruction, BuildError> {
        let transfer = Transfer { cond, rd, addr };
        let ins = match kind {
            StoreKind::Word => Instruction::Str(transfer),
            StoreKind::Byte => Instruction::Strb(transfer),
            StoreKind::Halfword => Instruction::Strh(transfer),
        };
        ins.check_target()?;
        Ok(ins)
    }

    fn check_target(&self) -> Result<(), BuildError> {
        match self {
            Instruction::Ldr(_) => Ok(()),
            Instruction::Ldrb(t)
            | Instruction::Ldrh(t)
            | Instruction::Ldsb(t)
            | Instruction::Ldsh(t)
            | Instruction::Str(t)
            | Instruction::Strb(t)
            | Instruction::Strh(t)
                if t.addr.is_target() =>
            {
                Err(BuildError::PseudoTargetNotAllowed {
                    mnemonic: self.mnemonic(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Adc(_) => "ADC",
            Instruction::Add(_) => "ADD",
            Instruction::And(_) => "AND",
            Instruction::Bic(_) => "BIC",
            Instruction::Eor(_) => "EOR",
            Instruction::Orr(_) => "ORR",
            Instruction::Rsb(_) => "RSB",
            Instruction::Rsc(_) => "RSC",
            Instruction::Sbc(_) => "SBC",
            Instruction::Sub(_) => "SUB",
            Instruction::Mov(_) => "MOV",
            Instruction::Mvn(_) => "MVN",
            Instruction::Cmn(_) => "CMN",
            Instruction::Cmp(_) => "CMP",
            Instruction::Teq(_) => "TEQ",
            Instruction::Tst(_) => "TST",
            Instruction::Mul { .. } => "MUL",
            Instruction::Mla { .. } => "MLA",
            Instruction::Smull(_) => "SMULL",
            Instruction::Smlal(_) => "SMLAL",
            Instruction::Umull(_) => "UMULL",
            Instruction::Umlal(_) => "UMLAL",
            Instruction::B { link: false, .. } => "B",
            Instruction::B { link: true, .. } => "BL",
            Instruction::Bx { .. } => "BX",
            Instruction::Bkpt => "BKPT",
            Instruction::Ldr(_) => "LDR",
            Instruction::Ldrb(_) => "LDRB",
            Instruction::Ldrh(_) => "LDRH",
            Instruction::Ldsb(_) => "LDRSB",
            Instruction::Ldsh(_) => "LDRSH",
            Instruction::Str(_) => "STR",
            Instruction::Strb(_) => "STRB",
            Instruction::Strh(_) => "STRH",
        }
    }

    pub fn condition(&self) -> Condition {
        match self {
            Instruction::Adc(op)
            | Instruction::Add(op)
            | Instruction::And(op)
            | Instruction::Bic(op)
            | Instruction::Eor(op)
            | Instruction::Orr(op)
            | Instruction::Rsb(op)
            | Instruction::Rsc(op)
            | Instruction::Sbc(op)
            | Instruction::Sub(op) => op.cond,
            Instruction::Mov(op) | Instruction::Mvn(op) => op.cond,
            Instruction::Cmn(op)
            | Instruction::Cmp(op)
            | Instruction::Teq(op)
            | Instruction::Tst(op) => op.cond,
            Instruction::Mul { cond, .. }
            | Instruction::Mla { cond, .. }
            | Instruction::B { cond, .. }
            | Instruction::Bx { cond, .. } => *cond,
            Instruction::Smull(m)
            | Instruction::Smlal(m)
            | Instruction::Umull(m)
            | Instruction::Umlal(m) => m.cond,
            Instruction::Bkpt => Condition::Al,
            Instruction::Ldr(t)
            | Instruction::Ldrb(t)
            | Instruction::Ldrh(t)
            | Instruction::Ldsb(t)
            | Instruction::Ldsh(t)
            | Instruction::Str(t)
            | Instruction::Strb(t)
            | Instruction::Strh(t) => t.cond,
        }
    }

    /// Branch or pseudo-load target, if the instruction has one.
    pub fn target(&self) -> Option<&Target> {
        match self {
            Instruction::B { target, .. } => Some(target),
            Instruction::Ldr(Transfer {
                addr: AddressingMode::Target(target),
                ..
            }) => Some(target),
            _ => None,
        }
    }

    /// Run the instruction. PC has already been advanced past it.
    ///
    /// A failing condition makes this a no-op. Side effects applied before a
    /// memory fault (such as base write-back) are kept.
    pub fn execute(
        &self,
        regs: &mut RegisterFile,
        mem: &mut Memory,
    ) -> Result<StepOutcome, ExecError> {
        // BKPT reports AL, so it always gets through
        if !self.condition().holds(regs.flags()) {
            return Ok(StepOutcome::Continued);
        }

        match self {
            Instruction::Adc(op) => op.arithmetic(regs, |a, b, c| add_inner_op(a, b, c)),
            Instruction::Add(op) => op.arithmetic(regs, |a, b, _| add_inner_op(a, b, false)),
            Instruction::Rsb(op) => op.arithmetic(regs, |a, b, _| sub_inner_op(b, a, true)),
            Instruction::Rsc(op) => op.arithmetic(regs, |a, b, c| sub_inner_op(b, a, c)),
            Instruction::Sbc(op) => op.arithmetic(regs, |a, b, c| sub_inner_op(a, b, c)),
            Instruction::Sub(op) => op.arithmetic(regs, |a, b, _| sub_inner_op(a, b, true)),
            Instruction::And(op) => op.logical(regs, |a, b| a & b),
            Instruction::Bic(op) => op.logical(regs, |a, b| a & !b),
            Instruction::Eor(op) => op.logical(regs, |a, b| a ^ b),
            Instruction::Orr(op) => op.logical(regs, |a, b| a | b),
            Instruction::Mov(op) => op.execute(regs, |v| v),
            Instruction::Mvn(op) => op.execute(regs, |v| !v),
            Instruction::Cmn(op) => {
                let value = op.op.resolve(regs, false);
                let alu = add_inner_op(regs.get(op.rn), value, false);
                alu.set_flags(regs);
            }
            Instruction::Cmp(op) => {
                // C is `Rn - op >= 0` evaluated without wrapping, which is
                // ARM's NOT borrow for unsigned operands.
                let value = op.op.resolve(regs, false);
                let alu = sub_inner_op(regs.get(op.rn), value, true);
                alu.set_flags(regs);
            }
            Instruction::Teq(op) => {
                let value = op.op.resolve(regs, true);
                regs.set_nz(regs.get(op.rn) ^ value);
            }
            Instruction::Tst(op) => {
                let value = op.op.resolve(regs, true);
                regs.set_nz(regs.get(op.rn) & value);
            }
            Instruction::Mul { s, rd, rm, rs, .. } => {
                let result = regs.get(*rm).wrapping_mul(regs.get(*rs));
                regs.set(*rd, result);
                if *s {
                    regs.set_nz(result);
                }
            }
            Instruction::Mla {
                s, rd, rm, rs, rn, ..
            } => {
                let result = regs
                    .get(*rm)
                    .wrapping_mul(regs.get(*rs))
                    .wrapping_add(regs.get(*rn));
                regs.set(*rd, result);
                if *s {
                    regs.set_nz(result);
                }
            }
            Instruction::Smull(m) => m.execute(regs, |rm, rs, _| {
                (rm as i32 as i64).wrapping_mul(rs as i32 as i64) as u64
            }),
            Instruction::Smlal(m) => m.execute(regs, |rm, rs, acc| {
                ((rm as i32 as i64).wrapping_mul(rs as i32 as i64) as u64).wrapping_add(acc)
            }),
            Instruction::Umull(m) => m.execute(regs, |rm, rs, _| rm as u64 * rs as u64),
            Instruction::Umlal(m) => {
                m.execute(regs, |rm, rs, acc| (rm as u64 * rs as u64).wrapping_add(acc))
            }
            Instruction::B { link, target, .. } => {
                let dest = target.resolve(regs)?;
                if *link {
                    regs.set(Register::LR, regs.pc());
                }
                regs.set_pc(dest);
            }
            Instruction::Bx { rm, .. } => {
                let dest = regs.get(*rm);
                regs.set_pc(dest);
            }
            Instruction::Bkpt => return Ok(StepOutcome::Breakpoint),
            Instruction::Ldr(t) => t.load(regs, mem, Width::Word, false)?,
            Instruction::Ldrb(t) => t.load(regs, mem, Width::Byte, false)?,
            Instruction::Ldrh(t) => t.load(regs, mem, Width::Halfword, false)?,
            Instruction::Ldsb(t) => t.load(regs, mem, Width::Byte, true)?,
            Instruction::Ldsh(t) => t.load(regs, mem, Width::Halfword, true)?,
            Instruction::Str(t) => t.store(regs, mem, Width::Word)?,
            Instruction::Strb(t) => t.store(regs, mem, Width::Byte)?,
            Instruction::Strh(t) => t.store(regs, mem, Width::Halfword)?,
        }
        Ok(StepOutcome::Continued)
    }
}

/// Outcome of a 33-bit ALU operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct ArithmeticOpResult {
    result: u32,
    carry: bool,
    overflow: bool,
}

impl ArithmeticOpResult {
    fn set_flags(self, regs: &mut RegisterFile) {
        regs.set_nz(self.result);
        regs.set_carry(self.carry);
        regs.set_overflow(self.overflow);
    }
}

fn sign(value: u32) -> bool {
    value & 0x8000_0000 != 0
}

/// `a + b + carry_in`. Overflow when the operands share a sign the result lacks.
fn add_inner_op(a: u32, b: u32, carry_in: bool) -> ArithmeticOpResult {
    let wide = a as u64 + b as u64 + carry_in as u64;
    let result = wide as u32;
    ArithmeticOpResult {
        result,
        carry: wide > u32::MAX as u64,
        overflow: sign(a) == sign(b) && sign(result) != sign(a),
    }
}

/// `a - b - !carry_in`, carry meaning NOT borrow.
///
/// Overflow when the operands differ in sign and the result takes the sign of
/// the subtrahend.
fn sub_inner_op(a: u32, b: u32, carry_in: bool) -> ArithmeticOpResult {
    let wide = a as i64 - b as i64 - (!carry_in) as i64;
    let result = wide as u32;
    ArithmeticOpResult {
        result,
        carry: wide >= 0,
        overflow: sign(a) != sign(b) && sign(result) == sign(b),
    }
}

impl DataOp {
    fn arithmetic(
        &self,
        regs: &mut RegisterFile,
        alu: impl Fn(u32, u32, bool) -> ArithmeticOpResult,
    ) {
        let carry_in = regs.carry();
        let value = self.op.resolve(regs, self.s);
        let out = alu(regs.get(self.rn), value, carry_in);
        regs.set(self.rd, out.result);
        if self.s {
            out.set_flags(regs);
        }
    }

    /// C comes from the shifter, V is left alone.
    fn logical(&self, regs: &mut RegisterFile, alu: impl Fn(u32, u32) -> u32) {
        let value = self.op.resolve(regs, self.s);
        let result = alu(regs.get(self.rn), value);
        regs.set(self.rd, result);
        if self.s {
            regs.set_nz(result);
        }
    }
}

impl MoveOp {
    fn execute(&self, regs: &mut RegisterFile, f: impl Fn(u32) -> u32) {
        let result = f(self.op.resolve(regs, self.s));
        regs.set(self.rd, result);
        if self.s {
            regs.set_nz(result);
        }
    }
}

impl LongMultiply {
    /// `f(rm, rs, hi:lo)` yields the new 64-bit hi:lo pair.
    fn execute(&self, regs: &mut RegisterFile, f: impl Fn(u32, u32, u64) -> u64) {
        let acc = ((regs.get(self.rdhi) as u64) << 32) | regs.get(self.rdlo) as u64;
        let result = f(regs.get(self.rm), regs.get(self.rs), acc);
        let (lo, hi) = (result as u32, (result >> 32) as u32);
        regs.set(self.rdlo, lo);
        regs.set(self.rdhi, hi);
        if self.s {
            regs.set_flag(Flags::N_BIT, sign(hi));
            regs.set_flag(Flags::Z_BIT, lo == 0 && hi == 0);
        }
    }
}

impl Transfer {
    fn load(
        &self,
        regs: &mut RegisterFile,
        mem: &Memory,
        width: Width,
        signed: bool,
    ) -> Result<(), ExecError> {
        // `LDR Rd, =value` never touches memory
        if let (AddressingMode::Target(target), Width::Word) = (&self.addr, width) {
            let value = target.resolve(regs)?;
            regs.set(self.rd, value);
            return Ok(());
        }
        let addr = self.addr.resolve(regs)?;
        let value = match width {
            Width::Byte => mem.load_byte(addr)?,
            Width::Halfword => mem.load_halfword(addr)?,
            Width::Word => mem.load_word(addr)?,
        };
        let value = match (signed, width) {
            (true, Width::Byte) => value as u8 as i8 as i32 as u32,
            (true, Width::Halfword) => value as u16 as i16 as i32 as u32,
            _ => value,
        };
        regs.set(self.rd, value);
        Ok(())
    }

    fn store(&self, regs: &mut RegisterFile, mem: &mut Memory, width: Width) -> Result<(), ExecError> {
        let value = regs.get(self.rd);
        let addr = self.addr.resolve(regs)?;
        match width {
            Width::Byte => mem.store_byte(addr, value)?,
            Width::Halfword => mem.store_halfword(addr, value)?,
            Width::Word => mem.store_word(addr, value)?,
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = |set: bool| if set { "S" } else { "" };
        let name = self.mnemonic();
        let cond = self.condition();
        match self {
            Instruction::Adc(op)
            | Instruction::Add(op)
            | Instruction::And(op)
            | Instruction::Bic(op)
            | Instruction::Eor(op)
            | Instruction::Orr(op)
            | Instruction::Rsb(op)
            | Instruction::Rsc(op)
            | Instruction::Sbc(op)
            | Instruction::Sub(op) => {
                write!(f, "{name}{cond}{} {}, {}, {}", s(op.s), op.rd, op.rn, op.op)
            }
            Instruction::Mov(op) | Instruction::Mvn(op) => {
                write!(f, "{name}{cond}{} {}, {}", s(op.s), op.rd, op.op)
            }
            Instruction::Cmn(op)
            | Instruction::Cmp(op)
            | Instruction::Teq(op)
            | Instruction::Tst(op) => write!(f, "{name}{cond} {}, {}", op.rn, op.op),
            Instruction::Mul { s: set, rd, rm, rs, .. } => {
                write!(f, "{name}{cond}{} {rd}, {rm}, {rs}", s(*set))
            }
            Instruction::Mla {
                s: set,
                rd,
                rm,
                rs,
                rn,
                ..
            } => write!(f, "{name}{cond}{} {rd}, {rm}, {rs}, {rn}", s(*set)),
            Instruction::Smull(m)
            | Instruction::Smlal(m)
            | Instruction::Umull(m)
            | Instruction::Umlal(m) => write!(
                f,
                "{name}{cond}{} {}, {}, {}, {}",
                s(m.s),
                m.rdlo,
                m.rdhi,
                m.rm,
                m.rs
            ),
            Instruction::B { target, .. } => write!(f, "{name}{cond} {target}"),
            Instruction::Bx { rm, .. } => write!(f, "{name}{cond} {rm}"),
            Instruction::Bkpt => f.write_str(name),
            Instruction::Ldr(t)
            | Instruction::Ldrb(t)
            | Instruction::Ldrh(t)
            | Instruction::Ldsb(t)
            | Instruction::Ldsh(t)
            | Instruction::Str(t)
            | Instruction::Strb(t)
            | Instruction::Strh(t) => {
                // Condition goes between the base mnemonic and the width suffix
                let (base, width) = name.split_at(3);
                write!(f, "{base}{cond}{width} {}, {}", t.rd, t.addr)
            }
        }
    }
}
