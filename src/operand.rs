//! Operands: plain values, shifter operands, addressing modes and targets.
//!
//! Resolution of a shifter operand may write the carry flag, and resolution
//! of a pre/post-indexed addressing mode writes back the base register, so both
//! take the register file mutably.

use std::fmt;

use crate::error::ExecError;
use crate::registers::RegisterFile;
use crate::symbol::Register;

/// A register or a 32-bit literal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Register(Register),
    Immediate(u32),
}

impl Operand {
    pub fn resolve(&self, regs: &RegisterFile) -> u32 {
        match *self {
            Operand::Register(reg) => regs.get(reg),
            Operand::Immediate(value) => value,
        }
    }
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Operand::Register(reg)
    }
}

impl From<u32> for Operand {
    fn from(value: u32) -> Self {
        Operand::Immediate(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operand::Register(reg) => write!(f, "{reg}"),
            Operand::Immediate(value) => {
                let signed = value as i32;
                if (-0x1_0000..0).contains(&signed) {
                    write!(f, "#{signed}")
                } else if value > 0xFFFF {
                    write!(f, "#0x{value:X}")
                } else {
                    write!(f, "#{value}")
                }
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shift {
    /// Logical shift left, zero fill.
    Lsl,
    /// Logical shift right, zero fill.
    Lsr,
    /// Arithmetic shift right, sign fill.
    Asr,
    /// Rotate right through 32 bits.
    Ror,
    /// Rotate right through 33 bits, with the carry flag as the extra bit.
    Rrx,
}

impl Shift {
    /// Shift `value` by `amount` positions, clamped to 32.
    ///
    /// Returns the result and the carry-out, which is the last bit shifted out.
    /// A zero amount shifts nothing out and yields no carry.
    pub fn apply(self, value: u32, amount: u32, carry_in: bool) -> (u32, Option<bool>) {
        let amount = amount.min(32);
        if amount == 0 {
            return (value, None);
        }
        let bit = |n: u32| (value >> n) & 1 != 0;
        match self {
            Shift::Lsl => {
                let wide = (value as u64) << amount;
                (wide as u32, Some(wide & (1 << 32) != 0))
            }
            Shift::Lsr => (((value as u64) >> amount) as u32, Some(bit(amount - 1))),
            Shift::Asr => (
                ((value as i32 as i64) >> amount) as u32,
                Some(bit(amount - 1)),
            ),
            Shift::Ror => (value.rotate_right(amount), Some(bit(amount - 1))),
            Shift::Rrx => {
                let (mut result, mut carry) = (value, carry_in);
                for _ in 0..amount {
                    let out = result & 1 != 0;
                    result = (result >> 1) | ((carry as u32) << 31);
                    carry = out;
                }
                (result, Some(carry))
            }
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shift::Lsl => "LSL",
            Shift::Lsr => "LSR",
            Shift::Asr => "ASR",
            Shift::Ror => "ROR",
            Shift::Rrx => "RRX",
        };
        f.write_str(name)
    }
}

/// The flexible last operand of data-processing instructions.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ShifterOperand {
    Plain(Operand),
    Shifted {
        base: Operand,
        shift: Shift,
        amount: Operand,
    },
}

impl ShifterOperand {
    pub fn shifted(base: impl Into<Operand>, shift: Shift, amount: impl Into<Operand>) -> Self {
        ShifterOperand::Shifted {
            base: base.into(),
            shift,
            amount: amount.into(),
        }
    }

    /// Compute the operand value. With `affect_flags`, a shift that moves bits
    /// out also stores the carry-out into C.
    pub fn resolve(&self, regs: &mut RegisterFile, affect_flags: bool) -> u32 {
        match *self {
            ShifterOperand::Plain(op) => op.resolve(regs),
            ShifterOperand::Shifted {
                base,
                shift,
                amount,
            } => {
                let value = base.resolve(regs);
                let amount = amount.resolve(regs);
                let (result, carry) = shift.apply(value, amount, regs.carry());
                if let (true, Some(carry)) = (affect_flags, carry) {
                    regs.set_carry(carry);
                }
                result
            }
        }
    }
}

impl From<Operand> for ShifterOperand {
    fn from(op: Operand) -> Self {
        ShifterOperand::Plain(op)
    }
}

impl From<Register> for ShifterOperand {
    fn from(reg: Register) -> Self {
        ShifterOperand::Plain(Operand::Register(reg))
    }
}

impl From<u32> for ShifterOperand {
    fn from(value: u32) -> Self {
        ShifterOperand::Plain(Operand::Immediate(value))
    }
}

impl fmt::Display for ShifterOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShifterOperand::Plain(op) => write!(f, "{op}"),
            ShifterOperand::Shifted {
                base,
                shift: Shift::Rrx,
                amount: Operand::Immediate(1),
            } => write!(f, "{base}, RRX"),
            ShifterOperand::Shifted {
                base,
                shift,
                amount,
            } => write!(f, "{base}, {shift} {amount}"),
        }
    }
}

/// Label or literal, used by branches and by the `LDR Rd, =value` form.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Target {
    Label(String),
    Immediate(u32),
}

impl Target {
    pub fn resolve(&self, regs: &RegisterFile) -> Result<u32, ExecError> {
        match self {
            Target::Label(name) => {
                regs.symbols()
                    .get(name)
                    .ok_or_else(|| ExecError::UnresolvedSymbol {
                        name: name.clone(),
                    })
            }
            Target::Immediate(value) => Ok(*value),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Target::Label(name) => Some(name),
            Target::Immediate(_) => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Label(name) => f.write_str(name),
            Target::Immediate(value) => write!(f, "{value}"),
        }
    }
}

/// How a load or store computes its effective address.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AddressingMode {
    /// `[Rn]`
    Register(Register),
    /// `[Rn, offset]`
    Offset { rn: Register, offset: ShifterOperand },
    /// `[Rn, offset]!`: base is updated, then used.
    PreIndexed { rn: Register, offset: ShifterOperand },
    /// `[Rn], offset`: base is used, then updated.
    PostIndexed { rn: Register, offset: ShifterOperand },
    /// `=value`: a constant rather than an address.
    Target(Target),
}

impl AddressingMode {
    /// Effective address, writing back the base register for the indexed forms.
    ///
    /// Offsets never touch the flags. For [`AddressingMode::Target`] this is
    /// the resolved constant.
    pub fn resolve(&self, regs: &mut RegisterFile) -> Result<u32, ExecError> {
        let addr = match self {
            AddressingMode::Register(rn) => regs.get(*rn),
            AddressingMode::Offset { rn, offset } => {
                let offset = offset.resolve(regs, false);
                regs.get(*rn).wrapping_add(offset)
            }
            AddressingMode::PreIndexed { rn, offset } => {
                let offset = offset.resolve(regs, false);
                let addr = regs.get(*rn).wrapping_add(offset);
                regs.set(*rn, addr);
                addr
            }
            AddressingMode::PostIndexed { rn, offset } => {
                let offset = offset.resolve(regs, false);
                let addr = regs.get(*rn);
                regs.set(*rn, addr.wrapping_add(offset));
                addr
            }
            AddressingMode::Target(target) => target.resolve(regs)?,
        };
        Ok(addr)
    }

    pub fn is_target(&self) -> bool {
        matches!(self, AddressingMode::Target(_))
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressingMode::Register(rn) => write!(f, "[{rn}]"),
            AddressingMode::Offset { rn, offset } => write!(f, "[{rn}, {offset}]"),
            AddressingMode::PreIndexed { rn, offset } => write!(f, "[{rn}, {offset}]!"),
            AddressingMode::PostIndexed { rn, offset } => write!(f, "[{rn}], {offset}"),
            AddressingMode::Target(target) => write!(f, "={target}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn shift_by_zero_is_identity() {
        for shift in [Shift::Lsl, Shift::Lsr, Shift::Asr, Shift::Ror, Shift::Rrx] {
            assert_eq!(shift.apply(0xDEAD_BEEF, 0, true), (0xDEAD_BEEF, None));
        }
    }

    #[test]
    fn lsl_edges() {
        assert_eq!(Shift::Lsl.apply(0x8000_0001, 1, false), (2, Some(true)));
        assert_eq!(Shift::Lsl.apply(0x0000_0001, 32, false), (0, Some(true)));
        assert_eq!(Shift::Lsl.apply(0x0000_0002, 32, false), (0, Some(false)));
        // clamped to 32
        assert_eq!(Shift::Lsl.apply(0x0000_0001, 200, false), (0, Some(true)));
    }

    #[test]
    fn lsr_edges() {
        assert_eq!(Shift::Lsr.apply(0x0000_0003, 1, false), (1, Some(true)));
        assert_eq!(Shift::Lsr.apply(0x8000_0000, 32, false), (0, Some(true)));
        assert_eq!(Shift::Lsr.apply(0x8000_0000, 31, false), (1, Some(false)));
    }

    #[test]
    fn asr_sign_fills() {
        assert_eq!(Shift::Asr.apply(0x8000_0000, 31, false), (0xFFFF_FFFF, Some(false)));
        assert_eq!(Shift::Asr.apply(0x8000_0000, 32, false), (0xFFFF_FFFF, Some(true)));
        assert_eq!(Shift::Asr.apply(0x4000_0000, 32, false), (0, Some(false)));
        assert_eq!(Shift::Asr.apply(0xFFFF_FFF0, 4, false), (0xFFFF_FFFF, Some(false)));
    }

    #[test]
    fn ror_wraps() {
        assert_eq!(Shift::Ror.apply(0x0000_00F1, 4, false), (0x1000_000F, Some(false)));
        assert_eq!(Shift::Ror.apply(0x0000_0001, 1, false), (0x8000_0000, Some(true)));
        assert_eq!(Shift::Ror.apply(0x8765_4321, 32, false), (0x8765_4321, Some(true)));
    }

    #[test]
    fn rrx_threads_carry() {
        assert_eq!(Shift::Rrx.apply(0x0000_0001, 1, false), (0, Some(true)));
        assert_eq!(Shift::Rrx.apply(0x0000_0000, 1, true), (0x8000_0000, Some(false)));
        // 33-bit rotate: two steps move the carry into bit 30
        assert_eq!(Shift::Rrx.apply(0x0000_0002, 2, true), (0x4000_0000, Some(true)));
        // 33 positions is a full turn but the loop is clamped at 32
        let (value, carry) = Shift::Rrx.apply(0x1234_5678, 1000, false);
        assert_eq!((value, carry), Shift::Rrx.apply(0x1234_5678, 32, false));
    }

    #[test]
    fn shifter_sets_carry_only_when_asked() {
        let mut regs = RegisterFile::new();
        regs.set(Register::R1, 0x8000_0000);
        let op = ShifterOperand::shifted(Register::R1, Shift::Lsl, 1u32);

        assert_eq!(op.resolve(&mut regs, false), 0);
        assert!(!regs.carry());

        assert_eq!(op.resolve(&mut regs, true), 0);
        assert!(regs.carry());

        // zero-length shift leaves carry alone
        let op = ShifterOperand::shifted(Register::R1, Shift::Lsr, Register::R2);
        assert_eq!(op.resolve(&mut regs, true), 0x8000_0000);
        assert!(regs.carry());
    }

    #[test]
    fn addressing_modes_write_back() {
        let mut regs = RegisterFile::new();
        regs.set(Register::R1, 0xA100_0000);

        let offset = AddressingMode::Offset {
            rn: Register::R1,
            offset: 4u32.into(),
        };
        assert_eq!(offset.resolve(&mut regs), Ok(0xA100_0004));
        assert_eq!(regs.get(Register::R1), 0xA100_0000);

        let pre = AddressingMode::PreIndexed {
            rn: Register::R1,
            offset: 4u32.into(),
        };
        assert_eq!(pre.resolve(&mut regs), Ok(0xA100_0004));
        assert_eq!(regs.get(Register::R1), 0xA100_0004);

        let post = AddressingMode::PostIndexed {
            rn: Register::R1,
            offset: (-4i32 as u32).into(),
        };
        assert_eq!(post.resolve(&mut regs), Ok(0xA100_0004));
        assert_eq!(regs.get(Register::R1), 0xA100_0000);
    }

    #[test]
    fn scaled_register_offset() {
        let mut regs = RegisterFile::new();
        regs.set(Register::R1, 0xA100_0000);
        regs.set(Register::R2, 3);
        let mode = AddressingMode::Offset {
            rn: Register::R1,
            offset: ShifterOperand::shifted(Register::R2, Shift::Lsl, 2u32),
        };
        assert_eq!(mode.resolve(&mut regs), Ok(0xA100_000C));
    }

    #[test]
    fn targets_resolve_through_symbols() {
        let mut regs = RegisterFile::new();
        regs.symbols_mut().insert("end", 4).unwrap();
        assert_eq!(Target::Label("end".into()).resolve(&regs), Ok(4));
        assert_eq!(Target::Immediate(9).resolve(&regs), Ok(9));
        assert_eq!(
            Target::Label("nowhere".into()).resolve(&regs),
            Err(ExecError::UnresolvedSymbol {
                name: "nowhere".into()
            })
        );
    }

    #[test]
    fn display() {
        let op = ShifterOperand::shifted(Register::R2, Shift::Ror, Register::R3);
        assert_eq!(op.to_string(), "R2, ROR R3");
        let op = ShifterOperand::shifted(Register::R2, Shift::Rrx, 1u32);
        assert_eq!(op.to_string(), "R2, RRX");
        let mode = AddressingMode::PostIndexed {
            rn: Register::R0,
            offset: (-4i32 as u32).into(),
        };
        assert_eq!(mode.to_string(), "[R0], #-4");
        let mode = AddressingMode::Target(Target::Label("msg".into()));
        assert_eq!(mode.to_string(), "=msg");
    }
}
