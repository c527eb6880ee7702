//! Condition codes and the N/Z/C/V flags they test.
//!
//! Every instruction carries a condition. If the flags held in the CPSR fulfil
//! it, the instruction executes; otherwise it is skipped without touching any
//! state. In the absence of a suffix the condition is `AL` (always).

use std::{fmt, str::FromStr};

/// Snapshot of the four condition flags.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Flags {
    /// Negative.
    pub n: bool,
    /// Zero.
    pub z: bool,
    /// Carry (or NOT borrow for subtraction).
    pub c: bool,
    /// Signed overflow.
    pub v: bool,
}

impl Flags {
    pub const N_BIT: u32 = 0x8000_0000;
    pub const Z_BIT: u32 = 0x4000_0000;
    pub const C_BIT: u32 = 0x2000_0000;
    pub const V_BIT: u32 = 0x1000_0000;

    pub fn from_cpsr(cpsr: u32) -> Self {
        Flags {
            n: cpsr & Self::N_BIT != 0,
            z: cpsr & Self::Z_BIT != 0,
            c: cpsr & Self::C_BIT != 0,
            v: cpsr & Self::V_BIT != 0,
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N = {}, Z = {}, C = {}, V = {}",
            self.n as u8, self.z as u8, self.c as u8, self.v as u8
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum Condition {
    /// Z set (equal).
    Eq,
    /// Z clear (not equal).
    Ne,
    /// C set (unsigned higher or same). Also written `HS`.
    Cs,
    /// C clear (unsigned lower). Also written `LO`.
    Cc,
    /// N set (negative).
    Mi,
    /// N clear (positive or zero).
    Pl,
    /// V set (overflow).
    Vs,
    /// V clear (no overflow).
    Vc,
    /// C set and Z clear (unsigned higher).
    Hi,
    /// C clear or Z set (unsigned lower or same).
    Ls,
    /// N equals V (greater or equal).
    Ge,
    /// N not equal to V (less than).
    Lt,
    /// Z clear and N equals V (greater than).
    Gt,
    /// Z set or N not equal to V (less than or equal).
    Le,
    /// Always.
    #[default]
    Al,
}

impl Condition {
    pub fn holds(self, flags: Flags) -> bool {
        let Flags { n, z, c, v } = flags;
        match self {
            Condition::Eq => z,
            Condition::Ne => !z,
            Condition::Cs => c,
            Condition::Cc => !c,
            Condition::Mi => n,
            Condition::Pl => !n,
            Condition::Vs => v,
            Condition::Vc => !v,
            Condition::Hi => c && !z,
            Condition::Ls => !c || z,
            Condition::Ge => n == v,
            Condition::Lt => n != v,
            Condition::Gt => !z && n == v,
            Condition::Le => z || n != v,
            Condition::Al => true,
        }
    }

    /// Suffix as written after a mnemonic. Empty for `AL`.
    pub fn suffix(self) -> &'static str {
        match self {
            Condition::Eq => "EQ",
            Condition::Ne => "NE",
            Condition::Cs => "CS",
            Condition::Cc => "CC",
            Condition::Mi => "MI",
            Condition::Pl => "PL",
            Condition::Vs => "VS",
            Condition::Vc => "VC",
            Condition::Hi => "HI",
            Condition::Ls => "LS",
            Condition::Ge => "GE",
            Condition::Lt => "LT",
            Condition::Gt => "GT",
            Condition::Le => "LE",
            Condition::Al => "",
        }
    }
}

impl FromStr for Condition {
    type Err = ();

    /// Expects an uppercase two-letter suffix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cond = match s {
            "EQ" => Condition::Eq,
            "NE" => Condition::Ne,
            "CS" | "HS" => Condition::Cs,
            "CC" | "LO" => Condition::Cc,
            "MI" => Condition::Mi,
            "PL" => Condition::Pl,
            "VS" => Condition::Vs,
            "VC" => Condition::Vc,
            "HI" => Condition::Hi,
            "LS" => Condition::Ls,
            "GE" => Condition::Ge,
            "LT" => Condition::Lt,
            "GT" => Condition::Gt,
            "LE" => Condition::Le,
            "AL" => Condition::Al,
            _ => return Err(()),
        };
        Ok(cond)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}
