use std::{fmt, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::error::BuildError;

// Symbol table of label -> code offset or data address
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Represents the CPU registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    /// Also known as SL.
    R10,
    /// Also known as FP.
    R11,
    /// Also known as IP.
    R12,
    /// Stack pointer by convention.
    R13,
    /// Link register, written by `BL`.
    R14,
    /// Program counter. Holds a code offset, not a byte address.
    R15,
}

impl Register {
    pub const SP: Register = Register::R13;
    pub const LR: Register = Register::R14;
    pub const PC: Register = Register::R15;

    const ALL: [Register; 16] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns `None` for indices above 15.
    pub fn from_index(idx: usize) -> Option<Register> {
        Self::ALL.get(idx).copied()
    }
}

impl FromStr for Register {
    type Err = ();

    /// Case-insensitive; accepts `R0`-`R15` and the usual aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "SP" => return Ok(Register::SP),
            "LR" => return Ok(Register::LR),
            "PC" => return Ok(Register::PC),
            "SL" => return Ok(Register::R10),
            "FP" => return Ok(Register::R11),
            "IP" => return Ok(Register::R12),
            _ => (),
        }
        let digits = upper.strip_prefix('R').ok_or(())?;
        // Reject `R01` and friends
        if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
            return Err(());
        }
        let idx: usize = digits.parse().map_err(|_| ())?;
        Register::from_index(idx).ok_or(())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.index())
    }
}

/// Label name -> code offset (CODE areas) or absolute address (DATA areas).
#[derive(Clone, Debug, Default)]
pub struct SymbolTable(FxMap<String, u32>);

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable(IndexMap::with_hasher(FxBuildHasher::default()))
    }

    /// Fails if the label already exists.
    pub fn insert(&mut self, name: &str, value: u32) -> Result<(), BuildError> {
        if self.0.contains_key(name) {
            return Err(BuildError::DuplicateSymbol {
                name: name.to_owned(),
            });
        }
        self.0.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
