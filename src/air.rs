use std::{fmt, str::FromStr};

use crate::{instruction::Instruction, span::Span};

/// Assembly intermediate representation: the parsed lines in source order.
#[derive(Clone, Default, Debug)]
pub struct Air {
    lines: Vec<AsmLine>,
}

impl Air {
    pub fn new() -> Self {
        Air { lines: Vec::new() }
    }

    pub fn add_line(&mut self, line: AsmLine) {
        self.lines.push(line)
    }

    pub fn get(&self, idx: usize) -> Option<&AsmLine> {
        self.lines.get(idx)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AsmLine> {
        self.lines.iter()
    }
}

impl FromIterator<AsmLine> for Air {
    fn from_iter<T: IntoIterator<Item = AsmLine>>(iter: T) -> Self {
        Air {
            lines: iter.into_iter().collect(),
        }
    }
}

/// Single statement with its optional label.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AsmLine {
    pub label: Option<String>,
    pub node: Node,
    /// Source span of the statement, used for diagnostics.
    pub span: Span,
}

impl AsmLine {
    pub fn new(label: Option<String>, node: Node, span: Span) -> Self {
        AsmLine { label, node, span }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Node {
    Instruction(Instruction),
    Area(Area),
    Data(DataDef),
}

/// `AREA name, attr, ...`. Switches the loader between code and data.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Area {
    pub name: String,
    pub attrs: Vec<AreaAttr>,
}

impl Area {
    pub fn has(&self, attr: AreaAttr) -> bool {
        self.attrs.contains(&attr)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AreaAttr {
    Code,
    Data,
    ReadOnly,
    ReadWrite,
    Align,
    NoInit,
}

impl FromStr for AreaAttr {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let attr = match s.to_ascii_uppercase().as_str() {
            "CODE" => AreaAttr::Code,
            "DATA" => AreaAttr::Data,
            "READONLY" => AreaAttr::ReadOnly,
            "READWRITE" => AreaAttr::ReadWrite,
            "ALIGN" => AreaAttr::Align,
            "NOINIT" => AreaAttr::NoInit,
            _ => return Err(()),
        };
        Ok(attr)
    }
}

impl fmt::Display for AreaAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AreaAttr::Code => "CODE",
            AreaAttr::Data => "DATA",
            AreaAttr::ReadOnly => "READONLY",
            AreaAttr::ReadWrite => "READWRITE",
            AreaAttr::Align => "ALIGN",
            AreaAttr::NoInit => "NOINIT",
        };
        f.write_str(name)
    }
}

/// Data definition directive.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DataDef {
    /// `DCB`: bytes and strings.
    Bytes(Vec<u8>),
    /// `DCW`: little-endian halfwords.
    Halfwords(Vec<u16>),
    /// `DCD`: little-endian words.
    Words(Vec<u32>),
    /// `SPACE n`: zero-filled bytes.
    Space(u32),
}

impl DataDef {
    /// Natural alignment of the first element.
    pub fn align(&self) -> u32 {
        match self {
            DataDef::Bytes(_) | DataDef::Space(_) => 1,
            DataDef::Halfwords(_) => 2,
            DataDef::Words(_) => 4,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            DataDef::Bytes(bytes) => bytes.len() as u32,
            DataDef::Halfwords(halves) => 2 * halves.len() as u32,
            DataDef::Words(words) => 4 * words.len() as u32,
            DataDef::Space(n) => *n,
        }
    }

    /// Memory image of the directive.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            DataDef::Bytes(bytes) => bytes.clone(),
            DataDef::Halfwords(halves) => halves.iter().flat_map(|h| h.to_le_bytes()).collect(),
            DataDef::Words(words) => words.iter().flat_map(|w| w.to_le_bytes()).collect(),
            DataDef::Space(n) => vec![0; *n as usize],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_attrs() {
        assert_eq!("readwrite".parse(), Ok(AreaAttr::ReadWrite));
        assert_eq!("NOINIT".parse(), Ok(AreaAttr::NoInit));
        assert_eq!("stack".parse::<AreaAttr>(), Err(()));
        let area = Area {
            name: "Strings".into(),
            attrs: vec![AreaAttr::Data, AreaAttr::ReadWrite],
        };
        assert!(area.has(AreaAttr::Data));
        assert!(!area.has(AreaAttr::Code));
    }

    #[test]
    fn data_images() {
        let words = DataDef::Words(vec![0x1122_3344, 1]);
        assert_eq!(words.to_bytes(), vec![0x44, 0x33, 0x22, 0x11, 1, 0, 0, 0]);
        assert_eq!((words.size(), words.align()), (8, 4));
        let halves = DataDef::Halfwords(vec![0xBEEF]);
        assert_eq!(halves.to_bytes(), vec![0xEF, 0xBE]);
        let space = DataDef::Space(3);
        assert_eq!(space.to_bytes(), vec![0, 0, 0]);
        assert_eq!(DataDef::Bytes(b"hi\0".to_vec()).size(), 3);
    }
}
