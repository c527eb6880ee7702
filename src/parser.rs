use std::{borrow::Cow, iter::Peekable, vec::IntoIter};

use miette::Result;

use crate::{
    air::{Air, Area, AreaAttr, AsmLine, DataDef, Node},
    condition::Condition,
    error,
    instruction::{CompareOp, DataOp, Instruction, LoadKind, LongMultiply, MoveOp, StoreKind},
    lexer::{tokenize, Token, TokenKind},
    operand::{AddressingMode, Operand, Shift, ShifterOperand, Target},
    span::Span,
    symbol::Register,
};

/// Base mnemonics that take the generic `{cond}{S}` suffixes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Op {
    Adc,
    Add,
    And,
    Bic,
    Eor,
    Orr,
    Rsb,
    Rsc,
    Sbc,
    Sub,
    Mov,
    Mvn,
    Cmn,
    Cmp,
    Teq,
    Tst,
    Mul,
    Mla,
    Smull,
    Smlal,
    Umull,
    Umlal,
}

impl Op {
    /// Longest names first so that prefixes never shadow longer mnemonics.
    const TABLE: [(&'static str, Op); 22] = [
        ("SMULL", Op::Smull),
        ("SMLAL", Op::Smlal),
        ("UMULL", Op::Umull),
        ("UMLAL", Op::Umlal),
        ("ADC", Op::Adc),
        ("ADD", Op::Add),
        ("AND", Op::And),
        ("BIC", Op::Bic),
        ("EOR", Op::Eor),
        ("ORR", Op::Orr),
        ("RSB", Op::Rsb),
        ("RSC", Op::Rsc),
        ("SBC", Op::Sbc),
        ("SUB", Op::Sub),
        ("MOV", Op::Mov),
        ("MVN", Op::Mvn),
        ("CMN", Op::Cmn),
        ("CMP", Op::Cmp),
        ("TEQ", Op::Teq),
        ("TST", Op::Tst),
        ("MUL", Op::Mul),
        ("MLA", Op::Mla),
    ];

    fn is_compare(self) -> bool {
        matches!(self, Op::Cmn | Op::Cmp | Op::Teq | Op::Tst)
    }
}

/// A decoded mnemonic or directive, suffixes included.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mnemonic {
    Alu { op: Op, cond: Condition, s: bool },
    Branch { link: bool, cond: Condition },
    BranchExchange { cond: Condition },
    Bkpt,
    Load { kind: LoadKind, cond: Condition },
    Store { kind: StoreKind, cond: Condition },
    Area,
    Dcb,
    Dcw,
    Dcd,
    Space,
    Unsupported,
}

impl Mnemonic {
    fn classify(word: &str) -> Option<Mnemonic> {
        let word = word.to_ascii_uppercase();
        let word = word.as_str();
        let directive = match word {
            "AREA" => Some(Mnemonic::Area),
            "DCB" => Some(Mnemonic::Dcb),
            "DCW" | "DCH" => Some(Mnemonic::Dcw),
            "DCD" => Some(Mnemonic::Dcd),
            "SPACE" => Some(Mnemonic::Space),
            "BKPT" => Some(Mnemonic::Bkpt),
            _ => None,
        };
        if directive.is_some() {
            return directive;
        }

        for (name, op) in Op::TABLE {
            if let Some(rest) = word.strip_prefix(name) {
                let suffix = if op.is_compare() {
                    cond_only(rest).map(|cond| (cond, false))
                } else {
                    cond_and_s(rest)
                };
                if let Some((cond, s)) = suffix {
                    return Some(Mnemonic::Alu { op, cond, s });
                }
            }
        }

        // B{cond} before BL{cond}: BLS is B+LS, BLLS is BL+LS
        if let Some(cond) = word.strip_prefix('B').and_then(cond_only) {
            return Some(Mnemonic::Branch { link: false, cond });
        }
        if let Some(cond) = word.strip_prefix("BL").and_then(cond_only) {
            return Some(Mnemonic::Branch { link: true, cond });
        }
        if let Some(cond) = word.strip_prefix("BX").and_then(cond_only) {
            return Some(Mnemonic::BranchExchange { cond });
        }

        if let Some(rest) = word.strip_prefix("LDR") {
            let widths = [
                ("", LoadKind::Word),
                ("B", LoadKind::Byte),
                ("H", LoadKind::Halfword),
                ("SB", LoadKind::SignedByte),
                ("SH", LoadKind::SignedHalfword),
            ];
            if let Some((kind, cond)) = cond_and_width(rest, &widths) {
                return Some(Mnemonic::Load { kind, cond });
            }
        }
        for (name, kind) in [("LDSB", LoadKind::SignedByte), ("LDSH", LoadKind::SignedHalfword)] {
            if let Some(cond) = word.strip_prefix(name).and_then(cond_only) {
                return Some(Mnemonic::Load { kind, cond });
            }
        }
        if let Some(rest) = word.strip_prefix("STR") {
            let widths = [
                ("", StoreKind::Word),
                ("B", StoreKind::Byte),
                ("H", StoreKind::Halfword),
            ];
            if let Some((kind, cond)) = cond_and_width(rest, &widths) {
                return Some(Mnemonic::Store { kind, cond });
            }
        }

        // Recognised so they can be reported, but not simulated
        for name in ["LDM", "STM", "MRS", "MSR", "SWP"] {
            if let Some(rest) = word.strip_prefix(name) {
                let modes = ["", "IA", "IB", "DA", "DB", "FD", "FA", "ED", "EA", "B"];
                if cond_and_width(rest, &modes.map(|m| (m, ()))).is_some() {
                    return Some(Mnemonic::Unsupported);
                }
            }
        }
        None
    }
}

/// Empty string or a condition code.
fn cond_only(s: &str) -> Option<Condition> {
    if s.is_empty() {
        return Some(Condition::Al);
    }
    s.parse().ok()
}

/// `{cond}{S}` or `{S}{cond}`.
fn cond_and_s(s: &str) -> Option<(Condition, bool)> {
    if let Some(cond) = cond_only(s) {
        return Some((cond, false));
    }
    if let Some(cond) = s.strip_prefix('S').and_then(cond_only) {
        return Some((cond, true));
    }
    s.strip_suffix('S')
        .and_then(cond_only)
        .map(|cond| (cond, true))
}

/// `{cond}{width}` or `{width}{cond}`.
fn cond_and_width<K: Copy>(s: &str, widths: &[(&str, K)]) -> Option<(K, Condition)> {
    for (width, kind) in widths {
        if let Some(cond) = s.strip_prefix(width).and_then(cond_only) {
            return Some((*kind, cond));
        }
        if let Some(cond) = s.strip_suffix(width).and_then(cond_only) {
            return Some((*kind, cond));
        }
    }
    None
}

fn unescape(s: &str) -> Cow<str> {
    if !s.contains('\\') {
        return Cow::Borrowed(s);
    }
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('0') => result.push('\0'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                // Trailing backslash; include it as is
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    Cow::Owned(result)
}

/// Transforms token stream into AIR
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    /// Peekable iterator over tokens, without whitespace or comments
    toks: Peekable<IntoIter<Token>>,
    /// Assembly intermediate representation
    air: Air,
    /// Label from a line of its own, waiting for the next statement
    pending_label: Option<(String, Span)>,
    /// Span of the last consumed token
    last_span: Span,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Result<Self> {
        let toks = tokenize(src)?;
        Ok(AsmParser {
            src,
            toks: toks.into_iter().peekable(),
            air: Air::new(),
            pending_label: None,
            last_span: Span::dummy(),
        })
    }

    fn get_span(&self, span: Span) -> &'a str {
        &self.src[span.as_range()]
    }

    /// Create AIR out of token stream
    pub fn parse(mut self) -> Result<Air> {
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.bump();
                }
                _ => self.parse_line()?,
            }
        }
        if let Some((_, span)) = self.pending_label {
            return Err(error::parse_dangling_label(span, self.src));
        }
        // Consume self to return AIR
        Ok(self.air)
    }

    fn parse_line(&mut self) -> Result<()> {
        let first = self.expect(TokenKind::Ident, "label or instruction")?;

        let (label, mnemonic, head) = match Mnemonic::classify(self.get_span(first.span)) {
            Some(mnemonic) if !self.names_label(mnemonic) => (None, mnemonic, first),
            _ => {
                let label = (self.get_span(first.span).to_owned(), first.span);
                if self.peek_kind() == TokenKind::Colon {
                    self.bump();
                }
                if self.at_line_end() {
                    // Label on a line of its own names the next statement
                    if let Some((_, span)) = self.pending_label.replace(label) {
                        return Err(error::parse_dangling_label(span, self.src));
                    }
                    return Ok(());
                }
                let tok = self.expect(TokenKind::Ident, "instruction or directive")?;
                match Mnemonic::classify(self.get_span(tok.span)) {
                    Some(mnemonic) => (Some(label), mnemonic, tok),
                    None => return Err(error::parse_unknown_mnemonic(tok.span, self.src)),
                }
            }
        };

        let label = match (label, self.pending_label.take()) {
            (Some(_), Some((_, span))) => {
                return Err(error::parse_dangling_label(span, self.src));
            }
            (Some((name, _)), None) | (None, Some((name, _))) => Some(name),
            (None, None) => None,
        };

        let node = self.parse_statement(mnemonic, head)?;
        let span = head.span.join(self.last_span);
        self.end_of_statement()?;
        self.air.add_line(AsmLine::new(label, node, span));
        Ok(())
    }

    /// Whether a first word spelling `first` is really a label.
    ///
    /// It is when a colon or another mnemonic follows. `B bcc` still branches
    /// to `bcc`, while `bcc B loop` defines it.
    fn names_label(&mut self, first: Mnemonic) -> bool {
        if first == Mnemonic::Area {
            return false;
        }
        let Some(next) = self.toks.peek().copied() else {
            return false;
        };
        match next.kind {
            TokenKind::Colon => true,
            TokenKind::Ident if Mnemonic::classify(self.get_span(next.span)).is_some() => {
                match first {
                    Mnemonic::Branch { .. } => {
                        let mut ahead = self.toks.clone();
                        ahead.next();
                        !matches!(
                            ahead.next().map(|tok| tok.kind),
                            None | Some(TokenKind::Newline | TokenKind::Eof)
                        )
                    }
                    _ => true,
                }
            }
            _ => false,
        }
    }

    fn parse_statement(&mut self, mnemonic: Mnemonic, head: Token) -> Result<Node> {
        let ins = match mnemonic {
            Mnemonic::Alu { op, cond, s } => self.parse_alu(op, cond, s)?,
            Mnemonic::Branch { link, cond } => {
                let target = self.expect_target()?;
                Instruction::B { cond, link, target }
            }
            Mnemonic::BranchExchange { cond } => {
                let rm = self.expect_reg()?;
                Instruction::Bx { cond, rm }
            }
            Mnemonic::Bkpt => {
                // The comment field is accepted and ignored
                if matches!(self.peek_kind(), TokenKind::Imm(_) | TokenKind::Num(_)) {
                    self.bump();
                }
                Instruction::Bkpt
            }
            Mnemonic::Load { kind, cond } => {
                let rd = self.expect_reg()?;
                let start = self.peek_span();
                let addr = self.expect_addressing_mode()?;
                Instruction::load(kind, cond, rd, addr).map_err(|err| {
                    error::parse_build(start.join(self.last_span), self.src, err)
                })?
            }
            Mnemonic::Store { kind, cond } => {
                let rd = self.expect_reg()?;
                let start = self.peek_span();
                let addr = self.expect_addressing_mode()?;
                Instruction::store(kind, cond, rd, addr).map_err(|err| {
                    error::parse_build(start.join(self.last_span), self.src, err)
                })?
            }
            Mnemonic::Area => return self.parse_area().map(Node::Area),
            Mnemonic::Dcb => return self.parse_dcb().map(Node::Data),
            Mnemonic::Dcw => {
                let mut halves = Vec::new();
                loop {
                    let span = self.peek_span();
                    let value = self.expect_number()?;
                    // Unsigned or sign-extended 16-bit
                    if value > 0xFFFF && value < 0xFFFF_8000 {
                        return Err(error::parse_bad_value(
                            span,
                            self.src,
                            "DCW values must fit in 16 bits",
                        ));
                    }
                    halves.push(value as u16);
                    if self.at_line_end() {
                        break;
                    }
                }
                return Ok(Node::Data(DataDef::Halfwords(halves)));
            }
            Mnemonic::Dcd => {
                let values = self.expect_numbers()?;
                return Ok(Node::Data(DataDef::Words(values)));
            }
            Mnemonic::Space => {
                let size = self.expect_number()?;
                return Ok(Node::Data(DataDef::Space(size)));
            }
            Mnemonic::Unsupported => {
                let word = self.get_span(head.span).to_ascii_uppercase();
                return Err(error::parse_unsupported(head.span, self.src, &word));
            }
        };
        Ok(Node::Instruction(ins))
    }

    fn parse_alu(&mut self, op: Op, cond: Condition, s: bool) -> Result<Instruction> {
        let data = |this: &mut Self| -> Result<DataOp> {
            let rd = this.expect_reg()?;
            let rn = this.expect_reg()?;
            let op = this.expect_shifter_operand()?;
            Ok(DataOp { cond, s, rd, rn, op })
        };
        let long = |this: &mut Self| -> Result<LongMultiply> {
            Ok(LongMultiply {
                cond,
                s,
                rdlo: this.expect_reg()?,
                rdhi: this.expect_reg()?,
                rm: this.expect_reg()?,
                rs: this.expect_reg()?,
            })
        };
        let ins = match op {
            Op::Adc => Instruction::Adc(data(self)?),
            Op::Add => Instruction::Add(data(self)?),
            Op::And => Instruction::And(data(self)?),
            Op::Bic => Instruction::Bic(data(self)?),
            Op::Eor => Instruction::Eor(data(self)?),
            Op::Orr => Instruction::Orr(data(self)?),
            Op::Rsb => Instruction::Rsb(data(self)?),
            Op::Rsc => Instruction::Rsc(data(self)?),
            Op::Sbc => Instruction::Sbc(data(self)?),
            Op::Sub => Instruction::Sub(data(self)?),
            Op::Mov | Op::Mvn => {
                let rd = self.expect_reg()?;
                let operand = self.expect_shifter_operand()?;
                let mov = MoveOp {
                    cond,
                    s,
                    rd,
                    op: operand,
                };
                if op == Op::Mov {
                    Instruction::Mov(mov)
                } else {
                    Instruction::Mvn(mov)
                }
            }
            Op::Cmn | Op::Cmp | Op::Teq | Op::Tst => {
                let rn = self.expect_reg()?;
                let cmp = CompareOp {
                    cond,
                    rn,
                    op: self.expect_shifter_operand()?,
                };
                match op {
                    Op::Cmn => Instruction::Cmn(cmp),
                    Op::Cmp => Instruction::Cmp(cmp),
                    Op::Teq => Instruction::Teq(cmp),
                    _ => Instruction::Tst(cmp),
                }
            }
            Op::Mul => Instruction::Mul {
                cond,
                s,
                rd: self.expect_reg()?,
                rm: self.expect_reg()?,
                rs: self.expect_reg()?,
            },
            Op::Mla => Instruction::Mla {
                cond,
                s,
                rd: self.expect_reg()?,
                rm: self.expect_reg()?,
                rs: self.expect_reg()?,
                rn: self.expect_reg()?,
            },
            Op::Smull => Instruction::Smull(long(self)?),
            Op::Smlal => Instruction::Smlal(long(self)?),
            Op::Umull => Instruction::Umull(long(self)?),
            Op::Umlal => Instruction::Umlal(long(self)?),
        };
        Ok(ins)
    }

    fn parse_area(&mut self) -> Result<Area> {
        let name_tok = self.expect(TokenKind::Ident, "area name")?;
        let name = self.get_span(name_tok.span).to_owned();
        let mut attrs = Vec::new();
        while self.peek_kind() == TokenKind::Ident {
            let tok = self.expect(TokenKind::Ident, "area attribute")?;
            let attr: AreaAttr = self.get_span(tok.span).parse().map_err(|_| {
                error::parse_unexpected(tok.span, self.src, "area attribute", "identifier")
            })?;
            // `ALIGN=n` carries a value that is not used
            if attr == AreaAttr::Align && self.peek_kind() == TokenKind::Eq {
                self.bump();
                self.expect_number()?;
            }
            if !attrs.contains(&attr) {
                attrs.push(attr);
            }
        }
        Ok(Area { name, attrs })
    }

    fn parse_dcb(&mut self) -> Result<DataDef> {
        let mut bytes = Vec::new();
        loop {
            let tok = self.expect_operand("string or number")?;
            match tok.kind {
                TokenKind::Str => {
                    let raw = self.get_span(tok.span);
                    // Get rid of start and end \"
                    bytes.extend_from_slice(unescape(&raw[1..raw.len() - 1]).as_bytes());
                }
                TokenKind::Num(val) | TokenKind::Imm(val) => bytes.push(val as u8),
                kind => {
                    return Err(error::parse_unexpected(
                        tok.span,
                        self.src,
                        "string or number",
                        &kind.to_string(),
                    ))
                }
            }
            if self.at_line_end() {
                break;
            }
        }
        Ok(DataDef::Bytes(bytes))
    }

    fn expect_numbers(&mut self) -> Result<Vec<u32>> {
        let mut values = vec![self.expect_number()?];
        while !self.at_line_end() {
            values.push(self.expect_number()?);
        }
        Ok(values)
    }

    fn expect_number(&mut self) -> Result<u32> {
        let tok = self.expect_where(
            |kind| matches!(kind, TokenKind::Num(_) | TokenKind::Imm(_)),
            "number",
        )?;
        match tok.kind {
            TokenKind::Num(val) | TokenKind::Imm(val) => Ok(val),
            _ => Err(error::parse_unexpected(tok.span, self.src, "number", &tok.kind.to_string())),
        }
    }

    /// `#imm`, `Rm`, `Rm, <shift> #n|Rs` or `Rm, RRX`.
    fn expect_shifter_operand(&mut self) -> Result<ShifterOperand> {
        let tok = self.expect_operand("register or immediate")?;
        let base = match tok.kind {
            TokenKind::Imm(val) => return Ok(ShifterOperand::Plain(Operand::Immediate(val))),
            TokenKind::Ident => Operand::Register(self.register_at(tok)?),
            kind => {
                return Err(error::parse_unexpected(
                    tok.span,
                    self.src,
                    "register or immediate",
                    &kind.to_string(),
                ))
            }
        };

        let shift = match self.toks.peek().copied() {
            Some(tok) if tok.kind == TokenKind::Ident => {
                match self.get_span(tok.span).to_ascii_uppercase().as_str() {
                    "LSL" | "ASL" => Shift::Lsl,
                    "LSR" => Shift::Lsr,
                    "ASR" => Shift::Asr,
                    "ROR" => Shift::Ror,
                    "RRX" => Shift::Rrx,
                    _ => return Ok(ShifterOperand::Plain(base)),
                }
            }
            _ => return Ok(ShifterOperand::Plain(base)),
        };
        self.bump();

        let amount = match (shift, self.peek_kind()) {
            // Plain RRX rotates by one
            (Shift::Rrx, TokenKind::Newline | TokenKind::Eof | TokenKind::RBracket) => {
                Operand::Immediate(1)
            }
            _ => {
                let tok = self.expect_operand("shift amount")?;
                match tok.kind {
                    TokenKind::Imm(val) => Operand::Immediate(val),
                    TokenKind::Ident => Operand::Register(self.register_at(tok)?),
                    kind => {
                        return Err(error::parse_unexpected(
                            tok.span,
                            self.src,
                            "shift amount",
                            &kind.to_string(),
                        ))
                    }
                }
            }
        };
        Ok(ShifterOperand::Shifted {
            base,
            shift,
            amount,
        })
    }

    fn expect_addressing_mode(&mut self) -> Result<AddressingMode> {
        let tok = self.expect_operand("addressing mode")?;
        match tok.kind {
            TokenKind::Eq => {
                let tok = self.expect_operand("label or number")?;
                let target = match tok.kind {
                    TokenKind::Ident => Target::Label(self.get_span(tok.span).to_owned()),
                    TokenKind::Num(val) | TokenKind::Imm(val) => Target::Immediate(val),
                    kind => {
                        return Err(error::parse_unexpected(
                            tok.span,
                            self.src,
                            "label or number",
                            &kind.to_string(),
                        ))
                    }
                };
                Ok(AddressingMode::Target(target))
            }
            TokenKind::LBracket => {
                let rn = self.expect_reg()?;
                if self.peek_kind() == TokenKind::RBracket {
                    self.bump();
                    if self.peek_kind() == TokenKind::Bang {
                        self.bump();
                    }
                    if self.at_line_end() {
                        return Ok(AddressingMode::Register(rn));
                    }
                    let offset = self.expect_shifter_operand()?;
                    return Ok(AddressingMode::PostIndexed { rn, offset });
                }
                let offset = self.expect_shifter_operand()?;
                self.expect(TokenKind::RBracket, "`]`")?;
                if self.peek_kind() == TokenKind::Bang {
                    self.bump();
                    Ok(AddressingMode::PreIndexed { rn, offset })
                } else {
                    Ok(AddressingMode::Offset { rn, offset })
                }
            }
            kind => Err(error::parse_unexpected(
                tok.span,
                self.src,
                "`[` or `=`",
                &kind.to_string(),
            )),
        }
    }

    fn expect_target(&mut self) -> Result<Target> {
        let tok = self.expect_operand("label")?;
        match tok.kind {
            TokenKind::Ident => Ok(Target::Label(self.get_span(tok.span).to_owned())),
            TokenKind::Num(val) | TokenKind::Imm(val) => Ok(Target::Immediate(val)),
            kind => Err(error::parse_unexpected(
                tok.span,
                self.src,
                "label",
                &kind.to_string(),
            )),
        }
    }

    fn expect_reg(&mut self) -> Result<Register> {
        let tok = self.expect(TokenKind::Ident, "register")?;
        self.register_at(tok)
    }

    fn register_at(&self, tok: Token) -> Result<Register> {
        self.get_span(tok.span).parse().map_err(|_| {
            error::parse_unexpected(tok.span, self.src, "register", "identifier")
        })
    }

    fn expect(&mut self, expected: TokenKind, name: &str) -> Result<Token> {
        self.expect_where(|kind| *kind == expected, name)
    }

    fn expect_where(
        &mut self,
        check: impl FnOnce(&TokenKind) -> bool,
        expected: &str,
    ) -> Result<Token> {
        let tok = self.expect_operand(expected)?;
        if check(&tok.kind) {
            Ok(tok)
        } else {
            Err(error::parse_unexpected(
                tok.span,
                self.src,
                expected,
                &tok.kind.to_string(),
            ))
        }
    }

    /// Next token, which must not end the statement.
    fn expect_operand(&mut self, expected: &str) -> Result<Token> {
        match self.peek_kind() {
            TokenKind::Newline | TokenKind::Eof => {
                Err(error::parse_eol(self.last_span, self.src, expected))
            }
            _ => Ok(self.bump()),
        }
    }

    fn end_of_statement(&mut self) -> Result<()> {
        match self.peek_kind() {
            TokenKind::Newline => {
                self.bump();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => {
                let span = self.peek_span();
                Err(error::parse_trailing(span, self.src))
            }
        }
    }

    fn at_line_end(&mut self) -> bool {
        matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof)
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.toks.peek().map_or(TokenKind::Eof, |tok| tok.kind)
    }

    fn peek_span(&mut self) -> Span {
        self.toks.peek().map_or(self.last_span, |tok| tok.span)
    }

    /// Consume the next token. Keeps returning `Eof` at the end.
    fn bump(&mut self) -> Token {
        match self.toks.next() {
            Some(tok) => {
                self.last_span = tok.span;
                tok
            }
            None => Token::new(TokenKind::Eof, self.last_span),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(src: &str) -> Air {
        AsmParser::new(src).unwrap().parse().unwrap()
    }

    fn nodes(src: &str) -> Vec<(Option<String>, Node)> {
        parse(src)
            .iter()
            .map(|line| (line.label.clone(), line.node.clone()))
            .collect()
    }

    fn ins(src: &str) -> Instruction {
        match parse(src).get(0).map(|line| line.node.clone()) {
            Some(Node::Instruction(ins)) => ins,
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn mnemonic_suffixes() {
        let alu = |op, cond, s| Some(Mnemonic::Alu { op, cond, s });
        assert_eq!(Mnemonic::classify("add"), alu(Op::Add, Condition::Al, false));
        assert_eq!(Mnemonic::classify("ADDS"), alu(Op::Add, Condition::Al, true));
        assert_eq!(Mnemonic::classify("addeqs"), alu(Op::Add, Condition::Eq, true));
        assert_eq!(Mnemonic::classify("ADDSEQ"), alu(Op::Add, Condition::Eq, true));
        assert_eq!(Mnemonic::classify("MOVLS"), alu(Op::Mov, Condition::Ls, false));
        assert_eq!(Mnemonic::classify("SMULLS"), alu(Op::Smull, Condition::Al, true));
        assert_eq!(Mnemonic::classify("CMPNE"), alu(Op::Cmp, Condition::Ne, false));
        assert_eq!(Mnemonic::classify("CMPS"), None);
        assert_eq!(Mnemonic::classify("subroutine"), None);
    }

    #[test]
    fn branch_suffixes() {
        let b = |link, cond| Some(Mnemonic::Branch { link, cond });
        assert_eq!(Mnemonic::classify("B"), b(false, Condition::Al));
        assert_eq!(Mnemonic::classify("BL"), b(true, Condition::Al));
        assert_eq!(Mnemonic::classify("BLS"), b(false, Condition::Ls));
        assert_eq!(Mnemonic::classify("BLE"), b(false, Condition::Le));
        assert_eq!(Mnemonic::classify("BLLS"), b(true, Condition::Ls));
        assert_eq!(Mnemonic::classify("bleq"), b(true, Condition::Eq));
        assert_eq!(
            Mnemonic::classify("BXNE"),
            Some(Mnemonic::BranchExchange { cond: Condition::Ne })
        );
        assert_eq!(Mnemonic::classify("blue"), None);
    }

    #[test]
    fn transfer_suffixes() {
        let load = |kind, cond| Some(Mnemonic::Load { kind, cond });
        assert_eq!(Mnemonic::classify("LDR"), load(LoadKind::Word, Condition::Al));
        assert_eq!(Mnemonic::classify("LDRHS"), load(LoadKind::Word, Condition::Cs));
        assert_eq!(Mnemonic::classify("LDREQSB"), load(LoadKind::SignedByte, Condition::Eq));
        assert_eq!(Mnemonic::classify("LDRSBEQ"), load(LoadKind::SignedByte, Condition::Eq));
        assert_eq!(Mnemonic::classify("LDSH"), load(LoadKind::SignedHalfword, Condition::Al));
        assert_eq!(Mnemonic::classify("LDRBLS"), load(LoadKind::Byte, Condition::Ls));
        assert_eq!(
            Mnemonic::classify("STRHHI"),
            Some(Mnemonic::Store {
                kind: StoreKind::Halfword,
                cond: Condition::Hi
            })
        );
        assert_eq!(Mnemonic::classify("strings"), None);
        assert_eq!(Mnemonic::classify("LDMIA"), Some(Mnemonic::Unsupported));
        assert_eq!(Mnemonic::classify("SWPB"), Some(Mnemonic::Unsupported));
        assert_eq!(Mnemonic::classify("STMFDEQ"), Some(Mnemonic::Unsupported));
        assert_eq!(Mnemonic::classify("stmt"), None);
    }

    #[test]
    fn data_processing_operands() {
        assert_eq!(
            ins("ADD R0, R1, R2, LSL #2"),
            Instruction::Add(DataOp {
                cond: Condition::Al,
                s: false,
                rd: Register::R0,
                rn: Register::R1,
                op: ShifterOperand::shifted(Register::R2, Shift::Lsl, 2u32),
            })
        );
        assert_eq!(
            ins("movs pc, lr"),
            Instruction::Mov(MoveOp {
                cond: Condition::Al,
                s: true,
                rd: Register::PC,
                op: Register::LR.into(),
            })
        );
        assert_eq!(
            ins("MVN R0, R1, RRX"),
            Instruction::Mvn(MoveOp {
                cond: Condition::Al,
                s: false,
                rd: Register::R0,
                op: ShifterOperand::shifted(Register::R1, Shift::Rrx, 1u32),
            })
        );
        assert_eq!(
            ins("TST R3, R4, ROR R5"),
            Instruction::Tst(CompareOp {
                cond: Condition::Al,
                rn: Register::R3,
                op: ShifterOperand::shifted(Register::R4, Shift::Ror, Register::R5),
            })
        );
    }

    #[test]
    fn addressing_modes() {
        let addr = |src: &str| match ins(src) {
            Instruction::Ldr(t) | Instruction::Str(t) => t.addr,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(addr("LDR R0, [R1]"), AddressingMode::Register(Register::R1));
        assert_eq!(
            addr("LDR R0, [R1, #4]"),
            AddressingMode::Offset {
                rn: Register::R1,
                offset: 4u32.into()
            }
        );
        assert_eq!(
            addr("STR R0, [R1, #-4]!"),
            AddressingMode::PreIndexed {
                rn: Register::R1,
                offset: (-4i32 as u32).into()
            }
        );
        assert_eq!(
            addr("LDR R0, [R1], R2, LSL #1"),
            AddressingMode::PostIndexed {
                rn: Register::R1,
                offset: ShifterOperand::shifted(Register::R2, Shift::Lsl, 1u32)
            }
        );
        assert_eq!(
            addr("LDR R0, =msg"),
            AddressingMode::Target(Target::Label("msg".into()))
        );
        assert_eq!(
            addr("LDR R0, =0xAB"),
            AddressingMode::Target(Target::Immediate(0xAB))
        );
    }

    #[test]
    fn labels() {
        let src = "
start   MOV R0, #1
loop:   B loop
alone
        MOV R1, #2
";
        let labels: Vec<_> = nodes(src).into_iter().map(|(label, _)| label).collect();
        assert_eq!(
            labels,
            vec![Some("start".into()), Some("loop".into()), Some("alone".into())]
        );
    }

    #[test]
    fn mnemonic_spelled_labels() {
        let src = "
bcc     B loop
movs:   MOV R0, #1
addeq   ADD R0, R0, #1
        B bcc
        BLT blt
blt     MOV R1, #2
";
        let parsed = nodes(src);
        let labels: Vec<_> = parsed.iter().map(|(label, _)| label.clone()).collect();
        assert_eq!(
            labels,
            vec![
                Some("bcc".into()),
                Some("movs".into()),
                Some("addeq".into()),
                None,
                None,
                Some("blt".into()),
            ]
        );
        let targets: Vec<_> = parsed
            .iter()
            .filter_map(|(_, node)| match node {
                Node::Instruction(ins) => ins.target().and_then(|t| t.label()).map(str::to_owned),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec!["loop", "bcc", "blt"]);
    }

    #[test]
    fn directives() {
        let src = r#"
        AREA Strings, DATA, READWRITE, ALIGN=2
msg     DCB "hi\n", 0
        DCW 0x1234, -1
nums    DCD 1, 0xFFFFFFFF
buf     SPACE 16
"#;
        assert_eq!(
            nodes(src),
            vec![
                (
                    None,
                    Node::Area(Area {
                        name: "Strings".into(),
                        attrs: vec![AreaAttr::Data, AreaAttr::ReadWrite, AreaAttr::Align],
                    })
                ),
                (Some("msg".into()), Node::Data(DataDef::Bytes(b"hi\n\0".to_vec()))),
                (None, Node::Data(DataDef::Halfwords(vec![0x1234, 0xFFFF]))),
                (Some("nums".into()), Node::Data(DataDef::Words(vec![1, u32::MAX]))),
                (Some("buf".into()), Node::Data(DataDef::Space(16))),
            ]
        );
    }

    #[test]
    fn statement_spans() {
        let src = "start ADD R0, R1, #1 ; comment";
        let air = parse(src);
        let span = air.get(0).map(|line| line.span).unwrap();
        assert_eq!(&src[span.as_range()], "ADD R0, R1, #1");
    }

    #[test]
    fn parse_errors() {
        let fails = |src: &str| AsmParser::new(src).and_then(|p| p.parse()).is_err();
        // missing operand
        assert!(fails("ADD R0, R1"));
        // trailing operand
        assert!(fails("MOV R0, R1, R2"));
        // bad register
        assert!(fails("MOV R16, #1"));
        // unknown mnemonic after label
        assert!(fails("start FROB R0"));
        // pseudo target on a byte load
        assert!(fails("LDRB R0, =msg"));
        // unsupported instruction
        assert!(fails("STMFD SP!, {R0}"));
        // label without statement
        assert!(fails("MOV R0, #1\nend"));
        // unclosed bracket
        assert!(fails("LDR R0, [R1, #4"));
        // halfword out of range
        assert!(fails("DCW 0x12345"));
        assert!(!fails("DCW 0xFFFF, -0x8000"));
    }

    #[test]
    fn unescape_sequences() {
        assert_eq!(unescape("plain"), "plain");
        assert_eq!(unescape(r#"a\tb\"c\\"#), "a\tb\"c\\");
        assert_eq!(unescape(r"\q"), r"\q");
    }
}
