use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::registers::{RegisterSnapshot, CPSR_INDEX};

#[macro_export]
macro_rules! dprint {
    ( $vis:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Visibility::*;
        let s = format!(
            $fmt
            $($tt)*
        );
        $crate::output::Output::Debugger($vis).print_str(&s);
    }};
}

#[macro_export]
macro_rules! dprintln {
    ( $vis:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::Visibility::*;
        $crate::output::Output::Debugger($vis).print_str("\n");
    }};
    ( $vis:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Visibility::*;
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Debugger($vis).print_str(&s);
    }};
}

#[derive(Clone, Copy, Debug)]
pub enum Output {
    /// Program results, on stdout
    Normal,
    /// Debugger chatter, on stderr
    Debugger(Visibility),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    /// Printed even with `--minimal`, without color
    Always,
    /// Suppressed with `--minimal`
    Sometimes,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_LINE_START: RefCell<bool> = const { RefCell::new(true) };
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_line_start(new_value: bool) -> bool {
        Self::IS_LINE_START.with(|value| value.replace(new_value))
    }
    /// Private. Use [`Output::start_new_line`].
    fn is_line_start() -> bool {
        Self::IS_LINE_START.with(|value| *value.borrow())
    }
    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    fn set_line_start_from_str(string: &str) {
        if let Some(ch) = Decolored::new(string).last() {
            Output::set_line_start(ch == '\n');
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                if Self::is_minimal() {
                    print_colorless(string);
                } else {
                    print!("{}", string);
                }
                Self::set_line_start_from_str(string);
            }
            Self::Debugger(visibility) => match (Self::is_minimal(), *visibility) {
                (false, _) => {
                    eprint!("{}", ColoredString::from(string).blue());
                    Self::set_line_start_from_str(string);
                }
                (true, Visibility::Always) => {
                    eprint_colorless(string);
                    Self::set_line_start_from_str(string);
                }
                (true, Visibility::Sometimes) => (),
            },
        }
    }

    pub fn start_new_line(&self) {
        if !Self::is_line_start() {
            self.print_str("\n");
        }
    }

    /// One line per register, `*` marking those written by the last step.
    pub fn print_registers(&self, regs: &RegisterSnapshot, changed: &[usize]) {
        self.print_str(&format_registers(regs, changed, Self::is_minimal()));
    }

    /// Hex dump of `bytes`, 16 to a row, labelled with addresses from `addr`.
    pub fn print_memory(&self, addr: u32, bytes: &[u8]) {
        self.print_str(&format_memory(addr, bytes, Self::is_minimal()));
    }
}

fn format_registers(regs: &RegisterSnapshot, changed: &[usize], minimal: bool) -> String {
    let mut out = String::new();
    if minimal {
        for (i, value) in regs.regs.iter().enumerate() {
            out.push_str(&format!("R{} {}\n", i, *value as i32));
        }
        out.push_str(&format!("CPSR 0x{:08X}\n", regs.cpsr));
        return out;
    }

    for (i, value) in regs.regs.iter().enumerate() {
        let mark = if changed.contains(&i) { "*" } else { " " };
        let name = format!("R{}", i);
        out.push_str(&format!(
            "{}\t{:<4} = 0x{:08X} = {}\n",
            mark.yellow().bold(),
            name.bold(),
            value,
            *value as i32
        ));
    }
    let mark = if changed.contains(&CPSR_INDEX) { "*" } else { " " };
    out.push_str(&format!(
        "{}\t{:<4} = 0x{:08X}   {}\n",
        mark.yellow().bold(),
        "CPSR".bold(),
        regs.cpsr,
        regs.flags()
    ));
    out
}

fn format_memory(addr: u32, bytes: &[u8], minimal: bool) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let row_addr = addr.wrapping_add(row as u32 * 16);
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        if minimal {
            out.push_str(&format!("0x{:08X} {}\n", row_addr, hex.join(" ")));
            continue;
        }
        let text: String = chunk
            .iter()
            .map(|&b| match b {
                0x20..=0x7e => b as char,
                _ => '.',
            })
            .collect();
        out.push_str(&format!(
            "\x1b[2m0x{:08X}\x1b[0m  {:<47}  \x1b[2m│\x1b[0m{}\n",
            row_addr,
            hex.join(" "),
            text
        ));
    }
    out
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn eprint_colorless(string: &str) {
    eprint!("{}", Decolored::new(string).collect::<String>());
}

fn print_colorless(string: &str) {
    print!("{}", Decolored::new(string).collect::<String>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
    }

    #[test]
    fn register_lines() {
        colored::control::set_override(false);
        let mut regs = RegisterSnapshot {
            regs: [0; 16],
            cpsr: 0x6000_0000,
        };
        regs.regs[0] = 0xFFFF_FFFF;
        let text = format_registers(&regs, &[0, CPSR_INDEX], false);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 17);
        assert_eq!(lines[0], "*\tR0   = 0xFFFFFFFF = -1");
        assert_eq!(lines[1], " \tR1   = 0x00000000 = 0");
        assert_eq!(lines[16], "*\tCPSR = 0x60000000   N = 0, Z = 1, C = 1, V = 0");

        let minimal = format_registers(&regs, &[], true);
        assert!(minimal.starts_with("R0 -1\nR1 0\n"));
        assert!(minimal.ends_with("CPSR 0x60000000\n"));
    }

    #[test]
    fn memory_rows() {
        let bytes: Vec<u8> = (0..20).collect();
        let text = format_memory(0xA100_0000, &bytes, true);
        assert_eq!(
            text,
            "0xA1000000 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F\n\
             0xA1000010 10 11 12 13\n"
        );
    }
}
