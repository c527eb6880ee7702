use crate::error::{MemoryError, Width};

/// Virtual address of the first byte of data memory.
pub const DATA_BASE: u32 = 0xA100_0000;
/// Default amount of data memory in bytes.
pub const DEFAULT_SIZE: usize = 1024;
/// Largest size that keeps every address within 32 bits.
pub const MAX_SIZE: usize = (u32::MAX - DATA_BASE) as usize + 1;

/// Byte-addressable little-endian data memory at a fixed base address.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Memory {
    base: u32,
    buf: Vec<u8>,
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new(DEFAULT_SIZE)
    }
}

impl Memory {
    /// Sizes above [`MAX_SIZE`] are clamped.
    pub fn new(size: usize) -> Self {
        Memory {
            base: DATA_BASE,
            buf: vec![0; size.min(MAX_SIZE)],
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// One past the last valid address, as a 64-bit value so it cannot wrap.
    fn end(&self) -> u64 {
        self.base as u64 + self.buf.len() as u64
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && (addr as u64) < self.end()
    }

    /// Translate a virtual address into a buffer index for an access of `width`.
    fn index(&self, addr: u32, width: Width) -> Result<usize, MemoryError> {
        if addr % width.bytes() != 0 {
            return Err(MemoryError::Misaligned { addr, width });
        }
        if addr < self.base || addr as u64 + width.bytes() as u64 > self.end() {
            return Err(MemoryError::OutOfBounds {
                addr,
                base: self.base,
                end: self.end().min(u32::MAX as u64) as u32,
            });
        }
        Ok((addr - self.base) as usize)
    }

    pub fn load_byte(&self, addr: u32) -> Result<u32, MemoryError> {
        let idx = self.index(addr, Width::Byte)?;
        Ok(self.buf[idx] as u32)
    }

    pub fn load_halfword(&self, addr: u32) -> Result<u32, MemoryError> {
        let idx = self.index(addr, Width::Halfword)?;
        Ok(u16::from_le_bytes([self.buf[idx], self.buf[idx + 1]]) as u32)
    }

    pub fn load_word(&self, addr: u32) -> Result<u32, MemoryError> {
        let idx = self.index(addr, Width::Word)?;
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.buf[idx..idx + 4]);
        Ok(u32::from_le_bytes(bytes))
    }

    /// Only the low byte of `value` is stored.
    pub fn store_byte(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        let idx = self.index(addr, Width::Byte)?;
        self.buf[idx] = value as u8;
        Ok(())
    }

    /// Only the low halfword of `value` is stored.
    pub fn store_halfword(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        let idx = self.index(addr, Width::Halfword)?;
        self.buf[idx..idx + 2].copy_from_slice(&(value as u16).to_le_bytes());
        Ok(())
    }

    pub fn store_word(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        let idx = self.index(addr, Width::Word)?;
        self.buf[idx..idx + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Store a run of bytes starting at `addr`. Stops at the first failing byte.
    pub fn store_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        for (i, byte) in bytes.iter().enumerate() {
            self.store_byte(addr.wrapping_add(i as u32), *byte as u32)?;
        }
        Ok(())
    }

    /// Bytes in `addr..addr + len` for display; the part outside memory is dropped.
    pub fn range_to_bytes(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len as u64)
            .map(|i| addr as u64 + i)
            .filter(|a| *a >= self.base as u64 && *a < self.end())
            .map(|a| self.buf[(a - self.base as u64) as usize])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_round_trip() {
        let mut mem = Memory::new(64);
        for addr in (DATA_BASE..DATA_BASE + 64).step_by(4) {
            let value = addr ^ 0xDEAD_BEEF;
            mem.store_word(addr, value).unwrap();
            assert_eq!(mem.load_word(addr), Ok(value));
        }
    }

    #[test]
    fn little_endian_layout() {
        let mut mem = Memory::new(16);
        mem.store_word(DATA_BASE, 0x1122_3344).unwrap();
        assert_eq!(mem.range_to_bytes(DATA_BASE, 4), vec![0x44, 0x33, 0x22, 0x11]);
        assert_eq!(mem.load_halfword(DATA_BASE + 2), Ok(0x1122));
        assert_eq!(mem.load_byte(DATA_BASE + 1), Ok(0x33));
    }

    #[test]
    fn stores_truncate() {
        let mut mem = Memory::new(16);
        mem.store_byte(DATA_BASE, 0x1FF).unwrap();
        mem.store_halfword(DATA_BASE + 2, 0xABCD_1234).unwrap();
        assert_eq!(mem.load_byte(DATA_BASE), Ok(0xFF));
        assert_eq!(mem.load_halfword(DATA_BASE + 2), Ok(0x1234));
    }

    #[test]
    fn misaligned_access() {
        let mut mem = Memory::new(16);
        assert_eq!(
            mem.load_word(DATA_BASE + 2),
            Err(MemoryError::Misaligned {
                addr: DATA_BASE + 2,
                width: Width::Word
            })
        );
        assert!(matches!(
            mem.store_halfword(DATA_BASE + 1, 0),
            Err(MemoryError::Misaligned { .. })
        ));
        assert!(mem.load_byte(DATA_BASE + 3).is_ok());
    }

    #[test]
    fn out_of_bounds_access() {
        let mut mem = Memory::new(16);
        assert!(matches!(
            mem.load_word(DATA_BASE + 16),
            Err(MemoryError::OutOfBounds { .. })
        ));
        assert!(matches!(
            mem.store_byte(DATA_BASE - 1, 0),
            Err(MemoryError::OutOfBounds { .. })
        ));
        assert!(matches!(
            mem.load_byte(0),
            Err(MemoryError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn range_is_clipped() {
        let mut mem = Memory::new(4);
        mem.store_bytes(DATA_BASE, b"abcd").unwrap();
        assert_eq!(mem.range_to_bytes(DATA_BASE + 2, 8), b"cd".to_vec());
        assert!(mem.range_to_bytes(0, 4).is_empty());
    }

    #[test]
    fn contains_covers_buffer_only() {
        let mem = Memory::new(4);
        assert!(mem.contains(DATA_BASE));
        assert!(mem.contains(DATA_BASE + 3));
        assert!(!mem.contains(DATA_BASE + 4));
        assert!(!mem.contains(DATA_BASE - 1));
    }
}
