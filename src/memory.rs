//! The flat byte-addressed story image and its dynamic/static/high regions.

use crate::error::{ZError, ZResult};
use crate::header::Header;

/// A loaded story file: header plus the raw byte image.
///
/// Bytes `[0, base_static_mem)` are dynamic (writable). Bytes
/// `[base_static_mem, base_high_mem)` are static. Bytes from `base_high_mem`
/// onward are high memory, reachable only through packed addresses. Both
/// static and high memory are read-only at run time.
pub struct Game {
    pub header: Header,
    pub memory: Vec<u8>,
    /// Snapshot of dynamic memory as loaded, used by `restart` and by Quetzal's
    /// XOR-based `CMem` compression.
    original_dynamic: Vec<u8>,
}

impl Game {
    pub fn load(bytes: Vec<u8>) -> ZResult<Game> {
        let header = Header::new(&bytes)?;
        if bytes.len() < header.len_file && header.len_file != 0 {
            return Err(ZError::format(format!(
                "story file truncated: header declares {} bytes, got {}",
                header.len_file,
                bytes.len()
            )));
        }
        let static_base = header.base_static_mem as usize;
        let original_dynamic = bytes[..static_base.min(bytes.len())].to_vec();
        Ok(Game {
            header,
            memory: bytes,
            original_dynamic,
        })
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    fn check_read(&self, addr: u32) -> ZResult<()> {
        if (addr as usize) >= self.memory.len() {
            return Err(ZError::Address {
                addr,
                len: self.memory.len() as u32,
            });
        }
        Ok(())
    }

    pub fn byte(&self, addr: u32) -> ZResult<u8> {
        self.check_read(addr)?;
        Ok(self.memory[addr as usize])
    }

    pub fn word(&self, addr: u32) -> ZResult<u16> {
        self.check_read(addr + 1)?;
        let a = addr as usize;
        Ok(((self.memory[a] as u16) << 8) | (self.memory[a + 1] as u16))
    }

    pub fn sword(&self, addr: u32) -> ZResult<i16> {
        Ok(self.word(addr)? as i16)
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) -> ZResult<()> {
        if (addr as usize) >= self.header.base_static_mem as usize {
            return Err(ZError::Protection { addr });
        }
        self.check_read(addr)?;
        self.memory[addr as usize] = value;
        Ok(())
    }

    pub fn write_word(&mut self, addr: u32, value: u16) -> ZResult<()> {
        if (addr as usize + 1) >= self.header.base_static_mem as usize {
            return Err(ZError::Protection { addr });
        }
        self.check_read(addr + 1)?;
        let a = addr as usize;
        self.memory[a] = (value >> 8) as u8;
        self.memory[a + 1] = value as u8;
        Ok(())
    }

    pub fn slice(&self, addr: u32, len: usize) -> ZResult<&[u8]> {
        let a = addr as usize;
        if a + len > self.memory.len() {
            return Err(ZError::Address {
                addr,
                len: self.memory.len() as u32,
            });
        }
        Ok(&self.memory[a..a + len])
    }

    pub fn packed_routine(&self, packed: u16) -> u32 {
        packed as u32 * self.header.packed_address_factor()
    }

    pub fn packed_string(&self, packed: u16) -> u32 {
        packed as u32 * self.header.packed_address_factor()
    }

    /// Restore dynamic memory to its as-loaded contents; static/high memory
    /// is never mutated so it needs no restoration.
    pub fn restart(&mut self) {
        let n = self.original_dynamic.len();
        self.memory[..n].copy_from_slice(&self.original_dynamic);
    }

    pub fn original_dynamic_memory(&self) -> &[u8] {
        &self.original_dynamic
    }

    pub fn dynamic_memory(&self) -> &[u8] {
        &self.memory[..self.header.base_static_mem as usize]
    }

    /// Overwrite dynamic memory wholesale, as used by `restore`.
    pub fn set_dynamic_memory(&mut self, bytes: &[u8]) -> ZResult<()> {
        let n = self.header.base_static_mem as usize;
        if bytes.len() != n {
            return Err(ZError::format(format!(
                "restored dynamic memory has {} bytes, expected {n}",
                bytes.len()
            )));
        }
        self.memory[..n].copy_from_slice(bytes);
        Ok(())
    }

    /// 16-bit checksum over `[0x40, len_file)`, per the `verify` opcode.
    pub fn checksum(&self) -> u16 {
        let start = 0x40usize;
        let end = self.header.len_file.min(self.memory.len());
        if end <= start {
            return 0;
        }
        self.memory[start..end]
            .iter()
            .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(static_base: u16) -> Game {
        let mut bytes = vec![0u8; 256];
        bytes[0] = 3;
        bytes[0x0E] = (static_base >> 8) as u8;
        bytes[0x0F] = static_base as u8;
        Game::load(bytes).unwrap()
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut g = image(0x80);
        g.write_byte(0x10, 42).unwrap();
        assert_eq!(g.byte(0x10).unwrap(), 42);
    }

    #[test]
    fn write_outside_dynamic_fails() {
        let mut g = image(0x80);
        assert!(g.write_byte(0x80, 1).is_err());
        assert!(g.write_byte(0x90, 1).is_err());
    }

    #[test]
    fn read_outside_image_fails() {
        let g = image(0x80);
        assert!(g.byte(1000).is_err());
    }

    #[test]
    fn restart_restores_dynamic_memory() {
        let mut g = image(0x80);
        g.write_byte(0x10, 99).unwrap();
        g.restart();
        assert_eq!(g.byte(0x10).unwrap(), 0);
    }

    #[test]
    fn failed_write_leaves_byte_unchanged() {
        let mut g = image(0x80);
        let before = g.byte(0x80).unwrap();
        let _ = g.write_byte(0x80, 5);
        assert_eq!(g.byte(0x80).unwrap(), before);
    }
}
