//! Flat, byte-addressed data memory.
//!
//! No cache hierarchy, no MMU, no page faults: a fixed-size byte array
//! initialized to `0xFF`, with a single configurable access latency applied
//! uniformly by the MEM stage (see `stages::mem_stage`). Word accesses are
//! little-endian.

/// A fixed-size, little-endian byte-addressed memory.
pub struct DataMemory {
    bytes: Vec<u8>,
}

impl DataMemory {
    pub fn new(size: usize) -> Self {
        Self { bytes: vec![0xFF; size] }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Reads a little-endian word at `address`. Out-of-bounds reads are a
    /// soft error (spec §7): logged, and the read is suppressed, returning 0.
    pub fn read_word(&self, address: u32) -> u32 {
        let addr = address as usize;
        match self.bytes.get(addr..addr + 4) {
            Some(bytes) => u32::from_le_bytes(bytes.try_into().unwrap()),
            None => {
                eprintln!(
                    "[WARN] memory read out of bounds: address {:#010x}, size {:#x}",
                    address,
                    self.bytes.len()
                );
                0
            }
        }
    }

    /// Writes a little-endian word at `address`. Out-of-bounds writes are a
    /// soft error (spec §7): logged, and the write is suppressed.
    pub fn write_word(&mut self, address: u32, value: u32) {
        let addr = address as usize;
        if addr + 4 > self.bytes.len() {
            eprintln!(
                "[WARN] memory write out of bounds: address {:#010x}, size {:#x}",
                address,
                self.bytes.len()
            );
            return;
        }
        self.bytes[addr..addr + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Writes a single byte, used by the loader to seed initial contents.
    pub fn write_byte(&mut self, address: u32, value: u8) {
        if let Some(slot) = self.bytes.get_mut(address as usize) {
            *slot = value;
        }
    }

    /// Prints the contents of `[start, end)` as hex, four bytes per line,
    /// matching the original simulator's debug dump layout.
    pub fn print_range(&self, start: u32, end: u32) {
        println!("data_memory[{:#010x}:{:#010x}]", start, end);
        for i in start..end {
            if i % 4 == 0 {
                print!("{:#010x}: ", i);
            }
            let byte = self.bytes.get(i as usize).copied().unwrap_or(0xFF);
            print!("{:02x} ", byte);
            if i % 4 == 3 {
                println!();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_memory_reads_as_all_ones() {
        let mem = DataMemory::new(16);
        assert_eq!(mem.read_word(0), 0xFFFF_FFFF);
    }

    #[test]
    fn little_endian_round_trip() {
        let mut mem = DataMemory::new(16);
        mem.write_word(4, 0x0A0B_0C0D);
        assert_eq!(mem.read_word(4), 0x0A0B_0C0D);
        // Verify actual byte order, not just round-trip.
        mem.write_word(0, 0x0000_000A);
        let mut raw = [0u8; 4];
        for (i, slot) in raw.iter_mut().enumerate() {
            *slot = mem.bytes[i];
        }
        assert_eq!(raw, [0x0A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn out_of_bounds_access_is_suppressed_not_fatal() {
        let mut mem = DataMemory::new(8);
        assert_eq!(mem.read_word(100), 0);
        mem.write_word(100, 42);
        assert_eq!(mem.read_word(0), 0xFFFF_FFFF);
    }
}
