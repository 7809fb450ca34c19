use crate::cpu::Fault;
use crate::listing;
use tracing::warn;

/// The unified writable memory: a fixed-size, zero-initialized array of
/// 64-bit word cells. Out-of-range access is a fault, never a clamp.
#[derive(Clone)]
pub struct Memory {
    cells: Vec<u64>,
}

impl Memory {
    pub fn new(words: usize) -> Self {
        Self {
            cells: vec![0; words],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, addr: u64) -> Result<usize, Fault> {
        let idx = addr as usize;
        if addr < self.cells.len() as u64 {
            Ok(idx)
        } else {
            Err(Fault::AddressOutOfRange { addr })
        }
    }

    pub fn read(&self, addr: u64) -> Result<u64, Fault> {
        Ok(self.cells[self.index(addr)?])
    }

    pub fn write(&mut self, addr: u64, value: u64) -> Result<(), Fault> {
        let idx = self.index(addr)?;
        self.cells[idx] = value;
        Ok(())
    }

    /// Loads `(address, word)` pairs from a hex listing, skipping
    /// malformed lines.
    pub fn load_listing(&mut self, text: &str) -> Result<(), Fault> {
        for (addr, word) in listing::parse_listing(text) {
            self.write(addr, word)?;
        }
        Ok(())
    }

    // Processing-in-memory: each op reads two cells and writes a third
    // without staging through registers. Integer cells are two's
    // complement i64 views; float cells hold f32 bit patterns
    // zero-extended into the word.

    pub fn pim_add(&mut self, a: u64, b: u64, dst: u64) -> Result<(), Fault> {
        let r = (self.read(a)? as i64).wrapping_add(self.read(b)? as i64);
        self.write(dst, r as u64)
    }

    pub fn pim_sub(&mut self, a: u64, b: u64, dst: u64) -> Result<(), Fault> {
        let r = (self.read(a)? as i64).wrapping_sub(self.read(b)? as i64);
        self.write(dst, r as u64)
    }

    pub fn pim_mul(&mut self, a: u64, b: u64, dst: u64) -> Result<(), Fault> {
        let r = (self.read(a)? as i64).wrapping_mul(self.read(b)? as i64);
        self.write(dst, r as u64)
    }

    /// Division by zero is tolerated: reported, destination untouched.
    pub fn pim_div(&mut self, a: u64, b: u64, dst: u64) -> Result<(), Fault> {
        let divisor = self.read(b)? as i64;
        if divisor == 0 {
            warn!(addr = b, "PIM integer division by zero, destination unchanged");
            return Ok(());
        }
        let r = (self.read(a)? as i64).wrapping_div(divisor);
        self.write(dst, r as u64)
    }

    fn read_f32(&self, addr: u64) -> Result<f32, Fault> {
        Ok(f32::from_bits(self.read(addr)? as u32))
    }

    fn write_f32(&mut self, addr: u64, value: f32) -> Result<(), Fault> {
        self.write(addr, value.to_bits() as u64)
    }

    pub fn pim_fadd(&mut self, a: u64, b: u64, dst: u64) -> Result<(), Fault> {
        let r = self.read_f32(a)? + self.read_f32(b)?;
        self.write_f32(dst, r)
    }

    pub fn pim_fsub(&mut self, a: u64, b: u64, dst: u64) -> Result<(), Fault> {
        let r = self.read_f32(a)? - self.read_f32(b)?;
        self.write_f32(dst, r)
    }

    pub fn pim_fmul(&mut self, a: u64, b: u64, dst: u64) -> Result<(), Fault> {
        let r = self.read_f32(a)? * self.read_f32(b)?;
        self.write_f32(dst, r)
    }

    pub fn pim_fdiv(&mut self, a: u64, b: u64, dst: u64) -> Result<(), Fault> {
        let divisor = self.read_f32(b)?;
        if divisor == 0.0 {
            warn!(addr = b, "PIM float division by zero, destination unchanged");
            return Ok(());
        }
        let r = self.read_f32(a)? / divisor;
        self.write_f32(dst, r)
    }
}

/// Read-only boot memory. Fetch prefers it when PC is inside its bounds;
/// nothing in the ISA can write it.
#[derive(Clone)]
pub struct Rom {
    cells: Vec<u64>,
}

impl Rom {
    pub fn new(words: usize) -> Self {
        Self {
            cells: vec![0; words],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn read(&self, addr: u64) -> Result<u64, Fault> {
        self.cells
            .get(addr as usize)
            .copied()
            .ok_or(Fault::AddressOutOfRange { addr })
    }

    /// Seeds the ROM image from a hex listing before execution starts.
    pub fn load_listing(&mut self, text: &str) -> Result<(), Fault> {
        for (addr, word) in listing::parse_listing(text) {
            if addr >= self.cells.len() as u64 {
                return Err(Fault::AddressOutOfRange { addr });
            }
            self.cells[addr as usize] = word;
        }
        Ok(())
    }
}
