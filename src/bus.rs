//! Memory-mapped peripheral bus.
//!
//! Peripherals are a closed set of device variants behind one
//! read/write capability; the bus owns the address-window registry and
//! forwards in-window accesses with the base subtracted. Windows must
//! not overlap; that is enforced here, not by the devices.

use crate::cpu::Fault;
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::trace;

/// Flat cell framebuffer behind the display window. Rendering itself is
/// a host concern; the core only stores cells.
#[derive(Debug, Clone)]
pub struct Display {
    cells: Vec<u64>,
}

impl Display {
    pub const WINDOW: u64 = 0x400;

    pub fn new() -> Self {
        Self {
            cells: vec![0; Self::WINDOW as usize],
        }
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

/// Input buffer fed by the host through the bus write contract.
/// Reading an empty buffer returns 0 immediately, it never blocks.
#[derive(Debug, Clone, Default)]
pub struct Keyboard {
    buffer: VecDeque<u64>,
}

impl Keyboard {
    pub const WINDOW: u64 = 0x10;

    pub fn new() -> Self {
        Self::default()
    }
}

/// Uniform 16-bit source; writes are ignored.
#[derive(Debug, Clone)]
pub struct Random {
    rng: StdRng,
}

impl Random {
    pub const WINDOW: u64 = 0x10;

    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

/// Block storage device, optionally seeded from an external image file
/// (one byte per cell).
#[derive(Debug, Clone)]
pub struct Storage {
    cells: Vec<u64>,
}

impl Storage {
    pub const WINDOW: u64 = 0x400;

    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![0; size],
        }
    }

    pub fn from_image(bytes: &[u8], size: usize) -> Self {
        let mut cells = vec![0; size.max(bytes.len())];
        for (cell, byte) in cells.iter_mut().zip(bytes) {
            *cell = *byte as u64;
        }
        Self { cells }
    }
}

/// The closed set of peripherals the bus can dispatch to.
#[derive(Debug, Clone)]
pub enum Device {
    Display(Display),
    Keyboard(Keyboard),
    Random(Random),
    Storage(Storage),
}

impl Device {
    fn read(&mut self, offset: u64, addr: u64) -> Result<u64, Fault> {
        match self {
            Device::Display(d) => d
                .cells
                .get(offset as usize)
                .copied()
                .ok_or(Fault::AddressOutOfRange { addr }),
            Device::Keyboard(k) => Ok(k.buffer.pop_front().unwrap_or(0)),
            Device::Random(r) => Ok(r.rng.gen_range(0..=0xFFFF)),
            Device::Storage(s) => s
                .cells
                .get(offset as usize)
                .copied()
                .ok_or(Fault::AddressOutOfRange { addr }),
        }
    }

    fn write(&mut self, offset: u64, value: u64, addr: u64) -> Result<(), Fault> {
        match self {
            Device::Display(d) => {
                let cell = d
                    .cells
                    .get_mut(offset as usize)
                    .ok_or(Fault::AddressOutOfRange { addr })?;
                *cell = value;
                Ok(())
            }
            Device::Keyboard(k) => {
                k.buffer.push_back(value);
                Ok(())
            }
            Device::Random(_) => Ok(()), // writes are a no-op for the RNG
            Device::Storage(s) => {
                let cell = s
                    .cells
                    .get_mut(offset as usize)
                    .ok_or(Fault::AddressOutOfRange { addr })?;
                *cell = value;
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Device::Display(_) => "display",
            Device::Keyboard(_) => "keyboard",
            Device::Random(_) => "random",
            Device::Storage(_) => "storage",
        }
    }
}

struct Mapping {
    base: u64,
    window: u64,
    dev: Device,
}

/// Address-window dispatcher. Each device owns `[base, base+window)`.
#[derive(Default)]
pub struct Bus {
    maps: Vec<Mapping>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device window. Overlapping windows are a
    /// configuration error.
    pub fn attach(&mut self, base: u64, window: u64, dev: Device) -> Result<()> {
        for m in &self.maps {
            if base < m.base + m.window && m.base < base + window {
                bail!(
                    "window {:#06x}+{:#x} for {} overlaps {} at {:#06x}",
                    base,
                    window,
                    dev.name(),
                    m.dev.name(),
                    m.base
                );
            }
        }
        self.maps.push(Mapping { base, window, dev });
        Ok(())
    }

    fn lookup(&mut self, addr: u64) -> Result<(&mut Device, u64), Fault> {
        for m in &mut self.maps {
            if addr >= m.base && addr < m.base + m.window {
                return Ok((&mut m.dev, addr - m.base));
            }
        }
        Err(Fault::AddressOutOfRange { addr })
    }

    pub fn read(&mut self, addr: u64) -> Result<u64, Fault> {
        let (dev, offset) = self.lookup(addr)?;
        dev.read(offset, addr)
    }

    pub fn write(&mut self, addr: u64, value: u64) -> Result<(), Fault> {
        let (dev, offset) = self.lookup(addr)?;
        dev.write(offset, value, addr)
    }

    /// Post-dispatch render hook. Real rendering lives outside the
    /// core; only visual devices emit anything, and only at trace level.
    pub fn render_all(&self) {
        for m in &self.maps {
            if let Device::Display(_) = m.dev {
                trace!(base = m.base, "display render hook");
            }
        }
    }
}
