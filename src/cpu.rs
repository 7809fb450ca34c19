use crate::bus::Bus;
use crate::decoder;
use crate::disasm::fmt_decoded;
use crate::exec::{self, Flow};
use crate::memory::{Memory, Rom};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Stack pointer register by convention.
pub const SP: usize = 14;
/// Heap-allocation pointer register by convention.
pub const HP: usize = 15;

pub const GPR_COUNT: usize = 64;
pub const FPR_COUNT: usize = 64;
pub const VREG_COUNT: usize = 4;
pub const VREG_LANES: usize = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CpuConfig {
    /// Unified memory size in words.
    pub mem_words: usize,
    /// Boot ROM size in words; fetch prefers ROM below this bound.
    pub rom_words: usize,
    /// Base address of the interrupt vector table in unified memory.
    pub vector_base: u64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            mem_words: 0x10000,
            rom_words: 0x10,
            vector_base: 0x80,
        }
    }
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags: u8 {
const Z = 1 << 0; // result == 0
const N = 1 << 1; // result != 0 (consulted by nothing; kept for the contract)
const C = 1 << 2; // reserved, never written
const V = 1 << 3; // reserved, never written
}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Running,
    Halted,
}

#[derive(thiserror::Error, Debug)]
pub enum Fault {
    #[error("invalid instruction {word:#018x} at {pc:#06x}")]
    InvalidInstruction { pc: u64, word: u64 },
    #[error("address out of range: {addr:#06x}")]
    AddressOutOfRange { addr: u64 },
    #[error("register index {index} out of range")]
    BadRegister { index: u64 },
}

#[derive(Debug, Clone)]
pub struct Cpu {
    pub pc: u64,
    pub flags: Flags,
    pub gpr: [i64; GPR_COUNT],
    pub fpr: [f64; FPR_COUNT],
    pub vr: [[f64; VREG_LANES]; VREG_COUNT],
    pub state: State,
    pub cfg: CpuConfig,
    pending_irq: Option<u64>,
}

/// Serializable architectural state, for the post-halt register dump.
#[derive(Debug, Clone, Serialize)]
pub struct CpuSnapshot {
    pub pc: u64,
    pub flags: Flags,
    pub gpr: Vec<i64>,
    pub fpr: Vec<f64>,
    pub vr: [[f64; VREG_LANES]; VREG_COUNT],
}

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        Self {
            pc: 0,
            flags: Flags::empty(),
            gpr: [0; GPR_COUNT],
            fpr: [0.0; FPR_COUNT],
            vr: [[0.0; VREG_LANES]; VREG_COUNT],
            state: State::Running,
            cfg,
            pending_irq: None,
        }
    }

    pub fn reset(&mut self, start: u64) {
        self.pc = start;
        self.state = State::Running;
        self.pending_irq = None;
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    /// Z and N are recomputed by every integer arithmetic/compare op.
    pub fn set_flags(&mut self, result: i64) {
        self.flags.set(Flags::Z, result == 0);
        self.flags.set(Flags::N, result != 0);
    }

    /// Records an interrupt request; delivery happens at the next step
    /// boundary, never mid-instruction.
    pub fn raise_irq(&mut self, number: u64) {
        self.pending_irq = Some(number);
    }

    /// Bump allocation off the heap pointer register; returns the old
    /// pointer. No opcode consumes this, it is a host-side convention.
    pub fn allocate_heap(&mut self, words: i64) -> u64 {
        let addr = self.gpr[HP];
        self.gpr[HP] = self.gpr[HP].wrapping_add(words);
        addr as u64
    }

    /// Stack pushes always target the unified writable memory; the boot
    /// ROM has no write contract.
    pub fn push(&mut self, mem: &mut Memory, value: u64) -> Result<(), Fault> {
        mem.write(self.gpr[SP] as u64, value)?;
        self.gpr[SP] = self.gpr[SP].wrapping_sub(1);
        Ok(())
    }

    pub fn pop(&mut self, mem: &Memory) -> Result<u64, Fault> {
        self.gpr[SP] = self.gpr[SP].wrapping_add(1);
        mem.read(self.gpr[SP] as u64)
    }

    fn deliver_pending_irq(&mut self, mem: &mut Memory) -> Result<(), Fault> {
        if let Some(number) = self.pending_irq.take() {
            let isr = mem.read(self.cfg.vector_base + number)?;
            self.push(mem, self.pc)?;
            trace!(number, isr, "delivering interrupt");
            self.pc = isr;
        }
        Ok(())
    }

    /// One fetch/decode/execute cycle, including polled interrupt
    /// delivery and the post-dispatch peripheral render hook.
    pub fn step(&mut self, mem: &mut Memory, rom: &Rom, bus: &mut Bus) -> Result<(), Fault> {
        self.deliver_pending_irq(mem)?;

        let pc = self.pc;
        let word = if (pc as usize) < rom.len() {
            rom.read(pc)?
        } else {
            mem.read(pc)?
        };
        self.pc = pc.wrapping_add(1);

        let d = decoder::decode(word).ok_or(Fault::InvalidInstruction { pc, word })?;
        trace!(pc, instr = %fmt_decoded(&d), "execute");

        if let Flow::Halt = exec::dispatch(self, mem, bus, &d)? {
            self.state = State::Halted;
        }
        bus.render_all();
        Ok(())
    }

    /// Runs until HALT or until PC leaves unified memory.
    pub fn run(&mut self, mem: &mut Memory, rom: &Rom, bus: &mut Bus) -> Result<(), Fault> {
        while self.is_running() && (self.pc as usize) < mem.len() {
            self.step(mem, rom, bus)?;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            pc: self.pc,
            flags: self.flags,
            gpr: self.gpr.to_vec(),
            fpr: self.fpr.to_vec(),
            vr: self.vr,
        }
    }
}
