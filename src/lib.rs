pub mod asm;
pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod disasm;
pub mod exec;
pub mod isa;
pub mod listing;
pub mod memory;

pub use bus::{Bus, Device};
pub use cpu::{Cpu, CpuConfig, Fault};
pub use memory::{Memory, Rom};
