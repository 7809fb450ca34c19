use pimvm::asm::{Assembler, Preprocessor};
use pimvm::bus::{Device, Display};
use pimvm::cpu::{Flags, SP};
use pimvm::{Bus, Cpu, CpuConfig, Memory, Rom};
use pretty_assertions::assert_eq;
use std::path::Path;

fn assemble_source(src: &str) -> String {
    let mut pp = Preprocessor::new();
    let lines = pp.preprocess(src, Path::new(".")).unwrap();
    let mut asm = Assembler::new();
    asm.assemble(&lines).unwrap();
    asm.listing_string()
}

#[test]
fn assembled_countdown_runs_to_halt() {
    let listing = assemble_source(
        "#define COUNT 5\n\
         .text\n\
         .org 0x100\n\
         start:\n\
         MOV %R0, COUNT\n\
         MOV %R1, 1\n\
         loop:\n\
         SUB %R0, %R0, %R1\n\
         JNZ loop\n\
         HALT\n",
    );
    let mut mem = Memory::new(0x1000);
    mem.load_listing(&listing).unwrap();

    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.reset(0x100);
    let rom = Rom::new(0);
    let mut bus = Bus::new();
    cpu.run(&mut mem, &rom, &mut bus).unwrap();

    assert!(!cpu.is_running());
    assert_eq!(cpu.gpr[0], 0);
    assert!(cpu.flags.contains(Flags::Z));
}

#[test]
fn assembled_subroutine_writes_to_the_display() {
    let listing = assemble_source(
        "; write 'H' to the display, via a subroutine\n\
         .text\n\
         .org 0x100\n\
         main:\n\
         MOV %R14, 0x2F0\n\
         CALL putc\n\
         HALT\n\
         putc:\n\
         OUT 0x800, 'H'\n\
         RET\n",
    );
    let mut mem = Memory::new(0x1000);
    mem.load_listing(&listing).unwrap();

    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.reset(0x100);
    let rom = Rom::new(0);
    let mut bus = Bus::new();
    bus.attach(0x800, Display::WINDOW, Device::Display(Display::new()))
        .unwrap();
    cpu.run(&mut mem, &rom, &mut bus).unwrap();

    assert!(!cpu.is_running());
    assert_eq!(cpu.gpr[SP], 0x2F0, "stack balanced after CALL/RET");
    assert_eq!(bus.read(0x800).unwrap(), 'H' as u64);
}

#[test]
fn interrupt_vector_listing_drives_an_isr() {
    // Program raises INT 1; the vector listing routes it to an ISR that
    // bumps R5 and returns.
    let program = assemble_source(
        ".text\n\
         .org 0x100\n\
         MOV %R14, 0x2F0\n\
         INT 1\n\
         HALT\n\
         .org 0x150\n\
         isr:\n\
         ADDI %R5, %R5, 1\n\
         IRET\n",
    );
    let vectors = "0081 0000000000000150\n";

    let mut mem = Memory::new(0x1000);
    mem.load_listing(&program).unwrap();
    mem.load_listing(vectors).unwrap();

    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.reset(0x100);
    let rom = Rom::new(0);
    let mut bus = Bus::new();
    cpu.run(&mut mem, &rom, &mut bus).unwrap();

    assert!(!cpu.is_running());
    assert_eq!(cpu.gpr[5], 1);
}

#[test]
fn listing_is_indexed_by_address_not_position() {
    // Emission order here is static segment after text, addresses
    // interleaved; loading must honor the embedded addresses.
    let listing = assemble_source(
        ".static\n\
         .org 0x200\n\
         dd 99\n\
         .text\n\
         .org 0x100\n\
         LOAD %R0, 0x200, 0\n\
         HALT\n",
    );
    let mut mem = Memory::new(0x1000);
    mem.load_listing(&listing).unwrap();

    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.reset(0x100);
    let rom = Rom::new(0);
    let mut bus = Bus::new();
    cpu.run(&mut mem, &rom, &mut bus).unwrap();
    assert_eq!(cpu.gpr[0], 99);
}
