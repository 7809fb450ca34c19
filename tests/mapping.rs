use pimvm::bus::{Device, Display, Keyboard, Random, Storage};
use pimvm::decoder::{encode_word, OperandType};
use pimvm::isa::Opcode;
use pimvm::{Bus, Cpu, CpuConfig, Fault, Memory, Rom};
use pretty_assertions::assert_eq;

const R: OperandType = OperandType::Reg;
const I: OperandType = OperandType::Imm;

fn seeded_bus() -> Bus {
    let mut bus = Bus::new();
    bus.attach(0x400, Storage::WINDOW, Device::Storage(Storage::new(0x400)))
        .unwrap();
    bus.attach(0x800, Display::WINDOW, Device::Display(Display::new()))
        .unwrap();
    bus.attach(0xC00, Keyboard::WINDOW, Device::Keyboard(Keyboard::new()))
        .unwrap();
    bus.attach(0x1000, Random::WINDOW, Device::Random(Random::with_seed(7)))
        .unwrap();
    bus
}

fn machine(words: &[(u64, u64)]) -> (Cpu, Memory, Rom, Bus) {
    let mut mem = Memory::new(0x1000);
    for &(addr, w) in words {
        mem.write(addr, w).unwrap();
    }
    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.reset(0);
    (cpu, mem, Rom::new(0), seeded_bus())
}

#[test]
fn overlapping_windows_are_rejected() {
    let mut bus = Bus::new();
    bus.attach(0x800, 0x400, Device::Display(Display::new()))
        .unwrap();
    let err = bus
        .attach(0xB00, 0x200, Device::Keyboard(Keyboard::new()))
        .unwrap_err();
    assert!(err.to_string().contains("overlaps"), "{err}");
}

#[test]
fn adjacent_windows_are_fine() {
    let mut bus = Bus::new();
    bus.attach(0x800, 0x400, Device::Display(Display::new()))
        .unwrap();
    bus.attach(0xC00, 0x10, Device::Keyboard(Keyboard::new()))
        .unwrap();
}

#[test]
fn out_and_in_cover_all_four_operand_type_combinations() {
    // Each OUT writes a distinct display cell; each IN reads it back.
    let (mut cpu, mut mem, rom, mut bus) = machine(&[
        (0, encode_word(Opcode::Out, I, I, &[0x800, 11])), // literal, literal
        (1, encode_word(Opcode::Out, I, R, &[0x801, 1])),  // literal addr, reg value
        (2, encode_word(Opcode::Out, R, I, &[2, 13])),     // reg addr, literal value
        (3, encode_word(Opcode::Out, R, R, &[3, 4])),      // reg addr, reg value
        (4, encode_word(Opcode::In, R, I, &[10, 0x800])),
        (5, encode_word(Opcode::In, R, I, &[11, 0x801])),
        (6, encode_word(Opcode::In, R, I, &[12, 0x802])),
        (7, encode_word(Opcode::In, R, R, &[13, 5])),
    ]);
    cpu.gpr[1] = 12;
    cpu.gpr[2] = 0x802;
    cpu.gpr[3] = 0x803;
    cpu.gpr[4] = 14;
    cpu.gpr[5] = 0x803;
    for _ in 0..8 {
        cpu.step(&mut mem, &rom, &mut bus).unwrap();
    }
    assert_eq!(cpu.gpr[10], 11);
    assert_eq!(cpu.gpr[11], 12);
    assert_eq!(cpu.gpr[12], 13);
    assert_eq!(cpu.gpr[13], 14);
}

#[test]
fn unmapped_address_faults_the_run() {
    // The port lives in a register: 0x2000 does not fit a 12-bit slot.
    let (mut cpu, mut mem, rom, mut bus) =
        machine(&[(0, encode_word(Opcode::In, R, R, &[0, 1]))]);
    cpu.gpr[1] = 0x2000;
    let err = cpu.step(&mut mem, &rom, &mut bus).unwrap_err();
    assert!(matches!(err, Fault::AddressOutOfRange { addr: 0x2000 }), "{err}");
}

#[test]
fn keyboard_returns_zero_when_empty_and_drains_in_order() {
    let mut bus = seeded_bus();
    assert_eq!(bus.read(0xC00).unwrap(), 0, "empty buffer reads as 0");
    bus.write(0xC00, 'h' as u64).unwrap();
    bus.write(0xC00, 'i' as u64).unwrap();
    assert_eq!(bus.read(0xC00).unwrap(), 'h' as u64);
    assert_eq!(bus.read(0xC00).unwrap(), 'i' as u64);
    assert_eq!(bus.read(0xC00).unwrap(), 0);
}

#[test]
fn random_source_yields_16_bit_values_and_ignores_writes() {
    let mut bus = seeded_bus();
    for _ in 0..32 {
        assert!(bus.read(0x1000).unwrap() <= 0xFFFF);
    }
    bus.write(0x1000, 0xDEAD).unwrap(); // no-op
}

#[test]
fn seeded_random_sources_agree() {
    let mut a = Bus::new();
    a.attach(0, 0x10, Device::Random(Random::with_seed(42))).unwrap();
    let mut b = Bus::new();
    b.attach(0, 0x10, Device::Random(Random::with_seed(42))).unwrap();
    for _ in 0..8 {
        assert_eq!(a.read(0).unwrap(), b.read(0).unwrap());
    }
}

#[test]
fn storage_preloads_one_byte_per_cell() {
    let storage = Storage::from_image(&[0xAA, 0xBB, 0xCC], 0x400);
    let mut bus = Bus::new();
    bus.attach(0x400, Storage::WINDOW, Device::Storage(storage))
        .unwrap();
    assert_eq!(bus.read(0x400).unwrap(), 0xAA);
    assert_eq!(bus.read(0x401).unwrap(), 0xBB);
    assert_eq!(bus.read(0x402).unwrap(), 0xCC);
    assert_eq!(bus.read(0x403).unwrap(), 0);
}

#[test]
fn storage_is_writable_through_the_bus() {
    let mut bus = seeded_bus();
    bus.write(0x410, 0x1234).unwrap();
    assert_eq!(bus.read(0x410).unwrap(), 0x1234);
}

#[test]
fn device_window_bounds_are_exact() {
    let mut bus = Bus::new();
    bus.attach(0x800, 0x400, Device::Display(Display::new()))
        .unwrap();
    assert!(bus.read(0x800).is_ok());
    assert!(bus.read(0xBFF).is_ok());
    assert!(matches!(
        bus.read(0xC00).unwrap_err(),
        Fault::AddressOutOfRange { addr: 0xC00 }
    ));
}
