use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pimvm::bus::{Device, Display, Keyboard, Random, Storage};
use pimvm::{Bus, Cpu, CpuConfig, Memory, Rom};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run a memory-dump hex listing on the pimvm emulator"
)]
struct Opts {
    /// Memory dump (address/word hex listing)
    #[arg(value_name = "DUMPFILE")]
    input: String,
    /// Interrupt vector listing, loaded verbatim into unified memory
    #[arg(long)]
    interrupt_file: Option<String>,
    /// Start address for execution (decimal, or hex with 0x)
    #[arg(long, value_parser = parse_addr)]
    start_address: u64,
    /// Boot ROM hex listing; fetch prefers ROM inside its bounds
    #[arg(long)]
    rom_file: Option<String>,
    /// Raw image preloaded into the storage peripheral
    #[arg(long)]
    image_file: Option<String>,
    /// Write a JSON register/flag snapshot here after the run
    #[arg(long)]
    dump_state: Option<String>,
    /// Step cap, to keep runaway programs from spinning forever
    #[arg(long, default_value_t = 10_000_000u64)]
    max_steps: u64,
    /// Seed for the random-number peripheral (defaults to entropy)
    #[arg(long)]
    rng_seed: Option<u64>,
}

fn parse_addr(s: &str) -> Result<u64, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("bad address `{s}`: {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let cfg = CpuConfig::default();
    let mut mem = Memory::new(cfg.mem_words);
    let mut rom = Rom::new(cfg.rom_words);

    let dump = std::fs::read_to_string(&opts.input)
        .with_context(|| format!("reading memory dump {}", opts.input))?;
    mem.load_listing(&dump)?;

    if let Some(path) = &opts.interrupt_file {
        let vectors = std::fs::read_to_string(path)
            .with_context(|| format!("reading interrupt vectors {path}"))?;
        mem.load_listing(&vectors)?;
    }
    if let Some(path) = &opts.rom_file {
        let image = std::fs::read_to_string(path)
            .with_context(|| format!("reading ROM listing {path}"))?;
        rom.load_listing(&image)?;
    }

    let storage = match &opts.image_file {
        Some(path) => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading storage image {path}"))?;
            Storage::from_image(&bytes, Storage::WINDOW as usize)
        }
        None => Storage::new(Storage::WINDOW as usize),
    };
    let random = match opts.rng_seed {
        Some(seed) => Random::with_seed(seed),
        None => Random::new(),
    };

    let mut bus = Bus::new();
    bus.attach(0x400, Storage::WINDOW, Device::Storage(storage))?;
    bus.attach(0x800, Display::WINDOW, Device::Display(Display::new()))?;
    bus.attach(0xC00, Keyboard::WINDOW, Device::Keyboard(Keyboard::new()))?;
    bus.attach(0x1000, Random::WINDOW, Device::Random(random))?;

    let mut cpu = Cpu::new(cfg);
    cpu.reset(opts.start_address);

    // Run loop with a step cap
    for _ in 0..opts.max_steps {
        if !cpu.is_running() || cpu.pc as usize >= mem.len() {
            break;
        }
        if let Err(fault) = cpu.step(&mut mem, &rom, &mut bus) {
            eprintln!("FAULT: {fault}");
            break;
        }
    }

    if let Some(path) = &opts.dump_state {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating state dump {path}"))?;
        serde_json::to_writer_pretty(file, &cpu.snapshot())?;
    }

    Ok(())
}
