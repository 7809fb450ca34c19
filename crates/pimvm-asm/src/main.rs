use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use pimvm::asm::{Assembler, Preprocessor};
use pimvm::decoder;
use pimvm::disasm::fmt_decoded;

#[derive(Parser, Debug)]
#[command(author, version, about = "Two-pass assembler for the pimvm ISA")]
struct Opts {
    /// Input assembly files; later files continue the same address space
    #[arg(value_name = "SOURCE", num_args = 1.., required = true)]
    inputs: Vec<PathBuf>,
    /// Output hex listing
    #[arg(short, long)]
    output: PathBuf,
    /// Print a disassembly of the emitted words to stdout
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    let mut pp = Preprocessor::new();
    let mut asm = Assembler::new();
    for input in &opts.inputs {
        let lines = pp
            .preprocess_file(input)
            .with_context(|| format!("preprocessing {}", input.display()))?;
        asm.assemble(&lines)
            .with_context(|| format!("assembling {}", input.display()))?;
    }

    let mut out = BufWriter::new(
        File::create(&opts.output)
            .with_context(|| format!("creating {}", opts.output.display()))?,
    );
    asm.write_listing(&mut out)?;

    if opts.list {
        for (addr, word) in asm.words() {
            match decoder::decode(word) {
                Some(d) => println!("{addr:04X}  {}", fmt_decoded(&d)),
                None => println!("{addr:04X}  .data {word:#018x}"),
            }
        }
    }

    Ok(())
}
