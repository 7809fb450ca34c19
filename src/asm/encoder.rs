//! Two-pass assembler: pass 1 lays out segments and records label
//! addresses, pass 2 parses operands and emits fixed-width words.

use crate::asm::preprocess::PreprocessError;
use crate::decoder::{encode_jump, encode_word, OperandType, OPERAND_MASK};
use crate::isa::Opcode;
use crate::listing;
use std::collections::HashMap;
use std::io::{self, Write};

#[derive(thiserror::Error, Debug)]
pub enum AsmError {
    #[error("invalid operand `{token}` in `{line}`")]
    InvalidOperand { token: String, line: String },
    #[error("unknown instruction or directive `{token}` in `{line}`")]
    UnknownMnemonic { token: String, line: String },
    #[error("undefined label `{name}` in `{line}`")]
    UndefinedLabel { name: String, line: String },
    #[error("operand `{token}` does not fit a 12-bit slot in `{line}`")]
    OperandTooWide { token: String, line: String },
    #[error("label `{name}` defined twice")]
    DuplicateLabel { name: String },
    #[error("malformed directive `{line}`")]
    MalformedDirective { line: String },
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// The five independent address spaces assembled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentId {
    Text = 0,
    Static = 1,
    Heap = 2,
    Stack = 3,
    Interrupt = 4,
}

const SEGMENT_COUNT: usize = 5;

#[derive(Debug, Clone)]
enum Entry {
    Instr {
        addr: u64,
        op: Opcode,
        ty0: OperandType,
        ty1: OperandType,
        ops: Vec<u64>,
    },
    Data {
        addr: u64,
        word: u64,
    },
}

enum LineKind<'a> {
    Segment(SegmentId),
    Org(u64),
    Label(&'a str),
    Statement {
        mnemonic: &'a str,
        operands: Vec<&'a str>,
    },
}

fn classify(line: &str) -> Result<LineKind<'_>, AsmError> {
    if line.starts_with(".text") {
        return Ok(LineKind::Segment(SegmentId::Text));
    }
    if line.starts_with(".static") {
        return Ok(LineKind::Segment(SegmentId::Static));
    }
    if line.starts_with(".heap") {
        return Ok(LineKind::Segment(SegmentId::Heap));
    }
    if line.starts_with(".stack") {
        return Ok(LineKind::Segment(SegmentId::Stack));
    }
    if line.starts_with(".interrupt") {
        return Ok(LineKind::Segment(SegmentId::Interrupt));
    }
    if line.starts_with(".org") {
        let arg = line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| AsmError::MalformedDirective { line: line.into() })?;
        let addr = u64::from_str_radix(arg.trim_start_matches("0x"), 16)
            .map_err(|_| AsmError::MalformedDirective { line: line.into() })?;
        return Ok(LineKind::Org(addr));
    }
    if let Some(name) = line.strip_suffix(':') {
        return Ok(LineKind::Label(name.trim()));
    }
    let mut parts = line.split_whitespace();
    let mnemonic = parts
        .next()
        .ok_or_else(|| AsmError::MalformedDirective { line: line.into() })?;
    // Operands may be separated by commas, whitespace, or both; quoted
    // character literals keep their commas.
    let mut operands = Vec::new();
    for token in parts {
        if token.starts_with('\'') {
            operands.push(token);
            continue;
        }
        operands.extend(token.split(',').filter(|s| !s.is_empty()));
    }
    Ok(LineKind::Statement { mnemonic, operands })
}

/// Element width in address units for `db`/`dw`/`dd`/`df`.
fn data_width(directive: &str) -> Option<u64> {
    match directive {
        "db" => Some(1),
        "dw" => Some(2),
        "dd" | "df" => Some(4),
        _ => None,
    }
}

#[derive(Default)]
pub struct Assembler {
    labels: HashMap<String, u64>,
    segments: [Vec<Entry>; SEGMENT_COUNT],
    current: usize,
    addr: u64,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> &HashMap<String, u64> {
        &self.labels
    }

    /// Runs both passes over one preprocessed line stream. The segment
    /// and address counters are restored between the passes so both
    /// walks see identical layout state; across successive calls they
    /// carry over, letting several source files share one address
    /// space.
    pub fn assemble(&mut self, lines: &[String]) -> Result<(), AsmError> {
        let (current, addr) = (self.current, self.addr);
        self.first_pass(lines)?;
        self.current = current;
        self.addr = addr;
        self.second_pass(lines)
    }

    /// Pass 1: walk segments counting instruction and data widths,
    /// recording `name -> address` for every label definition.
    pub fn first_pass(&mut self, lines: &[String]) -> Result<(), AsmError> {
        for line in lines {
            match classify(line)? {
                LineKind::Segment(seg) => self.current = seg as usize,
                LineKind::Org(addr) => self.addr = addr,
                LineKind::Label(name) => {
                    if self.labels.insert(name.to_string(), self.addr).is_some() {
                        return Err(AsmError::DuplicateLabel { name: name.into() });
                    }
                }
                LineKind::Statement { mnemonic, operands } => {
                    if Opcode::from_mnemonic(mnemonic).is_some() {
                        self.addr += 1; // one word per instruction
                    } else if let Some(width) = data_width(mnemonic) {
                        self.addr += width * operands.len() as u64;
                    } else {
                        return Err(AsmError::UnknownMnemonic {
                            token: mnemonic.into(),
                            line: line.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Pass 2: re-walk the same lines emitting one entry per address.
    pub fn second_pass(&mut self, lines: &[String]) -> Result<(), AsmError> {
        for line in lines {
            match classify(line)? {
                LineKind::Segment(seg) => self.current = seg as usize,
                LineKind::Org(addr) => self.addr = addr,
                LineKind::Label(_) => {} // recorded in pass 1
                LineKind::Statement { mnemonic, operands } => {
                    if let Some(op) = Opcode::from_mnemonic(mnemonic) {
                        self.emit_instruction(op, &operands, line)?;
                    } else if data_width(mnemonic).is_some() {
                        self.emit_data(mnemonic, &operands, line)?;
                    } else {
                        return Err(AsmError::UnknownMnemonic {
                            token: mnemonic.into(),
                            line: line.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn emit_instruction(&mut self, op: Opcode, operands: &[&str], line: &str) -> Result<(), AsmError> {
        let mut ops = Vec::with_capacity(operands.len());
        let mut types = Vec::with_capacity(operands.len());
        for token in operands {
            let (value, ty) = self.parse_operand(token, line)?;
            // Control transfers carry a wide target; everything else has
            // to fit its slot, and silent truncation is worse than an
            // error here.
            if !op.is_control_transfer() && value > OPERAND_MASK {
                return Err(AsmError::OperandTooWide {
                    token: (*token).into(),
                    line: line.into(),
                });
            }
            ops.push(value);
            types.push(ty);
        }
        let ty = |i: usize| types.get(i).copied().unwrap_or(OperandType::None);
        self.segments[self.current].push(Entry::Instr {
            addr: self.addr,
            op,
            ty0: ty(0),
            ty1: ty(1),
            ops,
        });
        self.addr += 1;
        Ok(())
    }

    fn emit_data(&mut self, directive: &str, operands: &[&str], line: &str) -> Result<(), AsmError> {
        let width = data_width(directive).expect("caller checked directive");
        for token in operands {
            let token = token.trim_end_matches(',');
            let word = if directive == "df" {
                let value: f32 = token
                    .parse()
                    .map_err(|_| AsmError::InvalidOperand {
                        token: token.into(),
                        line: line.into(),
                    })?;
                value.to_bits() as u64
            } else {
                let value = parse_int_auto(token).ok_or_else(|| AsmError::InvalidOperand {
                    token: token.into(),
                    line: line.into(),
                })?;
                match directive {
                    "db" => value & 0xFF,
                    "dw" => value & 0xFFFF,
                    _ => value & 0xFFFF_FFFF,
                }
            };
            self.segments[self.current].push(Entry::Data {
                addr: self.addr,
                word,
            });
            self.addr += width;
        }
        Ok(())
    }

    /// Operand grammar, first match wins: char literal, `%R<n>`/`%F<n>`
    /// register, `#0x`/`0x` hex immediate, `#<float>` IEEE-754 bits,
    /// bare decimal, resolved label.
    fn parse_operand(&self, token: &str, line: &str) -> Result<(u64, OperandType), AsmError> {
        let token = token.trim_end_matches(',');
        let invalid = || AsmError::InvalidOperand {
            token: token.into(),
            line: line.into(),
        };

        if let Some(inner) = token.strip_prefix('\'') {
            let ch = inner.strip_suffix('\'').and_then(|s| {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            });
            return ch.map(|c| (c as u64, OperandType::Imm)).ok_or_else(invalid);
        }
        if let Some(rest) = token.strip_prefix("%R").or_else(|| token.strip_prefix("%F")) {
            let index = rest.parse::<u64>().map_err(|_| invalid())?;
            return Ok((index, OperandType::Reg));
        }
        if let Some(hex) = token
            .strip_prefix("#0x")
            .or_else(|| token.strip_prefix("0x"))
        {
            let value = u64::from_str_radix(hex, 16).map_err(|_| invalid())?;
            return Ok((value, OperandType::Imm));
        }
        if let Some(rest) = token.strip_prefix('#') {
            let value: f32 = rest.parse().map_err(|_| invalid())?;
            return Ok((value.to_bits() as u64, OperandType::Imm));
        }
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            return Ok((token.parse::<u64>().map_err(|_| invalid())?, OperandType::Imm));
        }
        if let Some(&addr) = self.labels.get(token) {
            return Ok((addr, OperandType::Label));
        }
        if token
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            return Err(AsmError::UndefinedLabel {
                name: token.into(),
                line: line.into(),
            });
        }
        Err(invalid())
    }

    /// Emitted `(address, word)` pairs in segment emission order.
    pub fn words(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        for segment in &self.segments {
            for entry in segment {
                out.push(match *entry {
                    Entry::Instr {
                        addr,
                        op,
                        ty0,
                        ty1,
                        ref ops,
                    } => {
                        let word = if op.is_control_transfer() {
                            encode_jump(op, ops.first().copied().unwrap_or(0))
                        } else {
                            encode_word(op, ty0, ty1, ops)
                        };
                        (addr, word)
                    }
                    Entry::Data { addr, word } => (addr, word),
                });
            }
        }
        out
    }

    /// Writes the hex listing, one line per emitted address.
    pub fn write_listing<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for (addr, word) in self.words() {
            writeln!(w, "{}", listing::format_line(addr, word))?;
        }
        Ok(())
    }

    pub fn listing_string(&self) -> String {
        let mut out = Vec::new();
        self.write_listing(&mut out).expect("writing to a Vec");
        String::from_utf8(out).expect("listing is ASCII")
    }
}

fn parse_int_auto(token: &str) -> Option<u64> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = token.strip_prefix("0o") {
        u64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = token.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else {
        token.parse::<u64>().ok()
    }
}
