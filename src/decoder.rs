//! Bit-exact 64-bit instruction word layout.
//!
//! Regular instructions pack `opcode[63:56] ty0[55:52] ty1[51:48]
//! op0[47:36] op1[35:24] op2[23:12]` with the low 12 bits zero.
//! Control transfers (JUMP/JZ/JNZ/CALL) instead pack the opcode followed
//! by a right-aligned 56-bit target of which decode reads the low 40 bits.

use crate::isa::Opcode;
use serde::{Deserialize, Serialize};

pub const OPERAND_MASK: u64 = 0xFFF;
pub const TARGET_MASK: u64 = 0xFF_FFFF_FFFF; // 40 bits read back on fetch
pub const TARGET_EMIT_MASK: u64 = 0xFF_FFFF_FFFF_FFFF; // 56 bits emitted

/// Operand type tags carried in the two 4-bit nibbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperandType {
    None = 0,
    Reg = 1,
    Imm = 2,
    /// A label resolved to an address; behaves as an immediate.
    Label = 9,
}

impl OperandType {
    pub fn from_nibble(n: u8) -> Option<Self> {
        match n {
            0 => Some(OperandType::None),
            1 => Some(OperandType::Reg),
            2 => Some(OperandType::Imm),
            9 => Some(OperandType::Label),
            _ => None,
        }
    }

    pub fn is_reg(self) -> bool {
        self == OperandType::Reg
    }
}

/// Decoded view of one instruction word.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Decoded {
    pub op: Opcode,
    pub ty0: OperandType,
    pub ty1: OperandType,
    /// The three 12-bit operand slots, destination first.
    pub ops: [u64; 3],
    /// Absolute target, authoritative for control transfers only.
    pub target: u64,
}

/// Packs a regular (non-control-transfer) instruction word.
pub fn encode_word(op: Opcode, ty0: OperandType, ty1: OperandType, ops: &[u64]) -> u64 {
    let mut word = ((op as u64) << 56) | ((ty0 as u64) << 52) | ((ty1 as u64) << 48);
    for (slot, value) in ops.iter().take(3).enumerate() {
        word |= (value & OPERAND_MASK) << (36 - 12 * slot as u64);
    }
    word
}

/// Packs a control-transfer word: opcode followed by the target,
/// right-aligned in the low 56 bits.
pub fn encode_jump(op: Opcode, target: u64) -> u64 {
    ((op as u64) << 56) | (target & TARGET_EMIT_MASK)
}

/// Unpacks one word. Returns `None` for an unknown opcode or a malformed
/// type nibble; the caller turns that into an invalid-instruction fault.
pub fn decode(word: u64) -> Option<Decoded> {
    let op = Opcode::from_u8((word >> 56) as u8)?;
    if op.is_control_transfer() {
        // The type nibbles overlap the target field here and carry no
        // type information.
        return Some(Decoded {
            op,
            ty0: OperandType::None,
            ty1: OperandType::None,
            ops: [0; 3],
            target: word & TARGET_MASK,
        });
    }
    let ty0 = OperandType::from_nibble(((word >> 52) & 0xF) as u8)?;
    let ty1 = OperandType::from_nibble(((word >> 48) & 0xF) as u8)?;
    let ops = [
        (word >> 36) & OPERAND_MASK,
        (word >> 24) & OPERAND_MASK,
        (word >> 12) & OPERAND_MASK,
    ];
    Some(Decoded {
        op,
        ty0,
        ty1,
        ops,
        target: word & TARGET_MASK,
    })
}
