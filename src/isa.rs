//! Opcode catalogue for the 64-bit word ISA.

use serde::{Deserialize, Serialize};

/// All architectural opcodes with their fixed numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Add = 1,
    Sub = 2,
    Fadd = 3,
    Fsub = 4,
    Vadd = 5,
    Vsub = 6,
    Mul = 7,
    Div = 8,
    Fmul = 9,
    Fdiv = 10,
    Vmul = 11,
    Vdiv = 12,
    Load = 13,
    Store = 14,
    Cmp = 15,
    Fcmp = 16,
    Jump = 17,
    Jz = 18,
    Jnz = 19,
    Fmov = 20,
    Halt = 21,
    PimAdd = 22,
    PimSub = 23,
    PimMul = 24,
    PimDiv = 25,
    PimFadd = 26,
    PimFsub = 27,
    PimFmul = 28,
    PimFdiv = 29,
    Int = 30,
    Iret = 31,
    In = 32,
    Out = 33,
    Loadf = 34,
    Call = 35,
    Ret = 36,
    Mov = 37,
    Addi = 38,
}

impl Opcode {
    pub fn from_u8(code: u8) -> Option<Self> {
        TABLE.iter().find(|d| d.op as u8 == code).map(|d| d.op)
    }

    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        TABLE.iter().find(|d| d.mnemonic == mnemonic).map(|d| d.op)
    }

    pub fn mnemonic(self) -> &'static str {
        TABLE
            .iter()
            .find(|d| d.op == self)
            .map(|d| d.mnemonic)
            .unwrap_or("?")
    }

    /// Control transfers carry a wide absolute target instead of typed
    /// operand slots. CALL shares JUMP's full-width addressing.
    pub fn is_control_transfer(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Jz | Opcode::Jnz | Opcode::Call)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub op: Opcode,
    pub mnemonic: &'static str,
}

pub const TABLE: &[InstrDesc] = &[
    InstrDesc { op: Opcode::Add, mnemonic: "ADD" },
    InstrDesc { op: Opcode::Sub, mnemonic: "SUB" },
    InstrDesc { op: Opcode::Fadd, mnemonic: "FADD" },
    InstrDesc { op: Opcode::Fsub, mnemonic: "FSUB" },
    InstrDesc { op: Opcode::Vadd, mnemonic: "VADD" },
    InstrDesc { op: Opcode::Vsub, mnemonic: "VSUB" },
    InstrDesc { op: Opcode::Mul, mnemonic: "MUL" },
    InstrDesc { op: Opcode::Div, mnemonic: "DIV" },
    InstrDesc { op: Opcode::Fmul, mnemonic: "FMUL" },
    InstrDesc { op: Opcode::Fdiv, mnemonic: "FDIV" },
    InstrDesc { op: Opcode::Vmul, mnemonic: "VMUL" },
    InstrDesc { op: Opcode::Vdiv, mnemonic: "VDIV" },
    InstrDesc { op: Opcode::Load, mnemonic: "LOAD" },
    InstrDesc { op: Opcode::Store, mnemonic: "STORE" },
    InstrDesc { op: Opcode::Cmp, mnemonic: "CMP" },
    InstrDesc { op: Opcode::Fcmp, mnemonic: "FCMP" },
    InstrDesc { op: Opcode::Jump, mnemonic: "JUMP" },
    InstrDesc { op: Opcode::Jz, mnemonic: "JZ" },
    InstrDesc { op: Opcode::Jnz, mnemonic: "JNZ" },
    InstrDesc { op: Opcode::Fmov, mnemonic: "FMOV" },
    InstrDesc { op: Opcode::Halt, mnemonic: "HALT" },
    InstrDesc { op: Opcode::PimAdd, mnemonic: "PIM_ADD" },
    InstrDesc { op: Opcode::PimSub, mnemonic: "PIM_SUB" },
    InstrDesc { op: Opcode::PimMul, mnemonic: "PIM_MUL" },
    InstrDesc { op: Opcode::PimDiv, mnemonic: "PIM_DIV" },
    InstrDesc { op: Opcode::PimFadd, mnemonic: "PIM_FADD" },
    InstrDesc { op: Opcode::PimFsub, mnemonic: "PIM_FSUB" },
    InstrDesc { op: Opcode::PimFmul, mnemonic: "PIM_FMUL" },
    InstrDesc { op: Opcode::PimFdiv, mnemonic: "PIM_FDIV" },
    InstrDesc { op: Opcode::Int, mnemonic: "INT" },
    InstrDesc { op: Opcode::Iret, mnemonic: "IRET" },
    InstrDesc { op: Opcode::In, mnemonic: "IN" },
    InstrDesc { op: Opcode::Out, mnemonic: "OUT" },
    InstrDesc { op: Opcode::Loadf, mnemonic: "LOADF" },
    InstrDesc { op: Opcode::Call, mnemonic: "CALL" },
    InstrDesc { op: Opcode::Ret, mnemonic: "RET" },
    InstrDesc { op: Opcode::Mov, mnemonic: "MOV" },
    InstrDesc { op: Opcode::Addi, mnemonic: "ADDI" },
];
