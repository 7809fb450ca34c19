use crate::decoder::{Decoded, OperandType};
use crate::isa::Opcode;

fn fmt_operand(ty: OperandType, value: u64) -> String {
    match ty {
        OperandType::Reg => format!("%R{value}"),
        OperandType::Imm => format!("#{value:#x}"),
        OperandType::Label => format!("{value:#x}"),
        OperandType::None => format!("{value}"),
    }
}

/// One-line textual form of a decoded word, for trace logs and the
/// assembler's listing mode.
pub fn fmt_decoded(d: &Decoded) -> String {
    let mn = d.op.mnemonic();
    if d.op.is_control_transfer() {
        return format!("{mn} {:#x}", d.target);
    }
    match d.op {
        Opcode::Halt | Opcode::Ret | Opcode::Iret => mn.to_string(),
        Opcode::Int => format!("{mn} {}", d.ops[0]),
        Opcode::Cmp | Opcode::Fcmp | Opcode::Mov | Opcode::In | Opcode::Out | Opcode::Fmov => {
            format!(
                "{mn} {}, {}",
                fmt_operand(d.ty0, d.ops[0]),
                fmt_operand(d.ty1, d.ops[1])
            )
        }
        _ => format!(
            "{mn} {}, {}, {}",
            fmt_operand(d.ty0, d.ops[0]),
            fmt_operand(d.ty1, d.ops[1]),
            d.ops[2]
        ),
    }
}
