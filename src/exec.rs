//! Opcode dispatch. Each arm reads and writes only the register file,
//! flags, memory, or bus, exactly as the catalogue specifies.

use crate::bus::Bus;
use crate::cpu::{Cpu, Fault, Flags, FPR_COUNT, GPR_COUNT, VREG_COUNT, VREG_LANES};
use crate::decoder::Decoded;
use crate::isa::Opcode;
use crate::memory::Memory;
use tracing::warn;

pub enum Flow {
    Continue,
    Halt,
}

fn gpr(index: u64) -> Result<usize, Fault> {
    if index < GPR_COUNT as u64 {
        Ok(index as usize)
    } else {
        Err(Fault::BadRegister { index })
    }
}

fn fpr(index: u64) -> Result<usize, Fault> {
    if index < FPR_COUNT as u64 {
        Ok(index as usize)
    } else {
        Err(Fault::BadRegister { index })
    }
}

fn vreg(index: u64) -> Result<usize, Fault> {
    if index < VREG_COUNT as u64 {
        Ok(index as usize)
    } else {
        Err(Fault::BadRegister { index })
    }
}

/// Effective base for LOAD/STORE/LOADF: a register when the second
/// operand is typed as one, otherwise a literal address.
fn effective_base(cpu: &Cpu, d: &Decoded) -> Result<u64, Fault> {
    if d.ty1.is_reg() {
        Ok(cpu.gpr[gpr(d.ops[1])?] as u64)
    } else {
        Ok(d.ops[1])
    }
}

pub fn dispatch(cpu: &mut Cpu, mem: &mut Memory, bus: &mut Bus, d: &Decoded) -> Result<Flow, Fault> {
    match d.op {
        Opcode::Add => {
            let r = cpu.gpr[gpr(d.ops[1])?].wrapping_add(cpu.gpr[gpr(d.ops[2])?]);
            cpu.gpr[gpr(d.ops[0])?] = r;
            cpu.set_flags(r);
        }
        Opcode::Addi => {
            let r = cpu.gpr[gpr(d.ops[1])?].wrapping_add(d.ops[2] as i64);
            cpu.gpr[gpr(d.ops[0])?] = r;
            cpu.set_flags(r);
        }
        Opcode::Sub => {
            let r = cpu.gpr[gpr(d.ops[1])?].wrapping_sub(cpu.gpr[gpr(d.ops[2])?]);
            cpu.gpr[gpr(d.ops[0])?] = r;
            cpu.set_flags(r);
        }
        Opcode::Mul => {
            let r = cpu.gpr[gpr(d.ops[1])?].wrapping_mul(cpu.gpr[gpr(d.ops[2])?]);
            cpu.gpr[gpr(d.ops[0])?] = r;
            cpu.set_flags(r);
        }
        Opcode::Div => {
            let divisor = cpu.gpr[gpr(d.ops[2])?];
            if divisor == 0 {
                warn!("integer division by zero, destination unchanged");
            } else {
                let r = cpu.gpr[gpr(d.ops[1])?].wrapping_div(divisor);
                cpu.gpr[gpr(d.ops[0])?] = r;
                cpu.set_flags(r);
            }
        }
        Opcode::Fadd => {
            cpu.fpr[fpr(d.ops[0])?] = cpu.fpr[fpr(d.ops[1])?] + cpu.fpr[fpr(d.ops[2])?];
        }
        Opcode::Fsub => {
            cpu.fpr[fpr(d.ops[0])?] = cpu.fpr[fpr(d.ops[1])?] - cpu.fpr[fpr(d.ops[2])?];
        }
        Opcode::Fmul => {
            cpu.fpr[fpr(d.ops[0])?] = cpu.fpr[fpr(d.ops[1])?] * cpu.fpr[fpr(d.ops[2])?];
        }
        Opcode::Fdiv => {
            let divisor = cpu.fpr[fpr(d.ops[2])?];
            if divisor == 0.0 {
                warn!("float division by zero, destination unchanged");
            } else {
                cpu.fpr[fpr(d.ops[0])?] = cpu.fpr[fpr(d.ops[1])?] / divisor;
            }
        }
        Opcode::Vadd => {
            let (c, a, b) = (vreg(d.ops[0])?, vreg(d.ops[1])?, vreg(d.ops[2])?);
            for lane in 0..VREG_LANES {
                cpu.vr[c][lane] = cpu.vr[a][lane] + cpu.vr[b][lane];
            }
        }
        Opcode::Vsub => {
            let (c, a, b) = (vreg(d.ops[0])?, vreg(d.ops[1])?, vreg(d.ops[2])?);
            for lane in 0..VREG_LANES {
                cpu.vr[c][lane] = cpu.vr[a][lane] - cpu.vr[b][lane];
            }
        }
        Opcode::Vmul => {
            let (c, a, b) = (vreg(d.ops[0])?, vreg(d.ops[1])?, vreg(d.ops[2])?);
            for lane in 0..VREG_LANES {
                cpu.vr[c][lane] = cpu.vr[a][lane] * cpu.vr[b][lane];
            }
        }
        Opcode::Vdiv => {
            let (c, a, b) = (vreg(d.ops[0])?, vreg(d.ops[1])?, vreg(d.ops[2])?);
            for lane in 0..VREG_LANES {
                let divisor = cpu.vr[b][lane];
                if divisor == 0.0 {
                    warn!(lane, "vector division by zero, lane unchanged");
                    continue;
                }
                cpu.vr[c][lane] = cpu.vr[a][lane] / divisor;
            }
        }
        Opcode::Load => {
            let addr = effective_base(cpu, d)?.wrapping_add(d.ops[2]);
            cpu.gpr[gpr(d.ops[0])?] = mem.read(addr)? as i64;
        }
        Opcode::Loadf => {
            let addr = effective_base(cpu, d)?.wrapping_add(d.ops[2]);
            cpu.fpr[fpr(d.ops[0])?] = f32::from_bits(mem.read(addr)? as u32) as f64;
        }
        Opcode::Store => {
            let addr = effective_base(cpu, d)?.wrapping_add(d.ops[2]);
            mem.write(addr, cpu.gpr[gpr(d.ops[0])?] as u64)?;
        }
        Opcode::Cmp => {
            let r = cpu.gpr[gpr(d.ops[0])?].wrapping_sub(cpu.gpr[gpr(d.ops[1])?]);
            cpu.set_flags(r);
        }
        Opcode::Fcmp => {
            let diff = cpu.fpr[fpr(d.ops[0])?] - cpu.fpr[fpr(d.ops[1])?];
            cpu.flags.set(Flags::Z, diff == 0.0);
            cpu.flags.set(Flags::N, diff != 0.0);
        }
        Opcode::Jump => {
            cpu.pc = d.target;
        }
        Opcode::Jz => {
            if cpu.flags.contains(Flags::Z) {
                cpu.pc = d.target;
            }
        }
        Opcode::Jnz => {
            if !cpu.flags.contains(Flags::Z) {
                cpu.pc = d.target;
            }
        }
        Opcode::Fmov => {
            // The immediate converts numerically; bit-pattern constants
            // go through memory (df and LOADF).
            cpu.fpr[fpr(d.ops[0])?] = d.ops[1] as f64;
        }
        Opcode::Mov => {
            let dst = gpr(d.ops[0])?;
            cpu.gpr[dst] = if d.ty1.is_reg() {
                cpu.gpr[gpr(d.ops[1])?]
            } else {
                d.ops[1] as i64
            };
        }
        Opcode::Halt => return Ok(Flow::Halt),
        Opcode::PimAdd => mem.pim_add(d.ops[0], d.ops[1], d.ops[2])?,
        Opcode::PimSub => mem.pim_sub(d.ops[0], d.ops[1], d.ops[2])?,
        Opcode::PimMul => mem.pim_mul(d.ops[0], d.ops[1], d.ops[2])?,
        Opcode::PimDiv => mem.pim_div(d.ops[0], d.ops[1], d.ops[2])?,
        Opcode::PimFadd => mem.pim_fadd(d.ops[0], d.ops[1], d.ops[2])?,
        Opcode::PimFsub => mem.pim_fsub(d.ops[0], d.ops[1], d.ops[2])?,
        Opcode::PimFmul => mem.pim_fmul(d.ops[0], d.ops[1], d.ops[2])?,
        Opcode::PimFdiv => mem.pim_fdiv(d.ops[0], d.ops[1], d.ops[2])?,
        Opcode::Int => {
            // Delivery (and the return-address push) happens at the next
            // step boundary.
            cpu.raise_irq(d.ops[0]);
        }
        Opcode::Iret | Opcode::Ret => {
            cpu.pc = cpu.pop(mem)?;
        }
        Opcode::Call => {
            let ret = cpu.pc;
            cpu.push(mem, ret)?;
            cpu.pc = d.target;
        }
        Opcode::In => {
            let addr = if d.ty1.is_reg() {
                cpu.gpr[gpr(d.ops[1])?] as u64
            } else {
                d.ops[1]
            };
            cpu.gpr[gpr(d.ops[0])?] = bus.read(addr)? as i64;
        }
        Opcode::Out => {
            // Address and value each come from a register or a literal,
            // in all four combinations.
            let addr = if d.ty0.is_reg() {
                cpu.gpr[gpr(d.ops[0])?] as u64
            } else {
                d.ops[0]
            };
            let value = if d.ty1.is_reg() {
                cpu.gpr[gpr(d.ops[1])?] as u64
            } else {
                d.ops[1]
            };
            bus.write(addr, value)?;
        }
    }
    Ok(Flow::Continue)
}
