//! Stage handlers: IF, ID, EX, MEM, WB.
//!
//! Each function mutates [`Pipeline`] in place and is invoked by
//! `Pipeline::run` once per cycle in the order WB, MEM, EX, ID, IF (see
//! that function for why the order is reversed). Grounded directly on the
//! five `pipe_*_Handler` functions of the original simulator, generalized
//! from a single combinational EX latch to the functional-unit pool so one
//! set of handlers serves both the integer-only and floating-point
//! configurations.

use crate::alu::{alu, branch_condition, fp_alu};
use crate::instruction::{Instruction, Opcode};
use crate::latch::{Latch, Stage};
use crate::pipeline::Pipeline;
use crate::register::UNDEFINED;

fn is_destination(p: &Pipeline, fp: bool, reg: u32) -> bool {
    if fp { p.fp_regs.is_destination(reg) } else { p.int_regs.is_destination(reg) }
}

fn read_reg(p: &Pipeline, fp: bool, reg: u32) -> u32 {
    if fp { p.fp_regs.read(reg) } else { p.int_regs.read(reg) }
}

fn write_reg(p: &mut Pipeline, fp: bool, reg: u32, value: u32) {
    if fp { p.fp_regs.write(reg, value) } else { p.int_regs.write(reg, value) }
}

fn set_destination(p: &mut Pipeline, fp: bool, reg: u32, flag: bool) {
    if fp { p.fp_regs.set_destination(reg, flag) } else { p.int_regs.set_destination(reg, flag) }
}

/// Which register file `src1`/`src2` come from. A memory op's base-address
/// register (`src1` on a load, `src2` on a store) is always a GPR, even for
/// `LWS`/`SWS`. Only the load's destination or the store's value operand is
/// FP-typed.
fn operand_files(ir: Instruction) -> (bool, bool) {
    let fp_src1 = !ir.opcode.is_load() && ir.is_fp_typed();
    let fp_src2 = !ir.opcode.is_store() && ir.is_fp_typed();
    (fp_src1, fp_src2)
}

/// Fetches the instruction at `IF.PC` into `ID.IR` when IF is available, and
/// advances `IF.PC`/`ID.NPC` unless the newly fetched instruction is `EOP`.
///
/// Branch redirection is handled entirely in [`mem_stage`] (see the Open
/// Questions resolution): IF only ever fetches sequentially.
pub fn if_stage(p: &mut Pipeline) {
    if !p.latches[Stage::If].is_available {
        return;
    }

    let pc = p.latches[Stage::If].pc;
    let index = pc.wrapping_sub(p.instr_base_address) / 4;
    let fetched = p.instr_memory.get(index as usize).copied().unwrap_or(Instruction::eop());

    p.latches[Stage::Id].ir = fetched;
    p.latches[Stage::Id].is_available = true;

    if p.policy.verbose {
        eprintln!("[IF] pc={:#010x} -> {:?}", pc, fetched.opcode);
    }

    if fetched.opcode != Opcode::Eop {
        p.latches[Stage::If].pc = pc.wrapping_add(4);
        p.latches[Stage::Id].npc = p.latches[Stage::If].pc;
    }
}

/// Decode, hazard-check, and dispatch into a functional unit.
///
/// `EOP` is held until every functional unit drains (so in-flight work
/// finishes before the program's end is promoted downstream); `NOP` and
/// everything else share the same RAW/structural/WAW hazard check, since a
/// bubble's UNDEFINED source registers never carry the destination flag.
pub fn id_stage(p: &mut Pipeline) {
    if p.is_memory_ongoing {
        return;
    }

    let ir = p.latches[Stage::Id].ir;

    if ir.opcode == Opcode::Eop {
        if p.units.all_idle() {
            p.latches[Stage::Id].is_available = true;
            p.latches[Stage::If].is_available = false;
        } else {
            p.stalls += 1;
            p.latches[Stage::Id].is_available = false;
            p.latches[Stage::If].is_available = false;
        }
    } else {
        let (fp_src1, fp_src2) = operand_files(ir);
        let raw = is_destination(p, fp_src1, ir.src1) || is_destination(p, fp_src2, ir.src2);
        let kind = ir.opcode.unit_kind();
        let free_unit = p.units.free_unit_for(kind);
        let latency = free_unit.map(|i| p.units.get(i).latency).unwrap_or(0);
        let waw = ir.writes_register() && p.units.has_waw_conflict(ir.dest, latency);

        if raw || free_unit.is_none() || waw {
            p.stalls += 1;
            p.latches[Stage::Id].is_available = false;
            p.latches[Stage::If].is_available = false;
        } else {
            p.latches[Stage::Id].is_available = true;

            if ir.is_branch() {
                p.control_delay += 1;
                if p.control_delay == 1 {
                    p.stalls += 1;
                    p.latches[Stage::If].is_available = false;
                    p.is_branch_ongoing = true;
                    p.is_branch_calculated = false;
                } else if p.is_branch_calculated {
                    p.control_delay = 0;
                    p.latches[Stage::Id].is_available = false;
                    p.latches[Stage::If].is_available = true;
                    p.is_branch_ongoing = false;
                    p.is_branch_calculated = false;
                } else {
                    p.stalls += 1;
                    p.latches[Stage::Id].is_available = false;
                    p.latches[Stage::If].is_available = false;
                }
            } else {
                p.latches[Stage::If].is_available = true;
            }
        }
    }

    if p.latches[Stage::Id].is_available {
        dispatch(p, ir);
    }
}

fn dispatch(p: &mut Pipeline, ir: Instruction) {
    let kind = ir.opcode.unit_kind();
    let Some(unit_index) = p.units.free_unit_for(kind) else {
        p.latches[Stage::Id].is_available = false;
        return;
    };

    let fp = ir.is_fp_typed();
    let (fp_src1, fp_src2) = operand_files(ir);
    let mut a = read_reg(p, fp_src1, ir.src1);
    let mut b = read_reg(p, fp_src2, ir.src2);
    if ir.opcode.is_store() {
        std::mem::swap(&mut a, &mut b);
    }

    let mut latch = Latch::undefined();
    latch.ir = ir;
    latch.a = a;
    latch.b = b;
    latch.imm = ir.immediate;
    latch.npc = p.latches[Stage::Id].npc;
    latch.is_available = true;

    if ir.writes_register() {
        latch.rd = ir.dest;
        set_destination(p, fp, ir.dest, true);
    }

    if p.policy.verbose {
        eprintln!("[ID] dispatch {:?} -> unit {unit_index}", ir.opcode);
    }

    p.units.get_mut(unit_index).dispatch(ir, latch);
    p.last_dispatched_unit = Some(unit_index);
    p.latches[Stage::Id].is_available = false;
}

/// Executes all functional units one cycle, completing at most one into MEM
/// (the lowest-index ready unit wins ties; see spec §4.4's structural-hazard
/// invariant).
pub fn ex_stage(p: &mut Pipeline) {
    if p.is_memory_ongoing {
        return;
    }

    for unit in p.units.iter_mut() {
        if unit.busy > 0 {
            unit.busy -= 1;
        }
    }

    let ready = p.units.ready_indices();
    if let Some(&winner) = ready.iter().min() {
        for &idx in &ready {
            if idx == winner {
                complete_unit(p, idx);
            } else {
                // Structural hazard: MEM already claimed this cycle.
                p.units.get_mut(idx).busy = 1;
            }
        }
    }
}

fn complete_unit(p: &mut Pipeline, idx: usize) {
    let unit = p.units.get(idx);
    let latch = unit.latch;
    let ir = unit.instruction.expect("ready unit always holds an instruction");

    let is_bubble = matches!(ir.opcode, Opcode::Nop | Opcode::Eop);

    let (alu_output, cond) = if is_bubble {
        (UNDEFINED, UNDEFINED)
    } else if ir.is_fp_alu() {
        (fp_alu(ir.opcode, latch.a, latch.b), UNDEFINED)
    } else if ir.is_branch() {
        let computed = alu(ir.opcode, latch.a as i32, latch.b as i32, latch.imm as i32, latch.npc as i32);
        (computed as u32, branch_condition(ir.opcode, latch.a as i32))
    } else {
        let computed = alu(ir.opcode, latch.a as i32, latch.b as i32, latch.imm as i32, latch.npc as i32);
        (computed as u32, UNDEFINED)
    };

    let mut mem_latch = Latch::undefined();
    mem_latch.ir = ir;
    mem_latch.alu_output = alu_output;
    mem_latch.cond = cond;
    mem_latch.b = if is_bubble { UNDEFINED } else { latch.b };
    mem_latch.rd = if is_bubble { UNDEFINED } else { latch.rd };
    mem_latch.is_available = true;

    if ir.writes_register() {
        let fp = ir.is_fp_typed();
        set_destination(p, fp, ir.dest, true);
    }

    if p.policy.verbose {
        eprintln!("[EX] unit {idx} completes {:?} -> MEM", ir.opcode);
    }

    p.latches[Stage::Mem] = mem_latch;
    p.units.get_mut(idx).retire();
}

/// Memory access, branch resolution, and the uniform branch-redirect point
/// for both pipeline variants (see the Open Questions resolution in
/// SPEC_FULL.md §9).
pub fn mem_stage(p: &mut Pipeline) {
    let mem_ir = p.latches[Stage::Mem].ir;

    if mem_ir.is_branch() && p.is_branch_ongoing {
        p.is_branch_calculated = true;
    }

    if p.latches[Stage::Mem].cond == 1 {
        p.latches[Stage::Mem].cond = 0;
        p.latches[Stage::If].pc = p.latches[Stage::Mem].alu_output;
        if p.policy.verbose {
            eprintln!("[MEM] branch taken -> pc={:#010x}", p.latches[Stage::Mem].alu_output);
        }
    }

    if mem_ir.is_memory() && !p.is_memory_ongoing {
        p.mem_delay = p.data_memory_latency + 1;
        p.is_memory_ongoing = true;
        p.latches[Stage::Mem].is_available = false;
        p.latches[Stage::If].is_available = false;
    }

    if p.is_memory_ongoing {
        if p.mem_delay <= 1 {
            p.is_memory_ongoing = false;
            p.latches[Stage::Mem].is_available = true;
            p.latches[Stage::If].is_available = true;
        } else {
            p.stalls += 1;
            p.mem_delay -= 1;
        }
    }

    if p.latches[Stage::Mem].is_available {
        p.latches[Stage::Wb].ir = mem_ir;
        p.latches[Stage::Wb].is_available = true;
    }

    if p.latches[Stage::Mem].is_available && mem_ir.opcode != Opcode::Nop && mem_ir.opcode != Opcode::Eop {
        p.latches[Stage::Wb].rd = p.latches[Stage::Mem].rd;

        if mem_ir.writes_register() {
            let fp = mem_ir.is_fp_typed();
            set_destination(p, fp, mem_ir.dest, true);
        }

        p.latches[Stage::Wb].alu_output =
            if mem_ir.is_int_alu() || mem_ir.opcode.is_int_alu_imm() || mem_ir.is_fp_alu() {
                p.latches[Stage::Mem].alu_output
            } else {
                UNDEFINED
            };

        p.latches[Stage::Wb].lmd = if mem_ir.opcode.is_load() {
            p.data_memory.read_word(p.latches[Stage::Mem].alu_output)
        } else {
            UNDEFINED
        };

        if mem_ir.opcode.is_store() {
            p.data_memory.write_word(p.latches[Stage::Mem].alu_output, p.latches[Stage::Mem].b);
        }

        p.latches[Stage::Mem].is_available = false;
        p.latches[Stage::Wb].is_available = true;
    }

    if p.latches[Stage::Wb].ir.opcode == Opcode::Eop {
        p.latches[Stage::Wb].lmd = UNDEFINED;
        p.latches[Stage::Wb].alu_output = UNDEFINED;
    }
}

/// Commits the WB latch's result to the appropriate register file.
pub fn wb_stage(p: &mut Pipeline) {
    if !p.latches[Stage::Wb].is_available {
        return;
    }

    let ir = p.latches[Stage::Wb].ir;
    let rd = p.latches[Stage::Wb].rd;

    if ir.opcode != Opcode::Nop && ir.opcode != Opcode::Eop {
        p.instructions_executed += 1;

        if rd != UNDEFINED {
            let fp = ir.is_fp_typed();
            if ir.is_int_alu() || ir.opcode.is_int_alu_imm() || ir.is_fp_alu() {
                write_reg(p, fp, rd, p.latches[Stage::Wb].alu_output);
                set_destination(p, fp, rd, false);
            } else if ir.opcode.is_load() {
                write_reg(p, fp, rd, p.latches[Stage::Wb].lmd);
                set_destination(p, fp, rd, false);
            }
        }

        if p.policy.verbose {
            eprintln!("[WB] retire {:?}, rd={}", ir.opcode, rd);
        }
    }

    p.latches[Stage::Wb].is_available = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_base_register_is_always_integer() {
        let mut lws = Instruction::nop();
        lws.opcode = Opcode::Lws;
        lws.dest = 1;
        lws.src1 = 0;
        let (fp_src1, _) = operand_files(lws);
        assert!(!fp_src1, "LWS base register must read the integer file");

        let mut sws = Instruction::nop();
        sws.opcode = Opcode::Sws;
        sws.src1 = 1;
        sws.src2 = 0;
        let (fp_src1, fp_src2) = operand_files(sws);
        assert!(fp_src1, "SWS value operand must read the FP file");
        assert!(!fp_src2, "SWS base register must read the integer file");
    }

    #[test]
    fn arithmetic_operands_follow_opcode_type() {
        let mut adds = Instruction::nop();
        adds.opcode = Opcode::Adds;
        let (fp_src1, fp_src2) = operand_files(adds);
        assert!(fp_src1 && fp_src2);

        let mut add = Instruction::nop();
        add.opcode = Opcode::Add;
        let (fp_src1, fp_src2) = operand_files(add);
        assert!(!fp_src1 && !fp_src2);
    }
}
