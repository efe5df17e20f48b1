//! Instruction representation
//!
//! Unlike a bit-encoded ISA, instructions here are already fully decoded at
//! parse time (see [`crate::parser`]): `instr_memory` holds [`Instruction`]
//! records directly, so the ID stage has no bit-field extraction to do, only
//! operand reads and hazard checks.

use crate::register::UNDEFINED;

/// A single instruction, as stored in instruction memory.
///
/// Fields unused by `opcode` are left at [`UNDEFINED`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub dest: u32,
    pub src1: u32,
    pub src2: u32,
    pub immediate: u32,
}

impl Instruction {
    pub const fn nop() -> Self {
        Self {
            opcode: Opcode::Nop,
            dest: UNDEFINED,
            src1: UNDEFINED,
            src2: UNDEFINED,
            immediate: UNDEFINED,
        }
    }

    pub const fn eop() -> Self {
        Self { opcode: Opcode::Eop, ..Self::nop() }
    }

    pub fn is_branch(&self) -> bool {
        self.opcode.is_branch()
    }

    pub fn is_memory(&self) -> bool {
        self.opcode.is_memory()
    }

    pub fn is_int_alu(&self) -> bool {
        self.opcode.is_int_alu()
    }

    pub fn is_fp_alu(&self) -> bool {
        self.opcode.is_fp_alu()
    }

    pub fn is_fp_typed(&self) -> bool {
        self.opcode.is_fp_typed()
    }

    /// True for opcodes that leave a result in a destination register
    /// (integer ALU, FP ALU, LW, LWS).
    pub fn writes_register(&self) -> bool {
        use Opcode::*;
        matches!(self.opcode, Add | Sub | Xor | Addi | Subi | Adds | Subs | Mults | Divs | Lw | Lws)
    }
}

impl Default for Instruction {
    fn default() -> Self {
        Self::nop()
    }
}

/// The opcode set: memory, integer ALU, FP ALU, control, and the two
/// terminator pseudo-opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Memory
    Lw,
    Sw,
    Lws,
    Sws,
    // Integer ALU
    Add,
    Sub,
    Xor,
    Addi,
    Subi,
    // FP ALU
    Adds,
    Subs,
    Mults,
    Divs,
    // Control
    Beqz,
    Bnez,
    Bltz,
    Bgtz,
    Blez,
    Bgez,
    Jump,
    // Terminators
    Eop,
    Nop,
}

impl Opcode {
    pub fn is_branch(self) -> bool {
        use Opcode::*;
        matches!(self, Beqz | Bnez | Bltz | Bgtz | Blez | Bgez | Jump)
    }

    pub fn is_memory(self) -> bool {
        use Opcode::*;
        matches!(self, Lw | Sw | Lws | Sws)
    }

    pub fn is_load(self) -> bool {
        matches!(self, Opcode::Lw | Opcode::Lws)
    }

    pub fn is_store(self) -> bool {
        matches!(self, Opcode::Sw | Opcode::Sws)
    }

    pub fn is_int_alu(self) -> bool {
        use Opcode::*;
        matches!(self, Add | Sub | Xor | Addi | Subi)
    }

    pub fn is_int_alu_imm(self) -> bool {
        matches!(self, Opcode::Addi | Opcode::Subi)
    }

    pub fn is_fp_alu(self) -> bool {
        use Opcode::*;
        matches!(self, Adds | Subs | Mults | Divs)
    }

    /// FP ALU ops and FP memory ops: anything that reads/writes the FP
    /// register file and is dispatched against an FP-typed functional unit.
    pub fn is_fp_typed(self) -> bool {
        self.is_fp_alu() || matches!(self, Opcode::Lws | Opcode::Sws)
    }

    /// The functional-unit class (FP variant) this opcode dispatches to.
    pub fn unit_kind(self) -> crate::functional_unit::UnitKind {
        use crate::functional_unit::UnitKind;
        match self {
            Opcode::Adds | Opcode::Subs => UnitKind::Adder,
            Opcode::Mults => UnitKind::Multiplier,
            Opcode::Divs => UnitKind::Divider,
            _ => UnitKind::Integer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nop_is_not_a_branch_or_memory_op() {
        let nop = Instruction::nop();
        assert!(!nop.is_branch());
        assert!(!nop.is_memory());
        assert!(!nop.writes_register());
    }

    #[test]
    fn classification_predicates_partition_opcodes() {
        assert!(Opcode::Lw.is_memory());
        assert!(Opcode::Lws.is_memory());
        assert!(Opcode::Lws.is_fp_typed());
        assert!(!Opcode::Lw.is_fp_typed());
        assert!(Opcode::Jump.is_branch());
        assert!(Opcode::Divs.is_fp_alu());
        assert!(!Opcode::Divs.is_int_alu());
    }
}
