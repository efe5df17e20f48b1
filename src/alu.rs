//! ALU implementation
//!
//! One combinational function per EX stage computes the result for every
//! opcode: integer add/sub/xor, effective-address computation for memory
//! ops, taken-target computation for branches, and (FP variant) IEEE-754
//! single-precision arithmetic reinterpreted through 32-bit words.

use crate::instruction::Opcode;

/// Computes `EX/MEM.ALU_Output` for a non-branch, non-FP opcode.
///
/// `a`/`b` are the latched `A`/`B` operands, `imm` is the latched immediate,
/// `npc` is the latched next-sequential-PC (used for branch targets).
pub fn alu(opcode: Opcode, a: i32, b: i32, imm: i32, npc: i32) -> i32 {
    match opcode {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Addi => a.wrapping_add(imm),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Subi => a.wrapping_sub(imm),
        Opcode::Xor => a ^ b,
        Opcode::Lw | Opcode::Sw | Opcode::Lws | Opcode::Sws => a.wrapping_add(imm),
        _ if opcode.is_branch() => npc.wrapping_add(imm),
        _ => 0,
    }
}

/// Computes `EX/MEM.ALU_Output` for an FP ALU opcode by reinterpreting `a`
/// and `b` as IEEE-754 single-precision bit patterns.
pub fn fp_alu(opcode: Opcode, a: u32, b: u32) -> u32 {
    let lhs = f32::from_bits(a);
    let rhs = f32::from_bits(b);
    let result = match opcode {
        Opcode::Adds => lhs + rhs,
        Opcode::Subs => lhs - rhs,
        Opcode::Mults => lhs * rhs,
        Opcode::Divs => lhs / rhs,
        _ => 0.0,
    };
    result.to_bits()
}

/// Computes the branch condition bit (`EX/MEM.Cond`) from the latched `A`
/// operand. `JUMP` is unconditional and always resolves taken.
pub fn branch_condition(opcode: Opcode, a: i32) -> u32 {
    (match opcode {
        Opcode::Beqz => a == 0,
        Opcode::Bnez => a != 0,
        Opcode::Bltz => a < 0,
        Opcode::Bgtz => a > 0,
        Opcode::Blez => a <= 0,
        Opcode::Bgez => a >= 0,
        Opcode::Jump => true,
        _ => false,
    }) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_ops() {
        assert_eq!(alu(Opcode::Add, 3, 4, 0, 0), 7);
        assert_eq!(alu(Opcode::Sub, 10, 4, 0, 0), 6);
        assert_eq!(alu(Opcode::Xor, 0b1100, 0b1010, 0, 0), 0b0110);
        assert_eq!(alu(Opcode::Addi, 3, 0, 5, 0), 8);
        assert_eq!(alu(Opcode::Subi, 10, 0, 3, 0), 7);
    }

    #[test]
    fn memory_effective_address() {
        assert_eq!(alu(Opcode::Lw, 100, 0, 8, 0), 108);
        assert_eq!(alu(Opcode::Sw, 100, 0, -4, 0), 96);
    }

    #[test]
    fn branch_target_is_npc_plus_imm() {
        assert_eq!(alu(Opcode::Beqz, 0, 0, 12, 40), 52);
    }

    #[test]
    fn branch_condition_codes() {
        assert_eq!(branch_condition(Opcode::Beqz, 0), 1);
        assert_eq!(branch_condition(Opcode::Beqz, 1), 0);
        assert_eq!(branch_condition(Opcode::Bnez, 1), 1);
        assert_eq!(branch_condition(Opcode::Bltz, -1), 1);
        assert_eq!(branch_condition(Opcode::Bgtz, 1), 1);
        assert_eq!(branch_condition(Opcode::Blez, 0), 1);
        assert_eq!(branch_condition(Opcode::Bgez, -1), 0);
        assert_eq!(branch_condition(Opcode::Jump, 0), 1);
    }

    #[test]
    fn fp_ops_round_trip_through_bits() {
        let a = 2.5f32.to_bits();
        let b = 4.0f32.to_bits();
        assert_eq!(f32::from_bits(fp_alu(Opcode::Adds, a, b)), 6.5);
        assert_eq!(f32::from_bits(fp_alu(Opcode::Mults, a, b)), 10.0);
        assert_eq!(f32::from_bits(fp_alu(Opcode::Subs, b, a)), 1.5);
        assert_eq!(f32::from_bits(fp_alu(Opcode::Divs, b, a)), 1.6);
    }
}
