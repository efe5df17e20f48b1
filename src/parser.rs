//! Textual assembly parser.
//!
//! Two passes over the source, mirroring the original simulator's loader:
//! the first tokenizes each line into an [`Instruction`] and records any
//! label definition; the second resolves every branch/jump's label operand
//! into a PC-relative immediate, `(target_index - source_index - 1) << 2`.
//!
//! This module is a straightforward tokenizer, not part of the core timing
//! model, and is kept deliberately free of any pipeline state.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ParseError, SimulatorResult};
use crate::instruction::{Instruction, Opcode};

/// Parses `path` into a flat instruction list, with all branch/jump targets
/// already resolved to PC-relative immediates.
pub fn parse_program(path: &Path) -> SimulatorResult<Vec<Instruction>> {
    let source = fs::read_to_string(path)?;

    let mut instructions = Vec::new();
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut pending_labels: Vec<(usize, String)> = Vec::new();

    for (line_no, raw_line) in source.lines().enumerate() {
        let line = strip_comment(raw_line);
        let mut tokens = line.split_whitespace().peekable();
        let Some(mut token) = tokens.next() else { continue };

        if let Some(label) = token.strip_suffix(':') {
            labels.insert(label.to_string(), instructions.len());
            token = match tokens.next() {
                Some(t) => t,
                None => continue,
            };
        }

        let mnemonic = token.to_ascii_uppercase();
        let rest: Vec<&str> = tokens.collect();
        let instr = parse_instruction(path, line_no + 1, &mnemonic, &rest, &mut pending_labels, instructions.len())?;
        instructions.push(instr);
    }

    if instructions.is_empty() {
        return Err(ParseError::EmptyProgram { path: path.to_path_buf() }.into());
    }

    for (index, label) in pending_labels {
        let target = *labels
            .get(&label)
            .ok_or_else(|| ParseError::UndefinedLabel {
                path: path.to_path_buf(),
                line: index + 1,
                label: label.clone(),
            })?;
        let offset = (target as i64 - index as i64 - 1) << 2;
        instructions[index].immediate = offset as i32 as u32;
    }

    Ok(instructions)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(at) => &line[..at],
        None => line,
    }
}

fn parse_instruction(
    path: &Path,
    line: usize,
    mnemonic: &str,
    operands: &[&str],
    pending_labels: &mut Vec<(usize, String)>,
    index: usize,
) -> Result<Instruction, ParseError> {
    let mut instr = Instruction::nop();

    macro_rules! malformed {
        ($token:expr) => {
            ParseError::MalformedOperand {
                path: path.to_path_buf(),
                line,
                mnemonic: mnemonic.to_string(),
                token: $token.to_string(),
            }
        };
    }

    match mnemonic {
        "NOP" => instr.opcode = Opcode::Nop,
        "EOP" => instr.opcode = Opcode::Eop,

        "ADD" | "SUB" | "XOR" | "ADDS" | "SUBS" | "MULTS" | "DIVS" => {
            instr.opcode = match mnemonic {
                "ADD" => Opcode::Add,
                "SUB" => Opcode::Sub,
                "XOR" => Opcode::Xor,
                "ADDS" => Opcode::Adds,
                "SUBS" => Opcode::Subs,
                "MULTS" => Opcode::Mults,
                _ => Opcode::Divs,
            };
            let [d, s1, s2] = three_operands(operands).ok_or_else(|| malformed!(operands.join(" ")))?;
            instr.dest = parse_register(d).ok_or_else(|| malformed!(d))?;
            instr.src1 = parse_register(s1).ok_or_else(|| malformed!(s1))?;
            instr.src2 = parse_register(s2).ok_or_else(|| malformed!(s2))?;
        }

        "ADDI" | "SUBI" => {
            instr.opcode = if mnemonic == "ADDI" { Opcode::Addi } else { Opcode::Subi };
            let [d, s1, imm] = three_operands(operands).ok_or_else(|| malformed!(operands.join(" ")))?;
            instr.dest = parse_register(d).ok_or_else(|| malformed!(d))?;
            instr.src1 = parse_register(s1).ok_or_else(|| malformed!(s1))?;
            instr.immediate = parse_immediate(imm).ok_or_else(|| malformed!(imm))? as u32;
        }

        "LW" | "LWS" => {
            instr.opcode = if mnemonic == "LW" { Opcode::Lw } else { Opcode::Lws };
            let [d, mem] = two_operands(operands).ok_or_else(|| malformed!(operands.join(" ")))?;
            instr.dest = parse_register(d).ok_or_else(|| malformed!(d))?;
            let (imm, base) = parse_memory_operand(mem).ok_or_else(|| malformed!(mem))?;
            instr.immediate = imm as u32;
            instr.src1 = base;
        }

        "SW" | "SWS" => {
            instr.opcode = if mnemonic == "SW" { Opcode::Sw } else { Opcode::Sws };
            let [v, mem] = two_operands(operands).ok_or_else(|| malformed!(operands.join(" ")))?;
            instr.src1 = parse_register(v).ok_or_else(|| malformed!(v))?;
            let (imm, base) = parse_memory_operand(mem).ok_or_else(|| malformed!(mem))?;
            instr.immediate = imm as u32;
            instr.src2 = base;
        }

        "BEQZ" | "BNEZ" | "BLTZ" | "BGTZ" | "BLEZ" | "BGEZ" => {
            instr.opcode = match mnemonic {
                "BEQZ" => Opcode::Beqz,
                "BNEZ" => Opcode::Bnez,
                "BLTZ" => Opcode::Bltz,
                "BGTZ" => Opcode::Bgtz,
                "BLEZ" => Opcode::Blez,
                _ => Opcode::Bgez,
            };
            let [s1, label] = two_operands(operands).ok_or_else(|| malformed!(operands.join(" ")))?;
            instr.src1 = parse_register(s1).ok_or_else(|| malformed!(s1))?;
            pending_labels.push((index, label.to_string()));
        }

        "JUMP" => {
            instr.opcode = Opcode::Jump;
            let [label] = one_operand(operands).ok_or_else(|| malformed!(operands.join(" ")))?;
            pending_labels.push((index, label.to_string()));
        }

        other => {
            return Err(ParseError::UnknownMnemonic {
                path: path.to_path_buf(),
                line,
                token: other.to_string(),
            })
        }
    }

    Ok(instr)
}

fn one_operand<'a>(operands: &[&'a str]) -> Option<[&'a str; 1]> {
    match operands {
        [a] => Some([a]),
        _ => None,
    }
}

fn two_operands<'a>(operands: &[&'a str]) -> Option<[&'a str; 2]> {
    match operands {
        [a, b] => Some([a, b]),
        _ => None,
    }
}

fn three_operands<'a>(operands: &[&'a str]) -> Option<[&'a str; 3]> {
    match operands {
        [a, b, c] => Some([a, b, c]),
        _ => None,
    }
}

fn trim_comma(token: &str) -> &str {
    token.trim_end_matches(',')
}

/// Parses a `Rn`/`Fn` register name into its index.
fn parse_register(token: &str) -> Option<u32> {
    let token = trim_comma(token);
    let digits = token.strip_prefix('R').or_else(|| token.strip_prefix('F'))?;
    digits.parse().ok()
}

/// Parses a decimal or `0x`-prefixed hex immediate, C-`strtoul`-style.
fn parse_immediate(token: &str) -> Option<i64> {
    let token = trim_comma(token);
    let (negative, token) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let value = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        token.parse().ok()?
    };
    Some(if negative { -value } else { value })
}

/// Parses `imm(Rn)` / `imm(Fn)` into `(immediate, register_index)`.
fn parse_memory_operand(token: &str) -> Option<(i64, u32)> {
    let token = trim_comma(token);
    let open = token.find('(')?;
    let close = token.find(')')?;
    if close <= open {
        return None;
    }
    let imm = parse_immediate(&token[..open])?;
    let reg = parse_register(&token[open + 1..close])?;
    Some((imm, reg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulatorError;
    use std::io::Write as _;
    use std::path::PathBuf;

    fn write_temp(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "mipssim-test-{:?}-{}.asm",
            std::thread::current().id(),
            contents.len()
        ));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_simple_arithmetic_program() {
        let path = write_temp("ADDI R1 R0 5\nADDI R2 R0 7\nADD R3 R1 R2\nEOP\n");
        let program = parse_program(&path).unwrap();
        assert_eq!(program.len(), 4);
        assert_eq!(program[0].opcode, Opcode::Addi);
        assert_eq!(program[0].dest, 1);
        assert_eq!(program[0].immediate, 5);
        assert_eq!(program[2].opcode, Opcode::Add);
        assert_eq!(program[3].opcode, Opcode::Eop);
    }

    #[test]
    fn resolves_forward_branch_label() {
        let path = write_temp("ADDI R1 R0 1\nBNEZ R1 L\nADDI R2 R0 99\nL: ADDI R3 R0 42\nEOP\n");
        let program = parse_program(&path).unwrap();
        assert_eq!(program[1].opcode, Opcode::Bnez);
        // target index 3, source index 1 -> (3 - 1 - 1) << 2 = 4
        assert_eq!(program[1].immediate as i32, 4);
    }

    #[test]
    fn parses_memory_operands() {
        let path = write_temp("LW R1 8(R2)\nSW R3 -4(R4)\nEOP\n");
        let program = parse_program(&path).unwrap();
        assert_eq!(program[0].opcode, Opcode::Lw);
        assert_eq!(program[0].dest, 1);
        assert_eq!(program[0].immediate, 8);
        assert_eq!(program[0].src1, 2);
        assert_eq!(program[1].opcode, Opcode::Sw);
        assert_eq!(program[1].src1, 3);
        assert_eq!(program[1].immediate as i32, -4);
        assert_eq!(program[1].src2, 4);
    }

    #[test]
    fn unknown_mnemonic_is_an_error() {
        let path = write_temp("FROB R1 R2 R3\nEOP\n");
        let err = parse_program(&path).unwrap_err();
        assert!(matches!(err, SimulatorError::ParseError(ParseError::UnknownMnemonic { .. })));
    }

    #[test]
    fn undefined_label_is_an_error() {
        let path = write_temp("BEQZ R1 NOWHERE\nEOP\n");
        let err = parse_program(&path).unwrap_err();
        assert!(matches!(err, SimulatorError::ParseError(ParseError::UndefinedLabel { .. })));
    }
}
