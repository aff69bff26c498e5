//! Linear decoding of code streams into instruction lists.
//!
//! The weaver needs to see and splice *every* instruction of a body, so decoding is a
//! straight linear sweep over the code bytes rather than a control-flow walk. Branch
//! displacements are resolved to absolute byte offsets during decoding; the encoder
//! turns them back into displacements when the body is laid out again.

use crate::{
    bytecode::{
        instruction::{op_spec, Immediate, Instruction, Operand, OperandType},
        opcodes,
    },
    file::io::read_le_at,
    metadata::token::Token,
    Result,
};

/// Decodes a complete code stream.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] on unknown opcodes and on branch displacements
/// that point outside the code stream, and [`crate::Error::OutOfBounds`] on truncated
/// operands.
pub fn decode_code(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0_usize;

    while offset < code.len() {
        let start = offset;

        let first = read_le_at::<u8>(code, &mut offset)?;
        let opcode = if first == opcodes::FE_PREFIX {
            let second = read_le_at::<u8>(code, &mut offset)?;
            0xFE00 | u16::from(second)
        } else {
            u16::from(first)
        };

        let Some(spec) = op_spec(opcode) else {
            return Err(malformed_error!(
                "Unknown opcode {:#06x} at code offset {}",
                opcode,
                start
            ));
        };

        let operand = match spec.operand {
            OperandType::None => Operand::None,
            OperandType::Int8 => {
                Operand::Immediate(Immediate::Int8(read_le_at::<i8>(code, &mut offset)?))
            }
            OperandType::UInt8 => {
                Operand::Immediate(Immediate::UInt8(read_le_at::<u8>(code, &mut offset)?))
            }
            OperandType::Int32 => {
                Operand::Immediate(Immediate::Int32(read_le_at::<i32>(code, &mut offset)?))
            }
            OperandType::Int64 => {
                Operand::Immediate(Immediate::Int64(read_le_at::<i64>(code, &mut offset)?))
            }
            OperandType::Token => Operand::Token(Token::new(read_le_at::<u32>(code, &mut offset)?)),
            OperandType::BranchTarget8 => {
                let displacement = i64::from(read_le_at::<i8>(code, &mut offset)?);
                Operand::Target(absolute_target(start, offset, displacement, code.len())?)
            }
            OperandType::BranchTarget32 => {
                let displacement = i64::from(read_le_at::<i32>(code, &mut offset)?);
                Operand::Target(absolute_target(start, offset, displacement, code.len())?)
            }
            OperandType::Switch => {
                let count = read_le_at::<u32>(code, &mut offset)? as usize;
                let mut displacements = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    displacements.push(i64::from(read_le_at::<i32>(code, &mut offset)?));
                }
                let mut targets = Vec::with_capacity(displacements.len());
                for displacement in displacements {
                    targets.push(absolute_target(start, offset, displacement, code.len())?);
                }
                Operand::Switch(targets)
            }
        };

        instructions.push(Instruction {
            offset: start as u64,
            opcode,
            operand,
        });
    }

    Ok(instructions)
}

/// Resolves a displacement (relative to the end of the instruction) to an absolute
/// code offset, rejecting targets outside the stream.
fn absolute_target(
    instruction_start: usize,
    next_offset: usize,
    displacement: i64,
    code_len: usize,
) -> Result<u64> {
    let target = next_offset as i64 + displacement;
    if target < 0 || target as usize >= code_len {
        return Err(malformed_error!(
            "Branch at code offset {} targets {} which is outside the code stream",
            instruction_start,
            target
        ));
    }

    #[allow(clippy::cast_sign_loss)]
    Ok(target as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instruction::FlowType;

    #[test]
    fn decode_simple_body() {
        // ldsfld 0x04000001; ldc.i4.1; add; stsfld 0x04000001; ret
        let code = [
            0x7E, 0x01, 0x00, 0x00, 0x04, 0x17, 0x58, 0x80, 0x01, 0x00, 0x00, 0x04, 0x2A,
        ];

        let instructions = decode_code(&code).unwrap();
        assert_eq!(instructions.len(), 5);

        assert_eq!(instructions[0].mnemonic(), "ldsfld");
        assert_eq!(
            instructions[0].operand,
            Operand::Token(Token::new(0x04000001))
        );
        assert_eq!(instructions[1].mnemonic(), "ldc.i4.1");
        assert_eq!(instructions[2].mnemonic(), "add");
        assert_eq!(instructions[3].mnemonic(), "stsfld");
        assert_eq!(instructions[4].mnemonic(), "ret");

        assert_eq!(instructions[0].offset, 0);
        assert_eq!(instructions[1].offset, 5);
        assert_eq!(instructions[2].offset, 6);
        assert_eq!(instructions[3].offset, 7);
        assert_eq!(instructions[4].offset, 12);
    }

    #[test]
    fn decode_branches_to_absolute_targets() {
        // ldc.i4.0; brtrue.s +1 (over the nop); nop; ret
        let code = [0x16, 0x2D, 0x01, 0x00, 0x2A];

        let instructions = decode_code(&code).unwrap();
        assert_eq!(instructions.len(), 4);
        assert_eq!(instructions[1].flow_type(), FlowType::ConditionalBranch);
        assert_eq!(instructions[1].operand, Operand::Target(4));
    }

    #[test]
    fn decode_backward_branch() {
        // nop; br.s -3 (back to the nop)
        let code = [0x00, 0x2B, 0xFD];

        let instructions = decode_code(&code).unwrap();
        assert_eq!(instructions[1].operand, Operand::Target(0));
    }

    #[test]
    fn decode_switch() {
        // switch(2) with displacements 1 and 2; nop; nop; ret
        let code = [
            0x45, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x2A,
        ];

        let instructions = decode_code(&code).unwrap();
        assert_eq!(instructions[0].mnemonic(), "switch");
        assert_eq!(instructions[0].operand, Operand::Switch(vec![14, 15]));
    }

    #[test]
    fn decode_prefixed_opcode() {
        // ldc.i4.1; ldc.i4.2; ceq; ret
        let code = [0x17, 0x18, 0xFE, 0x01, 0x2A];

        let instructions = decode_code(&code).unwrap();
        assert_eq!(instructions[2].mnemonic(), "ceq");
        assert_eq!(instructions[2].offset, 2);
        assert_eq!(instructions[3].offset, 4);
    }

    #[test]
    fn unknown_opcode() {
        let code = [0xF7];
        assert!(matches!(
            decode_code(&code),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn branch_outside_stream() {
        // br.s +10 with nothing there
        let code = [0x2B, 0x0A];
        assert!(matches!(
            decode_code(&code),
            Err(crate::Error::Malformed { .. })
        ));
    }
}
