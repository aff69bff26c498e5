//! Re-encoding of instruction lists into code streams.
//!
//! Encoding is where a spliced body becomes a valid code stream again: every
//! instruction receives a fresh byte offset, constant loads and branches are
//! normalized to their shortest legal encodings, branch displacements are rewritten
//! against the new layout, and the exception-handler table is rebased. The encoder
//! also produces the old→new offset map that the symbol writer uses to keep
//! sequence points aligned with the instructions they describe.
//!
//! Branch sizing is the classic relaxation loop: every branch starts in short form
//! and is widened until each remaining short displacement fits in a signed byte.
//! Code that was already normalized is a fixpoint of this pass, so a plain
//! decode/encode round trip reproduces the input bytes exactly.

use rustc_hash::FxHashMap;

use crate::{
    bytecode::{
        instruction::{
            long_form_of, op_spec, short_form_of, Immediate, Instruction, Operand, OperandType,
            PENDING_OFFSET,
        },
        opcodes,
    },
    file::io::write_le,
    metadata::method::{ExceptionHandlerKind, MethodBody},
    Error, Result,
};

/// The result of laying out one method body.
#[derive(Debug)]
pub struct EncodedBody {
    /// The encoded code stream
    pub code: Vec<u8>,
    /// Map from as-loaded byte offsets to their new byte offsets; instructions that
    /// were spliced in during the weave have no as-loaded offset and do not appear
    pub offset_map: FxHashMap<u32, u32>,
}

/// Lays out a body: assigns offsets, normalizes encodings, rewrites branches, and
/// rebases the exception-handler table. The instruction list is updated in place to
/// the new offset space.
///
/// Exception-handler regions that started at offset 0 keep starting at offset 0, so
/// instructions spliced at method entry stay covered; every other boundary keeps
/// tracking the instruction it originally pointed at.
///
/// # Errors
/// Returns [`crate::Error::InvalidBranchTarget`] when a branch or handler boundary
/// references an offset no instruction occupies.
pub fn encode_body(body: &mut MethodBody) -> Result<EncodedBody> {
    // As-loaded offset -> index, and the as-loaded end of code, captured before any
    // opcode normalization changes instruction sizes.
    let mut old_index: FxHashMap<u64, usize> = FxHashMap::default();
    let mut old_code_len = 0_u64;
    for (index, instruction) in body.instructions.iter().enumerate() {
        if instruction.offset == PENDING_OFFSET {
            continue;
        }
        old_index.insert(instruction.offset, index);
        old_code_len = instruction.offset + instruction_size(instruction) as u64;
    }

    // Branch and switch targets, resolved into index space.
    let mut targets: Vec<Option<Vec<usize>>> = vec![None; body.instructions.len()];
    for (index, instruction) in body.instructions.iter().enumerate() {
        match &instruction.operand {
            Operand::Target(target) => {
                let resolved = *old_index
                    .get(target)
                    .ok_or(Error::InvalidBranchTarget(*target))?;
                targets[index] = Some(vec![resolved]);
            }
            Operand::Switch(switch_targets) => {
                let mut resolved = Vec::with_capacity(switch_targets.len());
                for target in switch_targets {
                    resolved.push(
                        *old_index
                            .get(target)
                            .ok_or(Error::InvalidBranchTarget(*target))?,
                    );
                }
                targets[index] = Some(resolved);
            }
            _ => {}
        }
    }

    normalize_macros(&mut body.instructions);

    // Relaxation: widen short branches until every displacement fits.
    let mut new_offsets = layout(&body.instructions);
    loop {
        let mut changed = false;
        for (index, instruction) in body.instructions.iter_mut().enumerate() {
            if op_spec(instruction.opcode).map(|s| s.operand) != Some(OperandType::BranchTarget8) {
                continue;
            }
            let Some(target_list) = &targets[index] else {
                continue;
            };
            let next = new_offsets[index] as i64 + instruction_size(instruction) as i64;
            let displacement = new_offsets[target_list[0]] as i64 - next;
            if i8::try_from(displacement).is_err() {
                // Widening only; the loop terminates once nothing is left to widen.
                if let Some(long) = long_form_of(instruction.opcode) {
                    instruction.opcode = long;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
        new_offsets = layout(&body.instructions);
    }

    // Emission against the final layout.
    let mut code = Vec::new();
    for (index, instruction) in body.instructions.iter().enumerate() {
        emit(&mut code, instruction, index, &new_offsets, &targets)?;
    }
    let new_code_len = code.len() as u64;

    // Move the instruction list into the new offset space.
    for (index, instruction) in body.instructions.iter_mut().enumerate() {
        instruction.offset = new_offsets[index];
        match &mut instruction.operand {
            Operand::Target(target) => {
                *target = new_offsets[targets[index].as_ref().map_or(0, |t| t[0])];
            }
            Operand::Switch(switch_targets) => {
                if let Some(resolved) = &targets[index] {
                    for (slot, target_index) in switch_targets.iter_mut().zip(resolved) {
                        *slot = new_offsets[*target_index];
                    }
                }
            }
            _ => {}
        }
    }

    let mut offset_map = FxHashMap::default();
    for (old, index) in &old_index {
        #[allow(clippy::cast_possible_truncation)]
        offset_map.insert(*old as u32, new_offsets[*index] as u32);
    }

    rebase_handlers(body, &offset_map, old_code_len, new_code_len)?;

    Ok(EncodedBody { code, offset_map })
}

/// Chooses the shortest legal encoding for constant loads and resets every branch to
/// short form ahead of relaxation.
fn normalize_macros(instructions: &mut [Instruction]) {
    for instruction in instructions.iter_mut() {
        if let Some(value) = instruction.ldc_i4_value() {
            match value {
                -1 => {
                    instruction.opcode = opcodes::LDC_I4_M1;
                    instruction.operand = Operand::None;
                }
                0..=8 => {
                    #[allow(clippy::cast_sign_loss)]
                    let macro_opcode = opcodes::LDC_I4_0 + value as u16;
                    instruction.opcode = macro_opcode;
                    instruction.operand = Operand::None;
                }
                _ => {
                    if let Ok(small) = i8::try_from(value) {
                        instruction.opcode = opcodes::LDC_I4_S;
                        instruction.operand = Operand::Immediate(Immediate::Int8(small));
                    } else {
                        instruction.opcode = opcodes::LDC_I4;
                        instruction.operand = Operand::Immediate(Immediate::Int32(value));
                    }
                }
            }
            continue;
        }

        if let Some(short) = short_form_of(instruction.opcode) {
            instruction.opcode = short;
        }
    }
}

/// Encoded size in bytes of one instruction in its current form.
fn instruction_size(instruction: &Instruction) -> usize {
    let opcode_size = if instruction.opcode > 0xFF { 2 } else { 1 };
    let operand_size = match op_spec(instruction.opcode).map(|s| s.operand) {
        Some(OperandType::None) | None => 0,
        Some(OperandType::Int8 | OperandType::UInt8 | OperandType::BranchTarget8) => 1,
        Some(OperandType::Int32 | OperandType::Token | OperandType::BranchTarget32) => 4,
        Some(OperandType::Int64) => 8,
        Some(OperandType::Switch) => match &instruction.operand {
            Operand::Switch(targets) => 4 + 4 * targets.len(),
            _ => 4,
        },
    };
    opcode_size + operand_size
}

/// Sequential byte offsets of every instruction in its current form.
fn layout(instructions: &[Instruction]) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(instructions.len());
    let mut offset = 0_u64;
    for instruction in instructions {
        offsets.push(offset);
        offset += instruction_size(instruction) as u64;
    }
    offsets
}

/// Writes one instruction against the final layout.
fn emit(
    code: &mut Vec<u8>,
    instruction: &Instruction,
    index: usize,
    new_offsets: &[u64],
    targets: &[Option<Vec<usize>>],
) -> Result<()> {
    if instruction.opcode > 0xFF {
        write_le::<u8>(code, opcodes::FE_PREFIX);
        write_le::<u8>(code, (instruction.opcode & 0xFF) as u8);
    } else {
        write_le::<u8>(code, instruction.opcode as u8);
    }

    let next = new_offsets[index] as i64 + instruction_size(instruction) as i64;

    match op_spec(instruction.opcode).map(|s| s.operand) {
        Some(OperandType::None) | None => {}
        Some(OperandType::Int8) => match instruction.operand {
            Operand::Immediate(Immediate::Int8(value)) => write_le::<i8>(code, value),
            _ => return Err(operand_mismatch(instruction)),
        },
        Some(OperandType::UInt8) => match instruction.operand {
            Operand::Immediate(Immediate::UInt8(value)) => write_le::<u8>(code, value),
            _ => return Err(operand_mismatch(instruction)),
        },
        Some(OperandType::Int32) => match instruction.operand {
            Operand::Immediate(Immediate::Int32(value)) => write_le::<i32>(code, value),
            _ => return Err(operand_mismatch(instruction)),
        },
        Some(OperandType::Int64) => match instruction.operand {
            Operand::Immediate(Immediate::Int64(value)) => write_le::<i64>(code, value),
            _ => return Err(operand_mismatch(instruction)),
        },
        Some(OperandType::Token) => match instruction.operand {
            Operand::Token(token) => write_le::<u32>(code, token.value()),
            _ => return Err(operand_mismatch(instruction)),
        },
        Some(OperandType::BranchTarget8) => {
            let target_index = branch_target(instruction, index, targets)?;
            let displacement = new_offsets[target_index] as i64 - next;
            let Ok(value) = i8::try_from(displacement) else {
                return Err(malformed_error!(
                    "Short branch displacement {} out of range after layout",
                    displacement
                ));
            };
            write_le::<i8>(code, value);
        }
        Some(OperandType::BranchTarget32) => {
            let target_index = branch_target(instruction, index, targets)?;
            let displacement = new_offsets[target_index] as i64 - next;
            #[allow(clippy::cast_possible_truncation)]
            write_le::<i32>(code, displacement as i32);
        }
        Some(OperandType::Switch) => {
            let Some(target_list) = &targets[index] else {
                return Err(operand_mismatch(instruction));
            };
            #[allow(clippy::cast_possible_truncation)]
            write_le::<u32>(code, target_list.len() as u32);
            for target_index in target_list {
                let displacement = new_offsets[*target_index] as i64 - next;
                #[allow(clippy::cast_possible_truncation)]
                write_le::<i32>(code, displacement as i32);
            }
        }
    }

    Ok(())
}

fn branch_target(
    instruction: &Instruction,
    index: usize,
    targets: &[Option<Vec<usize>>],
) -> Result<usize> {
    targets[index]
        .as_ref()
        .and_then(|t| t.first().copied())
        .ok_or_else(|| operand_mismatch(instruction))
}

fn operand_mismatch(instruction: &Instruction) -> Error {
    malformed_error!(
        "Instruction '{}' carries an operand of the wrong shape",
        instruction.mnemonic()
    )
}

/// Moves handler boundaries into the new offset space.
fn rebase_handlers(
    body: &mut MethodBody,
    offset_map: &FxHashMap<u32, u32>,
    old_code_len: u64,
    new_code_len: u64,
) -> Result<()> {
    let map_boundary = |old: u32, anchor_entry: bool| -> Result<u32> {
        if anchor_entry && old == 0 {
            // A protected region that started at method entry keeps covering it, so
            // instructions spliced in front of the old first instruction stay inside.
            return Ok(0);
        }
        if u64::from(old) == old_code_len {
            #[allow(clippy::cast_possible_truncation)]
            return Ok(new_code_len as u32);
        }
        offset_map
            .get(&old)
            .copied()
            .ok_or(Error::InvalidBranchTarget(u64::from(old)))
    };

    for handler in &mut body.handlers {
        let try_start = map_boundary(handler.try_offset, true)?;
        let try_end = map_boundary(handler.try_offset + handler.try_length, false)?;
        let handler_start = map_boundary(handler.handler_offset, false)?;
        let handler_end = map_boundary(handler.handler_offset + handler.handler_length, false)?;

        handler.try_offset = try_start;
        handler.try_length = try_end - try_start;
        handler.handler_offset = handler_start;
        handler.handler_length = handler_end - handler_start;

        if handler.kind == ExceptionHandlerKind::Filter {
            handler.filter_offset = map_boundary(handler.filter_offset, false)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::decoder::decode_code,
        metadata::{method::ExceptionHandler, token::Token},
    };

    fn body_from(code: &[u8]) -> MethodBody {
        MethodBody {
            max_stack: 8,
            locals: Vec::new(),
            instructions: decode_code(code).unwrap(),
            handlers: Vec::new(),
        }
    }

    #[test]
    fn round_trip_is_identity_for_normalized_code() {
        // ldc.i4.0; brtrue.s IL_0004; nop; ret
        let code = [0x16, 0x2D, 0x01, 0x00, 0x2A];
        let mut body = body_from(&code);

        let encoded = encode_body(&mut body).unwrap();
        assert_eq!(encoded.code, code);
        assert_eq!(encoded.offset_map.get(&0), Some(&0));
        assert_eq!(encoded.offset_map.get(&4), Some(&4));
    }

    #[test]
    fn entry_splice_shifts_offsets_and_targets() {
        // ldc.i4.0; brtrue.s IL_0004; nop; ret
        let code = [0x16, 0x2D, 0x01, 0x00, 0x2A];
        let mut body = body_from(&code);

        // Splice a 5-byte load in front of everything.
        body.instructions.insert(
            0,
            Instruction::new(opcodes::LDSFLD, Operand::Token(Token::new(0x04000001))),
        );

        let encoded = encode_body(&mut body).unwrap();
        assert_eq!(encoded.offset_map.get(&0), Some(&5));
        assert_eq!(encoded.offset_map.get(&4), Some(&9));

        let reparsed = decode_code(&encoded.code).unwrap();
        assert_eq!(reparsed[2].mnemonic(), "brtrue.s");
        assert_eq!(reparsed[2].operand, Operand::Target(9));
    }

    #[test]
    fn short_branch_widens_when_displacement_overflows() {
        // br.s over 126 bytes of nops, then the target ret.
        let mut code = vec![0x2B, 0x7E];
        code.extend(std::iter::repeat(0x00).take(126));
        code.push(0x2A);
        let mut body = body_from(&code);

        // Four spliced instructions (12 bytes) push the displacement past +127.
        for instruction in [
            Instruction::new(opcodes::LDSFLD, Operand::Token(Token::new(0x04000001))),
            Instruction::new(opcodes::LDC_I4, Operand::Immediate(Immediate::Int32(1))),
            Instruction::new(opcodes::ADD, Operand::None),
            Instruction::new(opcodes::STSFLD, Operand::Token(Token::new(0x04000001))),
        ]
        .into_iter()
        .rev()
        {
            body.instructions.insert(2, instruction);
        }

        let encoded = encode_body(&mut body).unwrap();
        let reparsed = decode_code(&encoded.code).unwrap();

        let branch = reparsed.iter().find(|i| i.is_branch()).unwrap();
        assert_eq!(branch.mnemonic(), "br");
        let target = reparsed.last().unwrap();
        assert_eq!(target.mnemonic(), "ret");
        assert_eq!(branch.operand, Operand::Target(target.offset));
    }

    #[test]
    fn spliced_ldc_is_normalized_to_macro_form() {
        let code = [0x2A];
        let mut body = body_from(&code);
        body.instructions.insert(
            0,
            Instruction::new(opcodes::LDC_I4, Operand::Immediate(Immediate::Int32(1))),
        );

        let encoded = encode_body(&mut body).unwrap();
        assert_eq!(encoded.code, [0x17, 0x2A]);
    }

    #[test]
    fn handler_at_entry_extends_over_splice() {
        // nop; nop; ret with a try [0..2) / handler [2..3)
        let code = [0x00, 0x00, 0x2A];
        let mut body = body_from(&code);
        body.handlers.push(ExceptionHandler {
            kind: ExceptionHandlerKind::Finally,
            try_offset: 0,
            try_length: 2,
            handler_offset: 2,
            handler_length: 1,
            filter_offset: 0,
        });

        body.instructions
            .insert(0, Instruction::new(opcodes::NOP, Operand::None));

        encode_body(&mut body).unwrap();
        let handler = body.handlers[0];
        assert_eq!(handler.try_offset, 0, "entry region keeps covering entry");
        assert_eq!(handler.try_length, 3);
        assert_eq!(handler.handler_offset, 3);
        assert_eq!(handler.handler_length, 1);
    }

    #[test]
    fn handler_mid_body_tracks_its_instruction() {
        // nop; nop; ret with a try [1..2) / handler [2..3)
        let code = [0x00, 0x00, 0x2A];
        let mut body = body_from(&code);
        body.handlers.push(ExceptionHandler {
            kind: ExceptionHandlerKind::Finally,
            try_offset: 1,
            try_length: 1,
            handler_offset: 2,
            handler_length: 1,
            filter_offset: 0,
        });

        body.instructions
            .insert(0, Instruction::new(opcodes::NOP, Operand::None));

        encode_body(&mut body).unwrap();
        let handler = body.handlers[0];
        assert_eq!(handler.try_offset, 2);
        assert_eq!(handler.try_length, 1);
        assert_eq!(handler.handler_offset, 3);
    }

    #[test]
    fn unresolved_branch_target_is_an_error() {
        let mut body = MethodBody::new();
        let mut branch = Instruction::new(opcodes::BR_S, Operand::Target(40));
        branch.offset = 0;
        body.instructions.push(branch);

        assert!(matches!(
            encode_body(&mut body),
            Err(Error::InvalidBranchTarget(40))
        ));
    }
}
