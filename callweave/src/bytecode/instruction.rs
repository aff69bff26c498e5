//! Instruction representation, operand types, and decoding metadata.
//!
//! The central type is [`Instruction`]: one decoded (or freshly spliced) instruction
//! with its opcode, typed operand, and byte offset. Supporting enums give type-safe
//! representations for operands and control-flow behavior; [`op_spec`] is the
//! table-driven source of truth for operand shapes and flow classification. The design
//! favors tagged variants with explicit discriminators over any kind of instruction
//! hierarchy.

use std::fmt;

use crate::{
    bytecode::opcodes,
    metadata::token::Token,
};

/// Offset sentinel carried by instructions that have been spliced into a body but not
/// yet laid out by the encoder.
pub const PENDING_OFFSET: u64 = u64::MAX;

/// Shape of the operand bytes following an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand present
    None,
    /// Signed 8-bit immediate
    Int8,
    /// Unsigned 8-bit slot index
    UInt8,
    /// Signed 32-bit immediate
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// Metadata token reference
    Token,
    /// Signed 8-bit relative branch displacement
    BranchTarget8,
    /// Signed 32-bit relative branch displacement
    BranchTarget32,
    /// Switch table: count plus that many 32-bit displacements
    Switch,
}

/// An immediate value embedded in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    /// Signed 8-bit immediate value
    Int8(i8),
    /// Unsigned 8-bit immediate value (argument/local slot index)
    UInt8(u8),
    /// Signed 32-bit immediate value
    Int32(i32),
    /// Signed 64-bit immediate value
    Int64(i64),
}

/// A decoded operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand present
    None,
    /// Immediate value (constant embedded in instruction)
    Immediate(Immediate),
    /// Branch target as an absolute byte offset into the code stream
    Target(u64),
    /// Metadata token reference
    Token(Token),
    /// Switch table of absolute byte offsets
    Switch(Vec<u64>),
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally block
    EndFinally,
    /// Leave protected region
    Leave,
}

/// Static description of one opcode: mnemonic, operand shape, flow behavior.
#[derive(Debug, Clone, Copy)]
pub struct OpSpec {
    /// Assembler mnemonic
    pub mnemonic: &'static str,
    /// Operand shape following the opcode bytes
    pub operand: OperandType,
    /// Control-flow classification
    pub flow: FlowType,
}

macro_rules! spec {
    ($mnemonic:literal, $operand:ident, $flow:ident) => {
        Some(OpSpec {
            mnemonic: $mnemonic,
            operand: OperandType::$operand,
            flow: FlowType::$flow,
        })
    };
}

/// Looks up the static description of an opcode.
///
/// Returns `None` for byte values that are not part of the instruction set.
#[must_use]
pub fn op_spec(opcode: u16) -> Option<OpSpec> {
    use opcodes::*;

    match opcode {
        NOP => spec!("nop", None, Sequential),
        LDARG_0 => spec!("ldarg.0", None, Sequential),
        LDARG_1 => spec!("ldarg.1", None, Sequential),
        LDARG_2 => spec!("ldarg.2", None, Sequential),
        LDARG_3 => spec!("ldarg.3", None, Sequential),
        LDLOC_0 => spec!("ldloc.0", None, Sequential),
        LDLOC_1 => spec!("ldloc.1", None, Sequential),
        LDLOC_2 => spec!("ldloc.2", None, Sequential),
        LDLOC_3 => spec!("ldloc.3", None, Sequential),
        STLOC_0 => spec!("stloc.0", None, Sequential),
        STLOC_1 => spec!("stloc.1", None, Sequential),
        STLOC_2 => spec!("stloc.2", None, Sequential),
        STLOC_3 => spec!("stloc.3", None, Sequential),
        LDARG_S => spec!("ldarg.s", UInt8, Sequential),
        LDARGA_S => spec!("ldarga.s", UInt8, Sequential),
        STARG_S => spec!("starg.s", UInt8, Sequential),
        LDLOC_S => spec!("ldloc.s", UInt8, Sequential),
        LDLOCA_S => spec!("ldloca.s", UInt8, Sequential),
        STLOC_S => spec!("stloc.s", UInt8, Sequential),
        LDNULL => spec!("ldnull", None, Sequential),
        LDC_I4_M1 => spec!("ldc.i4.m1", None, Sequential),
        LDC_I4_0 => spec!("ldc.i4.0", None, Sequential),
        LDC_I4_1 => spec!("ldc.i4.1", None, Sequential),
        LDC_I4_2 => spec!("ldc.i4.2", None, Sequential),
        LDC_I4_3 => spec!("ldc.i4.3", None, Sequential),
        LDC_I4_4 => spec!("ldc.i4.4", None, Sequential),
        LDC_I4_5 => spec!("ldc.i4.5", None, Sequential),
        LDC_I4_6 => spec!("ldc.i4.6", None, Sequential),
        LDC_I4_7 => spec!("ldc.i4.7", None, Sequential),
        LDC_I4_8 => spec!("ldc.i4.8", None, Sequential),
        LDC_I4_S => spec!("ldc.i4.s", Int8, Sequential),
        LDC_I4 => spec!("ldc.i4", Int32, Sequential),
        LDC_I8 => spec!("ldc.i8", Int64, Sequential),
        DUP => spec!("dup", None, Sequential),
        POP => spec!("pop", None, Sequential),
        CALL => spec!("call", Token, Call),
        RET => spec!("ret", None, Return),
        BR_S => spec!("br.s", BranchTarget8, UnconditionalBranch),
        BRFALSE_S => spec!("brfalse.s", BranchTarget8, ConditionalBranch),
        BRTRUE_S => spec!("brtrue.s", BranchTarget8, ConditionalBranch),
        BEQ_S => spec!("beq.s", BranchTarget8, ConditionalBranch),
        BGE_S => spec!("bge.s", BranchTarget8, ConditionalBranch),
        BGT_S => spec!("bgt.s", BranchTarget8, ConditionalBranch),
        BLE_S => spec!("ble.s", BranchTarget8, ConditionalBranch),
        BLT_S => spec!("blt.s", BranchTarget8, ConditionalBranch),
        BNE_UN_S => spec!("bne.un.s", BranchTarget8, ConditionalBranch),
        BGE_UN_S => spec!("bge.un.s", BranchTarget8, ConditionalBranch),
        BGT_UN_S => spec!("bgt.un.s", BranchTarget8, ConditionalBranch),
        BLE_UN_S => spec!("ble.un.s", BranchTarget8, ConditionalBranch),
        BLT_UN_S => spec!("blt.un.s", BranchTarget8, ConditionalBranch),
        BR => spec!("br", BranchTarget32, UnconditionalBranch),
        BRFALSE => spec!("brfalse", BranchTarget32, ConditionalBranch),
        BRTRUE => spec!("brtrue", BranchTarget32, ConditionalBranch),
        BEQ => spec!("beq", BranchTarget32, ConditionalBranch),
        BGE => spec!("bge", BranchTarget32, ConditionalBranch),
        BGT => spec!("bgt", BranchTarget32, ConditionalBranch),
        BLE => spec!("ble", BranchTarget32, ConditionalBranch),
        BLT => spec!("blt", BranchTarget32, ConditionalBranch),
        BNE_UN => spec!("bne.un", BranchTarget32, ConditionalBranch),
        BGE_UN => spec!("bge.un", BranchTarget32, ConditionalBranch),
        BGT_UN => spec!("bgt.un", BranchTarget32, ConditionalBranch),
        BLE_UN => spec!("ble.un", BranchTarget32, ConditionalBranch),
        BLT_UN => spec!("blt.un", BranchTarget32, ConditionalBranch),
        SWITCH => spec!("switch", Switch, Switch),
        ADD => spec!("add", None, Sequential),
        SUB => spec!("sub", None, Sequential),
        MUL => spec!("mul", None, Sequential),
        DIV => spec!("div", None, Sequential),
        DIV_UN => spec!("div.un", None, Sequential),
        REM => spec!("rem", None, Sequential),
        REM_UN => spec!("rem.un", None, Sequential),
        AND => spec!("and", None, Sequential),
        OR => spec!("or", None, Sequential),
        XOR => spec!("xor", None, Sequential),
        SHL => spec!("shl", None, Sequential),
        SHR => spec!("shr", None, Sequential),
        SHR_UN => spec!("shr.un", None, Sequential),
        NEG => spec!("neg", None, Sequential),
        NOT => spec!("not", None, Sequential),
        CALLVIRT => spec!("callvirt", Token, Call),
        LDSTR => spec!("ldstr", Token, Sequential),
        NEWOBJ => spec!("newobj", Token, Call),
        THROW => spec!("throw", None, Throw),
        LDFLD => spec!("ldfld", Token, Sequential),
        LDFLDA => spec!("ldflda", Token, Sequential),
        STFLD => spec!("stfld", Token, Sequential),
        LDSFLD => spec!("ldsfld", Token, Sequential),
        LDSFLDA => spec!("ldsflda", Token, Sequential),
        STSFLD => spec!("stsfld", Token, Sequential),
        ENDFINALLY => spec!("endfinally", None, EndFinally),
        LEAVE => spec!("leave", BranchTarget32, Leave),
        LEAVE_S => spec!("leave.s", BranchTarget8, Leave),
        CEQ => spec!("ceq", None, Sequential),
        CGT => spec!("cgt", None, Sequential),
        CGT_UN => spec!("cgt.un", None, Sequential),
        CLT => spec!("clt", None, Sequential),
        CLT_UN => spec!("clt.un", None, Sequential),
        RETHROW => spec!("rethrow", None, Throw),
        _ => None,
    }
}

/// Maps a long-form branch opcode to its short-form equivalent.
#[must_use]
pub fn short_form_of(opcode: u16) -> Option<u16> {
    use opcodes::*;

    match opcode {
        BR => Some(BR_S),
        BRFALSE => Some(BRFALSE_S),
        BRTRUE => Some(BRTRUE_S),
        BEQ => Some(BEQ_S),
        BGE => Some(BGE_S),
        BGT => Some(BGT_S),
        BLE => Some(BLE_S),
        BLT => Some(BLT_S),
        BNE_UN => Some(BNE_UN_S),
        BGE_UN => Some(BGE_UN_S),
        BGT_UN => Some(BGT_UN_S),
        BLE_UN => Some(BLE_UN_S),
        BLT_UN => Some(BLT_UN_S),
        LEAVE => Some(LEAVE_S),
        _ => None,
    }
}

/// Maps a short-form branch opcode to its long-form equivalent.
#[must_use]
pub fn long_form_of(opcode: u16) -> Option<u16> {
    use opcodes::*;

    match opcode {
        BR_S => Some(BR),
        BRFALSE_S => Some(BRFALSE),
        BRTRUE_S => Some(BRTRUE),
        BEQ_S => Some(BEQ),
        BGE_S => Some(BGE),
        BGT_S => Some(BGT),
        BLE_S => Some(BLE),
        BLT_S => Some(BLT),
        BNE_UN_S => Some(BNE_UN),
        BGE_UN_S => Some(BGE_UN),
        BGT_UN_S => Some(BGT_UN),
        BLE_UN_S => Some(BLE_UN),
        BLT_UN_S => Some(BLT_UN),
        LEAVE_S => Some(LEAVE),
        _ => None,
    }
}

/// One instruction of a decoded method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset within the code stream; [`PENDING_OFFSET`] for spliced
    /// instructions that have not been laid out yet
    pub offset: u64,
    /// Opcode value; two-byte opcodes carry the `0xFE` prefix in the high byte
    pub opcode: u16,
    /// Decoded operand
    pub operand: Operand,
}

impl Instruction {
    /// Creates a fresh instruction awaiting layout.
    #[must_use]
    pub fn new(opcode: u16, operand: Operand) -> Self {
        Instruction {
            offset: PENDING_OFFSET,
            opcode,
            operand,
        }
    }

    /// The static description of this instruction's opcode.
    #[must_use]
    pub fn spec(&self) -> Option<OpSpec> {
        op_spec(self.opcode)
    }

    /// Assembler mnemonic, or `"??"` for opcodes outside the instruction set.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.spec().map_or("??", |s| s.mnemonic)
    }

    /// Control-flow classification of this instruction.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        self.spec().map_or(FlowType::Sequential, |s| s.flow)
    }

    /// True for the static and virtual call opcodes whose callee can receive
    /// caller-side counters (`call` and `callvirt`; `newobj` is excluded).
    #[must_use]
    pub fn is_call_site(&self) -> bool {
        self.opcode == opcodes::CALL || self.opcode == opcodes::CALLVIRT
    }

    /// True for instructions carrying a branch displacement operand, including
    /// `leave` and `leave.s`.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.spec().map(|s| s.operand),
            Some(OperandType::BranchTarget8 | OperandType::BranchTarget32)
        )
    }

    /// The 32-bit constant this instruction loads, for any of the `ldc.i4` forms.
    #[must_use]
    pub fn ldc_i4_value(&self) -> Option<i32> {
        use opcodes::*;

        match self.opcode {
            LDC_I4_M1 => Some(-1),
            LDC_I4_0..=LDC_I4_8 => Some(i32::from(self.opcode - LDC_I4_0)),
            LDC_I4_S => match self.operand {
                Operand::Immediate(Immediate::Int8(value)) => Some(i32::from(value)),
                _ => None,
            },
            LDC_I4 => match self.operand {
                Operand::Immediate(Immediate::Int32(value)) => Some(value),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.mnemonic())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Immediate(Immediate::Int8(value)) => write!(f, " {value}"),
            Operand::Immediate(Immediate::UInt8(value)) => write!(f, " {value}"),
            Operand::Immediate(Immediate::Int32(value)) => write!(f, " {value}"),
            Operand::Immediate(Immediate::Int64(value)) => write!(f, " {value}"),
            Operand::Target(target) => write!(f, " IL_{target:04x}"),
            Operand::Token(token) => write!(f, " {token}"),
            Operand::Switch(targets) => write!(f, " switch({})", targets.len()),
        }
    }
}
