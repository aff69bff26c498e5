//! Opcode constants of the stack-VM instruction set.
//!
//! Single-byte opcodes carry their encoding byte in the low 8 bits. Two-byte opcodes
//! use the `0xFE` prefix and are stored with the prefix in the high byte (e.g. [`CEQ`]
//! is the instruction `0xFE 0x01`, stored as `0xFE01`). The [`FE_PREFIX`] constant
//! holds the shared first byte.
#![allow(missing_docs)]

// ── Single-byte opcodes ────────────────────────────────────────────────────

// Misc
pub const NOP: u16 = 0x00;

// Load argument shorthand
pub const LDARG_0: u16 = 0x02;
pub const LDARG_1: u16 = 0x03;
pub const LDARG_2: u16 = 0x04;
pub const LDARG_3: u16 = 0x05;

// Load/store local shorthand
pub const LDLOC_0: u16 = 0x06;
pub const LDLOC_1: u16 = 0x07;
pub const LDLOC_2: u16 = 0x08;
pub const LDLOC_3: u16 = 0x09;
pub const STLOC_0: u16 = 0x0A;
pub const STLOC_1: u16 = 0x0B;
pub const STLOC_2: u16 = 0x0C;
pub const STLOC_3: u16 = 0x0D;

// Load/store argument/local (short form)
pub const LDARG_S: u16 = 0x0E;
pub const LDARGA_S: u16 = 0x0F;
pub const STARG_S: u16 = 0x10;
pub const LDLOC_S: u16 = 0x11;
pub const LDLOCA_S: u16 = 0x12;
pub const STLOC_S: u16 = 0x13;

// Null / constant loaders
pub const LDNULL: u16 = 0x14;
pub const LDC_I4_M1: u16 = 0x15;
pub const LDC_I4_0: u16 = 0x16;
pub const LDC_I4_1: u16 = 0x17;
pub const LDC_I4_2: u16 = 0x18;
pub const LDC_I4_3: u16 = 0x19;
pub const LDC_I4_4: u16 = 0x1A;
pub const LDC_I4_5: u16 = 0x1B;
pub const LDC_I4_6: u16 = 0x1C;
pub const LDC_I4_7: u16 = 0x1D;
pub const LDC_I4_8: u16 = 0x1E;
pub const LDC_I4_S: u16 = 0x1F;
pub const LDC_I4: u16 = 0x20;
pub const LDC_I8: u16 = 0x21;

// Stack manipulation
pub const DUP: u16 = 0x25;
pub const POP: u16 = 0x26;

// Call / return
pub const CALL: u16 = 0x28;
pub const RET: u16 = 0x2A;

// Branch (short form)
pub const BR_S: u16 = 0x2B;
pub const BRFALSE_S: u16 = 0x2C;
pub const BRTRUE_S: u16 = 0x2D;
pub const BEQ_S: u16 = 0x2E;
pub const BGE_S: u16 = 0x2F;
pub const BGT_S: u16 = 0x30;
pub const BLE_S: u16 = 0x31;
pub const BLT_S: u16 = 0x32;
pub const BNE_UN_S: u16 = 0x33;
pub const BGE_UN_S: u16 = 0x34;
pub const BGT_UN_S: u16 = 0x35;
pub const BLE_UN_S: u16 = 0x36;
pub const BLT_UN_S: u16 = 0x37;

// Branch (long form)
pub const BR: u16 = 0x38;
pub const BRFALSE: u16 = 0x39;
pub const BRTRUE: u16 = 0x3A;
pub const BEQ: u16 = 0x3B;
pub const BGE: u16 = 0x3C;
pub const BGT: u16 = 0x3D;
pub const BLE: u16 = 0x3E;
pub const BLT: u16 = 0x3F;
pub const BNE_UN: u16 = 0x40;
pub const BGE_UN: u16 = 0x41;
pub const BGT_UN: u16 = 0x42;
pub const BLE_UN: u16 = 0x43;
pub const BLT_UN: u16 = 0x44;

// Switch
pub const SWITCH: u16 = 0x45;

// Arithmetic
pub const ADD: u16 = 0x58;
pub const SUB: u16 = 0x59;
pub const MUL: u16 = 0x5A;
pub const DIV: u16 = 0x5B;
pub const DIV_UN: u16 = 0x5C;
pub const REM: u16 = 0x5D;
pub const REM_UN: u16 = 0x5E;

// Bitwise / logical
pub const AND: u16 = 0x5F;
pub const OR: u16 = 0x60;
pub const XOR: u16 = 0x61;
pub const SHL: u16 = 0x62;
pub const SHR: u16 = 0x63;
pub const SHR_UN: u16 = 0x64;
pub const NEG: u16 = 0x65;
pub const NOT: u16 = 0x66;

// Virtual call / object model
pub const CALLVIRT: u16 = 0x6F;
pub const LDSTR: u16 = 0x72;
pub const NEWOBJ: u16 = 0x73;

// Exception
pub const THROW: u16 = 0x7A;

// Field access
pub const LDFLD: u16 = 0x7B;
pub const LDFLDA: u16 = 0x7C;
pub const STFLD: u16 = 0x7D;
pub const LDSFLD: u16 = 0x7E;
pub const LDSFLDA: u16 = 0x7F;
pub const STSFLD: u16 = 0x80;

// Exception handling
pub const ENDFINALLY: u16 = 0xDC;
pub const LEAVE: u16 = 0xDD;
pub const LEAVE_S: u16 = 0xDE;

// ── Two-byte opcodes (0xFE prefix) ─────────────────────────────────────────
//
// The first byte is always FE_PREFIX; the constants carry it in the high byte.

pub const FE_PREFIX: u8 = 0xFE;

pub const CEQ: u16 = 0xFE01;
pub const CGT: u16 = 0xFE02;
pub const CGT_UN: u16 = 0xFE03;
pub const CLT: u16 = 0xFE04;
pub const CLT_UN: u16 = 0xFE05;
pub const RETHROW: u16 = 0xFE1A;
