//! Instruction-level processing: decoding, splicing, and re-encoding of method bodies.
//!
//! # Architecture
//!
//! The bytecode layer is deliberately offset-centric. [`decoder::decode_code`] turns a
//! raw code stream into [`instruction::Instruction`] values that remember their
//! as-loaded byte offsets; branch operands decode to *absolute* offsets in that same
//! space. Code edits are list splices that leave the original offsets untouched, so an
//! as-loaded offset keeps identifying "the instruction formerly at this offset" for the
//! whole weave. [`encoder::encode_body`] then lays the stream out again: it assigns
//! fresh offsets, normalizes short/long opcode forms, rewrites branch displacements,
//! and rebases the exception-handler table, returning the old→new offset map the
//! symbol writer needs.

pub mod decoder;
pub mod encoder;
pub mod instruction;
pub mod opcodes;
