//! The token-addressed metadata graph and its serializers.
//!
//! A loaded module is a set of flat row arenas (types, methods, fields, plus the
//! module/type/member reference tables) addressed by [`token::Token`] values: the high
//! byte of a token names the table, the low 24 bits the 1-based row. References between
//! rows are tokens, never owning pointers, so the graph can be mutated freely while it
//! is walked from snapshots.
//!
//! # Key Components
//!
//! - [`module::Module`] - the mutable graph, with append-only mutation APIs
//! - [`token::Token`] / [`token::TableId`] - row addressing
//! - [`signatures::TypeSig`] / [`signatures::MethodSig`] - tagged type signatures
//! - [`builders`] - fluent row builders for synthesized types and fields
//! - [`reader`] / [`writer`] - the `.sbm` container serializers
//! - [`symbols`] - the `.sym` debug-symbol file and its offset remapping

pub mod builders;
pub mod field;
pub mod method;
pub mod module;
pub mod reader;
pub mod refs;
pub mod signatures;
pub mod symbols;
pub mod token;
pub mod types;
pub mod writer;
