//! Binary file primitives shared by the module and symbol-file serializers.
//!
//! Everything in the container format is little-endian; strings are a `u32` byte
//! length followed by UTF-8 data. The [`io`] module provides the safe, bounds-checked
//! reading and writing helpers the metadata layer is built on.

pub mod io;
