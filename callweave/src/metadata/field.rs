//! Field definition rows.

use bitflags::bitflags;

use crate::metadata::{signatures::TypeSig, token::Token};

bitflags! {
    /// Attribute flags of a field definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldAttributes: u32 {
        /// Accessible only within the declaring type
        const PRIVATE = 0x0000_0001;
        /// Accessible from anywhere
        const PUBLIC = 0x0000_0006;
        /// One slot per type rather than per instance
        const STATIC = 0x0000_0010;
    }
}

/// One field definition row.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Declaring type (TypeDef token), maintained by the module mutation API
    pub parent: Token,
    /// Field name
    pub name: String,
    /// Attribute flags
    pub flags: FieldAttributes,
    /// Field type
    pub ty: TypeSig,
}

impl FieldDef {
    /// True for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }
}
