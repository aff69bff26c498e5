//! Cross-module reference rows.
//!
//! References let instruction operands name members that live in other modules: a
//! [`MemberRef`] binds a name and signature to a [`TypeRef`], which in turn binds a
//! fully qualified type name to a [`ModuleRef`]. The weaver appends to these tables
//! when a counter field declared in one module has to be addressed from another.

use std::fmt;

use crate::{
    file::io::{read_le_at, read_string_at, write_le, write_string},
    metadata::{
        signatures::{MethodSig, TypeSig},
        token::Token,
    },
    Result,
};

/// A referenced module, by name (no path; resolution is the loader's concern).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRef {
    /// Module name, without extension
    pub name: String,
}

/// A type living in a referenced module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// Owning module (ModuleRef token); null means the current module
    pub module: Token,
    /// Namespace of the referenced type
    pub namespace: String,
    /// Simple name of the referenced type
    pub name: String,
}

impl TypeRef {
    /// The fully qualified name: `namespace.name`, or just the name when the
    /// namespace is empty.
    #[must_use]
    pub fn fqn(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// The signature of a referenced member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRefSig {
    /// Field reference with its field type
    Field(TypeSig),
    /// Method reference with its full signature
    Method(MethodSig),
}

impl MemberRefSig {
    const TAG_FIELD: u8 = 0x00;
    const TAG_METHOD: u8 = 0x01;

    /// Parse one member signature from an offset, advancing the offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on an unknown tag byte.
    pub fn read_at(data: &[u8], offset: &mut usize) -> Result<MemberRefSig> {
        let tag = read_le_at::<u8>(data, offset)?;
        match tag {
            Self::TAG_FIELD => Ok(MemberRefSig::Field(TypeSig::read_at(data, offset)?)),
            Self::TAG_METHOD => Ok(MemberRefSig::Method(MethodSig::read_at(data, offset)?)),
            _ => Err(malformed_error!("Unknown member signature tag {:#04x}", tag)),
        }
    }

    /// Append the binary form of this signature to an output buffer.
    pub fn write(&self, out: &mut Vec<u8>) {
        match self {
            MemberRefSig::Field(ty) => {
                write_le::<u8>(out, Self::TAG_FIELD);
                ty.write(out);
            }
            MemberRefSig::Method(sig) => {
                write_le::<u8>(out, Self::TAG_METHOD);
                sig.write(out);
            }
        }
    }
}

/// A field or method living on a referenced (or defined) type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Declaring type (TypeRef or TypeDef token)
    pub parent: Token,
    /// Member name
    pub name: String,
    /// Member signature
    pub signature: MemberRefSig,
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.parent, self.name)
    }
}

pub(crate) fn read_module_ref(data: &[u8], offset: &mut usize) -> Result<ModuleRef> {
    Ok(ModuleRef {
        name: read_string_at(data, offset)?,
    })
}

pub(crate) fn write_module_ref(out: &mut Vec<u8>, row: &ModuleRef) {
    write_string(out, &row.name);
}

pub(crate) fn read_type_ref(data: &[u8], offset: &mut usize) -> Result<TypeRef> {
    Ok(TypeRef {
        module: Token::new(read_le_at::<u32>(data, offset)?),
        namespace: read_string_at(data, offset)?,
        name: read_string_at(data, offset)?,
    })
}

pub(crate) fn write_type_ref(out: &mut Vec<u8>, row: &TypeRef) {
    write_le::<u32>(out, row.module.value());
    write_string(out, &row.namespace);
    write_string(out, &row.name);
}

pub(crate) fn read_member_ref(data: &[u8], offset: &mut usize) -> Result<MemberRef> {
    Ok(MemberRef {
        parent: Token::new(read_le_at::<u32>(data, offset)?),
        name: read_string_at(data, offset)?,
        signature: MemberRefSig::read_at(data, offset)?,
    })
}

pub(crate) fn write_member_ref(out: &mut Vec<u8>, row: &MemberRef) {
    write_le::<u32>(out, row.parent.value());
    write_string(out, &row.name);
    row.signature.write(out);
}
