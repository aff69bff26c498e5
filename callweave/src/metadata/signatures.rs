//! Tagged type and member signatures.
//!
//! Signatures are explicit tagged variants rather than a type hierarchy: a
//! [`TypeSig`] is either a primitive, a named class, or a generic-parameter
//! placeholder. Their [`std::fmt::Display`] form is the canonical text used when
//! matching call-site callees against discovered methods, so two references to the
//! same method always render identically regardless of which module they live in.

use std::fmt;

use crate::{
    file::io::{read_le_at, read_string_at, write_le, write_string},
    Result,
};

/// A type as it appears in field types, parameters, and return positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// No value (return position only)
    Void,
    /// Boolean
    Boolean,
    /// UTF-16 code unit
    Char,
    /// Signed 8-bit integer
    I1,
    /// Unsigned 8-bit integer
    U1,
    /// Signed 16-bit integer
    I2,
    /// Unsigned 16-bit integer
    U2,
    /// Signed 32-bit integer
    I4,
    /// Unsigned 32-bit integer
    U4,
    /// Signed 64-bit integer
    I8,
    /// Unsigned 64-bit integer
    U8,
    /// 32-bit floating point
    R4,
    /// 64-bit floating point
    R8,
    /// String reference
    String,
    /// Root object reference
    Object,
    /// A named class or interface, by fully qualified name
    Class(String),
    /// A generic parameter of the declaring type, by position
    GenericParam(u16),
}

impl TypeSig {
    const TAG_VOID: u8 = 0x00;
    const TAG_BOOLEAN: u8 = 0x01;
    const TAG_CHAR: u8 = 0x02;
    const TAG_I1: u8 = 0x03;
    const TAG_U1: u8 = 0x04;
    const TAG_I2: u8 = 0x05;
    const TAG_U2: u8 = 0x06;
    const TAG_I4: u8 = 0x07;
    const TAG_U4: u8 = 0x08;
    const TAG_I8: u8 = 0x09;
    const TAG_U8: u8 = 0x0A;
    const TAG_R4: u8 = 0x0B;
    const TAG_R8: u8 = 0x0C;
    const TAG_STRING: u8 = 0x0D;
    const TAG_OBJECT: u8 = 0x0E;
    const TAG_CLASS: u8 = 0x0F;
    const TAG_GENERIC_PARAM: u8 = 0x10;

    /// Parse one signature from an offset, advancing the offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on an unknown tag byte.
    pub fn read_at(data: &[u8], offset: &mut usize) -> Result<TypeSig> {
        let tag = read_le_at::<u8>(data, offset)?;
        match tag {
            Self::TAG_VOID => Ok(TypeSig::Void),
            Self::TAG_BOOLEAN => Ok(TypeSig::Boolean),
            Self::TAG_CHAR => Ok(TypeSig::Char),
            Self::TAG_I1 => Ok(TypeSig::I1),
            Self::TAG_U1 => Ok(TypeSig::U1),
            Self::TAG_I2 => Ok(TypeSig::I2),
            Self::TAG_U2 => Ok(TypeSig::U2),
            Self::TAG_I4 => Ok(TypeSig::I4),
            Self::TAG_U4 => Ok(TypeSig::U4),
            Self::TAG_I8 => Ok(TypeSig::I8),
            Self::TAG_U8 => Ok(TypeSig::U8),
            Self::TAG_R4 => Ok(TypeSig::R4),
            Self::TAG_R8 => Ok(TypeSig::R8),
            Self::TAG_STRING => Ok(TypeSig::String),
            Self::TAG_OBJECT => Ok(TypeSig::Object),
            Self::TAG_CLASS => Ok(TypeSig::Class(read_string_at(data, offset)?)),
            Self::TAG_GENERIC_PARAM => Ok(TypeSig::GenericParam(read_le_at::<u16>(data, offset)?)),
            _ => Err(malformed_error!("Unknown type signature tag {:#04x}", tag)),
        }
    }

    /// Append the binary form of this signature to an output buffer.
    pub fn write(&self, out: &mut Vec<u8>) {
        match self {
            TypeSig::Void => write_le::<u8>(out, Self::TAG_VOID),
            TypeSig::Boolean => write_le::<u8>(out, Self::TAG_BOOLEAN),
            TypeSig::Char => write_le::<u8>(out, Self::TAG_CHAR),
            TypeSig::I1 => write_le::<u8>(out, Self::TAG_I1),
            TypeSig::U1 => write_le::<u8>(out, Self::TAG_U1),
            TypeSig::I2 => write_le::<u8>(out, Self::TAG_I2),
            TypeSig::U2 => write_le::<u8>(out, Self::TAG_U2),
            TypeSig::I4 => write_le::<u8>(out, Self::TAG_I4),
            TypeSig::U4 => write_le::<u8>(out, Self::TAG_U4),
            TypeSig::I8 => write_le::<u8>(out, Self::TAG_I8),
            TypeSig::U8 => write_le::<u8>(out, Self::TAG_U8),
            TypeSig::R4 => write_le::<u8>(out, Self::TAG_R4),
            TypeSig::R8 => write_le::<u8>(out, Self::TAG_R8),
            TypeSig::String => write_le::<u8>(out, Self::TAG_STRING),
            TypeSig::Object => write_le::<u8>(out, Self::TAG_OBJECT),
            TypeSig::Class(name) => {
                write_le::<u8>(out, Self::TAG_CLASS);
                write_string(out, name);
            }
            TypeSig::GenericParam(index) => {
                write_le::<u8>(out, Self::TAG_GENERIC_PARAM);
                write_le::<u16>(out, *index);
            }
        }
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Void => write!(f, "void"),
            TypeSig::Boolean => write!(f, "bool"),
            TypeSig::Char => write!(f, "char"),
            TypeSig::I1 => write!(f, "i1"),
            TypeSig::U1 => write!(f, "u1"),
            TypeSig::I2 => write!(f, "i2"),
            TypeSig::U2 => write!(f, "u2"),
            TypeSig::I4 => write!(f, "i4"),
            TypeSig::U4 => write!(f, "u4"),
            TypeSig::I8 => write!(f, "i8"),
            TypeSig::U8 => write!(f, "u8"),
            TypeSig::R4 => write!(f, "r4"),
            TypeSig::R8 => write!(f, "r8"),
            TypeSig::String => write!(f, "string"),
            TypeSig::Object => write!(f, "object"),
            TypeSig::Class(name) => write!(f, "class({name})"),
            TypeSig::GenericParam(index) => write!(f, "!{index}"),
        }
    }
}

/// The signature of a method: return type plus parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// Return type
    pub ret: TypeSig,
    /// Parameter types, in order
    pub params: Vec<TypeSig>,
}

impl MethodSig {
    /// A `() -> void` signature.
    #[must_use]
    pub fn empty() -> Self {
        MethodSig {
            ret: TypeSig::Void,
            params: Vec::new(),
        }
    }

    /// Canonical text of the parameter list alone, e.g. `i4,string`.
    ///
    /// This is the parameter-signature component of the canonical callee signature
    /// used for call-site matching.
    #[must_use]
    pub fn params_text(&self) -> String {
        let rendered: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        rendered.join(",")
    }

    /// Parse one method signature from an offset, advancing the offset.
    ///
    /// # Errors
    /// Propagates [`TypeSig::read_at`] failures.
    pub fn read_at(data: &[u8], offset: &mut usize) -> Result<MethodSig> {
        let ret = TypeSig::read_at(data, offset)?;
        let count = read_le_at::<u32>(data, offset)? as usize;
        let mut params = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            params.push(TypeSig::read_at(data, offset)?);
        }
        Ok(MethodSig { ret, params })
    }

    /// Append the binary form of this signature to an output buffer.
    pub fn write(&self, out: &mut Vec<u8>) {
        self.ret.write(out);
        #[allow(clippy::cast_possible_truncation)]
        write_le::<u32>(out, self.params.len() as u32);
        for param in &self.params {
            param.write(out);
        }
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.params_text(), self.ret)
    }
}
