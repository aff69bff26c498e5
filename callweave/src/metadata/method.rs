//! Method definition rows and decoded method bodies.

use bitflags::bitflags;

use crate::{
    bytecode::instruction::Instruction,
    metadata::{signatures::MethodSig, signatures::TypeSig, token::Token},
};

bitflags! {
    /// Attribute flags of a method definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAttributes: u32 {
        /// Accessible only within the declaring type
        const PRIVATE = 0x0000_0001;
        /// Accessible from anywhere
        const PUBLIC = 0x0000_0006;
        /// No `this` parameter
        const STATIC = 0x0000_0010;
        /// Dispatched through the virtual-slot table
        const VIRTUAL = 0x0000_0040;
        /// Declared without an implementation; implementers provide the body
        const ABSTRACT = 0x0000_0400;
        /// Implemented natively outside the module
        const EXTERN = 0x0000_2000;
    }
}

/// One method definition row.
///
/// Methods are never created by the weaver; they are mutated in place to receive
/// counter-increment instructions. A method without a body (abstract, interface slot,
/// extern import) is counted at its call sites instead.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Declaring type (TypeDef token), maintained by the module mutation API
    pub parent: Token,
    /// Simple name
    pub name: String,
    /// Attribute flags
    pub flags: MethodAttributes,
    /// Number of generic parameters declared by this method
    pub generic_arity: u16,
    /// Parameter and return types
    pub signature: MethodSig,
    /// Custom attribute type names attached to this method
    pub attributes: Vec<String>,
    /// Decoded body; `None` for abstract, interface, and extern methods
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Creates a public instance method with the given signature and no body.
    #[must_use]
    pub fn new(name: &str, signature: MethodSig) -> Self {
        MethodDef {
            parent: Token::new(0),
            name: name.to_string(),
            flags: MethodAttributes::PUBLIC,
            generic_arity: 0,
            signature,
            attributes: Vec::new(),
            body: None,
        }
    }

    /// True for abstract method declarations.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MethodAttributes::ABSTRACT)
    }

    /// True for natively implemented imports.
    #[must_use]
    pub fn is_extern(&self) -> bool {
        self.flags.contains(MethodAttributes::EXTERN)
    }

    /// True when a decoded body is present.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// True when the given custom attribute is attached to this method.
    #[must_use]
    pub fn has_attribute(&self, attribute_fqn: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute_fqn)
    }
}

/// A decoded method body.
///
/// Instructions carry their as-loaded byte offsets; instructions spliced in by the
/// weaver carry [`crate::bytecode::instruction::PENDING_OFFSET`] until the body is
/// re-encoded at save time. Branch targets and exception-handler boundaries are
/// expressed in the as-loaded offset space for the whole weave, which keeps them
/// valid identifiers across splices.
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// Maximum operand-stack depth of the method
    pub max_stack: u16,
    /// Local variable types, slot order
    pub locals: Vec<TypeSig>,
    /// Decoded instruction stream
    pub instructions: Vec<Instruction>,
    /// Exception-handler regions, in nesting order
    pub handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Creates an empty body with no locals and no handlers.
    #[must_use]
    pub fn new() -> Self {
        MethodBody {
            max_stack: 8,
            locals: Vec::new(),
            instructions: Vec::new(),
            handlers: Vec::new(),
        }
    }
}

impl Default for MethodBody {
    fn default() -> Self {
        MethodBody::new()
    }
}

/// The kind of one exception-handler region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ExceptionHandlerKind {
    /// Typed catch handler
    Exception = 0x0000,
    /// Filter clause decides whether the handler runs
    Filter = 0x0001,
    /// Runs on every exit from the protected region
    Finally = 0x0002,
    /// Runs only on exceptional exit
    Fault = 0x0004,
}

impl ExceptionHandlerKind {
    /// Maps the serialized discriminant back to a kind.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<ExceptionHandlerKind> {
        match value {
            0x0000 => Some(ExceptionHandlerKind::Exception),
            0x0001 => Some(ExceptionHandlerKind::Filter),
            0x0002 => Some(ExceptionHandlerKind::Finally),
            0x0004 => Some(ExceptionHandlerKind::Fault),
            _ => None,
        }
    }
}

/// One exception-handler region of a method body.
///
/// All offsets and lengths are byte offsets into the encoded code stream. For
/// [`ExceptionHandlerKind::Filter`] regions, `filter_offset` is the start of the
/// filter code; for typed handlers it carries the exception-type token value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Region kind
    pub kind: ExceptionHandlerKind,
    /// Start of the protected region
    pub try_offset: u32,
    /// Length of the protected region
    pub try_length: u32,
    /// Start of the handler code
    pub handler_offset: u32,
    /// Length of the handler code
    pub handler_length: u32,
    /// Filter start, or the exception-type token for typed handlers
    pub filter_offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_classification() {
        let mut method = MethodDef::new("Bar", MethodSig::empty());
        assert!(!method.is_abstract());
        assert!(!method.has_body());

        method.flags |= MethodAttributes::ABSTRACT;
        assert!(method.is_abstract());

        method.flags = MethodAttributes::PUBLIC | MethodAttributes::EXTERN;
        assert!(method.is_extern());
    }

    #[test]
    fn handler_kind_round_trip() {
        for kind in [
            ExceptionHandlerKind::Exception,
            ExceptionHandlerKind::Filter,
            ExceptionHandlerKind::Finally,
            ExceptionHandlerKind::Fault,
        ] {
            assert_eq!(ExceptionHandlerKind::from_u16(kind as u16), Some(kind));
        }
        assert_eq!(ExceptionHandlerKind::from_u16(0x0008), None);
    }
}
