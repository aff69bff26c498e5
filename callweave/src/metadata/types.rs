//! Type definition rows.

use bitflags::bitflags;

use crate::metadata::token::Token;

/// Fully qualified name of the attribute the host compiler stamps onto
/// synthesized types and members.
pub const COMPILER_GENERATED_ATTRIBUTE: &str =
    "System.Runtime.CompilerServices.CompilerGeneratedAttribute";

/// The character separating a generic type's simple name from its arity,
/// e.g. ``Box`1``.
pub const GENERIC_ARITY_DELIMITER: char = '`';

bitflags! {
    /// Attribute flags of a type definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeAttributes: u32 {
        /// Visible outside the module
        const PUBLIC = 0x0000_0001;
        /// Interface declaration (no instance state)
        const INTERFACE = 0x0000_0020;
        /// Cannot be instantiated directly
        const ABSTRACT = 0x0000_0080;
        /// Cannot be derived from
        const SEALED = 0x0000_0100;
        /// Value type semantics (copied, not referenced)
        const VALUE_TYPE = 0x0000_0200;
    }
}

/// One type definition row: a class, interface, or value type of the module.
///
/// Child members are token lists into the field/method/type arenas; the row itself
/// never owns other rows. A type nested inside another appears in the enclosing row's
/// `nested` list and *not* in the module's top-level list.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Namespace, empty for nested and global types
    pub namespace: String,
    /// Simple name, including the generic-arity suffix (e.g. ``Box`1``)
    pub name: String,
    /// Attribute flags
    pub flags: TypeAttributes,
    /// Number of generic parameters declared by this type
    pub generic_arity: u16,
    /// Base type (TypeDef or TypeRef token); null for interfaces and the root type
    pub extends: Token,
    /// Field tokens, declaration order
    pub fields: Vec<Token>,
    /// Method tokens, declaration order
    pub methods: Vec<Token>,
    /// Nested TypeDef tokens, declaration order
    pub nested: Vec<Token>,
    /// Custom attribute type names attached to this type
    pub attributes: Vec<String>,
}

impl TypeDef {
    /// Creates a plain public class row with no members.
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeDef {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeAttributes::PUBLIC,
            generic_arity: 0,
            extends: Token::new(0),
            fields: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
            attributes: Vec::new(),
        }
    }

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

    /// True when the given custom attribute is attached to this type.
    #[must_use]
    pub fn has_attribute(&self, attribute_fqn: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute_fqn)
    }

    /// True for interface declarations.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }
}
