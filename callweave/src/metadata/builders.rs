//! Fluent builders for synthesized metadata rows.
//!
//! The weaver only ever synthesizes two kinds of rows: helper types and their static
//! counter fields. These builders wrap the raw [`crate::metadata::module::Module`]
//! mutation API with the flag bookkeeping those rows need.
//!
//! # Examples
//!
//! ```rust
//! use callweave::metadata::{builders::TypeDefBuilder, module::Module};
//!
//! let mut module = Module::new("demo");
//! let object = module.object_type_ref();
//! let helper = TypeDefBuilder::new("Foo_InvokeCounters")
//!     .namespace("Demo")
//!     .public()
//!     .sealed()
//!     .non_instantiable()
//!     .extends(object)
//!     .build(&mut module);
//! assert_eq!(module.type_def(helper).unwrap().fqn(), "Demo.Foo_InvokeCounters");
//! ```

use crate::{
    metadata::{
        field::{FieldAttributes, FieldDef},
        module::Module,
        signatures::TypeSig,
        token::Token,
        types::{TypeAttributes, TypeDef},
    },
    Result,
};

/// Builder for a new top-level type definition.
pub struct TypeDefBuilder {
    namespace: String,
    name: String,
    flags: TypeAttributes,
    extends: Token,
}

impl TypeDefBuilder {
    /// Create a new type builder with the given simple name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        TypeDefBuilder {
            namespace: String::new(),
            name: name.to_string(),
            flags: TypeAttributes::empty(),
            extends: Token::new(0),
        }
    }

    /// Set the namespace for this type.
    #[must_use]
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Make this type public.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.flags |= TypeAttributes::PUBLIC;
        self
    }

    /// Forbid deriving from this type.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.flags |= TypeAttributes::SEALED;
        self
    }

    /// Forbid instantiating this type (sealed static-holder pattern).
    #[must_use]
    pub fn non_instantiable(mut self) -> Self {
        self.flags |= TypeAttributes::ABSTRACT;
        self
    }

    /// Set the base type (TypeDef or TypeRef token).
    #[must_use]
    pub fn extends(mut self, base: Token) -> Self {
        self.extends = base;
        self
    }

    /// Append the type as a new top-level type of the module.
    pub fn build(self, module: &mut Module) -> Token {
        let mut ty = TypeDef::new(&self.namespace, &self.name);
        ty.flags = self.flags;
        ty.extends = self.extends;
        module.add_top_level_type(ty)
    }
}

/// Builder for a new field definition.
pub struct FieldBuilder {
    name: String,
    flags: FieldAttributes,
    ty: TypeSig,
}

impl FieldBuilder {
    /// Create a new field builder with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        FieldBuilder {
            name: name.to_string(),
            flags: FieldAttributes::empty(),
            ty: TypeSig::Object,
        }
    }

    /// Make this field public.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.flags |= FieldAttributes::PUBLIC;
        self
    }

    /// Give this field one slot per type rather than per instance.
    #[must_use]
    pub fn static_(mut self) -> Self {
        self.flags |= FieldAttributes::STATIC;
        self
    }

    /// Set the field type.
    #[must_use]
    pub fn ty(mut self, ty: TypeSig) -> Self {
        self.ty = ty;
        self
    }

    /// Append the field to the given type.
    ///
    /// # Errors
    /// Fails when the parent token does not resolve.
    pub fn build(self, module: &mut Module, parent: Token) -> Result<Token> {
        module.add_field(
            parent,
            FieldDef {
                parent: Token::new(0),
                name: self.name,
                flags: self.flags,
                ty: self.ty,
            },
        )
    }
}
