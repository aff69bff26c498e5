//! The mutable in-memory metadata graph of one module.
//!
//! A [`Module`] owns flat row arenas addressed by [`Token`] values. Rows reference
//! each other exclusively through tokens, so mutation never invalidates references:
//! the weaver appends helper types, counter fields, and reference rows while walking
//! snapshots of the token lists. Rows are never removed, which keeps every token
//! handed out during a weave stable until the module is serialized.

use crate::{
    metadata::{
        field::FieldDef,
        method::MethodDef,
        refs::{MemberRef, MemberRefSig, ModuleRef, TypeRef},
        signatures::TypeSig,
        token::{TableId, Token},
        types::TypeDef,
    },
    Error, Result,
};

/// Name of the core library module every module implicitly depends on.
pub const CORLIB_MODULE: &str = "corlib";

/// One loaded module: its name, row arenas, reference tables, and top-level type
/// list.
#[derive(Debug, Clone)]
pub struct Module {
    /// Module name, without extension
    pub name: String,
    pub(crate) types: Vec<TypeDef>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) methods: Vec<MethodDef>,
    pub(crate) module_refs: Vec<ModuleRef>,
    pub(crate) type_refs: Vec<TypeRef>,
    pub(crate) member_refs: Vec<MemberRef>,
    pub(crate) user_strings: Vec<String>,
    pub(crate) top_level: Vec<Token>,
}

fn row_index(token: Token, table: TableId, len: usize) -> Result<usize> {
    if token.table_id() != Some(table) {
        return Err(Error::TokenNotFound(token));
    }
    let row = token.row() as usize;
    if row == 0 || row > len {
        return Err(Error::TokenNotFound(token));
    }
    Ok(row - 1)
}

#[allow(clippy::cast_possible_truncation)]
fn token_for(table: TableId, index: usize) -> Token {
    Token::from_table_row(table, index as u32 + 1)
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Module {
            name: name.to_string(),
            types: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            module_refs: Vec::new(),
            type_refs: Vec::new(),
            member_refs: Vec::new(),
            user_strings: Vec::new(),
            top_level: Vec::new(),
        }
    }

    /// Top-level type tokens in declaration order.
    ///
    /// Callers that append types while walking should iterate a snapshot
    /// (`to_vec()`) of this list.
    #[must_use]
    pub fn top_level_types(&self) -> &[Token] {
        &self.top_level
    }

    /// Resolves a TypeDef token.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] on a table or row mismatch; the same applies
    /// to every other row accessor.
    pub fn type_def(&self, token: Token) -> Result<&TypeDef> {
        Ok(&self.types[row_index(token, TableId::TypeDef, self.types.len())?])
    }

    /// Resolves a TypeDef token mutably.
    pub fn type_def_mut(&mut self, token: Token) -> Result<&mut TypeDef> {
        let index = row_index(token, TableId::TypeDef, self.types.len())?;
        Ok(&mut self.types[index])
    }

    /// Resolves a MethodDef token.
    pub fn method_def(&self, token: Token) -> Result<&MethodDef> {
        Ok(&self.methods[row_index(token, TableId::MethodDef, self.methods.len())?])
    }

    /// Resolves a MethodDef token mutably.
    pub fn method_def_mut(&mut self, token: Token) -> Result<&mut MethodDef> {
        let index = row_index(token, TableId::MethodDef, self.methods.len())?;
        Ok(&mut self.methods[index])
    }

    /// Resolves a Field token.
    pub fn field_def(&self, token: Token) -> Result<&FieldDef> {
        Ok(&self.fields[row_index(token, TableId::Field, self.fields.len())?])
    }

    /// Resolves a Field token mutably.
    pub fn field_def_mut(&mut self, token: Token) -> Result<&mut FieldDef> {
        let index = row_index(token, TableId::Field, self.fields.len())?;
        Ok(&mut self.fields[index])
    }

    /// Resolves a ModuleRef token.
    pub fn module_ref(&self, token: Token) -> Result<&ModuleRef> {
        Ok(&self.module_refs[row_index(token, TableId::ModuleRef, self.module_refs.len())?])
    }

    /// Resolves a TypeRef token.
    pub fn type_ref(&self, token: Token) -> Result<&TypeRef> {
        Ok(&self.type_refs[row_index(token, TableId::TypeRef, self.type_refs.len())?])
    }

    /// Resolves a MemberRef token.
    pub fn member_ref(&self, token: Token) -> Result<&MemberRef> {
        Ok(&self.member_refs[row_index(token, TableId::MemberRef, self.member_refs.len())?])
    }

    /// Resolves a UserString token.
    pub fn user_string(&self, token: Token) -> Result<&str> {
        Ok(&self.user_strings[row_index(token, TableId::UserString, self.user_strings.len())?])
    }

    /// All TypeDef rows with their tokens, arena order.
    pub fn type_defs(&self) -> impl Iterator<Item = (Token, &TypeDef)> {
        self.types
            .iter()
            .enumerate()
            .map(|(index, row)| (token_for(TableId::TypeDef, index), row))
    }

    /// All MethodDef rows with their tokens, arena order.
    pub fn method_defs(&self) -> impl Iterator<Item = (Token, &MethodDef)> {
        self.methods
            .iter()
            .enumerate()
            .map(|(index, row)| (token_for(TableId::MethodDef, index), row))
    }

    /// Appends a type as a new top-level type of the module.
    pub fn add_top_level_type(&mut self, ty: TypeDef) -> Token {
        self.types.push(ty);
        let token = token_for(TableId::TypeDef, self.types.len() - 1);
        self.top_level.push(token);
        token
    }

    /// Appends a type nested inside an existing type.
    ///
    /// # Errors
    /// Fails when the enclosing token does not resolve.
    pub fn add_nested_type(&mut self, enclosing: Token, ty: TypeDef) -> Result<Token> {
        row_index(enclosing, TableId::TypeDef, self.types.len())?;
        self.types.push(ty);
        let token = token_for(TableId::TypeDef, self.types.len() - 1);
        self.type_def_mut(enclosing)?.nested.push(token);
        Ok(token)
    }

    /// Appends a field to an existing type, wiring the back-token.
    ///
    /// # Errors
    /// Fails when the parent token does not resolve.
    pub fn add_field(&mut self, parent: Token, mut field: FieldDef) -> Result<Token> {
        row_index(parent, TableId::TypeDef, self.types.len())?;
        field.parent = parent;
        self.fields.push(field);
        let token = token_for(TableId::Field, self.fields.len() - 1);
        self.type_def_mut(parent)?.fields.push(token);
        Ok(token)
    }

    /// Appends a method to an existing type, wiring the back-token.
    ///
    /// # Errors
    /// Fails when the parent token does not resolve.
    pub fn add_method(&mut self, parent: Token, mut method: MethodDef) -> Result<Token> {
        row_index(parent, TableId::TypeDef, self.types.len())?;
        method.parent = parent;
        self.methods.push(method);
        let token = token_for(TableId::MethodDef, self.methods.len() - 1);
        self.type_def_mut(parent)?.methods.push(token);
        Ok(token)
    }

    /// Returns the token of the named module reference, appending a row if absent.
    pub fn get_or_add_module_ref(&mut self, name: &str) -> Token {
        if let Some(index) = self.module_refs.iter().position(|row| row.name == name) {
            return token_for(TableId::ModuleRef, index);
        }
        self.module_refs.push(ModuleRef {
            name: name.to_string(),
        });
        token_for(TableId::ModuleRef, self.module_refs.len() - 1)
    }

    /// Returns the token of the described type reference, appending a row if absent.
    pub fn get_or_add_type_ref(&mut self, module: Token, namespace: &str, name: &str) -> Token {
        if let Some(index) = self.type_refs.iter().position(|row| {
            row.module == module && row.namespace == namespace && row.name == name
        }) {
            return token_for(TableId::TypeRef, index);
        }
        self.type_refs.push(TypeRef {
            module,
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        token_for(TableId::TypeRef, self.type_refs.len() - 1)
    }

    /// Returns the token of the described member reference, appending a row if
    /// absent.
    pub fn get_or_add_member_ref(&mut self, member: MemberRef) -> Token {
        if let Some(index) = self.member_refs.iter().position(|row| *row == member) {
            return token_for(TableId::MemberRef, index);
        }
        self.member_refs.push(member);
        token_for(TableId::MemberRef, self.member_refs.len() - 1)
    }

    /// Returns the token of the given string literal, appending a row if absent.
    pub fn get_or_add_user_string(&mut self, text: &str) -> Token {
        if let Some(index) = self.user_strings.iter().position(|row| row == text) {
            return token_for(TableId::UserString, index);
        }
        self.user_strings.push(text.to_string());
        token_for(TableId::UserString, self.user_strings.len() - 1)
    }

    /// The TypeRef of the root object type (`System.Object` in [`CORLIB_MODULE`]),
    /// created on first use.
    pub fn object_type_ref(&mut self) -> Token {
        let corlib = self.get_or_add_module_ref(CORLIB_MODULE);
        self.get_or_add_type_ref(corlib, "System", "Object")
    }

    /// Imports a static field declared on a type in another module, yielding a
    /// MemberRef token usable as an instruction operand in this module.
    pub fn import_field_ref(
        &mut self,
        module_name: &str,
        type_namespace: &str,
        type_name: &str,
        field_name: &str,
        field_type: TypeSig,
    ) -> Token {
        let module = self.get_or_add_module_ref(module_name);
        let parent = self.get_or_add_type_ref(module, type_namespace, type_name);
        self.get_or_add_member_ref(MemberRef {
            parent,
            name: field_name.to_string(),
            signature: MemberRefSig::Field(field_type),
        })
    }

    /// Finds a top-level type by namespace and simple name.
    #[must_use]
    pub fn find_top_level_type(&self, namespace: &str, name: &str) -> Option<Token> {
        self.top_level.iter().copied().find(|token| {
            self.type_def(*token)
                .map(|ty| ty.namespace == namespace && ty.name == name)
                .unwrap_or(false)
        })
    }

    /// The fully qualified name behind a TypeDef or TypeRef token.
    ///
    /// # Errors
    /// Fails when the token resolves to neither table.
    pub fn type_fqn(&self, token: Token) -> Result<String> {
        match token.table_id() {
            Some(TableId::TypeDef) => Ok(self.type_def(token)?.fqn()),
            Some(TableId::TypeRef) => Ok(self.type_ref(token)?.fqn()),
            _ => Err(Error::TokenNotFound(token)),
        }
    }
}
