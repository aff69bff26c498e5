//! Eligibility decisions: which types and methods receive counters.
//!
//! Three independent gates apply. Namespace gating is a prefix match of the include
//! and exclude lists against the qualified type name, with the exclude list taking
//! precedence and an empty include list meaning "everything not excluded". Nested
//! types are matched under their enclosing type's qualified name, so they inherit its
//! position in the namespace tree. Compiler-synthesized types and members are skipped
//! unless explicitly enabled; the heuristic is the one compilers actually observe —
//! angle brackets in the simple name, or the marker attribute. Finally, methods split
//! into body-eligible (counted at entry) and call-target-eligible (counted at every
//! call site) by whether they carry a body at all.

use crate::{
    metadata::{
        method::MethodDef,
        types::{TypeDef, COMPILER_GENERATED_ATTRIBUTE},
    },
    weave::config::WeaveConfig,
};

/// Per-type and per-method eligibility for one weave run.
#[derive(Debug, Clone)]
pub struct Filter {
    includes: Vec<String>,
    excludes: Vec<String>,
    instrument_compiler_generated: bool,
}

impl Filter {
    /// Builds the filter for a configuration.
    #[must_use]
    pub fn from_config(config: &WeaveConfig) -> Self {
        Filter {
            includes: config.includes.clone(),
            excludes: config.excludes.clone(),
            instrument_compiler_generated: config.instrument_compiler_generated,
        }
    }

    /// Whether a type's members may be instrumented at all.
    ///
    /// `qualified_name` is the name to match namespaces against: the fully qualified
    /// name for top-level types, `Enclosing.Fqn/Nested` for nested ones.
    #[must_use]
    pub fn is_type_eligible(&self, ty: &TypeDef, qualified_name: &str) -> bool {
        if !self.instrument_compiler_generated && is_compiler_generated_type(ty) {
            return false;
        }
        self.namespace_allowed(qualified_name)
    }

    /// Whether a method is counted at its entry. Property accessors get no special
    /// case.
    #[must_use]
    pub fn is_body_eligible(&self, method: &MethodDef) -> bool {
        if !method.has_body() || method.is_abstract() {
            return false;
        }
        self.instrument_compiler_generated || !is_compiler_generated_method(method)
    }

    /// Whether a method is counted at its call sites instead: abstract methods and
    /// everything bodyless, which covers interface members and extern imports.
    #[must_use]
    pub fn is_call_target_eligible(&self, method: &MethodDef) -> bool {
        if !method.is_abstract() && method.has_body() {
            return false;
        }
        self.instrument_compiler_generated || !is_compiler_generated_method(method)
    }

    fn namespace_allowed(&self, qualified_name: &str) -> bool {
        if self
            .excludes
            .iter()
            .any(|prefix| qualified_name.starts_with(prefix.as_str()))
        {
            return false;
        }
        self.includes.is_empty()
            || self
                .includes
                .iter()
                .any(|prefix| qualified_name.starts_with(prefix.as_str()))
    }
}

fn is_compiler_generated_type(ty: &TypeDef) -> bool {
    ty.name.contains('<') || ty.name.contains('>') || ty.has_attribute(COMPILER_GENERATED_ATTRIBUTE)
}

fn is_compiler_generated_method(method: &MethodDef) -> bool {
    method.name.contains('<')
        || method.name.contains('>')
        || method.has_attribute(COMPILER_GENERATED_ATTRIBUTE)
}
