//! The counter store: helper types and their static counter fields.
//!
//! Counters deliberately live on a separate non-generic helper type rather than on
//! the target type itself: statics of a generic type exist once per closed
//! instantiation, which would fragment counts across instantiations the weaver cannot
//! even enumerate. One non-generic holder gives one counter per method definition
//! across all instantiations.

use rustc_hash::FxHashMap;

use crate::{
    metadata::{
        builders::{FieldBuilder, TypeDefBuilder},
        module::Module,
        signatures::TypeSig,
        token::Token,
    },
    weave::naming,
    Result,
};

/// Allocates helper types and counter fields, deduplicating across one weave run.
///
/// The helper index maps fully qualified helper names to their tokens so repeated
/// lookups return the same helper; uniqueness of `(helper, method name)` pairs falls
/// out of the field lookup by exact name.
#[derive(Debug)]
pub struct CounterStore {
    field_prefix: String,
    helpers: FxHashMap<String, Token>,
}

impl CounterStore {
    /// Creates an empty store using the given counter-field prefix.
    #[must_use]
    pub fn new(field_prefix: &str) -> Self {
        CounterStore {
            field_prefix: field_prefix.to_string(),
            helpers: FxHashMap::default(),
        }
    }

    /// Number of distinct helper types handed out so far.
    #[must_use]
    pub fn helper_count(&self) -> usize {
        self.helpers.len()
    }

    /// Returns the helper type of a target type, creating it on first use.
    ///
    /// Lookup order: the run's helper index, then the module's existing top-level
    /// types (so re-runs against partially woven modules reuse rather than
    /// duplicate), and only then a fresh public sealed-abstract class in the target
    /// type's namespace, appended as a *top-level* type regardless of nesting.
    ///
    /// # Errors
    /// Fails when the target token does not resolve.
    pub fn get_or_create_helper(&mut self, module: &mut Module, target: Token) -> Result<Token> {
        let target_ty = module.type_def(target)?;
        let helper_name = naming::helper_type_name(&target_ty.name);
        let namespace = target_ty.namespace.clone();
        let helper_fqn = if namespace.is_empty() {
            helper_name.clone()
        } else {
            format!("{namespace}.{helper_name}")
        };

        if let Some(existing) = self.helpers.get(&helper_fqn) {
            return Ok(*existing);
        }

        if let Some(existing) = module.find_top_level_type(&namespace, &helper_name) {
            self.helpers.insert(helper_fqn, existing);
            return Ok(existing);
        }

        let object = module.object_type_ref();
        let helper = TypeDefBuilder::new(&helper_name)
            .namespace(&namespace)
            .public()
            .sealed()
            .non_instantiable()
            .extends(object)
            .build(module);

        log::debug!("Created helper type {helper_fqn}");
        self.helpers.insert(helper_fqn, helper);
        Ok(helper)
    }

    /// Returns the counter field of a method on its helper, creating it on first
    /// use.
    ///
    /// When the sanitized name already exists on the helper the existing field is
    /// returned — members whose names differ only in sanitized characters therefore
    /// share a counter and their counts merge.
    ///
    /// # Errors
    /// Fails when the helper token does not resolve.
    pub fn get_or_create_counter_field(
        &mut self,
        module: &mut Module,
        helper: Token,
        method_name: &str,
    ) -> Result<Token> {
        let field_name = naming::counter_field_name(&self.field_prefix, method_name);

        let helper_ty = module.type_def(helper)?;
        for field_token in &helper_ty.fields {
            if module.field_def(*field_token)?.name == field_name {
                return Ok(*field_token);
            }
        }

        FieldBuilder::new(&field_name)
            .public()
            .static_()
            .ty(TypeSig::U4)
            .build(module, helper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::types::{TypeAttributes, TypeDef},
        weave::naming::DEFAULT_FIELD_PREFIX,
    };

    fn store() -> CounterStore {
        CounterStore::new(DEFAULT_FIELD_PREFIX)
    }

    #[test]
    fn helper_is_created_once() {
        let mut module = Module::new("demo");
        let target = module.add_top_level_type(TypeDef::new("Demo", "Foo"));

        let mut counters = store();
        let first = counters.get_or_create_helper(&mut module, target).unwrap();
        let second = counters.get_or_create_helper(&mut module, target).unwrap();
        assert_eq!(first, second);
        assert_eq!(counters.helper_count(), 1);

        let helper = module.type_def(first).unwrap();
        assert_eq!(helper.fqn(), "Demo.Foo_InvokeCounters");
        assert!(helper.flags.contains(TypeAttributes::PUBLIC));
        assert!(helper.flags.contains(TypeAttributes::SEALED));
        assert!(helper.flags.contains(TypeAttributes::ABSTRACT));
        assert_eq!(helper.generic_arity, 0);
    }

    #[test]
    fn generic_arity_keeps_helpers_apart() {
        let mut module = Module::new("demo");
        let plain = module.add_top_level_type(TypeDef::new("Demo", "Box"));
        let mut generic_ty = TypeDef::new("Demo", "Box`1");
        generic_ty.generic_arity = 1;
        let generic = module.add_top_level_type(generic_ty);

        let mut counters = store();
        let plain_helper = counters.get_or_create_helper(&mut module, plain).unwrap();
        let generic_helper = counters.get_or_create_helper(&mut module, generic).unwrap();

        assert_ne!(plain_helper, generic_helper);
        assert_eq!(
            module.type_def(generic_helper).unwrap().name,
            "Box_1_InvokeCounters"
        );
    }

    #[test]
    fn existing_module_helper_is_reused() {
        let mut module = Module::new("demo");
        let target = module.add_top_level_type(TypeDef::new("Demo", "Foo"));
        let preexisting =
            module.add_top_level_type(TypeDef::new("Demo", "Foo_InvokeCounters"));

        let mut counters = store();
        let helper = counters.get_or_create_helper(&mut module, target).unwrap();
        assert_eq!(helper, preexisting);
    }

    #[test]
    fn counter_field_is_created_once() {
        let mut module = Module::new("demo");
        let target = module.add_top_level_type(TypeDef::new("Demo", "Foo"));

        let mut counters = store();
        let helper = counters.get_or_create_helper(&mut module, target).unwrap();
        let first = counters
            .get_or_create_counter_field(&mut module, helper, "Bar")
            .unwrap();
        let second = counters
            .get_or_create_counter_field(&mut module, helper, "Bar")
            .unwrap();
        assert_eq!(first, second);

        let field = module.field_def(first).unwrap();
        assert_eq!(field.name, "_invokeCount_Bar");
        assert_eq!(field.ty, TypeSig::U4);
        assert!(field.is_static());
    }

    #[test]
    fn sanitization_collisions_merge() {
        let mut module = Module::new("demo");
        let target = module.add_top_level_type(TypeDef::new("Demo", "Foo"));

        let mut counters = store();
        let helper = counters.get_or_create_helper(&mut module, target).unwrap();
        let first = counters
            .get_or_create_counter_field(&mut module, helper, "a.b")
            .unwrap();
        let second = counters
            .get_or_create_counter_field(&mut module, helper, "a|b")
            .unwrap();

        // Both sanitize to `a_b`; the counts merge silently.
        assert_eq!(first, second);
        assert_eq!(module.type_def(helper).unwrap().fields.len(), 1);
    }
}
