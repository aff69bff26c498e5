//! Entry instrumentation for methods that carry a body.
//!
//! The walk is depth-first over the declaration tree, handling each type's nested
//! types before the type's own methods. It iterates snapshots of the token lists, so
//! helper types appended to the module mid-walk never invalidate (or join) the
//! iteration.

use crate::{
    metadata::{module::Module, token::Token},
    weave::{counter_prelude, filter::Filter, CounterSite, WeaveSession},
    Result,
};

/// Splices the counter prelude into every body-eligible method of the module.
///
/// Per-method failures are logged and counted, never propagated: one stubborn method
/// must not stop the weave.
pub(crate) fn instrument_module(
    module: &mut Module,
    filter: &Filter,
    session: &mut WeaveSession,
) -> Result<()> {
    let roots = module.top_level_types().to_vec();
    for token in roots {
        let qualified = module.type_def(token)?.fqn();
        instrument_type(module, token, &qualified, filter, session)?;
    }
    Ok(())
}

fn instrument_type(
    module: &mut Module,
    token: Token,
    qualified_name: &str,
    filter: &Filter,
    session: &mut WeaveSession,
) -> Result<()> {
    if !filter.is_type_eligible(module.type_def(token)?, qualified_name) {
        return Ok(());
    }

    let nested = module.type_def(token)?.nested.clone();
    for nested_token in nested {
        let nested_name = module.type_def(nested_token)?.name.clone();
        let nested_qualified = format!("{qualified_name}/{nested_name}");
        instrument_type(module, nested_token, &nested_qualified, filter, session)?;
    }

    let methods = module.type_def(token)?.methods.clone();
    for method_token in methods {
        let method = module.method_def(method_token)?;
        if !filter.is_body_eligible(method) {
            continue;
        }
        let method_name = method.name.clone();

        let helper = session.counters.get_or_create_helper(module, token)?;
        let field = session
            .counters
            .get_or_create_counter_field(module, helper, &method_name)?;

        match instrument_entry(module, method_token, field) {
            Ok(true) => session.counter_sites.push(CounterSite {
                helper,
                field,
                method: method_token,
            }),
            Ok(false) => {
                log::warn!("Skipping {qualified_name}::{method_name}: body has no instructions");
                session.skipped += 1;
            }
            Err(error) => {
                log::warn!("Failed to instrument {qualified_name}::{method_name}: {error}");
                session.skipped += 1;
            }
        }
    }

    Ok(())
}

/// Splices the four-instruction counter prelude in front of the first instruction.
///
/// Returns `false` for the degenerate zero-instruction body, which is skipped. The
/// existing instructions are left untouched: compiler-synthesized preludes stay in
/// place behind the increment, and constructors are treated like any other method.
///
/// # Errors
/// Fails when the method token does not resolve.
pub(crate) fn instrument_entry(module: &mut Module, method: Token, field: Token) -> Result<bool> {
    let def = module.method_def_mut(method)?;
    let Some(body) = def.body.as_mut() else {
        return Ok(false);
    };
    if body.instructions.is_empty() {
        return Ok(false);
    }

    for (index, instruction) in counter_prelude(field).into_iter().enumerate() {
        body.instructions.insert(index, instruction);
    }

    Ok(true)
}
