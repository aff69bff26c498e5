//! Caller-side instrumentation for bodyless methods.
//!
//! Abstract declarations, interface slots, and extern imports have no body to splice
//! into, so their invocations are counted at every call site instead. Two passes:
//! discovery pre-allocates a counter per bodyless eligible method and registers it
//! under a canonical callee signature; the site scan then walks every decoded body
//! and records each `call`/`callvirt` whose callee matches. Splicing happens last,
//! inserting the counter prelude immediately before each recorded call instruction.
//!
//! Call sites are identified by the call instruction's as-loaded byte offset, which
//! stays stable however many splices land in the same body before it.

use rustc_hash::FxHashMap;

use crate::{
    metadata::{
        module::Module,
        refs::MemberRefSig,
        signatures::{MethodSig, TypeSig},
        token::{TableId, Token},
    },
    weave::{counter_prelude, filter::Filter, WeaveSession},
    Result,
};

/// The counter pre-allocated for one bodyless method, with everything needed to
/// address its field from another module.
#[derive(Debug, Clone)]
pub struct CalleeCounter {
    /// Counter field token in the declaring module
    pub field: Token,
    /// Helper type token in the declaring module
    pub helper: Token,
    /// Name of the module declaring the counter
    pub module_name: String,
    /// Helper type namespace, for reference import
    pub helper_namespace: String,
    /// Helper type simple name, for reference import
    pub helper_name: String,
    /// Counter field name, for reference import
    pub field_name: String,
}

/// One discovered call site awaiting its prelude.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Method containing the call instruction
    pub caller: Token,
    /// As-loaded byte offset of the call instruction within the caller's body
    pub offset: u64,
    /// The callee reference as it appears in the instruction operand
    pub callee: Token,
    /// Canonical callee signature, key into the discovery entries
    pub key: String,
}

/// Session state of the caller-side subsystem: discovery entries keyed by canonical
/// callee signature, plus the call sites found for them.
#[derive(Debug, Default)]
pub struct InstrumentationContext {
    /// Canonical callee signature → pre-allocated counter
    pub entries: FxHashMap<String, CalleeCounter>,
    /// Call sites in discovery order
    pub sites: Vec<CallSite>,
    /// Canonical callee signature → indices into `sites`
    pub sites_by_callee: FxHashMap<String, Vec<usize>>,
}

impl InstrumentationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        InstrumentationContext::default()
    }
}

/// The canonical callee signature: declaring type, simple name, and parameter
/// signature — enough to match references at call sites regardless of module origin.
#[must_use]
pub fn canonical_signature(type_fqn: &str, method_name: &str, signature: &MethodSig) -> String {
    format!("{type_fqn}::{method_name}({})", signature.params_text())
}

/// Pass A: walks all types and pre-allocates a helper and counter field for every
/// bodyless eligible method, registering each under its canonical signature.
pub(crate) fn discover(
    module: &mut Module,
    filter: &Filter,
    session: &mut WeaveSession,
) -> Result<()> {
    let roots = module.top_level_types().to_vec();
    for token in roots {
        let qualified = module.type_def(token)?.fqn();
        discover_type(module, token, &qualified, filter, session)?;
    }
    Ok(())
}

fn discover_type(
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
        discover_type(module, nested_token, &nested_qualified, filter, session)?;
    }

    let type_fqn = module.type_def(token)?.fqn();
    let methods = module.type_def(token)?.methods.clone();
    for method_token in methods {
        let method = module.method_def(method_token)?;
        if !filter.is_call_target_eligible(method) {
            continue;
        }
        let method_name = method.name.clone();
        let key = canonical_signature(&type_fqn, &method_name, &method.signature);

        if session.context.entries.contains_key(&key) {
            continue;
        }

        let helper = session.counters.get_or_create_helper(module, token)?;
        let field = session
            .counters
            .get_or_create_counter_field(module, helper, &method_name)?;

        let helper_ty = module.type_def(helper)?;
        let entry = CalleeCounter {
            field,
            helper,
            module_name: module.name.clone(),
            helper_namespace: helper_ty.namespace.clone(),
            helper_name: helper_ty.name.clone(),
            field_name: module.field_def(field)?.name.clone(),
        };
        session.context.entries.insert(key, entry);
    }

    Ok(())
}

/// Pass B: walks every method body in the module and records each static or virtual
/// call instruction whose callee matches a discovery entry. Call sites whose callee
/// is outside the processed set are left untouched.
pub(crate) fn scan(module: &Module, session: &mut WeaveSession) -> Result<()> {
    for token in module.top_level_types() {
        scan_type(module, *token, session)?;
    }
    Ok(())
}

fn scan_type(module: &Module, token: Token, session: &mut WeaveSession) -> Result<()> {
    let ty = module.type_def(token)?;
    for nested_token in &ty.nested {
        scan_type(module, *nested_token, session)?;
    }

    for method_token in &ty.methods {
        let method = module.method_def(*method_token)?;
        let Some(body) = method.body.as_ref() else {
            continue;
        };

        for instruction in &body.instructions {
            if !instruction.is_call_site() {
                continue;
            }
            let crate::bytecode::instruction::Operand::Token(callee) = &instruction.operand
            else {
                continue;
            };
            let callee = *callee;
            let Some(key) = resolve_callee(module, callee) else {
                continue;
            };
            if !session.context.entries.contains_key(&key) {
                continue;
            }

            let index = session.context.sites.len();
            session.context.sites.push(CallSite {
                caller: *method_token,
                offset: instruction.offset,
                callee,
                key: key.clone(),
            });
            session
                .context
                .sites_by_callee
                .entry(key)
                .or_default()
                .push(index);
        }
    }

    Ok(())
}

/// The canonical signature behind a call operand, when it names a method this module
/// can see.
fn resolve_callee(module: &Module, callee: Token) -> Option<String> {
    match callee.table_id()? {
        TableId::MethodDef => {
            let method = module.method_def(callee).ok()?;
            let parent = module.type_def(method.parent).ok()?;
            Some(canonical_signature(
                &parent.fqn(),
                &method.name,
                &method.signature,
            ))
        }
        TableId::MemberRef => {
            let member = module.member_ref(callee).ok()?;
            let MemberRefSig::Method(signature) = &member.signature else {
                return None;
            };
            let parent_fqn = module.type_fqn(member.parent).ok()?;
            Some(canonical_signature(&parent_fqn, &member.name, signature))
        }
        _ => None,
    }
}

/// Splices the counter prelude immediately before each recorded call site, in the
/// order the sites were discovered. A failing site logs a warning and the remaining
/// sites proceed.
///
/// Returns the number of sites actually spliced.
pub(crate) fn splice(module: &mut Module, session: &WeaveSession) -> usize {
    let mut spliced = 0_usize;

    for site in &session.context.sites {
        let Some(entry) = session.context.entries.get(&site.key) else {
            continue;
        };

        // A counter declared in another module is addressed through an imported
        // field reference in this module's reference table.
        let field_token = if entry.module_name == module.name {
            entry.field
        } else {
            module.import_field_ref(
                &entry.module_name,
                &entry.helper_namespace,
                &entry.helper_name,
                &entry.field_name,
                TypeSig::U4,
            )
        };

        match splice_before_call(module, site, field_token) {
            Ok(()) => spliced += 1,
            Err(error) => {
                log::warn!(
                    "Failed to splice counter before call to {} in {}: {error}",
                    site.key,
                    site.caller
                );
            }
        }
    }

    spliced
}

fn splice_before_call(module: &mut Module, site: &CallSite, field: Token) -> Result<()> {
    let method = module.method_def_mut(site.caller)?;
    let Some(body) = method.body.as_mut() else {
        return Err(crate::Error::TokenNotFound(site.caller));
    };

    let Some(index) = body
        .instructions
        .iter()
        .position(|i| i.offset == site.offset && i.is_call_site())
    else {
        return Err(crate::Error::InvalidBranchTarget(site.offset));
    };

    // The call hands its offset identity to the start of the prelude: branches and
    // handler boundaries that referenced the call now reference the increment, so a
    // branch that re-enters the call re-counts it.
    let call_offset = body.instructions[index].offset;
    body.instructions[index].offset = crate::bytecode::instruction::PENDING_OFFSET;

    let mut prelude = counter_prelude(field);
    prelude[0].offset = call_offset;
    for (slot, instruction) in prelude.into_iter().enumerate() {
        body.instructions.insert(index + slot, instruction);
    }

    Ok(())
}
