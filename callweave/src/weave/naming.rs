//! The counter naming contract shared by the weaver and the runtime collector.
//!
//! Helper types and counter fields are found again at runtime purely by name, so the
//! naming scheme is the wire format of this tool: a helper type is
//! `<sanitized-type-name><HELPER_SUFFIX>` in the target type's namespace, a counter
//! field is `<prefix><sanitized-method-name>`. This module owns both directions —
//! building the names during the weave and parsing them back apart for reports.

use crate::metadata::types::GENERIC_ARITY_DELIMITER;

/// Default counter-field prefix; overridable per run.
pub const DEFAULT_FIELD_PREFIX: &str = "_invokeCount_";

/// Suffix appended to the sanitized target-type name to form its helper type name.
pub const HELPER_SUFFIX: &str = "_InvokeCounters";

/// Characters in member names that cannot appear in field names and are collapsed
/// to `_`.
const MEMBER_SANITIZED: &[char] = &['<', '>', '.', '|'];

/// Replaces the generic-arity delimiter in a type name, so ``Box`1`` becomes
/// `Box_1`. The arity stays part of the name: `Foo` and ``Foo`1`` never share a
/// helper.
#[must_use]
pub fn sanitize_type_name(name: &str) -> String {
    name.replace(GENERIC_ARITY_DELIMITER, "_")
}

/// Collapses the characters compilers embed into synthesized member names.
///
/// Note the generic-arity delimiter is *not* collapsed here: two members whose names
/// differ only in sanitized characters end up with the same counter field, and their
/// counts merge silently.
#[must_use]
pub fn sanitize_member_name(name: &str) -> String {
    name.replace(MEMBER_SANITIZED, "_")
}

/// The helper type name of a target type.
#[must_use]
pub fn helper_type_name(type_name: &str) -> String {
    format!("{}{}", sanitize_type_name(type_name), HELPER_SUFFIX)
}

/// The counter field name of a method under the given prefix.
#[must_use]
pub fn counter_field_name(prefix: &str, method_name: &str) -> String {
    format!("{}{}", prefix, sanitize_member_name(method_name))
}

/// True when a field name marks prior instrumentation under the given prefix.
#[must_use]
pub fn is_counter_field(field_name: &str, prefix: &str) -> bool {
    field_name.starts_with(prefix)
}

/// True when a type name is a helper type name.
#[must_use]
pub fn is_helper_type(type_name: &str) -> bool {
    type_name.ends_with(HELPER_SUFFIX)
}

/// Recovers the sanitized method name from a counter field name.
#[must_use]
pub fn method_from_field<'a>(field_name: &'a str, prefix: &str) -> Option<&'a str> {
    field_name.strip_prefix(prefix)
}

/// Recovers the target type's display name and generic arity from a helper type
/// name: `Box_1_InvokeCounters` yields `("Box", 1)`, `Foo_InvokeCounters` yields
/// `("Foo", 0)`.
#[must_use]
pub fn target_from_helper(helper_name: &str) -> Option<(String, u16)> {
    let base = helper_name.strip_suffix(HELPER_SUFFIX)?;

    if let Some((head, tail)) = base.rsplit_once('_') {
        if !head.is_empty() && !tail.is_empty() {
            if let Ok(arity) = tail.parse::<u16>() {
                return Some((head.to_string(), arity));
            }
        }
    }

    Some((base.to_string(), 0))
}
