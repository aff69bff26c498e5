//! Serialization of the metadata graph back into `.sbm` module files.
//!
//! Writing is the single point where decoded method bodies are lowered back to code
//! bytes. Every body is re-encoded (normalizing short/long forms and rewriting branch
//! displacements); the per-method old→new offset maps this produces are returned so
//! the symbol file can be remapped alongside.

use rustc_hash::FxHashMap;

use crate::{
    bytecode::encoder::encode_body,
    file::io::{write_le, write_string},
    metadata::{
        field::FieldDef,
        method::MethodDef,
        module::Module,
        reader::{MODULE_MAGIC, MODULE_VERSION},
        refs,
        token::{TableId, Token},
        types::TypeDef,
    },
    Result,
};

/// Per-method maps from as-loaded code offsets to their offsets in the written
/// module, keyed by MethodDef token.
pub type BodyOffsetMaps = FxHashMap<Token, FxHashMap<u32, u32>>;

/// Serializes a module, re-encoding every method body.
///
/// The graph is mutated in the process: instruction offsets, branch targets, and
/// exception-handler boundaries move into the newly laid-out offset space.
///
/// # Errors
/// Propagates body-encoding failures (e.g. [`crate::Error::InvalidBranchTarget`]).
pub fn write_module(module: &mut Module) -> Result<(Vec<u8>, BodyOffsetMaps)> {
    let mut offset_maps = BodyOffsetMaps::default();
    let mut encoded_bodies: Vec<Option<Vec<u8>>> = Vec::with_capacity(module.methods.len());

    for (index, method) in module.methods.iter_mut().enumerate() {
        match method.body.as_mut() {
            Some(body) => {
                let encoded = encode_body(body)?;
                #[allow(clippy::cast_possible_truncation)]
                let token = Token::from_table_row(TableId::MethodDef, index as u32 + 1);
                offset_maps.insert(token, encoded.offset_map);
                encoded_bodies.push(Some(encoded.code));
            }
            None => encoded_bodies.push(None),
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(&MODULE_MAGIC);
    write_le::<u16>(&mut out, MODULE_VERSION);
    write_le::<u16>(&mut out, 0);
    write_string(&mut out, &module.name);

    write_count(&mut out, module.module_refs.len());
    for row in &module.module_refs {
        refs::write_module_ref(&mut out, row);
    }

    write_count(&mut out, module.type_refs.len());
    for row in &module.type_refs {
        refs::write_type_ref(&mut out, row);
    }

    write_count(&mut out, module.member_refs.len());
    for row in &module.member_refs {
        refs::write_member_ref(&mut out, row);
    }

    write_count(&mut out, module.user_strings.len());
    for row in &module.user_strings {
        write_string(&mut out, row);
    }

    write_count(&mut out, module.fields.len());
    for row in &module.fields {
        write_field(&mut out, row);
    }

    write_count(&mut out, module.methods.len());
    for (row, code) in module.methods.iter().zip(&encoded_bodies) {
        write_method(&mut out, row, code.as_deref());
    }

    write_count(&mut out, module.types.len());
    for row in &module.types {
        write_type(&mut out, row);
    }

    write_count(&mut out, module.top_level.len());
    for token in &module.top_level {
        write_le::<u32>(&mut out, token.value());
    }

    Ok((out, offset_maps))
}

#[allow(clippy::cast_possible_truncation)]
fn write_count(out: &mut Vec<u8>, count: usize) {
    write_le::<u32>(out, count as u32);
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[String]) {
    write_count(out, attributes.len());
    for attribute in attributes {
        write_string(out, attribute);
    }
}

fn write_token_list(out: &mut Vec<u8>, tokens: &[Token]) {
    write_count(out, tokens.len());
    for token in tokens {
        write_le::<u32>(out, token.value());
    }
}

fn write_field(out: &mut Vec<u8>, row: &FieldDef) {
    write_le::<u32>(out, row.parent.value());
    write_string(out, &row.name);
    write_le::<u32>(out, row.flags.bits());
    row.ty.write(out);
}

fn write_method(out: &mut Vec<u8>, row: &MethodDef, code: Option<&[u8]>) {
    write_le::<u32>(out, row.parent.value());
    write_string(out, &row.name);
    write_le::<u32>(out, row.flags.bits());
    write_le::<u16>(out, row.generic_arity);
    row.signature.write(out);
    write_attributes(out, &row.attributes);

    match (row.body.as_ref(), code) {
        (Some(body), Some(code)) => {
            write_le::<u8>(out, 1);
            write_le::<u16>(out, body.max_stack);
            write_count(out, body.locals.len());
            for local in &body.locals {
                local.write(out);
            }
            write_count(out, code.len());
            out.extend_from_slice(code);
            write_count(out, body.handlers.len());
            for handler in &body.handlers {
                write_le::<u16>(out, handler.kind as u16);
                write_le::<u32>(out, handler.try_offset);
                write_le::<u32>(out, handler.try_length);
                write_le::<u32>(out, handler.handler_offset);
                write_le::<u32>(out, handler.handler_length);
                write_le::<u32>(out, handler.filter_offset);
            }
        }
        _ => write_le::<u8>(out, 0),
    }
}

fn write_type(out: &mut Vec<u8>, row: &TypeDef) {
    write_string(out, &row.namespace);
    write_string(out, &row.name);
    write_le::<u32>(out, row.flags.bits());
    write_le::<u16>(out, row.generic_arity);
    write_le::<u32>(out, row.extends.value());
    write_attributes(out, &row.attributes);
    write_token_list(out, &row.fields);
    write_token_list(out, &row.methods);
    write_token_list(out, &row.nested);
}
