//! Deserialization of `.sbm` module files into the metadata graph.
//!
//! Method bodies are decoded into instruction lists eagerly, so the rest of the crate
//! never sees raw code bytes.

use crate::{
    bytecode::decoder::decode_code,
    file::io::{read_le_at, read_string_at},
    metadata::{
        field::{FieldAttributes, FieldDef},
        method::{
            ExceptionHandler, ExceptionHandlerKind, MethodAttributes, MethodBody, MethodDef,
        },
        module::Module,
        refs,
        signatures::{MethodSig, TypeSig},
        token::Token,
        types::{TypeAttributes, TypeDef},
    },
    Error, Result,
};

/// Magic bytes opening every module file.
pub const MODULE_MAGIC: [u8; 4] = *b"SBM0";
/// Container format version this crate reads and writes.
pub const MODULE_VERSION: u16 = 1;

/// Parses a complete module file.
///
/// # Errors
/// Returns [`Error::Empty`] for empty input, [`Error::NotSupported`] on a foreign
/// magic or version, and [`Error::Malformed`]/[`Error::OutOfBounds`] on structural
/// damage.
pub fn read_module(data: &[u8]) -> Result<Module> {
    if data.is_empty() {
        return Err(Error::Empty);
    }
    if data.len() < 8 || data[0..4] != MODULE_MAGIC {
        return Err(Error::NotSupported);
    }

    let mut offset = 4_usize;
    let version = read_le_at::<u16>(data, &mut offset)?;
    if version != MODULE_VERSION {
        return Err(Error::NotSupported);
    }
    let _flags = read_le_at::<u16>(data, &mut offset)?;

    let mut module = Module::new(&read_string_at(data, &mut offset)?);

    let module_ref_count = read_count(data, &mut offset)?;
    for _ in 0..module_ref_count {
        module.module_refs.push(refs::read_module_ref(data, &mut offset)?);
    }

    let type_ref_count = read_count(data, &mut offset)?;
    for _ in 0..type_ref_count {
        module.type_refs.push(refs::read_type_ref(data, &mut offset)?);
    }

    let member_ref_count = read_count(data, &mut offset)?;
    for _ in 0..member_ref_count {
        module.member_refs.push(refs::read_member_ref(data, &mut offset)?);
    }

    let user_string_count = read_count(data, &mut offset)?;
    for _ in 0..user_string_count {
        module.user_strings.push(read_string_at(data, &mut offset)?);
    }

    let field_count = read_count(data, &mut offset)?;
    for _ in 0..field_count {
        module.fields.push(read_field(data, &mut offset)?);
    }

    let method_count = read_count(data, &mut offset)?;
    for _ in 0..method_count {
        module.methods.push(read_method(data, &mut offset)?);
    }

    let type_count = read_count(data, &mut offset)?;
    for _ in 0..type_count {
        module.types.push(read_type(data, &mut offset)?);
    }

    let top_level_count = read_count(data, &mut offset)?;
    for _ in 0..top_level_count {
        module
            .top_level
            .push(Token::new(read_le_at::<u32>(data, &mut offset)?));
    }

    if offset != data.len() {
        return Err(malformed_error!(
            "Module has {} trailing bytes after the top-level type list",
            data.len() - offset
        ));
    }

    Ok(module)
}

fn read_count(data: &[u8], offset: &mut usize) -> Result<usize> {
    let count = read_le_at::<u32>(data, offset)? as usize;
    // A row cannot be smaller than one byte; anything larger than the remaining
    // input is a lie about the row count.
    if count > data.len() - *offset {
        return Err(malformed_error!("Row count {} exceeds remaining input", count));
    }
    Ok(count)
}

fn read_attributes(data: &[u8], offset: &mut usize) -> Result<Vec<String>> {
    let count = read_count(data, offset)?;
    let mut attributes = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        attributes.push(read_string_at(data, offset)?);
    }
    Ok(attributes)
}

fn read_token_list(data: &[u8], offset: &mut usize) -> Result<Vec<Token>> {
    let count = read_count(data, offset)?;
    let mut tokens = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        tokens.push(Token::new(read_le_at::<u32>(data, offset)?));
    }
    Ok(tokens)
}

fn read_field(data: &[u8], offset: &mut usize) -> Result<FieldDef> {
    Ok(FieldDef {
        parent: Token::new(read_le_at::<u32>(data, offset)?),
        name: read_string_at(data, offset)?,
        flags: FieldAttributes::from_bits_truncate(read_le_at::<u32>(data, offset)?),
        ty: TypeSig::read_at(data, offset)?,
    })
}

fn read_method(data: &[u8], offset: &mut usize) -> Result<MethodDef> {
    let parent = Token::new(read_le_at::<u32>(data, offset)?);
    let name = read_string_at(data, offset)?;
    let flags = MethodAttributes::from_bits_truncate(read_le_at::<u32>(data, offset)?);
    let generic_arity = read_le_at::<u16>(data, offset)?;
    let signature = MethodSig::read_at(data, offset)?;
    let attributes = read_attributes(data, offset)?;

    let has_body = read_le_at::<u8>(data, offset)?;
    let body = match has_body {
        0 => None,
        1 => Some(read_body(data, offset)?),
        other => {
            return Err(malformed_error!(
                "Method body presence flag must be 0 or 1, found {}",
                other
            ))
        }
    };

    Ok(MethodDef {
        parent,
        name,
        flags,
        generic_arity,
        signature,
        attributes,
        body,
    })
}

fn read_body(data: &[u8], offset: &mut usize) -> Result<MethodBody> {
    let max_stack = read_le_at::<u16>(data, offset)?;

    let local_count = read_count(data, offset)?;
    let mut locals = Vec::with_capacity(local_count.min(64));
    for _ in 0..local_count {
        locals.push(TypeSig::read_at(data, offset)?);
    }

    let code_len = read_le_at::<u32>(data, offset)? as usize;
    if *offset + code_len > data.len() {
        return Err(Error::OutOfBounds);
    }
    let instructions = decode_code(&data[*offset..*offset + code_len])?;
    *offset += code_len;

    let handler_count = read_count(data, offset)?;
    let mut handlers = Vec::with_capacity(handler_count.min(16));
    for _ in 0..handler_count {
        let raw_kind = read_le_at::<u16>(data, offset)?;
        let Some(kind) = ExceptionHandlerKind::from_u16(raw_kind) else {
            return Err(malformed_error!(
                "Unknown exception handler kind {:#06x}",
                raw_kind
            ));
        };
        handlers.push(ExceptionHandler {
            kind,
            try_offset: read_le_at::<u32>(data, offset)?,
            try_length: read_le_at::<u32>(data, offset)?,
            handler_offset: read_le_at::<u32>(data, offset)?,
            handler_length: read_le_at::<u32>(data, offset)?,
            filter_offset: read_le_at::<u32>(data, offset)?,
        });
    }

    Ok(MethodBody {
        max_stack,
        locals,
        instructions,
        handlers,
    })
}

fn read_type(data: &[u8], offset: &mut usize) -> Result<TypeDef> {
    Ok(TypeDef {
        namespace: read_string_at(data, offset)?,
        name: read_string_at(data, offset)?,
        flags: TypeAttributes::from_bits_truncate(read_le_at::<u32>(data, offset)?),
        generic_arity: read_le_at::<u16>(data, offset)?,
        extends: Token::new(read_le_at::<u32>(data, offset)?),
        attributes: read_attributes(data, offset)?,
        fields: read_token_list(data, offset)?,
        methods: read_token_list(data, offset)?,
        nested: read_token_list(data, offset)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(read_module(&[]), Err(Error::Empty)));
    }

    #[test]
    fn rejects_foreign_magic() {
        let data = b"ELF\x7f more bytes here".to_vec();
        assert!(matches!(read_module(&data), Err(Error::NotSupported)));
    }

    #[test]
    fn rejects_future_version() {
        let mut data = Vec::new();
        data.extend_from_slice(&MODULE_MAGIC);
        data.extend_from_slice(&2_u16.to_le_bytes());
        data.extend_from_slice(&0_u16.to_le_bytes());
        assert!(matches!(read_module(&data), Err(Error::NotSupported)));
    }

    #[test]
    fn rejects_lying_row_counts() {
        let mut data = Vec::new();
        data.extend_from_slice(&MODULE_MAGIC);
        data.extend_from_slice(&MODULE_VERSION.to_le_bytes());
        data.extend_from_slice(&0_u16.to_le_bytes());
        data.extend_from_slice(&4_u32.to_le_bytes());
        data.extend_from_slice(b"demo");
        data.extend_from_slice(&0xFFFF_u32.to_le_bytes());

        assert!(matches!(
            read_module(&data),
            Err(Error::Malformed { .. })
        ));
    }
}
