//! Low-level byte order and safe reading/writing utilities for module files.
//!
//! This module provides the [`BinIO`] trait for safe, endian-aware transfer of primitive
//! types to and from byte buffers. It is used throughout the metadata layer to ensure
//! correct serialization of the container structures; the module format is little-endian
//! throughout.

use crate::{Error::OutOfBounds, Result};

/// Trait for implementing type specific safe readers / writers
///
/// This trait abstracts over reading and writing primitive types in a safe and
/// endian-aware way. It is implemented for all integer types used in the module and
/// symbol-file formats.
pub trait BinIO: Sized {
    #[allow(missing_docs)]
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]> + AsRef<[u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Convert T into its little-endian byte representation
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_bin_io {
    ($($ty:ty),+) => {
        $(impl BinIO for $ty {
            type Bytes = [u8; std::mem::size_of::<$ty>()];

            fn from_le_bytes(bytes: Self::Bytes) -> Self {
                <$ty>::from_le_bytes(bytes)
            }

            fn to_le_bytes(self) -> Self::Bytes {
                <$ty>::to_le_bytes(self)
            }
        })+
    };
}

impl_bin_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Safely read T in little-endian from the start of a data stream.
///
/// ## Arguments
/// * 'data' - The data buffer / stream to read from
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too short.
pub fn read_le<T: BinIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely read T from an offset in little-endian from a data stream.
///
/// ## Arguments
/// * 'data'    - The data buffer / stream to read from
/// * 'offset'  - An offset to read from, will be advanced by the amount of bytes read
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would exceed the buffer.
pub fn read_le_at<T: BinIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(OutOfBounds);
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Append T in little-endian to an output buffer.
///
/// ## Arguments
/// * 'out'   - The output buffer to append to
/// * 'value' - The value to write
pub fn write_le<T: BinIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Safely read a length-prefixed UTF-8 string from an offset in a data stream.
///
/// The encoding is a `u32` byte length followed by that many bytes of UTF-8.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on a truncated buffer and
/// [`crate::Error::Malformed`] when the bytes are not valid UTF-8.
pub fn read_string_at(data: &[u8], offset: &mut usize) -> Result<String> {
    let len = read_le_at::<u32>(data, offset)? as usize;
    if (*offset + len) > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(text) = std::str::from_utf8(&data[*offset..*offset + len]) else {
        return Err(malformed_error!(
            "String at offset {} is not valid UTF-8",
            *offset
        ));
    };

    *offset += len;

    Ok(text.to_string())
}

/// Append a length-prefixed UTF-8 string to an output buffer.
pub fn write_string(out: &mut Vec<u8>, text: &str) {
    // Casting is fine: no metadata name approaches 4 GiB.
    #[allow(clippy::cast_possible_truncation)]
    write_le::<u32>(out, text.len() as u32);
    out.extend_from_slice(text.as_bytes());
}

/// Safely read `N` raw bytes from an offset in a data stream.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
pub fn read_bytes_at<const N: usize>(data: &[u8], offset: &mut usize) -> Result<[u8; N]> {
    if (*offset + N) > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..*offset + N].try_into() else {
        return Err(OutOfBounds);
    };

    *offset += N;

    Ok(read)
}
