// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Error during serialization
#[derive(Debug)]
pub enum EncodeError {
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EncodeError({})",
            match self {
                Self::Io(e) => e.to_string(),
            }
        )
    }
}

impl std::error::Error for EncodeError {}

impl From<std::io::Error> for EncodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Error during deserialization
#[derive(Debug)]
pub enum DecodeError {
    /// I/O error
    Io(std::io::Error),

    /// Invalid enum tag
    InvalidTag((&'static str, u8)),

    /// Invalid stream header
    InvalidHeader(&'static str),

    /// Unsupported format version
    UnsupportedVersion(u8),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DecodeError({})",
            match self {
                Self::Io(e) => e.to_string(),
                e => format!("{e:?}"),
            }
        )
    }
}

impl std::error::Error for DecodeError {}

impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Trait to serialize stuff
pub trait Encode {
    /// Serializes into writer.
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError>;

    /// Serializes into vector.
    fn encode_into_vec(&self) -> Vec<u8> {
        let mut v = vec![];

        // NOTE: Encoding into a vec cannot fail
        #[allow(clippy::expect_used)]
        self.encode_into(&mut v).expect("cannot fail");

        v
    }
}

/// Trait to deserialize stuff
pub trait Decode {
    /// Deserializes from reader.
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

/// Writes a length-prefixed byte string.
pub(crate) fn encode_byte_string<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<(), EncodeError> {
    writer.write_u64::<LittleEndian>(bytes.len() as u64)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Reads a length-prefixed byte string.
pub(crate) fn decode_byte_string<R: Read>(reader: &mut R) -> Result<Vec<u8>, DecodeError> {
    // NOTE: The length prefix comes from the stream, so clamp allocations
    // to something sane in case the stream is garbage
    const PREALLOC_CAP: u64 = 16 * 1_024 * 1_024;

    let len = reader.read_u64::<LittleEndian>()?;

    let mut bytes = Vec::with_capacity(len.min(PREALLOC_CAP) as usize);
    reader.take(len).read_to_end(&mut bytes)?;

    if (bytes.len() as u64) < len {
        return Err(DecodeError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated byte string",
        )));
    }

    Ok(bytes)
}
