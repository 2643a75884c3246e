//! Serial payload encoding.
//!
//! Bytes cross the client boundary as hex text: one two-digit pair per byte,
//! no separators, no framing. Outbound text is uppercase; inbound text is
//! accepted in either case.

use crate::errors::CodecError;

/// Encode raw bytes as uppercase hex text.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decode hex text into raw bytes.
///
/// Fails on odd-length input and on any character outside `[0-9a-fA-F]`.
/// The empty string decodes to an empty payload.
pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>, CodecError> {
    let len = text.len();
    if len % 2 != 0 {
        return Err(CodecError::OddLength { len });
    }
    hex::decode(text).map_err(|err| match err {
        hex::FromHexError::InvalidHexCharacter { c, index } => CodecError::InvalidCharacter {
            character: c,
            index,
        },
        hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
            CodecError::OddLength { len }
        }
    })
}
