//! Tagged constant values (`SerAr` in BIFF8): array literal cells and cached external values.
//!
//! Each constant is a one-byte tag followed by its payload:
//!
//! | tag    | kind    | payload                                               |
//! |--------|---------|-------------------------------------------------------|
//! | `0x00` | empty   | 8 reserved bytes                                      |
//! | `0x01` | number  | IEEE-754 `f64`                                        |
//! | `0x02` | text    | `u16` char count, `u8` flags (bit 0 = UTF-16), chars |
//! | `0x04` | boolean | `u8` 0 or 1, then 7 reserved bytes                    |
//! | `0x10` | error   | `u16` error code, 6 reserved bytes                    |

use serde::{Deserialize, Serialize};

use crate::error::{ConstantDecodeError, EncodeError};
use crate::reader::{ByteReader, ShortRead};
use crate::value::{ErrorKind, ValueEval};

const TAG_EMPTY: u8 = 0x00;
const TAG_NUMBER: u8 = 0x01;
const TAG_STRING: u8 = 0x02;
const TAG_BOOLEAN: u8 = 0x04;
const TAG_ERROR: u8 = 0x10;

const FIXED_PAYLOAD_LEN: usize = 8;
const STRING_FLAG_HIGH_BYTE: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    ErrorCode(u16),
}

impl ConstantValue {
    pub fn error(kind: ErrorKind) -> Self {
        ConstantValue::ErrorCode(u16::from(kind.biff_code()))
    }

    pub fn tag(&self) -> u8 {
        match self {
            ConstantValue::Empty => TAG_EMPTY,
            ConstantValue::Number(_) => TAG_NUMBER,
            ConstantValue::Text(_) => TAG_STRING,
            ConstantValue::Boolean(_) => TAG_BOOLEAN,
            ConstantValue::ErrorCode(_) => TAG_ERROR,
        }
    }

    /// Evaluation view of the constant. Unknown error codes surface as `#VALUE!`.
    pub fn to_value(&self) -> ValueEval {
        match self {
            ConstantValue::Empty => ValueEval::Blank,
            ConstantValue::Number(n) => ValueEval::number(*n),
            ConstantValue::Text(s) => ValueEval::Text(s.clone()),
            ConstantValue::Boolean(b) => ValueEval::Boolean(*b),
            ConstantValue::ErrorCode(code) => ValueEval::Error(
                u8::try_from(*code)
                    .ok()
                    .and_then(ErrorKind::from_biff_code)
                    .unwrap_or(ErrorKind::Value),
            ),
        }
    }
}

/// Read one tagged constant.
pub fn decode_one(reader: &mut ByteReader<'_>) -> Result<ConstantValue, ConstantDecodeError> {
    let start = reader.position();
    let eof = |e: ShortRead| ConstantDecodeError::UnexpectedEof {
        offset: start,
        needed: e.needed,
        remaining: e.remaining,
    };

    let tag = reader.read_u8().map_err(eof)?;
    match tag {
        TAG_EMPTY => {
            reader.skip(FIXED_PAYLOAD_LEN).map_err(eof)?;
            Ok(ConstantValue::Empty)
        }
        TAG_NUMBER => Ok(ConstantValue::Number(reader.read_f64().map_err(eof)?)),
        TAG_STRING => {
            let cch = reader.read_u16().map_err(eof)? as usize;
            let flags = reader.read_u8().map_err(eof)?;
            let text = if flags & STRING_FLAG_HIGH_BYTE != 0 {
                let raw = reader.read_bytes(cch * 2).map_err(eof)?;
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units)
                    .map_err(|_| ConstantDecodeError::InvalidUtf16 { offset: start })?
            } else {
                let raw = reader.read_bytes(cch).map_err(eof)?;
                raw.iter().map(|&b| char::from(b)).collect()
            };
            Ok(ConstantValue::Text(text))
        }
        TAG_BOOLEAN => {
            let value = reader.read_u8().map_err(eof)?;
            reader.skip(FIXED_PAYLOAD_LEN - 1).map_err(eof)?;
            match value {
                0 => Ok(ConstantValue::Boolean(false)),
                1 => Ok(ConstantValue::Boolean(true)),
                value => Err(ConstantDecodeError::InvalidBoolean {
                    offset: start,
                    value,
                }),
            }
        }
        TAG_ERROR => {
            let code = reader.read_u16().map_err(eof)?;
            reader.skip(FIXED_PAYLOAD_LEN - 2).map_err(eof)?;
            Ok(ConstantValue::ErrorCode(code))
        }
        tag => Err(ConstantDecodeError::UnknownTag { offset: start, tag }),
    }
}

/// Append one tagged constant to `out`.
pub fn encode_one(out: &mut Vec<u8>, value: &ConstantValue) -> Result<(), EncodeError> {
    out.push(value.tag());
    match value {
        ConstantValue::Empty => out.extend_from_slice(&[0u8; FIXED_PAYLOAD_LEN]),
        ConstantValue::Number(n) => out.extend_from_slice(&n.to_le_bytes()),
        ConstantValue::Text(s) => {
            let units = utf16_units(s);
            let cch = u16::try_from(units.len()).map_err(|_| EncodeError::StringTooLong {
                index: 0,
                len: units.len(),
                max: u16::MAX as usize,
            })?;
            out.extend_from_slice(&cch.to_le_bytes());
            write_string_body(out, &units);
        }
        ConstantValue::Boolean(b) => out.extend_from_slice(&u64::from(*b).to_le_bytes()),
        ConstantValue::ErrorCode(code) => {
            out.extend_from_slice(&code.to_le_bytes());
            out.extend_from_slice(&[0u8; FIXED_PAYLOAD_LEN - 2]);
        }
    }
    Ok(())
}

/// Payload size of `value` in bytes, excluding the tag byte.
pub fn encoded_size(value: &ConstantValue) -> usize {
    match value {
        ConstantValue::Text(s) => {
            let units = utf16_units(s);
            3 + string_body_len(&units)
        }
        _ => FIXED_PAYLOAD_LEN,
    }
}

pub(crate) fn utf16_units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn is_compressible(units: &[u16]) -> bool {
    units.iter().all(|&u| u <= 0xFF)
}

fn string_body_len(units: &[u16]) -> usize {
    if is_compressible(units) {
        units.len()
    } else {
        units.len() * 2
    }
}

/// Write the flags byte and characters of a BIFF8 unicode string (length prefix excluded).
///
/// Strings whose characters all fit in Latin-1 are written compressed (one byte per char).
pub(crate) fn write_string_body(out: &mut Vec<u8>, units: &[u16]) {
    if is_compressible(units) {
        out.push(0);
        out.extend(units.iter().map(|&u| u as u8));
    } else {
        out.push(STRING_FLAG_HIGH_BYTE);
        for unit in units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(value: &ConstantValue) -> ConstantValue {
        let mut out = Vec::new();
        encode_one(&mut out, value).unwrap();
        assert_eq!(out.len(), 1 + encoded_size(value), "size of {value:?}");
        let mut reader = ByteReader::new(&out);
        let decoded = decode_one(&mut reader).unwrap();
        assert!(reader.is_empty(), "trailing bytes after {value:?}");
        decoded
    }

    #[test]
    fn every_kind_round_trips() {
        for value in [
            ConstantValue::Empty,
            ConstantValue::Number(2.75),
            ConstantValue::Text("hello".to_string()),
            ConstantValue::Text("h\u{e9}llo \u{263A}".to_string()),
            ConstantValue::Text(String::new()),
            ConstantValue::Boolean(true),
            ConstantValue::Boolean(false),
            ConstantValue::error(ErrorKind::Div0),
        ] {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn text_layout_is_compressed_when_possible() {
        let mut out = Vec::new();
        encode_one(&mut out, &ConstantValue::Text("ab".to_string())).unwrap();
        assert_eq!(out, vec![0x02, 0x02, 0x00, 0x00, b'a', b'b']);

        let mut out = Vec::new();
        encode_one(&mut out, &ConstantValue::Text("\u{3042}".to_string())).unwrap();
        assert_eq!(out, vec![0x02, 0x01, 0x00, 0x01, 0x42, 0x30]);
    }

    #[test]
    fn fixed_kinds_use_eight_byte_payloads() {
        let mut out = Vec::new();
        encode_one(&mut out, &ConstantValue::Boolean(true)).unwrap();
        encode_one(&mut out, &ConstantValue::ErrorCode(0x2A)).unwrap();
        assert_eq!(
            out,
            vec![0x04, 1, 0, 0, 0, 0, 0, 0, 0, 0x10, 0x2A, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(encoded_size(&ConstantValue::Empty), 8);
        assert_eq!(encoded_size(&ConstantValue::Text("abc".into())), 6);
    }

    #[test]
    fn rejects_unknown_tags_and_bad_booleans() {
        let bytes = [0x03, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            decode_one(&mut ByteReader::new(&bytes)),
            Err(ConstantDecodeError::UnknownTag { offset: 0, tag: 0x03 })
        );

        let bytes = [0x04, 2, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            decode_one(&mut ByteReader::new(&bytes)),
            Err(ConstantDecodeError::InvalidBoolean { offset: 0, value: 2 })
        );
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let bytes = [0x01, 0, 0, 0];
        assert_eq!(
            decode_one(&mut ByteReader::new(&bytes)),
            Err(ConstantDecodeError::UnexpectedEof {
                offset: 0,
                needed: 8,
                remaining: 3
            })
        );
    }

    #[test]
    fn unknown_error_codes_evaluate_as_value_errors() {
        assert_eq!(
            ConstantValue::ErrorCode(0x99).to_value(),
            ValueEval::Error(ErrorKind::Value)
        );
        assert_eq!(
            ConstantValue::error(ErrorKind::NA).to_value(),
            ValueEval::Error(ErrorKind::NA)
        );
    }

    #[test]
    fn constants_serialize_with_serde() {
        let json = serde_json::to_string(&ConstantValue::Boolean(true)).unwrap();
        assert_eq!(json, r#"{"Boolean":true}"#);
        let back: ConstantValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ConstantValue::Boolean(true));
    }
}
