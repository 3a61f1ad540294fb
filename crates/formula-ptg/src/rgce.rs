//! BIFF8 `rgce` / `rgcb` codec.
//!
//! A formula is stored as two consecutive segments:
//!
//! - `rgce`: the primary token stream, exactly `cce` bytes long.
//! - `rgcb`: trailing data for tokens whose payload does not fit in the primary stream, written
//!   in token order once every primary token has been written. `PtgArray` contributes its
//!   literal (`cols - 1` as `u8`, `rows - 1` as `u16`, then the constants row by row);
//!   `PtgMemArea` contributes its precomputed area list (`u16` count + `Ref8U` rectangles).
//!
//! A formula without such tokens has no `rgcb` at all.

use crate::constants::{self, ConstantValue};
use crate::error::{ConstantDecodeError, DecodeError, EncodeError};
use crate::ftab::FunctionMetadataRegistry;
use crate::reader::{ByteReader, ShortRead};
use crate::token::{
    AreaRef, ArrayConstant, Attr, CellRef, Control, FunctionCall, MemRange, MemToken, NameRef,
    OperandClass, Operator, Reference, ScalarOperand, Token, MAX_ARRAY_COLS, MAX_ARRAY_ROWS,
};
use crate::value::ErrorKind;

const MAX_PTG_STR_LEN: usize = u8::MAX as usize;
const MAX_FUNC_VAR_ARGC: u8 = 0x7F;
const FUNC_VAR_PROMPT: u8 = 0x80;
const FUNC_VAR_COMMAND: u16 = 0x8000;
/// Smallest encoded constant (an empty string: tag + 3-byte header).
const MIN_CONSTANT_LEN: usize = 4;

/// The two segments of an encoded formula.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedRgce {
    pub rgce: Vec<u8>,
    pub rgcb: Vec<u8>,
}

impl EncodedRgce {
    /// Declared token-stream length.
    pub fn cce(&self) -> usize {
        self.rgce.len()
    }

    /// `rgce` immediately followed by `rgcb`, as stored in a `FORMULA` record.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.rgce.len() + self.rgcb.len());
        out.extend_from_slice(&self.rgce);
        out.extend_from_slice(&self.rgcb);
        out
    }
}

enum Trailing {
    Array,
    MemArea,
}

/// Decode `cce` bytes of tokens from the start of `bytes`, then attach any trailing payloads
/// that follow them.
pub fn decode_rgce(bytes: &[u8], cce: usize) -> Result<Vec<Token>, DecodeError> {
    // A declared length past the buffer is reported at the first token that does not fit.
    let truncated = cce > bytes.len();
    let rgce = &bytes[..cce.min(bytes.len())];

    let registry = FunctionMetadataRegistry::global();
    let mut tokens = Vec::new();
    // (token index, opcode byte, payload kind), in token order.
    let mut pending: Vec<(usize, u8, Trailing)> = Vec::new();
    let mut r = ByteReader::new(rgce);

    while let Some(ptg) = r.peek_u8() {
        let offset = r.position();
        r.skip(1).map_err(|_| DecodeError::UnsupportedToken { offset, ptg })?;
        let eof = |e: ShortRead| {
            if truncated {
                DecodeError::TokenStreamTruncated {
                    offset,
                    cce,
                    available: bytes.len(),
                }
            } else {
                DecodeError::UnexpectedEof {
                    offset,
                    ptg,
                    needed: e.needed,
                    remaining: e.remaining,
                }
            }
        };

        let token = match ptg {
            0x01 | 0x02 => {
                let row = r.read_u16().map_err(eof)?;
                let col = r.read_u16().map_err(eof)?;
                Token::Control(if ptg == 0x01 {
                    Control::Exp { row, col }
                } else {
                    Control::Tbl { row, col }
                })
            }
            0x03..=0x14 => match Operator::from_opcode(ptg) {
                Some(op) => Token::Operator(op),
                None => return Err(DecodeError::UnsupportedToken { offset, ptg }),
            },
            0x15 => Token::Control(Control::Paren),
            0x16 => Token::Control(Control::MissingArg),
            0x17 => {
                let cch = r.read_u8().map_err(eof)? as usize;
                let flags = r.read_u8().map_err(eof)?;
                Token::Scalar(ScalarOperand::Text(read_string_body(
                    &mut r, cch, flags, offset, ptg,
                )?))
            }
            0x19 => {
                let options = r.read_u8().map_err(eof)?;
                let data = r.read_u16().map_err(eof)?;
                let mut attr = Attr::new(options, data);
                if attr.is_choose() {
                    let count = data as usize + 1;
                    attr.jump_table.reserve(count);
                    for _ in 0..count {
                        attr.jump_table.push(r.read_u16().map_err(eof)?);
                    }
                }
                Token::Control(Control::Attr(attr))
            }
            0x1C => {
                let code = r.read_u8().map_err(eof)?;
                let kind = ErrorKind::from_biff_code(code)
                    .ok_or(DecodeError::InvalidErrorCode { offset, ptg, code })?;
                Token::Scalar(ScalarOperand::Error(kind))
            }
            0x1D => match r.read_u8().map_err(eof)? {
                0 => Token::Scalar(ScalarOperand::Boolean(false)),
                1 => Token::Scalar(ScalarOperand::Boolean(true)),
                value => return Err(DecodeError::InvalidBoolean { offset, ptg, value }),
            },
            0x1E => Token::Scalar(ScalarOperand::Int(r.read_u16().map_err(eof)?)),
            0x1F => Token::Scalar(ScalarOperand::Number(r.read_f64().map_err(eof)?)),
            _ => {
                let Some((base, class)) = OperandClass::split_opcode(ptg) else {
                    return Err(DecodeError::UnsupportedToken { offset, ptg });
                };
                match base {
                    0x20 => {
                        r.skip(7).map_err(eof)?;
                        pending.push((tokens.len(), ptg, Trailing::Array));
                        Token::Array { array: None, class }
                    }
                    0x21 => {
                        let index = r.read_u16().map_err(eof)?;
                        let meta = registry.by_index(index).ok_or(
                            DecodeError::UnknownFunctionId {
                                offset,
                                ptg,
                                func_id: index,
                            },
                        )?;
                        if !meta.has_fixed_arity() {
                            return Err(DecodeError::ArityMismatch {
                                offset,
                                ptg,
                                func_id: index,
                                argc: meta.min_params,
                                min: meta.min_params,
                                max: meta.max_params,
                            });
                        }
                        Token::Function {
                            call: FunctionCall::Fixed { index },
                            class,
                        }
                    }
                    0x22 => {
                        let raw_argc = r.read_u8().map_err(eof)?;
                        let raw_index = r.read_u16().map_err(eof)?;
                        let argc = raw_argc & MAX_FUNC_VAR_ARGC;
                        let index = raw_index & !FUNC_VAR_COMMAND;
                        let meta = registry.by_index(index).ok_or(
                            DecodeError::UnknownFunctionId {
                                offset,
                                ptg,
                                func_id: index,
                            },
                        )?;
                        if !meta.accepts(argc as usize) {
                            return Err(DecodeError::ArityMismatch {
                                offset,
                                ptg,
                                func_id: index,
                                argc,
                                min: meta.min_params,
                                max: meta.max_params,
                            });
                        }
                        Token::Function {
                            call: FunctionCall::Variable {
                                index,
                                argc,
                                prompt: raw_argc & FUNC_VAR_PROMPT != 0,
                                command_equivalent: raw_index & FUNC_VAR_COMMAND != 0,
                            },
                            class,
                        }
                    }
                    0x23 => {
                        let index = r.read_u16().map_err(eof)?;
                        r.skip(2).map_err(eof)?;
                        Token::Name {
                            name: NameRef::Defined { index },
                            class,
                        }
                    }
                    0x24 => Token::Reference {
                        reference: Reference::Cell(read_cell(&mut r).map_err(eof)?),
                        class,
                    },
                    0x25 => Token::Reference {
                        reference: Reference::Area(read_area(&mut r).map_err(eof)?),
                        class,
                    },
                    0x26 => {
                        r.skip(4).map_err(eof)?;
                        let cce = r.read_u16().map_err(eof)?;
                        pending.push((tokens.len(), ptg, Trailing::MemArea));
                        Token::Mem {
                            mem: MemToken::Area { cce, areas: None },
                            class,
                        }
                    }
                    0x27 => {
                        let code = r.read_u8().map_err(eof)?;
                        r.skip(3).map_err(eof)?;
                        let cce = r.read_u16().map_err(eof)?;
                        Token::Mem {
                            mem: MemToken::Err { code, cce },
                            class,
                        }
                    }
                    0x28 => {
                        r.skip(4).map_err(eof)?;
                        let cce = r.read_u16().map_err(eof)?;
                        Token::Mem {
                            mem: MemToken::NoMem { cce },
                            class,
                        }
                    }
                    0x29 | 0x2E | 0x2F => {
                        let cce = r.read_u16().map_err(eof)?;
                        let mem = match base {
                            0x29 => MemToken::Func { cce },
                            0x2E => MemToken::AreaN { cce },
                            _ => MemToken::NoMemN { cce },
                        };
                        Token::Mem { mem, class }
                    }
                    0x2A => {
                        r.skip(4).map_err(eof)?;
                        Token::Reference {
                            reference: Reference::CellErr,
                            class,
                        }
                    }
                    0x2B => {
                        r.skip(8).map_err(eof)?;
                        Token::Reference {
                            reference: Reference::AreaErr,
                            class,
                        }
                    }
                    0x2C => Token::Reference {
                        reference: Reference::CellN(read_cell(&mut r).map_err(eof)?),
                        class,
                    },
                    0x2D => Token::Reference {
                        reference: Reference::AreaN(read_area(&mut r).map_err(eof)?),
                        class,
                    },
                    0x39 => {
                        let ixti = r.read_u16().map_err(eof)?;
                        let index = r.read_u16().map_err(eof)?;
                        r.skip(2).map_err(eof)?;
                        Token::Name {
                            name: NameRef::External { ixti, index },
                            class,
                        }
                    }
                    0x3A => {
                        let ixti = r.read_u16().map_err(eof)?;
                        let cell = read_cell(&mut r).map_err(eof)?;
                        Token::Reference {
                            reference: Reference::Cell3d { ixti, cell },
                            class,
                        }
                    }
                    0x3B => {
                        let ixti = r.read_u16().map_err(eof)?;
                        let area = read_area(&mut r).map_err(eof)?;
                        Token::Reference {
                            reference: Reference::Area3d { ixti, area },
                            class,
                        }
                    }
                    0x3C => {
                        let ixti = r.read_u16().map_err(eof)?;
                        r.skip(4).map_err(eof)?;
                        Token::Reference {
                            reference: Reference::CellErr3d { ixti },
                            class,
                        }
                    }
                    0x3D => {
                        let ixti = r.read_u16().map_err(eof)?;
                        r.skip(8).map_err(eof)?;
                        Token::Reference {
                            reference: Reference::AreaErr3d { ixti },
                            class,
                        }
                    }
                    _ => return Err(DecodeError::UnsupportedToken { offset, ptg }),
                }
            }
        };
        tokens.push(token);
    }

    if truncated {
        return Err(DecodeError::TokenStreamTruncated {
            offset: rgce.len(),
            cce,
            available: bytes.len(),
        });
    }

    if pending.is_empty() {
        return Ok(tokens);
    }

    let mut payload = ByteReader::at(bytes, cce);
    for (index, ptg, kind) in pending {
        match kind {
            Trailing::Array => {
                let array = read_array_payload(&mut payload, ptg)?;
                if let Token::Array { array: slot, .. } = &mut tokens[index] {
                    *slot = Some(array);
                }
            }
            Trailing::MemArea => {
                let ranges = read_mem_area_payload(&mut payload, ptg)?;
                if let Token::Mem {
                    mem: MemToken::Area { areas, .. },
                    ..
                } = &mut tokens[index]
                {
                    *areas = Some(ranges);
                }
            }
        }
    }

    if !payload.is_empty() {
        log::debug!(
            "{} unused bytes after rgcb (cce={cce}, total={})",
            payload.remaining(),
            bytes.len()
        );
    }

    Ok(tokens)
}

fn read_cell(r: &mut ByteReader<'_>) -> Result<CellRef, ShortRead> {
    let row = r.read_u16()?;
    let col = r.read_u16()?;
    Ok(CellRef::from_fields(row, col))
}

fn read_area(r: &mut ByteReader<'_>) -> Result<AreaRef, ShortRead> {
    let row1 = r.read_u16()?;
    let row2 = r.read_u16()?;
    let col1 = r.read_u16()?;
    let col2 = r.read_u16()?;
    Ok(AreaRef::new(
        CellRef::from_fields(row1, col1),
        CellRef::from_fields(row2, col2),
    ))
}

fn read_string_body(
    r: &mut ByteReader<'_>,
    cch: usize,
    flags: u8,
    offset: usize,
    ptg: u8,
) -> Result<String, DecodeError> {
    let eof = |e: ShortRead| DecodeError::UnexpectedEof {
        offset,
        ptg,
        needed: e.needed,
        remaining: e.remaining,
    };
    if flags & 0x01 != 0 {
        let raw = r.read_bytes(cch * 2).map_err(eof)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| DecodeError::InvalidUtf16 { offset, ptg })
    } else {
        let raw = r.read_bytes(cch).map_err(eof)?;
        Ok(raw.iter().map(|&b| char::from(b)).collect())
    }
}

fn read_array_payload(r: &mut ByteReader<'_>, ptg: u8) -> Result<ArrayConstant, DecodeError> {
    let offset = r.position();
    let eof = |e: ShortRead| DecodeError::PayloadEof {
        offset,
        ptg,
        needed: e.needed,
        remaining: e.remaining,
    };
    let cols = r.read_u8().map_err(eof)? as usize + 1;
    let rows = r.read_u16().map_err(eof)? as usize + 1;
    let count = rows * cols;

    let mut values = Vec::with_capacity(count.min(r.remaining() / MIN_CONSTANT_LEN));
    for _ in 0..count {
        let value = constants::decode_one(r).map_err(|err| match err {
            ConstantDecodeError::UnexpectedEof {
                offset,
                needed,
                remaining,
            } => DecodeError::PayloadEof {
                offset,
                ptg,
                needed,
                remaining,
            },
            source => DecodeError::InvalidConstant {
                offset: source.offset(),
                ptg,
                source,
            },
        })?;
        values.push(value);
    }

    ArrayConstant::new(rows, cols, values).map_err(|_| DecodeError::PayloadEof {
        offset,
        ptg,
        needed: count,
        remaining: 0,
    })
}

fn read_mem_area_payload(r: &mut ByteReader<'_>, ptg: u8) -> Result<Vec<MemRange>, DecodeError> {
    let offset = r.position();
    let eof = |e: ShortRead| DecodeError::PayloadEof {
        offset,
        ptg,
        needed: e.needed,
        remaining: e.remaining,
    };
    let count = r.read_u16().map_err(eof)? as usize;
    let mut out = Vec::with_capacity(count.min(r.remaining() / 8));
    for _ in 0..count {
        out.push(MemRange {
            first_row: r.read_u16().map_err(eof)?,
            last_row: r.read_u16().map_err(eof)?,
            first_col: r.read_u16().map_err(eof)?,
            last_col: r.read_u16().map_err(eof)?,
        });
    }
    Ok(out)
}

/// Encode `tokens` into an `rgce` stream and its trailing `rgcb` payload.
pub fn encode_rgce(tokens: &[Token]) -> Result<EncodedRgce, EncodeError> {
    let registry = FunctionMetadataRegistry::global();
    let mut rgce = Vec::with_capacity(tokens.iter().map(Token::in_stream_size).sum());

    for (index, token) in tokens.iter().enumerate() {
        rgce.push(token.opcode());
        match token {
            Token::Operator(_) => {}
            Token::Control(control) => match control {
                Control::Exp { row, col } | Control::Tbl { row, col } => {
                    push_u16(&mut rgce, *row);
                    push_u16(&mut rgce, *col);
                }
                Control::Paren | Control::MissingArg => {}
                Control::Attr(attr) => {
                    rgce.push(attr.options);
                    push_u16(&mut rgce, attr.data);
                    if attr.is_choose() {
                        let declared = attr.data as usize + 1;
                        if attr.jump_table.len() != declared {
                            return Err(EncodeError::InvalidJumpTable {
                                index,
                                declared,
                                actual: attr.jump_table.len(),
                            });
                        }
                        for offset in &attr.jump_table {
                            push_u16(&mut rgce, *offset);
                        }
                    }
                }
            },
            Token::Scalar(scalar) => match scalar {
                ScalarOperand::Int(n) => push_u16(&mut rgce, *n),
                ScalarOperand::Number(n) => rgce.extend_from_slice(&n.to_le_bytes()),
                ScalarOperand::Boolean(b) => rgce.push(u8::from(*b)),
                ScalarOperand::Error(kind) => rgce.push(kind.biff_code()),
                ScalarOperand::Text(s) => {
                    let units = constants::utf16_units(s);
                    if units.len() > MAX_PTG_STR_LEN {
                        return Err(EncodeError::StringTooLong {
                            index,
                            len: units.len(),
                            max: MAX_PTG_STR_LEN,
                        });
                    }
                    rgce.push(units.len() as u8);
                    constants::write_string_body(&mut rgce, &units);
                }
            },
            Token::Reference { reference, .. } => write_reference(&mut rgce, reference),
            Token::Name { name, .. } => match *name {
                NameRef::Defined { index } => {
                    push_u16(&mut rgce, index);
                    push_u16(&mut rgce, 0);
                }
                NameRef::External { ixti, index } => {
                    push_u16(&mut rgce, ixti);
                    push_u16(&mut rgce, index);
                    push_u16(&mut rgce, 0);
                }
            },
            Token::Mem { mem, .. } => match *mem {
                MemToken::Area { cce, .. } | MemToken::NoMem { cce } => {
                    rgce.extend_from_slice(&[0; 4]);
                    push_u16(&mut rgce, cce);
                }
                MemToken::Err { code, cce } => {
                    rgce.extend_from_slice(&[code, 0, 0, 0]);
                    push_u16(&mut rgce, cce);
                }
                MemToken::Func { cce } | MemToken::AreaN { cce } | MemToken::NoMemN { cce } => {
                    push_u16(&mut rgce, cce)
                }
            },
            Token::Array { .. } => rgce.extend_from_slice(&[0; 7]),
            Token::Function { call, .. } => {
                let func_id = call.index();
                let meta = registry
                    .by_index(func_id)
                    .ok_or(EncodeError::UnknownFunctionId { index, func_id })?;
                match *call {
                    FunctionCall::Fixed { index: func_id } => {
                        if !meta.has_fixed_arity() {
                            return Err(EncodeError::ArityMismatch {
                                index,
                                func_id,
                                argc: meta.min_params,
                                min: meta.min_params,
                                max: meta.max_params,
                            });
                        }
                        push_u16(&mut rgce, func_id);
                    }
                    FunctionCall::Variable {
                        index: func_id,
                        argc,
                        prompt,
                        command_equivalent,
                    } => {
                        if argc > MAX_FUNC_VAR_ARGC || !meta.accepts(argc as usize) {
                            return Err(EncodeError::ArityMismatch {
                                index,
                                func_id,
                                argc,
                                min: meta.min_params,
                                max: meta.max_params,
                            });
                        }
                        rgce.push(if prompt { argc | FUNC_VAR_PROMPT } else { argc });
                        push_u16(
                            &mut rgce,
                            if command_equivalent {
                                func_id | FUNC_VAR_COMMAND
                            } else {
                                func_id
                            },
                        );
                    }
                }
            }
        }
    }

    if rgce.len() > u16::MAX as usize {
        return Err(EncodeError::TokenStreamTooLong { len: rgce.len() });
    }

    let mut rgcb = Vec::with_capacity(tokens.iter().map(Token::trailing_size).sum());
    for (index, token) in tokens.iter().enumerate() {
        match token {
            Token::Array { array, .. } => {
                let array = array
                    .as_ref()
                    .ok_or(EncodeError::MissingArrayPayload { index })?;
                write_array_payload(&mut rgcb, index, array)?;
            }
            Token::Mem {
                mem: MemToken::Area { areas, .. },
                ..
            } => {
                let areas = areas
                    .as_ref()
                    .ok_or(EncodeError::MissingMemAreaPayload { index })?;
                let count = u16::try_from(areas.len()).map_err(|_| EncodeError::TooManyMemAreas {
                    index,
                    count: areas.len(),
                })?;
                push_u16(&mut rgcb, count);
                for area in areas {
                    push_u16(&mut rgcb, area.first_row);
                    push_u16(&mut rgcb, area.last_row);
                    push_u16(&mut rgcb, area.first_col);
                    push_u16(&mut rgcb, area.last_col);
                }
            }
            _ => {}
        }
    }

    Ok(EncodedRgce { rgce, rgcb })
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_cell(out: &mut Vec<u8>, cell: &CellRef) {
    push_u16(out, cell.row);
    push_u16(out, cell.col_field());
}

fn write_area(out: &mut Vec<u8>, area: &AreaRef) {
    push_u16(out, area.first.row);
    push_u16(out, area.last.row);
    push_u16(out, area.first.col_field());
    push_u16(out, area.last.col_field());
}

fn write_reference(out: &mut Vec<u8>, reference: &Reference) {
    match reference {
        Reference::Cell(cell) | Reference::CellN(cell) => write_cell(out, cell),
        Reference::Area(area) | Reference::AreaN(area) => write_area(out, area),
        Reference::CellErr => out.extend_from_slice(&[0; 4]),
        Reference::AreaErr => out.extend_from_slice(&[0; 8]),
        Reference::Cell3d { ixti, cell } => {
            push_u16(out, *ixti);
            write_cell(out, cell);
        }
        Reference::Area3d { ixti, area } => {
            push_u16(out, *ixti);
            write_area(out, area);
        }
        Reference::CellErr3d { ixti } => {
            push_u16(out, *ixti);
            out.extend_from_slice(&[0; 4]);
        }
        Reference::AreaErr3d { ixti } => {
            push_u16(out, *ixti);
            out.extend_from_slice(&[0; 8]);
        }
    }
}

fn write_array_payload(
    out: &mut Vec<u8>,
    index: usize,
    array: &ArrayConstant,
) -> Result<(), EncodeError> {
    let (rows, cols) = (array.rows(), array.cols());
    if rows > MAX_ARRAY_ROWS || cols > MAX_ARRAY_COLS {
        return Err(EncodeError::ArrayTooLarge { index, rows, cols });
    }
    out.push((cols - 1) as u8);
    push_u16(out, (rows - 1) as u16);
    for value in array.matrix().iter() {
        write_constant(out, index, value)?;
    }
    Ok(())
}

fn write_constant(out: &mut Vec<u8>, index: usize, value: &ConstantValue) -> Result<(), EncodeError> {
    constants::encode_one(out, value).map_err(|err| match err {
        EncodeError::StringTooLong { len, max, .. } => EncodeError::StringTooLong { index, len, max },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_a_plus_b() {
        // A1+B1 with value-class references.
        let bytes = [0x44, 0, 0, 0, 0xC0, 0x44, 0, 0, 1, 0xC0, 0x03];
        let tokens = decode_rgce(&bytes, bytes.len()).unwrap();
        assert_eq!(
            tokens,
            vec![Token::cell(0, 0), Token::cell(0, 1), Token::op(Operator::Add)]
        );
        assert_eq!(encode_rgce(&tokens).unwrap().rgce, bytes.to_vec());
    }

    #[test]
    fn formula_without_arrays_has_no_rgcb() {
        let encoded = encode_rgce(&[Token::int(1), Token::int(2), Token::op(Operator::Add)]).unwrap();
        assert_eq!(encoded.rgce, vec![0x1E, 1, 0, 0x1E, 2, 0, 0x03]);
        assert!(encoded.rgcb.is_empty());
    }

    #[test]
    fn array_payload_trails_all_tokens() {
        let array = ArrayConstant::new(
            1,
            2,
            vec![ConstantValue::Number(1.0), ConstantValue::Boolean(false)],
        )
        .unwrap();
        let tokens = vec![Token::array(array.clone()), Token::int(7)];
        let encoded = encode_rgce(&tokens).unwrap();
        assert_eq!(encoded.rgce, vec![0x60, 0, 0, 0, 0, 0, 0, 0, 0x1E, 7, 0]);
        assert_eq!(&encoded.rgcb[..3], &[1, 0, 0]);
        assert_eq!(encoded.rgcb.len(), array.payload_size());

        let decoded = decode_rgce(&encoded.to_bytes(), encoded.cce()).unwrap();
        assert_eq!(decoded, tokens);
    }

    #[test]
    fn mem_area_list_round_trips() {
        let tokens = vec![
            Token::Mem {
                mem: MemToken::Area {
                    cce: 5,
                    areas: Some(vec![MemRange {
                        first_row: 0,
                        last_row: 3,
                        first_col: 1,
                        last_col: 1,
                    }]),
                },
                class: OperandClass::Reference,
            },
            Token::area(0, 1, 3, 1),
        ];
        let encoded = encode_rgce(&tokens).unwrap();
        assert_eq!(encoded.rgcb, vec![1, 0, 0, 0, 3, 0, 1, 0, 1, 0]);
        assert_eq!(decode_rgce(&encoded.to_bytes(), encoded.cce()).unwrap(), tokens);
    }

    #[test]
    fn choose_jump_table_round_trips() {
        let tokens = vec![
            Token::int(2),
            Token::Control(Control::Attr(Attr::choose(vec![8, 11, 14]))),
            Token::int(10),
        ];
        let encoded = encode_rgce(&tokens).unwrap();
        assert_eq!(
            &encoded.rgce[3..13],
            &[0x19, 0x04, 0x02, 0x00, 8, 0, 11, 0, 14, 0]
        );
        assert_eq!(decode_rgce(&encoded.rgce, encoded.cce()).unwrap(), tokens);
    }

    #[test]
    fn func_var_flags_round_trip() {
        let token = Token::function(
            FunctionCall::Variable {
                index: 4,
                argc: 2,
                prompt: true,
                command_equivalent: false,
            },
            OperandClass::Value,
        );
        let encoded = encode_rgce(std::slice::from_ref(&token)).unwrap();
        assert_eq!(encoded.rgce, vec![0x42, 0x82, 0x04, 0x00]);
        assert_eq!(decode_rgce(&encoded.rgce, 4).unwrap(), vec![token]);
    }

    #[test]
    fn encode_rejects_array_without_payload() {
        let tokens = vec![
            Token::int(1),
            Token::Array {
                array: None,
                class: OperandClass::Array,
            },
        ];
        assert_eq!(
            encode_rgce(&tokens),
            Err(EncodeError::MissingArrayPayload { index: 1 })
        );
    }

    #[test]
    fn encode_validates_function_arity() {
        let tokens = vec![Token::function(FunctionCall::variable(24, 2), OperandClass::Value)];
        assert!(matches!(
            encode_rgce(&tokens),
            Err(EncodeError::ArityMismatch { func_id: 24, argc: 2, .. })
        ));
        let tokens = vec![Token::function(FunctionCall::fixed(4), OperandClass::Value)];
        assert!(matches!(
            encode_rgce(&tokens),
            Err(EncodeError::ArityMismatch { func_id: 4, .. })
        ));
    }
}
