use thiserror::Error;

/// Failure decoding a single tagged constant (array literal cell, cached external value).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstantDecodeError {
    #[error("unexpected eof reading constant at offset {offset} (needed {needed} bytes, remaining {remaining})")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("unknown constant tag 0x{tag:02X} at offset {offset}")]
    UnknownTag { offset: usize, tag: u8 },
    #[error("invalid boolean constant 0x{value:02X} at offset {offset}")]
    InvalidBoolean { offset: usize, value: u8 },
    #[error("invalid UTF-16 text constant at offset {offset}")]
    InvalidUtf16 { offset: usize },
}

impl ConstantDecodeError {
    pub fn offset(&self) -> usize {
        match *self {
            ConstantDecodeError::UnexpectedEof { offset, .. }
            | ConstantDecodeError::UnknownTag { offset, .. }
            | ConstantDecodeError::InvalidBoolean { offset, .. }
            | ConstantDecodeError::InvalidUtf16 { offset } => offset,
        }
    }
}

/// Structural failure decoding an `rgce` token stream (and its trailing `rgcb` payload).
///
/// Offsets are byte offsets into the buffer handed to the decoder. `ptg` is the raw opcode byte
/// of the token being decoded (for payload errors: the token that owns the payload).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("declared rgce length {cce} exceeds the {available} bytes available (token at rgce offset {offset})")]
    TokenStreamTruncated {
        offset: usize,
        cce: usize,
        available: usize,
    },
    #[error("unexpected eof decoding ptg=0x{ptg:02X} at rgce offset {offset} (needed {needed} bytes, remaining {remaining})")]
    UnexpectedEof {
        offset: usize,
        ptg: u8,
        needed: usize,
        remaining: usize,
    },
    #[error("unsupported ptg=0x{ptg:02X} at rgce offset {offset}")]
    UnsupportedToken { offset: usize, ptg: u8 },
    #[error("unknown function id {func_id} (ptg=0x{ptg:02X} at rgce offset {offset})")]
    UnknownFunctionId { offset: usize, ptg: u8, func_id: u16 },
    #[error("function id {func_id} called with {argc} args, expected {min}..={max} (ptg=0x{ptg:02X} at rgce offset {offset})")]
    ArityMismatch {
        offset: usize,
        ptg: u8,
        func_id: u16,
        argc: u8,
        min: u8,
        max: u8,
    },
    #[error("invalid error code 0x{code:02X} (ptg=0x{ptg:02X} at rgce offset {offset})")]
    InvalidErrorCode { offset: usize, ptg: u8, code: u8 },
    #[error("invalid boolean 0x{value:02X} (ptg=0x{ptg:02X} at rgce offset {offset})")]
    InvalidBoolean { offset: usize, ptg: u8, value: u8 },
    #[error("invalid UTF-16 string (ptg=0x{ptg:02X} at rgce offset {offset})")]
    InvalidUtf16 { offset: usize, ptg: u8 },
    #[error("trailing payload for ptg=0x{ptg:02X} runs past the buffer at offset {offset} (needed {needed} bytes, remaining {remaining})")]
    PayloadEof {
        offset: usize,
        ptg: u8,
        needed: usize,
        remaining: usize,
    },
    #[error("invalid array constant for ptg=0x{ptg:02X} at offset {offset}: {source}")]
    InvalidConstant {
        offset: usize,
        ptg: u8,
        #[source]
        source: ConstantDecodeError,
    },
}

impl DecodeError {
    pub fn offset(&self) -> usize {
        match *self {
            DecodeError::TokenStreamTruncated { offset, .. }
            | DecodeError::UnexpectedEof { offset, .. }
            | DecodeError::UnsupportedToken { offset, .. }
            | DecodeError::UnknownFunctionId { offset, .. }
            | DecodeError::ArityMismatch { offset, .. }
            | DecodeError::InvalidErrorCode { offset, .. }
            | DecodeError::InvalidBoolean { offset, .. }
            | DecodeError::InvalidUtf16 { offset, .. }
            | DecodeError::PayloadEof { offset, .. }
            | DecodeError::InvalidConstant { offset, .. } => offset,
        }
    }

    pub fn ptg(&self) -> Option<u8> {
        match *self {
            DecodeError::TokenStreamTruncated { .. } => None,
            DecodeError::UnexpectedEof { ptg, .. }
            | DecodeError::UnsupportedToken { ptg, .. }
            | DecodeError::UnknownFunctionId { ptg, .. }
            | DecodeError::ArityMismatch { ptg, .. }
            | DecodeError::InvalidErrorCode { ptg, .. }
            | DecodeError::InvalidBoolean { ptg, .. }
            | DecodeError::InvalidUtf16 { ptg, .. }
            | DecodeError::PayloadEof { ptg, .. }
            | DecodeError::InvalidConstant { ptg, .. } => Some(ptg),
        }
    }
}

/// A token sequence that cannot be written as BIFF8 bytes.
///
/// These are producer bugs (a token built without its payload, a string too long for its length
/// prefix) rather than runtime conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("array constant token #{index} has no payload")]
    MissingArrayPayload { index: usize },
    #[error("mem-area token #{index} has no area list")]
    MissingMemAreaPayload { index: usize },
    #[error("string of {len} UTF-16 units does not fit a {max}-unit length prefix (token #{index})")]
    StringTooLong { index: usize, len: usize, max: usize },
    #[error("array constant token #{index} is {rows}x{cols}; BIFF8 allows at most 65536x256")]
    ArrayTooLarge { index: usize, rows: usize, cols: usize },
    #[error("mem-area token #{index} lists {count} areas; at most 65535 fit")]
    TooManyMemAreas { index: usize, count: usize },
    #[error("unknown function id {func_id} (token #{index})")]
    UnknownFunctionId { index: usize, func_id: u16 },
    #[error("function id {func_id} called with {argc} args, expected {min}..={max} (token #{index})")]
    ArityMismatch {
        index: usize,
        func_id: u16,
        argc: u8,
        min: u8,
        max: u8,
    },
    #[error("choose attribute (token #{index}) declares {declared} cases but carries {actual} jump offsets")]
    InvalidJumpTable {
        index: usize,
        declared: usize,
        actual: usize,
    },
    #[error("rgce is {len} bytes; the length prefix allows at most {max}", max = u16::MAX)]
    TokenStreamTooLong { len: usize },
}

/// A token sequence that cannot be evaluated at all.
///
/// Computational problems (`#DIV/0!`, `#VALUE!`, ...) are never reported here; they are ordinary
/// [`crate::ValueEval::Error`] results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("stack underflow evaluating token #{index} (ptg=0x{ptg:02X}): needed {needed}, had {available}")]
    StackUnderflow {
        index: usize,
        ptg: u8,
        needed: usize,
        available: usize,
    },
    #[error("formula left {stack_len} values on the stack")]
    StackNotSingular { stack_len: usize },
    #[error("operand stack exceeded {limit} entries at token #{index}")]
    StackOverflow { index: usize, limit: usize },
    #[error("unknown function id {func_id} at token #{index}")]
    UnknownFunctionId { index: usize, func_id: u16 },
    #[error("function {name} (id {func_id}) has no implementation")]
    FunctionNotImplemented { func_id: u16, name: &'static str },
    #[error("shared/table formula marker at token #{index} must be resolved before evaluation")]
    UnresolvedSharedFormula { index: usize },
}

/// A token sequence that does not describe a single expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("stack underflow rendering token #{index} (ptg=0x{ptg:02X}): needed {needed}, had {available}")]
    StackUnderflow {
        index: usize,
        ptg: u8,
        needed: usize,
        available: usize,
    },
    #[error("formula text left {stack_len} expressions on the stack")]
    StackNotSingular { stack_len: usize },
    #[error("unknown function id {func_id} at token #{index}")]
    UnknownFunctionId { index: usize, func_id: u16 },
    #[error("shared/table formula marker at token #{index} has no text form")]
    UnresolvedSharedFormula { index: usize },
}
