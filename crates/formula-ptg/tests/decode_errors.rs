use formula_ptg::{
    ConstantDecodeError, DecodeError, EncodeError, Formula, OperandClass, Token,
};
use pretty_assertions::assert_eq;

fn decode(bytes: &[u8], cce: usize) -> DecodeError {
    Formula::decode(bytes, cce).expect_err("decode should fail")
}

#[test]
fn unknown_function_id_fails_instead_of_guessing() {
    let err = decode(&[0x1E, 0x01, 0x00, 0x41, 0xFF, 0x0F], 6);
    assert_eq!(
        err,
        DecodeError::UnknownFunctionId {
            offset: 3,
            ptg: 0x41,
            func_id: 0x0FFF,
        }
    );
    assert_eq!(err.offset(), 3);
    assert_eq!(err.ptg(), Some(0x41));
    let message = err.to_string();
    assert!(message.contains("ptg=0x41"), "{message}");
    assert!(message.contains("offset"), "{message}");
}

#[test]
fn token_crossing_the_declared_length_is_truncated() {
    let err = decode(&[0x1E, 0x01, 0x00], 2);
    assert_eq!(
        err,
        DecodeError::UnexpectedEof {
            offset: 0,
            ptg: 0x1E,
            needed: 2,
            remaining: 1,
        }
    );
}

#[test]
fn declared_length_beyond_the_buffer() {
    assert_eq!(
        decode(&[0x1E, 0x01, 0x00], 9),
        DecodeError::TokenStreamTruncated {
            offset: 3,
            cce: 9,
            available: 3,
        }
    );

    // PtgNum at offset 3 is cut off by the end of the buffer.
    let err = decode(&[0x1E, 0x01, 0x00, 0x1F, 0x00, 0x00], 12);
    assert_eq!(
        err,
        DecodeError::TokenStreamTruncated {
            offset: 3,
            cce: 12,
            available: 6,
        }
    );
    assert_eq!(err.offset(), 3);
    assert_eq!(err.ptg(), None);
}

#[test]
fn boolean_tokens_must_be_zero_or_one() {
    let err = decode(&[0x1E, 0x01, 0x00, 0x1D, 0x02], 5);
    assert_eq!(
        err,
        DecodeError::InvalidBoolean {
            offset: 3,
            ptg: 0x1D,
            value: 0x02,
        }
    );
    assert!(err.to_string().contains("ptg=0x1D"), "{err}");

    for byte in [0u8, 1] {
        let bytes = [0x1D, byte];
        let formula = Formula::decode(&bytes, 2).unwrap();
        assert_eq!(formula.encode().unwrap(), bytes, "PtgBool {byte}");
    }
}

#[test]
fn unsupported_opcode_reports_its_offset() {
    assert_eq!(
        decode(&[0x1E, 0x01, 0x00, 0x18], 4),
        DecodeError::UnsupportedToken {
            offset: 3,
            ptg: 0x18,
        }
    );
}

#[test]
fn invalid_error_literal() {
    assert_eq!(
        decode(&[0x1C, 0x05], 2),
        DecodeError::InvalidErrorCode {
            offset: 0,
            ptg: 0x1C,
            code: 0x05,
        }
    );
}

#[test]
fn array_payload_running_past_the_buffer() {
    let mut bytes = vec![0x60, 0, 0, 0, 0, 0, 0, 0];
    // Two columns, one row, but only one constant present.
    bytes.extend_from_slice(&[0x01, 0x00, 0x00]);
    bytes.push(0x01);
    bytes.extend_from_slice(&1.0f64.to_le_bytes());

    let err = decode(&bytes, 8);
    assert!(
        matches!(
            err,
            DecodeError::PayloadEof {
                ptg: 0x60,
                needed: 1,
                remaining: 0,
                ..
            }
        ),
        "{err:?}"
    );
}

#[test]
fn array_payload_missing_entirely() {
    let err = decode(&[0x40, 0, 0, 0, 0, 0, 0, 0], 8);
    assert!(matches!(err, DecodeError::PayloadEof { offset: 8, ptg: 0x40, .. }), "{err:?}");
}

#[test]
fn bad_constant_inside_an_array() {
    let mut bytes = vec![0x60, 0, 0, 0, 0, 0, 0, 0];
    bytes.extend_from_slice(&[0x00, 0x00, 0x00]);
    bytes.push(0x04);
    bytes.extend_from_slice(&2u64.to_le_bytes());

    let err = decode(&bytes, 8);
    assert_eq!(
        err,
        DecodeError::InvalidConstant {
            offset: 11,
            ptg: 0x60,
            source: ConstantDecodeError::InvalidBoolean {
                offset: 11,
                value: 2,
            },
        }
    );
}

#[test]
fn func_var_outside_the_function_arity() {
    // ABS takes exactly one argument.
    let err = decode(&[0x1E, 1, 0, 0x1E, 2, 0, 0x42, 0x02, 0x18, 0x00], 10);
    assert!(
        matches!(
            err,
            DecodeError::ArityMismatch {
                offset: 6,
                func_id: 24,
                argc: 2,
                min: 1,
                max: 1,
                ..
            }
        ),
        "{err:?}"
    );
}

#[test]
fn encoding_an_array_token_without_its_literal_is_rejected() {
    let formula = Formula::new(vec![Token::Array {
        array: None,
        class: OperandClass::Array,
    }]);
    assert_eq!(
        formula.encode(),
        Err(EncodeError::MissingArrayPayload { index: 0 })
    );
}
