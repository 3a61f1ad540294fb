use formula_ptg::constants::{decode_one, encode_one, encoded_size};
use formula_ptg::{ByteReader, ConstantDecodeError, ConstantValue, ErrorKind};
use pretty_assertions::assert_eq;

fn encode(value: &ConstantValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_one(&mut out, value).unwrap();
    out
}

#[test]
#[allow(clippy::approx_constant)]
fn number_layout() {
    let bytes = encode(&ConstantValue::Number(3.14));
    let mut expected = vec![0x01];
    expected.extend_from_slice(&3.14f64.to_le_bytes());
    assert_eq!(bytes, expected);
    assert_eq!(encoded_size(&ConstantValue::Number(3.14)), 8);
}

#[test]
fn every_kind_decodes_back_with_the_reader_advanced() {
    let values = [
        ConstantValue::Empty,
        ConstantValue::Number(-0.5),
        ConstantValue::Text("abc".into()),
        ConstantValue::Text("Ωmega".into()),
        ConstantValue::Boolean(true),
        ConstantValue::error(ErrorKind::Div0),
    ];
    let mut bytes = Vec::new();
    for value in &values {
        let before = bytes.len();
        encode_one(&mut bytes, value).unwrap();
        assert_eq!(bytes.len() - before, 1 + encoded_size(value), "{value:?}");
    }

    let mut reader = ByteReader::new(&bytes);
    for value in &values {
        assert_eq!(&decode_one(&mut reader).unwrap(), value);
    }
    assert!(reader.is_empty());
}

#[test]
fn string_encoding_is_compressed_when_possible() {
    assert_eq!(
        encode(&ConstantValue::Text("ab".into())),
        vec![0x02, 0x02, 0x00, 0x00, b'a', b'b']
    );
    assert_eq!(
        encode(&ConstantValue::Text("Ω".into())),
        vec![0x02, 0x01, 0x00, 0x01, 0xA9, 0x03]
    );
}

#[test]
fn fixed_width_kinds_pad_to_eight_bytes() {
    assert_eq!(encode(&ConstantValue::Empty), vec![0x00; 9]);
    assert_eq!(
        encode(&ConstantValue::Boolean(true)),
        vec![0x04, 1, 0, 0, 0, 0, 0, 0, 0]
    );
    assert_eq!(
        encode(&ConstantValue::error(ErrorKind::NA)),
        vec![0x10, 0x2A, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn malformed_constants() {
    let mut reader = ByteReader::new(&[0x03, 0, 0]);
    assert_eq!(
        decode_one(&mut reader),
        Err(ConstantDecodeError::UnknownTag { offset: 0, tag: 0x03 })
    );

    let mut reader = ByteReader::new(&[0x01, 0, 0]);
    assert_eq!(
        decode_one(&mut reader),
        Err(ConstantDecodeError::UnexpectedEof {
            offset: 0,
            needed: 8,
            remaining: 2,
        })
    );
}

#[test]
fn boolean_reserved_bytes_are_ignored() {
    let bytes = [0x04, 0x01, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11, 0x1E];
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(decode_one(&mut reader), Ok(ConstantValue::Boolean(true)));
    assert_eq!(reader.position(), 9, "reserved bytes are still consumed");

    let mut reader = ByteReader::new(&[0x04, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(decode_one(&mut reader), Ok(ConstantValue::Boolean(false)));

    let mut reader = ByteReader::new(&[0x04, 0x02, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(
        decode_one(&mut reader),
        Err(ConstantDecodeError::InvalidBoolean { offset: 0, value: 2 })
    );
}

#[test]
fn constants_convert_to_values() {
    assert_eq!(
        ConstantValue::error(ErrorKind::Ref).to_value(),
        formula_ptg::ValueEval::Error(ErrorKind::Ref)
    );
    assert_eq!(
        ConstantValue::ErrorCode(0x99).to_value(),
        formula_ptg::ValueEval::Error(ErrorKind::Value)
    );
    assert_eq!(ConstantValue::Empty.to_value(), formula_ptg::ValueEval::Blank);
}

#[test]
fn constants_serialize_for_diagnostics() {
    let json = serde_json::to_string(&ConstantValue::Boolean(true)).unwrap();
    let back: ConstantValue = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ConstantValue::Boolean(true));
}
