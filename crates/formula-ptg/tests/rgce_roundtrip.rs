mod common;

use formula_ptg::{ArrayConstant, ConstantValue, ErrorKind, Formula, Operator, Token};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn constant() -> impl Strategy<Value = ConstantValue> {
    prop_oneof![
        Just(ConstantValue::Empty),
        (-1.0e12f64..1.0e12).prop_map(ConstantValue::Number),
        "[a-zA-Z0-9 ]{0,12}".prop_map(ConstantValue::Text),
        "[\u{0100}-\u{04FF}]{1,4}".prop_map(ConstantValue::Text),
        any::<bool>().prop_map(ConstantValue::Boolean),
        prop::sample::select(ErrorKind::ALL.to_vec()).prop_map(ConstantValue::error),
    ]
}

fn array() -> impl Strategy<Value = ArrayConstant> {
    (1usize..=4, 1usize..=4).prop_flat_map(|(rows, cols)| {
        prop::collection::vec(constant(), rows * cols)
            .prop_map(move |values| ArrayConstant::new(rows, cols, values).unwrap())
    })
}

/// `a1 & a2 & ... & an` over array literals, or a lone number when there are none.
fn formula_over(arrays: Vec<ArrayConstant>) -> Formula {
    let mut tokens = Vec::new();
    if arrays.is_empty() {
        tokens.push(Token::number(2.5));
    }
    for (i, array) in arrays.into_iter().enumerate() {
        tokens.push(Token::array(array));
        if i > 0 {
            tokens.push(Token::op(Operator::Concat));
        }
    }
    tokens.push(Token::text("tail"));
    tokens.push(Token::op(Operator::Concat));
    Formula::new(tokens)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0),
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn formulas_with_array_literals_round_trip(arrays in prop::collection::vec(array(), 0..=4)) {
        let formula = formula_over(arrays);
        let bytes = formula.encode().unwrap();
        let decoded = Formula::decode(&bytes, formula.token_stream_len()).unwrap();
        prop_assert_eq!(decoded, formula);
    }

    #[test]
    fn decoding_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..=64)) {
        let len = bytes.len();
        for cce in [0, len / 2, len] {
            let _ = Formula::decode(&bytes, cce);
        }
    }
}

#[test]
fn array_dimensions_are_stored_minus_one() {
    // 3 rows x 2 columns
    let values = (1..=6).map(|n| ConstantValue::Number(n as f64)).collect();
    let formula = Formula::new(vec![Token::array(ArrayConstant::new(3, 2, values).unwrap())]);
    let encoded = formula.encode_parts().unwrap();

    assert_eq!(encoded.rgce, vec![0x60, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(&encoded.rgcb[..3], &[0x01, 0x02, 0x00]);
    // First constant is row 0 / col 0, the second row 0 / col 1.
    assert_eq!(encoded.rgcb[3], 0x01);
    assert_eq!(&encoded.rgcb[4..12], &1.0f64.to_le_bytes());
    assert_eq!(&encoded.rgcb[13..21], &2.0f64.to_le_bytes());

    let decoded = Formula::decode(&encoded.to_bytes(), encoded.cce()).unwrap();
    let Token::Array { array: Some(array), .. } = &decoded.tokens()[0] else {
        panic!("expected an array literal");
    };
    assert_eq!((array.cols(), array.rows()), (2, 3));
    assert_eq!(array.get(2, 1), Some(&ConstantValue::Number(6.0)));
}

#[test]
fn multiple_arrays_keep_token_order_in_the_payload() {
    let first = ArrayConstant::new(1, 1, vec![ConstantValue::Text("a".into())]).unwrap();
    let second =
        ArrayConstant::new(1, 2, vec![ConstantValue::Boolean(true), ConstantValue::Empty]).unwrap();
    let formula = Formula::new(vec![
        Token::array(first.clone()),
        Token::array(second.clone()),
        Token::op(Operator::Add),
    ]);
    let encoded = formula.encode_parts().unwrap();
    assert_eq!(encoded.rgcb.len(), first.payload_size() + second.payload_size());
    assert_eq!(encoded.rgcb[..3], [0x00, 0x00, 0x00]);
    assert_eq!(encoded.rgcb[first.payload_size()], 0x01);

    let decoded = Formula::decode(&encoded.to_bytes(), encoded.cce()).unwrap();
    assert_eq!(decoded, formula);
}

#[test]
fn tokens_without_trailing_data_have_no_rgcb() {
    let formula = Formula::new(vec![
        Token::cell(0, 0),
        Token::cell(0, 1),
        Token::op(Operator::Add),
    ]);
    let encoded = formula.encode_parts().unwrap();
    assert!(encoded.rgcb.is_empty());
    assert_eq!(
        encoded.rgce,
        vec![0x44, 0x00, 0x00, 0x00, 0xC0, 0x44, 0x00, 0x00, 0x01, 0xC0, 0x03]
    );
}

#[test]
fn function_calls_round_trip_with_their_flags() {
    let formula = Formula::new(vec![
        Token::int(1),
        Token::int(2),
        common::call("SUM", 2),
        common::call("ABS", 1),
    ]);
    let bytes = formula.encode().unwrap();
    // Value-class PtgFuncVar SUM/2, then PtgFunc ABS.
    assert_eq!(&bytes[6..10], &[0x42, 0x02, 0x04, 0x00]);
    assert_eq!(&bytes[10..13], &[0x41, 0x18, 0x00]);
    assert_eq!(Formula::decode(&bytes, bytes.len()).unwrap(), formula);
}
