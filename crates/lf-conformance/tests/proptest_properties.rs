#![forbid(unsafe_code)]

//! Property tests for ordering, arithmetic, reductions and merges over
//! generated inputs.

use proptest::prelude::*;

use lf_frame::{DataFrame, Row, Series};
use lf_io::write_csv_string;
use lf_join::{MergeHow, merge};
use lf_types::Scalar;

fn arb_int_or_null() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        4 => (-1_000i64..1_000i64).prop_map(Scalar::Int64),
        1 => Just(Scalar::Null),
    ]
}

fn arb_series(max_len: usize) -> impl Strategy<Value = Series> {
    proptest::collection::vec(arb_int_or_null(), 0..max_len).prop_filter_map(
        "series construction must succeed",
        |values| Series::from_values("s", None, values).ok(),
    )
}

fn arb_cell() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        4 => (-100i64..100i64).prop_map(Scalar::Int64),
        1 => "[a-z]{1,4}".prop_map(Scalar::Utf8),
    ]
}

/// Uniform frame: every row carries every column; cells mix ints and strings.
fn arb_frame(max_rows: usize, columns: &'static [&'static str]) -> impl Strategy<Value = DataFrame> {
    proptest::collection::vec(
        proptest::collection::vec(arb_cell(), columns.len()),
        0..max_rows,
    )
    .prop_filter_map("frame construction must succeed", move |rows| {
        let rows = rows
            .into_iter()
            .map(|values| {
                columns
                    .iter()
                    .zip(values)
                    .map(|(name, value)| ((*name).to_owned(), value))
                    .collect::<Row>()
            })
            .collect();
        DataFrame::from_rows(rows, None).ok()
    })
}

fn keyed_frame(keys: &[i64], value_column: &str) -> DataFrame {
    let rows = keys
        .iter()
        .enumerate()
        .map(|(pos, key)| {
            Row::from_iter([
                ("k".to_owned(), Scalar::Int64(*key)),
                (value_column.to_owned(), Scalar::Int64(pos as i64)),
            ])
        })
        .collect();
    DataFrame::from_rows(rows, None).expect("keyed frame")
}

fn sorted_present(values: &[Scalar]) -> Vec<i64> {
    let mut out = values
        .iter()
        .filter_map(|value| match value {
            Scalar::Int64(v) => Some(*v),
            _ => None,
        })
        .collect::<Vec<_>>();
    out.sort_unstable();
    out
}

proptest! {
    #[test]
    fn sort_values_is_monotonic_and_preserves_values(series in arb_series(40), ascending in any::<bool>()) {
        let sorted = series.sort_values(ascending);
        prop_assert_eq!(sorted.len(), series.len());
        prop_assert_eq!(sorted_present(sorted.values()), sorted_present(series.values()));

        let present = sorted
            .values()
            .iter()
            .take_while(|value| !value.is_missing())
            .filter_map(|value| match value {
                Scalar::Int64(v) => Some(*v),
                _ => None,
            })
            .collect::<Vec<_>>();
        for pair in present.windows(2) {
            if ascending {
                prop_assert!(pair[0] <= pair[1]);
            } else {
                prop_assert!(pair[0] >= pair[1]);
            }
        }
        // Missing values trail the present ones.
        let first_missing = sorted.values().iter().position(Scalar::is_missing);
        if let Some(pos) = first_missing {
            prop_assert!(sorted.values()[pos..].iter().all(Scalar::is_missing));
        }
    }

    #[test]
    fn scalar_add_then_sub_round_trips(series in arb_series(40), k in -1_000i64..1_000i64) {
        let k = Scalar::Int64(k);
        let out = series.add(&k).and_then(|s| s.sub(&k)).expect("round trip");
        prop_assert_eq!(out.values(), series.values());
        prop_assert_eq!(out.index(), series.index());
    }

    #[test]
    fn axis_reductions_have_one_value_per_column_or_row(frame in arb_frame(20, &["a", "b", "c"])) {
        prop_assert_eq!(frame.sum(0).expect("sum 0").len(), frame.num_columns());
        prop_assert_eq!(frame.mean(0).expect("mean 0").len(), frame.num_columns());
        prop_assert_eq!(frame.sum(1).expect("sum 1").len(), frame.len());
        prop_assert_eq!(frame.std(1).expect("std 1").len(), frame.len());
        prop_assert_eq!(frame.variance(0).expect("variance 0").len(), frame.num_columns());
        prop_assert_eq!(frame.mean(1).expect("mean 1").len(), frame.len());
    }

    #[test]
    fn merge_row_counts_follow_key_multiplicity(
        left_keys in proptest::collection::vec(0i64..5, 1..12),
        right_keys in proptest::collection::vec(0i64..5, 1..12),
    ) {
        let left = keyed_frame(&left_keys, "l");
        let right = keyed_frame(&right_keys, "r");

        let pairs = left_keys
            .iter()
            .map(|key| right_keys.iter().filter(|other| *other == key).count())
            .sum::<usize>();
        let unmatched_left = left_keys.iter().filter(|key| !right_keys.contains(key)).count();
        let unmatched_right = right_keys.iter().filter(|key| !left_keys.contains(key)).count();

        let inner = merge(&left, &right, Some(&["k"]), MergeHow::Inner).expect("inner");
        prop_assert_eq!(inner.len(), pairs);

        let outer = merge(&left, &right, Some(&["k"]), MergeHow::Outer).expect("outer");
        prop_assert_eq!(outer.len(), pairs + unmatched_left + unmatched_right);
        prop_assert!(outer.len() >= inner.len());
    }

    #[test]
    fn csv_output_has_one_line_per_row_plus_header(frame in arb_frame(15, &["x", "y"])) {
        let text = write_csv_string(&frame).expect("csv");
        let expected_lines = if frame.num_columns() == 0 { 1 } else { frame.len() + 1 };
        prop_assert_eq!(text.matches("\r\n").count(), expected_lines);
    }
}
