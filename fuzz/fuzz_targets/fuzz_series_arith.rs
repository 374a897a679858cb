#![no_main]

use libfuzzer_sys::fuzz_target;
use lf_frame::Series;
use lf_types::Scalar;

fn decode(bytes: &[u8]) -> Vec<Scalar> {
    bytes
        .chunks(2)
        .map(|chunk| match chunk {
            [0, _] => Scalar::Null,
            [1, v] => Scalar::Float64(f64::from(*v) / 7.0),
            [_, v] => Scalar::Int64(i64::from(*v) - 128),
            _ => Scalar::Int64(i64::from(chunk[0])),
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let (left, right) = rest.split_at((split as usize).min(rest.len()));
    let Ok(series) = Series::from_values("fuzz", None, decode(left)) else {
        return;
    };
    let other = decode(right);

    for result in [
        series.add(other.as_slice()),
        series.sub(other.as_slice()),
        series.mul(other.as_slice()),
        series.div(other.as_slice()),
    ] {
        let out = result.expect("numeric operands never fail");
        assert_eq!(out.len(), series.len());
        assert_eq!(out.index(), series.index());
    }

    let sorted = series.sort_values(true);
    assert_eq!(sorted.len(), series.len());
    let _ = series.sum();
    let _ = series.variance();
});
