#![forbid(unsafe_code)]

use lf_index::resolve_bounds;
use lf_types::{DType, Scalar, TypeError, cast_scalar, infer_dtype};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityMask {
    bits: Vec<bool>,
}

impl ValidityMask {
    #[must_use]
    pub fn from_values(values: &[Scalar]) -> Self {
        let bits = values.iter().map(|value| !value.is_missing()).collect();
        Self { bits }
    }

    #[must_use]
    pub fn is_valid(&self, idx: usize) -> bool {
        self.bits.get(idx).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn count_valid(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }
}

/// Ordered values plus the dtype tag inferred (or assigned) at construction.
/// The tag is advisory; values are never coerced to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
    validity: ValidityMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("column length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("position {position} is out of bounds for length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
    #[error("periods must be a positive integer, got {periods}")]
    InvalidPeriods { periods: i64 },
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl Column {
    #[must_use]
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Self {
        let validity = ValidityMask::from_values(&values);
        Self {
            dtype,
            values,
            validity,
        }
    }

    #[must_use]
    pub fn from_values(values: Vec<Scalar>) -> Self {
        let dtype = infer_dtype(&values);
        Self::new(dtype, values)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    pub fn at(&self, position: usize) -> Result<&Scalar, ColumnError> {
        self.values
            .get(position)
            .ok_or(ColumnError::PositionOutOfBounds {
                position,
                len: self.len(),
            })
    }

    #[must_use]
    pub fn validity(&self) -> &ValidityMask {
        &self.validity
    }

    /// Half-open positional slice; keeps the dtype tag.
    #[must_use]
    pub fn slice(&self, start: isize, end: isize) -> Self {
        let (start, end) = resolve_bounds(self.len(), start, end);
        Self::new(self.dtype, self.values[start..end].to_vec())
    }

    /// Values at the given positions; used for sort permutations.
    #[must_use]
    pub fn take(&self, positions: &[usize]) -> Self {
        let values = positions
            .iter()
            .filter_map(|pos| self.values.get(*pos).cloned())
            .collect();
        Self::new(self.dtype, values)
    }

    /// Gather by optional positions; `None` or a position past the end reads
    /// as `Null`.
    #[must_use]
    pub fn reindex_by_positions(&self, positions: &[Option<usize>]) -> Self {
        let values = positions
            .iter()
            .map(|slot| {
                slot.and_then(|idx| self.values.get(idx))
                    .cloned()
                    .unwrap_or(Scalar::Null)
            })
            .collect::<Vec<_>>();

        Self::from_values(values)
    }

    pub fn binary_numeric(&self, right: &Self, op: ArithmeticOp) -> Result<Self, ColumnError> {
        if self.len() != right.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: right.len(),
            });
        }

        let values = self
            .values
            .iter()
            .zip(&right.values)
            .map(|(left, right)| apply_op(left, right, op))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_values(values))
    }

    pub fn binary_scalar(&self, right: &Scalar, op: ArithmeticOp) -> Result<Self, ColumnError> {
        let values = self
            .values
            .iter()
            .map(|left| apply_op(left, right, op))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_values(values))
    }

    /// Plain accumulation over [`reduction_input`]: `Null` contributes zero,
    /// NaN propagates and a string turns the result into NaN.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.values.iter().map(reduction_input).sum()
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.sum() / self.len() as f64
    }

    /// Sample variance with divisor `len - 1`. A column of length 0 or 1
    /// yields NaN.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.len() <= 1 {
            return f64::NAN;
        }

        let mean = self.mean();
        let denom = (self.len() - 1) as f64;
        self.values
            .iter()
            .map(|value| {
                let diff = reduction_input(value) - mean;
                diff * diff / denom
            })
            .sum()
    }

    #[must_use]
    pub fn std(&self) -> f64 {
        self.variance().sqrt()
    }

    /// `value[i] / value[i - periods] - 1`, with the first `periods` entries
    /// and any entry touching a missing value left `Null`.
    pub fn pct_change(&self, periods: i64) -> Result<Self, ColumnError> {
        let lag = validate_periods(periods)?;

        let mut values = Vec::with_capacity(self.len());
        for idx in 0..self.len() {
            if idx < lag
                || !self.validity.is_valid(idx)
                || !self.validity.is_valid(idx - lag)
            {
                values.push(Scalar::Null);
                continue;
            }
            let current = self.values[idx].to_f64()?;
            let previous = self.values[idx - lag].to_f64()?;
            values.push(Scalar::Float64(current / previous - 1.0));
        }

        Ok(Self::new(DType::Float64, values))
    }

    /// Stable permutation ordering the values; missing values stay last in
    /// both directions.
    #[must_use]
    pub fn sort_positions(&self, ascending: bool) -> Vec<usize> {
        let mut positions = (0..self.len()).collect::<Vec<_>>();
        positions.sort_by(|a, b| {
            let (left, right) = (&self.values[*a], &self.values[*b]);
            match (left.is_missing(), right.is_missing()) {
                (false, false) if !ascending => right.value_cmp(left),
                _ => left.value_cmp(right),
            }
        });
        positions
    }

    /// Floor every value into a new `int` column.
    pub fn to_int(&self) -> Result<Self, ColumnError> {
        if self.dtype == DType::Object {
            return Err(TypeError::InvalidCast {
                from: DType::Object,
                to: DType::Int64,
            }
            .into());
        }
        let values = self
            .values
            .iter()
            .map(|value| cast_scalar(value, DType::Int64))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(DType::Int64, values))
    }

    /// Retag as `float` in place. Values are left untouched since the widening
    /// is lossless and shape-preserving.
    pub fn promote_float(&mut self) -> Result<(), ColumnError> {
        if self.dtype == DType::Object {
            return Err(TypeError::InvalidCast {
                from: DType::Object,
                to: DType::Float64,
            }
            .into());
        }
        self.dtype = DType::Float64;
        Ok(())
    }

}

pub fn validate_periods(periods: i64) -> Result<usize, ColumnError> {
    usize::try_from(periods)
        .ok()
        .filter(|lag| *lag > 0)
        .ok_or(ColumnError::InvalidPeriods { periods })
}

/// Numeric view used by reductions: `Null` reads as zero, bools as 0/1 and
/// strings as NaN. Reductions never fail on content.
#[must_use]
pub fn reduction_input(value: &Scalar) -> f64 {
    match value {
        Scalar::Null => 0.0,
        Scalar::Bool(flag) => f64::from(u8::from(*flag)),
        Scalar::Int64(v) => *v as f64,
        Scalar::Float64(v) => *v,
        Scalar::Utf8(_) => f64::NAN,
    }
}

/// Elementwise kernel shared by column/column and column/scalar paths.
pub fn apply_op(left: &Scalar, right: &Scalar, op: ArithmeticOp) -> Result<Scalar, ColumnError> {
    if matches!(left, Scalar::Null) || matches!(right, Scalar::Null) {
        return Ok(Scalar::Null);
    }

    if let (Scalar::Int64(a), Scalar::Int64(b)) = (left, right) {
        let exact = match op {
            ArithmeticOp::Add => a.checked_add(*b),
            ArithmeticOp::Sub => a.checked_sub(*b),
            ArithmeticOp::Mul => a.checked_mul(*b),
            ArithmeticOp::Div => None,
        };
        if let Some(value) = exact {
            return Ok(Scalar::Int64(value));
        }
    }

    let lhs = left.to_f64()?;
    let rhs = right.to_f64()?;
    let result = match op {
        ArithmeticOp::Add => lhs + rhs,
        ArithmeticOp::Sub => lhs - rhs,
        ArithmeticOp::Mul => lhs * rhs,
        ArithmeticOp::Div => lhs / rhs,
    };
    Ok(Scalar::Float64(result))
}

#[cfg(test)]
mod tests {
    use lf_types::{DType, Scalar};

    use super::{ArithmeticOp, Column, ColumnError};

    fn ints(values: &[i64]) -> Column {
        Column::from_values(values.iter().copied().map(Scalar::Int64).collect())
    }

    #[test]
    fn reindex_injects_missing_values() {
        let column = ints(&[10, 20]);
        let out = column.reindex_by_positions(&[Some(1), None, Some(0), Some(9)]);

        assert_eq!(
            out.values(),
            &[
                Scalar::Int64(20),
                Scalar::Null,
                Scalar::Int64(10),
                Scalar::Null
            ]
        );
        assert_eq!(out.validity().count_valid(), 2);
    }

    #[test]
    fn numeric_addition_propagates_missing() {
        let left = Column::from_values(vec![
            Scalar::Int64(1),
            Scalar::Null,
            Scalar::Float64(f64::NAN),
        ]);
        let right = ints(&[2, 5, 3]);

        let out = left
            .binary_numeric(&right, ArithmeticOp::Add)
            .expect("add should pass");

        assert_eq!(out.values()[0], Scalar::Int64(3));
        assert_eq!(out.values()[1], Scalar::Null);
        assert!(out.values()[2].is_nan());
    }

    #[test]
    fn division_always_produces_floats() {
        let out = ints(&[3, 4])
            .binary_scalar(&Scalar::Int64(2), ArithmeticOp::Div)
            .expect("div");
        assert_eq!(out.values(), &[Scalar::Float64(1.5), Scalar::Float64(2.0)]);
        assert_eq!(out.dtype(), DType::Float64);
    }

    #[test]
    fn string_operand_is_a_type_error() {
        let err = ints(&[1])
            .binary_scalar(&Scalar::from("x"), ArithmeticOp::Mul)
            .expect_err("must fail");
        assert!(matches!(err, ColumnError::Type(_)));
    }

    #[test]
    fn reductions_follow_sample_statistics() {
        let column = ints(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(column.sum(), 40.0);
        assert_eq!(column.mean(), 5.0);
        let variance = column.variance();
        assert!((variance - 32.0 / 7.0).abs() < 1e-12);
        assert!((column.std() - variance.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn single_value_variance_is_nan() {
        assert!(ints(&[3]).variance().is_nan());
        assert!(ints(&[3]).std().is_nan());
    }

    #[test]
    fn strings_turn_reductions_into_nan() {
        let column = Column::from_values(vec![Scalar::Int64(1), Scalar::from("x"), Scalar::Null]);
        assert!(column.sum().is_nan());
        assert!(column.mean().is_nan());
        assert!(column.variance().is_nan());

        let with_null = Column::from_values(vec![Scalar::Int64(1), Scalar::Null, Scalar::Bool(true)]);
        assert_eq!(with_null.sum(), 2.0);
    }

    #[test]
    fn pct_change_leaves_leading_nulls() {
        let out = ints(&[10, 20, 40]).pct_change(1).expect("pct");
        assert_eq!(
            out.values(),
            &[Scalar::Null, Scalar::Float64(1.0), Scalar::Float64(1.0)]
        );

        let err = ints(&[1]).pct_change(0).expect_err("must fail");
        assert_eq!(err, ColumnError::InvalidPeriods { periods: 0 });
        let err = ints(&[1, 2]).pct_change(-1).expect_err("must fail");
        assert_eq!(err, ColumnError::InvalidPeriods { periods: -1 });
    }

    #[test]
    fn pct_change_past_the_end_keeps_the_length() {
        let out = ints(&[1, 2]).pct_change(5).expect("pct");
        assert_eq!(out.values(), &[Scalar::Null, Scalar::Null]);
        assert_eq!(out.dtype(), DType::Float64);

        let exact = ints(&[1, 2]).pct_change(2).expect("pct");
        assert_eq!(exact.len(), 2);
        assert!(exact.values().iter().all(Scalar::is_missing));
    }

    #[test]
    fn sort_positions_is_stable_with_missing_last() {
        let column = Column::from_values(vec![
            Scalar::Int64(3),
            Scalar::Null,
            Scalar::Int64(1),
            Scalar::Int64(3),
        ]);
        assert_eq!(column.sort_positions(true), vec![2, 0, 3, 1]);
        assert_eq!(column.sort_positions(false), vec![0, 3, 2, 1]);
    }

    #[test]
    fn int_conversion_floors_and_rejects_objects() {
        let column = Column::from_values(vec![Scalar::Float64(1.7), Scalar::Float64(-0.5)]);
        let out = column.to_int().expect("to_int");
        assert_eq!(out.values(), &[Scalar::Int64(1), Scalar::Int64(-1)]);
        assert_eq!(out.dtype(), DType::Int64);

        let objects = Column::from_values(vec![Scalar::from("a")]);
        assert!(objects.to_int().is_err());
    }

    #[test]
    fn float_promotion_only_retags() {
        let mut column = ints(&[1, 2]);
        column.promote_float().expect("promote");
        assert_eq!(column.dtype(), DType::Float64);
        assert_eq!(column.values(), &[Scalar::Int64(1), Scalar::Int64(2)]);
    }

    #[test]
    fn slice_reuses_sequence_semantics() {
        let column = ints(&[1, 2, 3, 4]);
        assert_eq!(column.slice(1, 3).values(), &[Scalar::Int64(2), Scalar::Int64(3)]);
        assert!(column.slice(5, 9).is_empty());
        assert!(matches!(
            column.at(4),
            Err(ColumnError::PositionOutOfBounds { position: 4, len: 4 })
        ));
    }
}
