#![forbid(unsafe_code)]

use std::fmt;

use indexmap::IndexMap;
use lf_columnar::{ArithmeticOp, Column, ColumnError, reduction_input, validate_periods};
use lf_index::{Index, IndexError, IndexLabel, align_positional, parse_index};
use lf_types::{DType, Scalar, TypeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row as an ordered mapping of column name to value.
pub type Row = IndexMap<String, Scalar>;

const DISPLAY_ROWS: usize = 10;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("index length ({index_len}) does not match column length ({column_len})")]
    LengthMismatch { index_len: usize, column_len: usize },
    #[error("columns must be a list of the same dimension: expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("KeyError: {0} not found")]
    KeyNotFound(String),
    #[error("invalid axis {axis}: expected 0 or 1")]
    InvalidAxis { axis: usize },
    #[error("{op} is not implemented for axis {axis}")]
    AxisNotImplemented { op: &'static str, axis: usize },
    #[error("{op} does not support a {operand} operand")]
    UnsupportedOperand {
        op: &'static str,
        operand: &'static str,
    },
    #[error("row {position} is out of bounds for length {len}")]
    RowOutOfBounds { position: usize, len: usize },
    #[error("column {name:?} has {column_len} values but the index has {index_len} labels")]
    MisalignedColumn {
        name: String,
        index_len: usize,
        column_len: usize,
    },
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Right-hand side of an elementwise operation. Sequences and series are
/// paired by position, never by label.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Scalar(&'a Scalar),
    Sequence(&'a [Scalar]),
    Series(&'a Series),
}

impl<'a> From<&'a Scalar> for Operand<'a> {
    fn from(value: &'a Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl<'a> From<&'a [Scalar]> for Operand<'a> {
    fn from(value: &'a [Scalar]) -> Self {
        Self::Sequence(value)
    }
}

impl<'a> From<&'a Series> for Operand<'a> {
    fn from(value: &'a Series) -> Self {
        Self::Series(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    index: Index,
    column: Column,
}

impl Series {
    pub fn new(name: impl Into<String>, index: Index, column: Column) -> Result<Self, FrameError> {
        if index.len() != column.len() {
            return Err(FrameError::LengthMismatch {
                index_len: index.len(),
                column_len: column.len(),
            });
        }

        Ok(Self {
            name: name.into(),
            index,
            column,
        })
    }

    /// Build from raw values; without explicit labels the index is `0..n`.
    pub fn from_values(
        name: impl Into<String>,
        index_labels: Option<Vec<IndexLabel>>,
        values: Vec<Scalar>,
    ) -> Result<Self, FrameError> {
        let index = parse_index(index_labels, values.len())?;
        let column = Column::from_values(values);
        Self::new(name, index, column)
    }

    /// Copy another series, optionally overriding its name or its labels.
    pub fn from_series(
        source: &Series,
        name: Option<String>,
        index_labels: Option<Vec<IndexLabel>>,
    ) -> Result<Self, FrameError> {
        let index = match index_labels {
            Some(labels) => parse_index(Some(labels), source.len())?,
            None => source.index.clone(),
        };
        Self::new(
            name.unwrap_or_else(|| source.name.clone()),
            index,
            source.column.clone(),
        )
    }

    /// A length-1 series holding `value`.
    #[must_use]
    pub fn from_scalar(name: impl Into<String>, value: Scalar) -> Self {
        Self {
            name: name.into(),
            index: Index::range(1),
            column: Column::from_values(vec![value]),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Replace the index wholesale; explicit labels must match the length.
    pub fn set_index(&mut self, labels: Option<Vec<IndexLabel>>) -> Result<(), FrameError> {
        self.index = parse_index(labels, self.len())?;
        Ok(())
    }

    #[must_use]
    pub fn column(&self) -> &Column {
        &self.column
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        self.column.values()
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.column.dtype()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.column.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    /// Number of non-missing values.
    #[must_use]
    pub fn count(&self) -> usize {
        self.column.validity().count_valid()
    }

    pub fn at(&self, position: usize) -> Result<&Scalar, FrameError> {
        Ok(self.column.at(position)?)
    }

    /// Positional half-open slice carrying the matching index labels.
    #[must_use]
    pub fn iloc(&self, start: isize, end: isize) -> Self {
        Self {
            name: self.name.clone(),
            index: self.index.slice(start, end),
            column: self.column.slice(start, end),
        }
    }

    pub fn add<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.binary(other.into(), ArithmeticOp::Add)
    }

    pub fn sub<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.binary(other.into(), ArithmeticOp::Sub)
    }

    pub fn mul<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.binary(other.into(), ArithmeticOp::Mul)
    }

    pub fn div<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.binary(other.into(), ArithmeticOp::Div)
    }

    /// Elementwise op against a broadcast scalar or a positionally zipped
    /// sequence/series. Missing right-hand positions produce `Null`; the
    /// result keeps this series' name and index.
    pub fn binary(&self, operand: Operand<'_>, op: ArithmeticOp) -> Result<Self, FrameError> {
        let column = match operand {
            Operand::Scalar(scalar) => {
                if matches!(scalar, Scalar::Utf8(_)) {
                    return Err(FrameError::UnsupportedOperand {
                        op: op.name(),
                        operand: "string",
                    });
                }
                self.column.binary_scalar(scalar, op)?
            }
            Operand::Sequence(values) => self.binary_positional(values, op)?,
            Operand::Series(other) => self.binary_positional(other.values(), op)?,
        };

        Self::new(self.name.clone(), self.index.clone(), column)
    }

    fn binary_positional(&self, values: &[Scalar], op: ArithmeticOp) -> Result<Column, FrameError> {
        let plan = align_positional(&self.index, values.len());
        let right = Column::new(self.column.dtype(), values.to_vec())
            .reindex_by_positions(&plan.right_positions);
        Ok(self.column.binary_numeric(&right, op)?)
    }

    pub fn pct_change(&self, periods: i64) -> Result<Self, FrameError> {
        let column = self.column.pct_change(periods)?;
        Self::new(self.name.clone(), self.index.clone(), column)
    }

    /// Convert to `target`. Converting to `int` floors into a new series;
    /// converting to `float` retags the existing values and hands the same
    /// series back, so callers must always use the returned value.
    pub fn astype(mut self, target: DType) -> Result<Self, FrameError> {
        if self.dtype() == target {
            return Ok(self);
        }

        match target {
            DType::Int64 => {
                let column = self.column.to_int()?;
                Self::new(self.name, self.index, column)
            }
            DType::Float64 => {
                self.column.promote_float()?;
                Ok(self)
            }
            DType::Object => Err(TypeError::InvalidCast {
                from: self.dtype(),
                to: target,
            }
            .into()),
        }
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.column.sum()
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.column.mean()
    }

    /// Sample variance (divisor `len - 1`); NaN for fewer than two values.
    #[must_use]
    pub fn variance(&self) -> f64 {
        self.column.variance()
    }

    #[must_use]
    pub fn std(&self) -> f64 {
        self.column.std()
    }

    /// Sort by value, carrying each value's label along. Stable; missing
    /// values end up last in either direction.
    #[must_use]
    pub fn sort_values(&self, ascending: bool) -> Self {
        let order = self.column.sort_positions(ascending);
        Self {
            name: self.name.clone(),
            index: self.index.take(&order),
            column: self.column.take(&order),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scalar> {
        self.values().iter()
    }

    /// Values paired with their position.
    pub fn iter_enumerated(&self) -> impl Iterator<Item = (&Scalar, usize)> + '_ {
        self.values().iter().zip(0..)
    }

    /// Apply `func(value, position)` to every value.
    #[must_use]
    pub fn map<F>(&self, mut func: F) -> Self
    where
        F: FnMut(&Scalar, usize) -> Scalar,
    {
        let values = self
            .iter_enumerated()
            .map(|(value, pos)| func(value, pos))
            .collect();
        Self {
            name: self.name.clone(),
            index: self.index.clone(),
            column: Column::from_values(values),
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Scalar;
    type IntoIter = std::slice::Iter<'a, Scalar>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.index.labels().iter().zip(self.values()).take(DISPLAY_ROWS) {
            writeln!(f, "{label}\t{value}")?;
        }
        write!(f, "Name: {}, dtype: {}", self.name, self.dtype())
    }
}

/// Table of named columns sharing one row index. Column order is insertion
/// order. Columns built from heterogeneous rows may be shorter than the
/// table; reads past a short column's end yield `Null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    index: Index,
    columns: IndexMap<String, Column>,
}

impl DataFrame {
    /// Strict constructor: every column must match the index length.
    pub fn new(index: Index, columns: IndexMap<String, Column>) -> Result<Self, FrameError> {
        for column in columns.values() {
            if column.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    index_len: index.len(),
                    column_len: column.len(),
                });
            }
        }

        Ok(Self { index, columns })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from row records. The column set is the union of keys in
    /// first-seen order and each column collects only the rows that carry
    /// it, in arrival order, so heterogeneous rows give ragged columns.
    pub fn from_rows(
        rows: Vec<Row>,
        index_labels: Option<Vec<IndexLabel>>,
    ) -> Result<Self, FrameError> {
        let index = parse_index(index_labels, rows.len())?;

        let mut data = IndexMap::<String, Vec<Scalar>>::new();
        for row in rows {
            for (name, value) in row {
                data.entry(name).or_default().push(value);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            rows = index.len(),
            columns = data.len(),
            "dataframe built from rows"
        );

        let columns = data
            .into_iter()
            .map(|(name, values)| (name, Column::from_values(values)))
            .collect();
        Ok(Self { index, columns })
    }

    /// Build from named series. The shared index is taken from the first
    /// series; the others are not checked against it (see
    /// [`DataFrame::validate_alignment`]).
    #[must_use]
    pub fn from_series_map(series: IndexMap<String, Series>) -> Self {
        let index = series
            .values()
            .next()
            .map(|first| first.index.clone())
            .unwrap_or_default();
        let columns = series
            .into_iter()
            .map(|(name, series)| (name, series.column))
            .collect();
        Self { index, columns }
    }

    /// Check that every column has exactly one value per index label.
    pub fn validate_alignment(&self) -> Result<(), FrameError> {
        for (name, column) in &self.columns {
            if column.len() != self.index.len() {
                return Err(FrameError::MisalignedColumn {
                    name: name.clone(),
                    index_len: self.index.len(),
                    column_len: column.len(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Re-derive the index against the first column's length.
    pub fn set_index(&mut self, labels: Option<Vec<IndexLabel>>) -> Result<(), FrameError> {
        let first_len = self.columns.values().next().map_or(0, Column::len);
        self.index = parse_index(labels, first_len)?;
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &IndexMap<String, Column> {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column_exists(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Rename every column at once; `names` must match the column count.
    pub fn set_columns(&mut self, names: Vec<String>) -> Result<(), FrameError> {
        if names.len() != self.columns.len() {
            return Err(FrameError::ColumnCountMismatch {
                expected: self.columns.len(),
                actual: names.len(),
            });
        }

        for (pos, name) in names.iter().enumerate() {
            if names[..pos].contains(name) {
                return Err(FrameError::DuplicateColumn(name.clone()));
            }
        }

        let columns = std::mem::take(&mut self.columns);
        self.columns = names.into_iter().zip(columns.into_values()).collect();
        Ok(())
    }

    /// Look a column up by name as a series carrying the row labels.
    pub fn get(&self, name: &str) -> Result<Series, FrameError> {
        let column = self
            .columns
            .get(name)
            .ok_or_else(|| FrameError::KeyNotFound(name.to_owned()))?;
        let index = self.row_index().slice(0, column.len() as isize);
        Series::new(name, index, column.clone())
    }

    /// Row count: the longest column.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.values().map(Column::len).max().unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-column values in column order.
    #[must_use]
    pub fn values(&self) -> Vec<&[Scalar]> {
        self.columns.values().map(Column::values).collect()
    }

    /// Value at a row position, null-filled for short columns.
    pub fn cell(&self, name: &str, position: usize) -> Result<Scalar, FrameError> {
        let column = self
            .columns
            .get(name)
            .ok_or_else(|| FrameError::KeyNotFound(name.to_owned()))?;
        self.check_row(position)?;
        Ok(column.value(position).cloned().unwrap_or(Scalar::Null))
    }

    pub fn row(&self, position: usize) -> Result<Row, FrameError> {
        self.check_row(position)?;
        Ok(self.row_unchecked(position))
    }

    /// Rows as records, in position order.
    pub fn iter_rows(&self) -> impl Iterator<Item = (usize, Row)> + '_ {
        (0..self.len()).map(|pos| (pos, self.row_unchecked(pos)))
    }

    /// Single-row frames paired with their position.
    pub fn iterrows(&self) -> impl Iterator<Item = (usize, DataFrame)> + '_ {
        (0..self.len()).map(|pos| {
            let columns = self
                .columns
                .iter()
                .map(|(name, column)| {
                    let value = column.value(pos).cloned().unwrap_or(Scalar::Null);
                    (name.clone(), Column::new(column.dtype(), vec![value]))
                })
                .collect();
            let index = Index::new(vec![self.row_label(pos)]);
            (pos, DataFrame { index, columns })
        })
    }

    /// Reductions never fail on content: a string cell makes its column's
    /// (axis 0) or row's (axis 1) entry NaN.
    pub fn sum(&self, axis: usize) -> Result<Series, FrameError> {
        match axis {
            0 => self.reduce_columns(Column::sum),
            1 => self.reduce_rows(|values, _| values.iter().sum()),
            _ => Err(FrameError::InvalidAxis { axis }),
        }
    }

    /// Row means divide each value by the column count.
    pub fn mean(&self, axis: usize) -> Result<Series, FrameError> {
        match axis {
            0 => self.reduce_columns(Column::mean),
            1 => self.reduce_rows(row_mean),
            _ => Err(FrameError::InvalidAxis { axis }),
        }
    }

    /// Row variances use `width - 1` as divisor, column variances `len - 1`.
    pub fn variance(&self, axis: usize) -> Result<Series, FrameError> {
        match axis {
            0 => self.reduce_columns(Column::variance),
            1 => self.reduce_rows(row_variance),
            _ => Err(FrameError::InvalidAxis { axis }),
        }
    }

    pub fn std(&self, axis: usize) -> Result<Series, FrameError> {
        match axis {
            0 => self.reduce_columns(Column::std),
            1 => self.reduce_rows(|values, width| row_variance(values, width).sqrt()),
            _ => Err(FrameError::InvalidAxis { axis }),
        }
    }

    /// Column-wise percent change; row-wise is not supported.
    pub fn pct_change(&self, periods: i64, axis: usize) -> Result<Self, FrameError> {
        validate_periods(periods)?;

        match axis {
            0 => {
                let columns = self
                    .columns
                    .iter()
                    .map(|(name, column)| {
                        column
                            .pct_change(periods)
                            .map(|changed| (name.clone(), changed))
                    })
                    .collect::<Result<IndexMap<_, _>, ColumnError>>()?;
                Ok(Self {
                    index: self.index.clone(),
                    columns,
                })
            }
            1 => Err(FrameError::AxisNotImplemented {
                op: "pct_change",
                axis,
            }),
            _ => Err(FrameError::InvalidAxis { axis }),
        }
    }

    fn check_row(&self, position: usize) -> Result<(), FrameError> {
        let len = self.len();
        if position >= len {
            return Err(FrameError::RowOutOfBounds { position, len });
        }
        Ok(())
    }

    fn row_unchecked(&self, position: usize) -> Row {
        self.columns
            .iter()
            .map(|(name, column)| {
                (
                    name.clone(),
                    column.value(position).cloned().unwrap_or(Scalar::Null),
                )
            })
            .collect()
    }

    fn row_label(&self, position: usize) -> IndexLabel {
        self.index
            .get(position)
            .cloned()
            .unwrap_or(IndexLabel::Int64(position as i64))
    }

    /// Labels for `0..len()`, borrowing the index where it reaches and
    /// falling back to positions past its end.
    fn row_index(&self) -> Index {
        if self.index.len() == self.len() {
            return self.index.clone();
        }
        Index::new((0..self.len()).map(|pos| self.row_label(pos)).collect())
    }

    fn reduce_columns(
        &self,
        reduce: impl Fn(&Column) -> f64,
    ) -> Result<Series, FrameError> {
        let mut labels = Vec::with_capacity(self.columns.len());
        let mut values = Vec::with_capacity(self.columns.len());
        for (name, column) in &self.columns {
            labels.push(IndexLabel::from(name.as_str()));
            values.push(Scalar::Float64(reduce(column)));
        }
        Series::new("", Index::new(labels), Column::new(DType::Float64, values))
    }

    fn reduce_rows(
        &self,
        reduce: impl Fn(&[f64], usize) -> f64,
    ) -> Result<Series, FrameError> {
        let width = self.columns.len();
        let mut row = Vec::with_capacity(width);
        let mut values = Vec::with_capacity(self.len());
        for pos in 0..self.len() {
            row.clear();
            for column in self.columns.values() {
                let value = column.value(pos).unwrap_or(&Scalar::Null);
                row.push(reduction_input(value));
            }
            values.push(Scalar::Float64(reduce(&row, width)));
        }
        Series::new("", self.row_index(), Column::new(DType::Float64, values))
    }
}

fn row_mean(values: &[f64], width: usize) -> f64 {
    values.iter().map(|value| value / width as f64).sum()
}

fn row_variance(values: &[f64], width: usize) -> f64 {
    let mean = row_mean(values, width);
    let denom = width as f64 - 1.0;
    values
        .iter()
        .map(|value| {
            let diff = value - mean;
            diff * diff / denom
        })
        .sum()
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut header = String::from("\t|");
        for name in self.columns.keys() {
            header.push_str(&format!("  {name}  |"));
        }
        writeln!(f, "{header}")?;
        writeln!(f, "{}", "-".repeat(header.len()))?;

        for (pos, row) in self.iter_rows() {
            write!(f, "{}\t|", self.row_label(pos))?;
            for value in row.values() {
                write!(f, "  {value}  |")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
