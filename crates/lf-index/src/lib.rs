#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexLabel {
    Int64(i64),
    Utf8(String),
}

impl From<i64> for IndexLabel {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<&str> for IndexLabel {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for IndexLabel {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl fmt::Display for IndexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
        }
    }
}

/// Ordered row (or column) labels. Duplicates are allowed; only positional
/// lookup is unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    labels: Vec<IndexLabel>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("index length ({index_len}) does not match values length ({values_len})")]
    LengthMismatch { index_len: usize, values_len: usize },
}

impl Index {
    #[must_use]
    pub fn new(labels: Vec<IndexLabel>) -> Self {
        Self { labels }
    }

    /// Default `0..len` labels.
    #[must_use]
    pub fn range(len: usize) -> Self {
        Self::new((0..len).map(|pos| IndexLabel::Int64(pos as i64)).collect())
    }

    #[must_use]
    pub fn from_i64(values: Vec<i64>) -> Self {
        Self::new(values.into_iter().map(IndexLabel::from).collect())
    }

    #[must_use]
    pub fn from_utf8(values: Vec<String>) -> Self {
        Self::new(values.into_iter().map(IndexLabel::from).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> &[IndexLabel] {
        &self.labels
    }

    #[must_use]
    pub fn get(&self, pos: usize) -> Option<&IndexLabel> {
        self.labels.get(pos)
    }

    /// Half-open positional slice. Negative bounds count from the end and
    /// both bounds are clamped, so an inverted range is simply empty.
    #[must_use]
    pub fn slice(&self, start: isize, end: isize) -> Self {
        let (start, end) = resolve_bounds(self.len(), start, end);
        Self::new(self.labels[start..end].to_vec())
    }

    /// Labels at the given positions, in the given order.
    #[must_use]
    pub fn take(&self, positions: &[usize]) -> Self {
        Self::new(
            positions
                .iter()
                .filter_map(|pos| self.labels.get(*pos).cloned())
                .collect(),
        )
    }
}

/// Resolve slice bounds the way sequence slicing does: negatives wrap once
/// from the end, everything clamps into `0..=len`, and `end < start`
/// collapses to an empty range.
#[must_use]
pub fn resolve_bounds(len: usize, start: isize, end: isize) -> (usize, usize) {
    let clamp = |bound: isize| -> usize {
        if bound < 0 {
            len.saturating_sub(bound.unsigned_abs())
        } else {
            bound.unsigned_abs().min(len)
        }
    };
    let start = clamp(start);
    let end = clamp(end).max(start);
    (start, end)
}

/// Build the index for `values_len` values: explicit labels must match the
/// length exactly, otherwise the default range index is produced.
pub fn parse_index(
    labels: Option<Vec<IndexLabel>>,
    values_len: usize,
) -> Result<Index, IndexError> {
    match labels {
        Some(labels) if labels.len() != values_len => Err(IndexError::LengthMismatch {
            index_len: labels.len(),
            values_len,
        }),
        Some(labels) => Ok(Index::new(labels)),
        None => Ok(Index::range(values_len)),
    }
}

/// Position-by-position pairing of a left structure with a right operand of
/// possibly different length. Labels are never consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPlan {
    pub index: Index,
    pub left_positions: Vec<Option<usize>>,
    pub right_positions: Vec<Option<usize>>,
}

#[must_use]
pub fn align_positional(left: &Index, right_len: usize) -> AlignmentPlan {
    let left_positions = (0..left.len()).map(Some).collect();
    let right_positions = (0..left.len())
        .map(|pos| (pos < right_len).then_some(pos))
        .collect();

    AlignmentPlan {
        index: left.clone(),
        left_positions,
        right_positions,
    }
}
