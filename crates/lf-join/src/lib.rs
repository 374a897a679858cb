#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use lf_frame::{DataFrame, FrameError, Row};
use lf_runtime::{DecisionAction, EvidenceLedger, RuntimePolicy};
use lf_types::Scalar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeHow {
    #[default]
    Inner,
    Outer,
}

impl MergeHow {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Outer => "outer",
        }
    }
}

impl fmt::Display for MergeHow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeHow {
    type Err = JoinError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inner" => Ok(Self::Inner),
            "outer" => Ok(Self::Outer),
            other => Err(JoinError::UnsupportedMergeType(other.to_owned())),
        }
    }
}

/// Merge configuration. Suffixes are appended to non-key column names that
/// appear on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    #[serde(default)]
    pub how: MergeHow,
    #[serde(default = "default_suffixes")]
    pub suffixes: (String, String),
}

fn default_suffixes() -> (String, String) {
    ("_x".to_owned(), "_y".to_owned())
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            how: MergeHow::Inner,
            suffixes: default_suffixes(),
        }
    }
}

impl MergeOptions {
    #[must_use]
    pub fn with_how(how: MergeHow) -> Self {
        Self {
            how,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("KeyError: {0} not found")]
    KeyNotFound(String),
    #[error("No common keys")]
    NoCommonKeys,
    #[error("MergeError: {0} not a supported merge type")]
    UnsupportedMergeType(String),
    #[error("merge scan of {left_rows}x{right_rows} rows exceeds the configured budget")]
    ScanBudgetRejected { left_rows: usize, right_rows: usize },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Merge with default suffixes.
pub fn merge(
    left: &DataFrame,
    right: &DataFrame,
    on: Option<&[&str]>,
    how: MergeHow,
) -> Result<DataFrame, JoinError> {
    merge_with_options(left, right, on, &MergeOptions::with_how(how))
}

/// Merge two frames on key columns.
///
/// With `on = None` the keys are the columns both frames share, in `left`'s
/// column order. Explicit keys must exist in both frames; an explicit empty
/// key list matches every pair of rows. Rows match when every key value is
/// equal under [`Scalar::strict_eq`].
///
/// Output columns are the keys, then `left`'s other columns, then `right`'s
/// other columns. Output rows follow the nested scan: for each `left` row,
/// each matching `right` row in order. An outer merge then appends unmatched
/// `left` rows and finally unmatched `right` rows, filling the absent side
/// with `Null`.
pub fn merge_with_options(
    left: &DataFrame,
    right: &DataFrame,
    on: Option<&[&str]>,
    options: &MergeOptions,
) -> Result<DataFrame, JoinError> {
    let keys = resolve_keys(left, right, on)?;

    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!(
        "merge",
        how = options.how.as_str(),
        left_rows = left.len(),
        right_rows = right.len(),
        keys = keys.len(),
    );
    #[cfg(feature = "tracing")]
    let _guard = span.enter();

    let plan = ColumnPlan::new(left, right, &keys, &options.suffixes);
    let left_rows = left.iter_rows().map(|(_, row)| row).collect::<Vec<_>>();
    let right_rows = right.iter_rows().map(|(_, row)| row).collect::<Vec<_>>();

    let mut left_matched = vec![false; left_rows.len()];
    let mut right_matched = vec![false; right_rows.len()];
    let mut out = Vec::new();

    for (left_pos, left_row) in left_rows.iter().enumerate() {
        for (right_pos, right_row) in right_rows.iter().enumerate() {
            if !keys_match(&keys, left_row, right_row) {
                continue;
            }
            out.push(plan.emit(left_row, Some(left_row), Some(right_row)));
            left_matched[left_pos] = true;
            right_matched[right_pos] = true;
        }
    }

    let matched_rows = out.len();
    if options.how == MergeHow::Outer {
        for (left_row, _) in left_rows.iter().zip(&left_matched).filter(|(_, hit)| !**hit) {
            out.push(plan.emit(left_row, Some(left_row), None));
        }
        for (right_row, _) in right_rows.iter().zip(&right_matched).filter(|(_, hit)| !**hit) {
            out.push(plan.emit(right_row, None, Some(right_row)));
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        output_rows = out.len(),
        matched_rows,
        unmatched_rows = out.len() - matched_rows,
        "merge complete"
    );
    #[cfg(not(feature = "tracing"))]
    let _ = matched_rows;

    Ok(DataFrame::from_rows(out, None)?)
}

/// Policy-gated merge: consults `policy` before the nested scan and records
/// the decision in `ledger`.
pub fn merge_with_policy(
    left: &DataFrame,
    right: &DataFrame,
    on: Option<&[&str]>,
    options: &MergeOptions,
    policy: &RuntimePolicy,
    ledger: &mut EvidenceLedger,
) -> Result<DataFrame, JoinError> {
    match policy.decide_merge_admission(left.len(), right.len(), ledger) {
        DecisionAction::Allow => merge_with_options(left, right, on, options),
        DecisionAction::Reject => Err(JoinError::ScanBudgetRejected {
            left_rows: left.len(),
            right_rows: right.len(),
        }),
    }
}

/// Parse `how` from its textual name, then merge.
pub fn merge_by_name(
    left: &DataFrame,
    right: &DataFrame,
    on: Option<&[&str]>,
    how: &str,
) -> Result<DataFrame, JoinError> {
    let keys = resolve_keys(left, right, on)?;
    let how = how.parse::<MergeHow>()?;
    let keys = keys.iter().map(String::as_str).collect::<Vec<_>>();
    merge(left, right, Some(keys.as_slice()), how)
}

fn resolve_keys(
    left: &DataFrame,
    right: &DataFrame,
    on: Option<&[&str]>,
) -> Result<Vec<String>, JoinError> {
    match on {
        None => {
            let keys = left
                .column_names()
                .into_iter()
                .filter(|name| right.column_exists(name))
                .map(str::to_owned)
                .collect::<Vec<_>>();
            if keys.is_empty() {
                return Err(JoinError::NoCommonKeys);
            }
            Ok(keys)
        }
        Some(keys) => keys
            .iter()
            .map(|key| {
                if left.column_exists(key) && right.column_exists(key) {
                    Ok((*key).to_owned())
                } else {
                    Err(JoinError::KeyNotFound((*key).to_owned()))
                }
            })
            .collect(),
    }
}

fn keys_match(keys: &[String], left: &Row, right: &Row) -> bool {
    keys.iter().all(|key| {
        let left_value = left.get(key).unwrap_or(&Scalar::Null);
        let right_value = right.get(key).unwrap_or(&Scalar::Null);
        left_value.strict_eq(right_value)
    })
}

/// Output naming decided once per merge.
struct ColumnPlan<'a> {
    keys: &'a [String],
    left: Vec<(String, String)>,
    right: Vec<(String, String)>,
}

impl<'a> ColumnPlan<'a> {
    fn new(
        left: &DataFrame,
        right: &DataFrame,
        keys: &'a [String],
        suffixes: &(String, String),
    ) -> Self {
        let left_rest = non_key_columns(left, keys);
        let right_rest = non_key_columns(right, keys);

        let rename = |names: &[String], others: &[String], suffix: &str| {
            names
                .iter()
                .map(|name| {
                    let out = if others.contains(name) {
                        format!("{name}{suffix}")
                    } else {
                        name.clone()
                    };
                    (name.clone(), out)
                })
                .collect::<Vec<_>>()
        };

        Self {
            keys,
            left: rename(left_rest.as_slice(), right_rest.as_slice(), suffixes.0.as_str()),
            right: rename(right_rest.as_slice(), left_rest.as_slice(), suffixes.1.as_str()),
        }
    }

    /// Key values come from `key_source`; an absent side fills with `Null`.
    /// Right columns are written last, so a right name that equals an
    /// earlier output name replaces that value in place.
    fn emit(&self, key_source: &Row, left: Option<&Row>, right: Option<&Row>) -> Row {
        let mut row = Row::with_capacity(self.keys.len() + self.left.len() + self.right.len());
        for key in self.keys {
            row.insert(key.clone(), lookup(Some(key_source), key));
        }
        for (source, target) in &self.left {
            row.insert(target.clone(), lookup(left, source));
        }
        for (source, target) in &self.right {
            row.insert(target.clone(), lookup(right, source));
        }
        row
    }
}

fn non_key_columns(frame: &DataFrame, keys: &[String]) -> Vec<String> {
    frame
        .column_names()
        .into_iter()
        .filter(|name| !keys.iter().any(|key| key == name))
        .map(str::to_owned)
        .collect()
}

fn lookup(row: Option<&Row>, name: &str) -> Scalar {
    row.and_then(|row| row.get(name))
        .cloned()
        .unwrap_or(Scalar::Null)
}
