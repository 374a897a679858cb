#![forbid(unsafe_code)]

//! Conformance harness: each JSON fixture under `fixtures/` names an
//! operation, its inputs and the expected result (or expected error text),
//! and the suite replays every fixture against the library.

use std::fs;
use std::path::{Path, PathBuf};

use lf_columnar::ArithmeticOp;
use lf_frame::{DataFrame, Operand, Series};
use lf_index::IndexLabel;
use lf_io::{read_json_records, scalar_from_json, write_csv_string};
use lf_join::{MergeHow, MergeOptions, merge_with_policy};
use lf_runtime::{EvidenceLedger, RuntimeMode, RuntimePolicy};
use lf_types::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const DEFAULT_HARDENED_SCAN_CAP: usize = 100_000;
const FLOAT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
    /// Fail fixtures that declare no expectation at all.
    pub strict_mode: bool,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        Self {
            fixture_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"),
            strict_mode: true,
        }
    }

    #[must_use]
    pub fn with_fixture_root(fixture_root: impl Into<PathBuf>) -> Self {
        Self {
            fixture_root: fixture_root.into(),
            ..Self::default_paths()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureOperation {
    SeriesArith,
    SeriesSort,
    SeriesPctChange,
    FrameReduce,
    FramePctChange,
    Merge,
    ToCsv,
}

/// One conformance case. Frames are given as JSON record arrays, series as
/// plain JSON value arrays; `null` in an expectation matches any missing
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub case_id: String,
    #[serde(default = "default_mode")]
    pub mode: RuntimeMode,
    pub operation: FixtureOperation,
    #[serde(default)]
    pub series: Option<Vec<Value>>,
    #[serde(default)]
    pub index: Option<Vec<IndexLabel>>,
    #[serde(default)]
    pub operand: Option<Value>,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub left: Option<Value>,
    #[serde(default)]
    pub right: Option<Value>,
    #[serde(default)]
    pub on: Option<Vec<String>>,
    #[serde(default)]
    pub how: Option<String>,
    #[serde(default)]
    pub axis: Option<usize>,
    #[serde(default)]
    pub periods: Option<i64>,
    #[serde(default)]
    pub ascending: Option<bool>,
    #[serde(default)]
    pub merge_scan_cap: Option<usize>,
    #[serde(default)]
    pub expected_values: Option<Vec<Value>>,
    #[serde(default)]
    pub expected_index: Option<Vec<IndexLabel>>,
    #[serde(default)]
    pub expected_columns: Option<Vec<String>>,
    #[serde(default)]
    pub expected_rows: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    pub expected_text: Option<String>,
    #[serde(default)]
    pub expected_error: Option<String>,
}

fn default_mode() -> RuntimeMode {
    RuntimeMode::Strict
}

impl Fixture {
    #[must_use]
    pub fn has_expectation(&self) -> bool {
        self.expected_values.is_some()
            || self.expected_index.is_some()
            || self.expected_columns.is_some()
            || self.expected_rows.is_some()
            || self.expected_text.is_some()
            || self.expected_error.is_some()
    }

    fn policy(&self) -> RuntimePolicy {
        match self.mode {
            RuntimeMode::Strict => RuntimePolicy::strict(),
            RuntimeMode::Hardened => RuntimePolicy::hardened(Some(
                self.merge_scan_cap.unwrap_or(DEFAULT_HARDENED_SCAN_CAP),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: String,
    pub operation: FixtureOperation,
    pub mode: RuntimeMode,
    pub status: CaseStatus,
    pub mismatch: Option<String>,
    pub evidence_records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessReport {
    pub suite: String,
    pub strict_mode: bool,
    pub fixture_count: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<CaseResult>,
}

impl HarnessReport {
    #[must_use]
    pub fn is_green(&self) -> bool {
        self.failed == 0 && self.fixture_count > 0
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&CaseResult> {
        self.results
            .iter()
            .filter(|result| result.status == CaseStatus::Fail)
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("fixture {path}: {source}")]
    FixtureParse {
        path: String,
        source: serde_json::Error,
    },
}

/// Count fixture files without executing them.
#[must_use]
pub fn run_smoke(config: &HarnessConfig) -> HarnessReport {
    let fixture_count = list_fixture_files(&config.fixture_root)
        .map(|files| files.len())
        .unwrap_or(0);

    HarnessReport {
        suite: "smoke".to_owned(),
        strict_mode: config.strict_mode,
        fixture_count,
        passed: 0,
        failed: 0,
        results: Vec::new(),
    }
}

pub fn run_fixture_suite(config: &HarnessConfig) -> Result<HarnessReport, HarnessError> {
    run_fixture_suite_filtered(config, None)
}

/// Run every fixture, or only the one whose `case_id` equals `case_filter`.
pub fn run_fixture_suite_filtered(
    config: &HarnessConfig,
    case_filter: Option<&str>,
) -> Result<HarnessReport, HarnessError> {
    let fixtures = load_fixtures(&config.fixture_root, case_filter)?;
    let results = fixtures
        .iter()
        .map(|fixture| run_fixture(config, fixture))
        .collect::<Vec<_>>();
    let failed = results
        .iter()
        .filter(|result| result.status == CaseStatus::Fail)
        .count();

    Ok(HarnessReport {
        suite: case_filter.map_or_else(|| "fixtures".to_owned(), |id| format!("fixtures:{id}")),
        strict_mode: config.strict_mode,
        fixture_count: fixtures.len(),
        passed: results.len() - failed,
        failed,
        results,
    })
}

pub fn load_fixtures(root: &Path, case_filter: Option<&str>) -> Result<Vec<Fixture>, HarnessError> {
    let mut fixtures = Vec::new();
    for path in list_fixture_files(root)? {
        let body = fs::read_to_string(&path)?;
        let fixture: Fixture =
            serde_json::from_str(&body).map_err(|source| HarnessError::FixtureParse {
                path: path.display().to_string(),
                source,
            })?;
        if case_filter.is_none_or(|id| fixture.case_id == id) {
            fixtures.push(fixture);
        }
    }
    fixtures.sort_by(|a, b| a.case_id.cmp(&b.case_id));
    Ok(fixtures)
}

pub fn write_report_json(report: &HarnessReport, path: &Path) -> Result<(), HarnessError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

#[must_use]
pub fn run_fixture(config: &HarnessConfig, fixture: &Fixture) -> CaseResult {
    let mut ledger = EvidenceLedger::new();
    let mismatch = if config.strict_mode && !fixture.has_expectation() {
        Some("fixture declares no expectation".to_owned())
    } else {
        evaluate(fixture, &mut ledger).err()
    };

    CaseResult {
        case_id: fixture.case_id.clone(),
        operation: fixture.operation,
        mode: fixture.mode,
        status: if mismatch.is_none() {
            CaseStatus::Pass
        } else {
            CaseStatus::Fail
        },
        mismatch,
        evidence_records: ledger.records().len(),
    }
}

fn list_fixture_files(root: &Path) -> Result<Vec<PathBuf>, HarnessError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

enum Outcome {
    Series(Series),
    Frame(DataFrame),
    Text(String),
}

enum CaseFailure {
    /// The fixture itself is malformed.
    Fixture(String),
    /// The library returned an error.
    Operation(String),
}

fn evaluate(fixture: &Fixture, ledger: &mut EvidenceLedger) -> Result<(), String> {
    match (execute(fixture, ledger), &fixture.expected_error) {
        (Err(CaseFailure::Fixture(msg)), _) => Err(format!("fixture format error: {msg}")),
        (Err(CaseFailure::Operation(msg)), Some(expected)) if msg.contains(expected.as_str()) => {
            Ok(())
        }
        (Err(CaseFailure::Operation(msg)), Some(expected)) => Err(format!(
            "expected error containing {expected:?}, got {msg:?}"
        )),
        (Err(CaseFailure::Operation(msg)), None) => Err(format!("unexpected error: {msg}")),
        (Ok(_), Some(expected)) => Err(format!(
            "expected error containing {expected:?}, but the operation succeeded"
        )),
        (Ok(outcome), None) => compare(fixture, &outcome),
    }
}

fn execute(fixture: &Fixture, ledger: &mut EvidenceLedger) -> Result<Outcome, CaseFailure> {
    match fixture.operation {
        FixtureOperation::SeriesArith => {
            let series = build_series(fixture)?;
            let op = parse_arith(fixture.op.as_deref())?;
            let raw = fixture
                .operand
                .clone()
                .ok_or_else(|| CaseFailure::Fixture("series_arith needs an operand".to_owned()))?;
            let out = match raw {
                Value::Array(items) => {
                    let values = to_scalars("operand", items)?;
                    series.binary(Operand::Sequence(&values), op)
                }
                other => {
                    let value = to_scalar("operand", other)?;
                    series.binary(Operand::Scalar(&value), op)
                }
            };
            out.map(Outcome::Series).map_err(operation_failed)
        }
        FixtureOperation::SeriesSort => {
            let series = build_series(fixture)?;
            Ok(Outcome::Series(
                series.sort_values(fixture.ascending.unwrap_or(true)),
            ))
        }
        FixtureOperation::SeriesPctChange => build_series(fixture)?
            .pct_change(fixture.periods.unwrap_or(1))
            .map(Outcome::Series)
            .map_err(operation_failed),
        FixtureOperation::FrameReduce => {
            let frame = build_frame("left", fixture.left.as_ref())?;
            let axis = fixture.axis.unwrap_or(0);
            let out = match fixture.op.as_deref().unwrap_or("sum") {
                "sum" => frame.sum(axis),
                "mean" => frame.mean(axis),
                "var" | "variance" => frame.variance(axis),
                "std" => frame.std(axis),
                other => {
                    return Err(CaseFailure::Fixture(format!(
                        "unknown reduction {other:?}"
                    )));
                }
            };
            out.map(Outcome::Series).map_err(operation_failed)
        }
        FixtureOperation::FramePctChange => build_frame("left", fixture.left.as_ref())?
            .pct_change(fixture.periods.unwrap_or(1), fixture.axis.unwrap_or(0))
            .map(Outcome::Frame)
            .map_err(operation_failed),
        FixtureOperation::Merge => {
            let left = build_frame("left", fixture.left.as_ref())?;
            let right = build_frame("right", fixture.right.as_ref())?;
            let how = fixture
                .how
                .as_deref()
                .unwrap_or("inner")
                .parse::<MergeHow>()
                .map_err(operation_failed)?;
            let keys = fixture
                .on
                .as_ref()
                .map(|keys| keys.iter().map(String::as_str).collect::<Vec<_>>());
            merge_with_policy(
                &left,
                &right,
                keys.as_deref(),
                &MergeOptions::with_how(how),
                &fixture.policy(),
                ledger,
            )
            .map(Outcome::Frame)
            .map_err(operation_failed)
        }
        FixtureOperation::ToCsv => {
            let frame = build_frame("left", fixture.left.as_ref())?;
            write_csv_string(&frame)
                .map(Outcome::Text)
                .map_err(operation_failed)
        }
    }
}

fn operation_failed(err: impl std::fmt::Display) -> CaseFailure {
    CaseFailure::Operation(err.to_string())
}

fn compare(fixture: &Fixture, outcome: &Outcome) -> Result<(), String> {
    match outcome {
        Outcome::Series(series) => {
            if let Some(expected) = &fixture.expected_values {
                compare_values("values", series.values(), expected)?;
            }
            if let Some(expected) = &fixture.expected_index {
                if series.index().labels() != expected.as_slice() {
                    return Err(format!(
                        "index mismatch: actual={:?}, expected={expected:?}",
                        series.index().labels()
                    ));
                }
            }
        }
        Outcome::Frame(frame) => {
            if let Some(expected) = &fixture.expected_columns {
                let actual = frame.column_names();
                if actual != *expected {
                    return Err(format!(
                        "column mismatch: actual={actual:?}, expected={expected:?}"
                    ));
                }
            }
            if let Some(expected) = &fixture.expected_rows {
                if frame.len() != expected.len() {
                    return Err(format!(
                        "row count mismatch: actual={}, expected={}",
                        frame.len(),
                        expected.len()
                    ));
                }
                for ((pos, row), expected_row) in frame.iter_rows().zip(expected) {
                    let actual = row.into_values().collect::<Vec<_>>();
                    compare_values(&format!("row {pos}"), &actual, expected_row)?;
                }
            }
        }
        Outcome::Text(text) => {
            if let Some(expected) = &fixture.expected_text {
                if text != expected {
                    return Err(format!(
                        "text mismatch: actual={text:?}, expected={expected:?}"
                    ));
                }
            }
        }
    }
    Ok(())
}

fn compare_values(what: &str, actual: &[Scalar], expected: &[Value]) -> Result<(), String> {
    if actual.len() != expected.len() {
        return Err(format!(
            "{what} length mismatch: actual={}, expected={}",
            actual.len(),
            expected.len()
        ));
    }
    for (pos, (value, want)) in actual.iter().zip(expected).enumerate() {
        if !scalar_matches(value, want) {
            return Err(format!(
                "{what} mismatch at {pos}: actual={value:?}, expected={want}"
            ));
        }
    }
    Ok(())
}

fn scalar_matches(actual: &Scalar, expected: &Value) -> bool {
    match (actual, expected) {
        (_, Value::Null) => actual.is_missing(),
        (Scalar::Int64(_) | Scalar::Float64(_), Value::Number(number)) => {
            match (actual.to_f64(), number.as_f64()) {
                (Ok(a), Some(e)) => (a - e).abs() <= FLOAT_TOLERANCE * e.abs().max(1.0),
                _ => false,
            }
        }
        (Scalar::Bool(a), Value::Bool(e)) => a == e,
        (Scalar::Utf8(a), Value::String(e)) => a == e,
        _ => false,
    }
}

fn build_series(fixture: &Fixture) -> Result<Series, CaseFailure> {
    let values = fixture
        .series
        .clone()
        .ok_or_else(|| CaseFailure::Fixture("missing series values".to_owned()))?;
    let values = to_scalars("series", values)?;
    Series::from_values("series", fixture.index.clone(), values)
        .map_err(|err| CaseFailure::Fixture(err.to_string()))
}

fn build_frame(side: &str, records: Option<&Value>) -> Result<DataFrame, CaseFailure> {
    let records =
        records.ok_or_else(|| CaseFailure::Fixture(format!("missing {side} frame records")))?;
    read_json_records(&records.to_string()).map_err(|err| CaseFailure::Fixture(err.to_string()))
}

fn to_scalar(what: &str, value: Value) -> Result<Scalar, CaseFailure> {
    scalar_from_json(what, value).map_err(|err| CaseFailure::Fixture(err.to_string()))
}

fn to_scalars(what: &str, values: Vec<Value>) -> Result<Vec<Scalar>, CaseFailure> {
    values
        .into_iter()
        .map(|value| to_scalar(what, value))
        .collect()
}

fn parse_arith(name: Option<&str>) -> Result<ArithmeticOp, CaseFailure> {
    match name {
        Some("add") => Ok(ArithmeticOp::Add),
        Some("sub") => Ok(ArithmeticOp::Sub),
        Some("mul") => Ok(ArithmeticOp::Mul),
        Some("div") => Ok(ArithmeticOp::Div),
        other => Err(CaseFailure::Fixture(format!(
            "unknown arithmetic op {other:?}"
        ))),
    }
}
