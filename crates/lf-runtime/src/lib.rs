#![forbid(unsafe_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    Strict,
    Hardened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Allow,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MergeScanBudget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityIssue {
    pub kind: IssueKind,
    pub subject: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub ts_unix_ms: u64,
    pub mode: RuntimeMode,
    pub action: DecisionAction,
    pub issue: CompatibilityIssue,
    pub observed: usize,
    pub cap: Option<usize>,
}

impl DecisionRecord {
    #[must_use]
    pub fn render_plain(&self) -> String {
        format!(
            "[{}::{:?}] mode={:?} observed={} cap={}\n{}",
            self.issue.subject,
            self.action,
            self.mode,
            self.observed,
            self.cap
                .map_or_else(|| "none".to_owned(), |cap| cap.to_string()),
            self.issue.detail
        )
    }
}

/// Append-only audit trail of every policy decision taken during a session.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLedger {
    records: Vec<DecisionRecord>,
}

impl EvidenceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: DecisionRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    #[must_use]
    pub fn rejections(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.action == DecisionAction::Reject)
            .count()
    }

    pub fn to_json(&self) -> Result<String, RuntimeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Execution policy. Strict mode mirrors the reference behavior: merges are
/// never refused and callers own input sizing. Hardened mode refuses a merge
/// whose nested scan would exceed `merge_scan_cap` row pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePolicy {
    pub mode: RuntimeMode,
    #[serde(default)]
    pub merge_scan_cap: Option<usize>,
}

impl RuntimePolicy {
    #[must_use]
    pub fn strict() -> Self {
        Self {
            mode: RuntimeMode::Strict,
            merge_scan_cap: None,
        }
    }

    #[must_use]
    pub fn hardened(merge_scan_cap: Option<usize>) -> Self {
        Self {
            mode: RuntimeMode::Hardened,
            merge_scan_cap,
        }
    }

    pub fn from_json_str(input: &str) -> Result<Self, RuntimeError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn decide_merge_admission(
        &self,
        left_rows: usize,
        right_rows: usize,
        ledger: &mut EvidenceLedger,
    ) -> DecisionAction {
        let scan_pairs = left_rows.saturating_mul(right_rows);
        let over_cap = self.merge_scan_cap.is_some_and(|cap| scan_pairs > cap);

        let action = match self.mode {
            RuntimeMode::Hardened if over_cap => DecisionAction::Reject,
            RuntimeMode::Strict | RuntimeMode::Hardened => DecisionAction::Allow,
        };

        ledger.push(DecisionRecord {
            ts_unix_ms: now_unix_ms().unwrap_or_default(),
            mode: self.mode,
            action,
            issue: CompatibilityIssue {
                kind: IssueKind::MergeScanBudget,
                subject: "merge_scan".to_owned(),
                detail: format!("left_rows={left_rows}, right_rows={right_rows}"),
            },
            observed: scan_pairs,
            cap: self.merge_scan_cap,
        });
        action
    }
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self::strict()
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("system clock is before UNIX_EPOCH")]
    ClockSkew,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn now_unix_ms() -> Result<u64, RuntimeError> {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| RuntimeError::ClockSkew)?
        .as_millis();
    Ok(ms as u64)
}
