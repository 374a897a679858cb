#![forbid(unsafe_code)]

//! Label-indexed `Series` and `DataFrame` values.
//!
//! Elementwise arithmetic pairs values by position, never by label.
//! Reductions run per column (axis 0) or per row (axis 1), and [`merge`]
//! joins two frames on key columns with a nested scan.
//!
//! ```
//! use labelframe::{DataFrame, MergeHow, Row, Scalar, merge};
//!
//! let row = |k: &str, v: i64| {
//!     Row::from_iter([("k".to_owned(), Scalar::from(k)), ("v".to_owned(), Scalar::Int64(v))])
//! };
//! let left = DataFrame::from_rows(vec![row("a", 1), row("b", 2)], None)?;
//! let right = DataFrame::from_rows(vec![row("b", 3)], None)?;
//!
//! let out = merge(&left, &right, Some(&["k"]), MergeHow::Inner)?;
//! assert_eq!(out.column_names(), vec!["k", "v_x", "v_y"]);
//! assert_eq!(out.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use lf_columnar::{ArithmeticOp, Column, ColumnError, ValidityMask};
pub use lf_frame::{DataFrame, FrameError, Operand, Row, Series};
pub use lf_index::{Index, IndexError, IndexLabel};
pub use lf_io::{
    IoError, read_csv_path, read_csv_str, read_json_records, write_csv_path, write_csv_string,
    write_json_records,
};
pub use lf_join::{
    JoinError, MergeHow, MergeOptions, merge, merge_by_name, merge_with_options,
    merge_with_policy,
};
pub use lf_runtime::{DecisionAction, EvidenceLedger, RuntimeError, RuntimeMode, RuntimePolicy};
pub use lf_types::{DType, Scalar, TypeError};
