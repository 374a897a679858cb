#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Advisory element-type tag attached to a column at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DType {
    #[serde(rename = "int")]
    Int64,
    #[serde(rename = "float")]
    Float64,
    #[serde(rename = "object")]
    Object,
}

impl DType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int64 => "int",
            Self::Float64 => "float",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl Scalar {
    /// The dtype this single value contributes to inference; `None` for `Null`.
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Self::Null => None,
            Self::Int64(_) => Some(DType::Int64),
            Self::Float64(_) => Some(DType::Float64),
            Self::Bool(_) | Self::Utf8(_) => Some(DType::Object),
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Float64(v) if v.is_nan())
    }

    /// Value equality as used for join-key matching.
    ///
    /// Integers and floats compare numerically, NaN is never equal to
    /// anything (itself included) and `Null` matches `Null`.
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::Int64(a), Self::Float64(b)) | (Self::Float64(b), Self::Int64(a)) => {
                (*a as f64) == *b
            }
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            _ => false,
        }
    }

    /// Total order over present values: numbers (bools as 0/1) by
    /// `f64::total_cmp`, then strings lexicographically. Missing values sort
    /// after everything.
    #[must_use]
    pub fn value_cmp(&self, other: &Self) -> Ordering {
        match (self.is_missing(), other.is_missing()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        match (self, other) {
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::Utf8(a), Self::Utf8(b)) => a.cmp(b),
            (Self::Utf8(_), _) => Ordering::Greater,
            (_, Self::Utf8(_)) => Ordering::Less,
            _ => match (self.to_f64(), other.to_f64()) {
                (Ok(a), Ok(b)) => a.total_cmp(&b),
                _ => Ordering::Equal,
            },
        }
    }

    pub fn to_f64(&self) -> Result<f64, TypeError> {
        match self {
            Self::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            Self::Int64(v) => Ok(*v as f64),
            Self::Float64(v) => Ok(*v),
            Self::Null => Err(TypeError::ValueIsMissing),
            Self::Utf8(v) => Err(TypeError::NonNumericValue {
                value: v.clone(),
                dtype: DType::Object,
            }),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) if v.is_nan() => f.write_str("NaN"),
            Self::Float64(v) if v.is_infinite() => {
                f.write_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("cannot convert {from} to {to}")]
    InvalidCast { from: DType, to: DType },
    #[error("value {value:?} has non-numeric dtype {dtype}")]
    NonNumericValue { value: String, dtype: DType },
    #[error("value is missing")]
    ValueIsMissing,
}

#[must_use]
pub fn common_dtype(left: DType, right: DType) -> DType {
    use DType::{Float64, Int64, Object};

    match (left, right) {
        (a, b) if a == b => a,
        (Object, _) | (_, Object) => Object,
        (Int64, Float64) | (Float64, Int64) => Float64,
        _ => Object,
    }
}

/// Classify a value sequence once; `Null` entries do not participate and an
/// all-null (or empty) sequence is `float`.
#[must_use]
pub fn infer_dtype(values: &[Scalar]) -> DType {
    values
        .iter()
        .filter(|value| !matches!(value, Scalar::Null))
        .filter_map(Scalar::dtype)
        .reduce(common_dtype)
        .unwrap_or(DType::Float64)
}

pub fn cast_scalar(value: &Scalar, target: DType) -> Result<Scalar, TypeError> {
    if matches!(value, Scalar::Null) {
        return Ok(Scalar::Null);
    }

    match target {
        DType::Object => Ok(value.clone()),
        DType::Int64 => match value {
            Scalar::Int64(v) => Ok(Scalar::Int64(*v)),
            Scalar::Bool(v) => Ok(Scalar::Int64(i64::from(*v))),
            Scalar::Float64(v) => {
                let floored = v.floor();
                if !floored.is_finite() || floored < i64::MIN as f64 || floored > i64::MAX as f64 {
                    return Ok(Scalar::Null);
                }
                Ok(Scalar::Int64(floored as i64))
            }
            _ => Err(TypeError::InvalidCast {
                from: DType::Object,
                to: target,
            }),
        },
        DType::Float64 => match value {
            Scalar::Int64(v) => Ok(Scalar::Float64(*v as f64)),
            Scalar::Bool(v) => Ok(Scalar::Float64(if *v { 1.0 } else { 0.0 })),
            Scalar::Float64(v) => Ok(Scalar::Float64(*v)),
            _ => Err(TypeError::InvalidCast {
                from: DType::Object,
                to: target,
            }),
        },
    }
}
