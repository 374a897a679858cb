#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use indexmap::IndexMap;
use lf_columnar::Column;
use lf_frame::{DataFrame, FrameError, Row};
use lf_index::Index;
use lf_types::Scalar;
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error("duplicate csv header: {0}")]
    DuplicateHeader(String),
    #[error("json input must be an array of objects")]
    NotRecordArray,
    #[error("unsupported json value in column {column:?}: nested arrays and objects are not scalars")]
    UnsupportedJsonValue { column: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Read CSV text with a header row. Header order becomes column order; a
/// trailing empty header (as produced by [`write_csv_string`]) is ignored.
pub fn read_csv_str(input: &str) -> Result<DataFrame, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut headers = reader
        .headers()?
        .iter()
        .map(str::to_owned)
        .collect::<Vec<_>>();
    if headers.last().is_some_and(String::is_empty) {
        headers.pop();
    }
    if headers.is_empty() {
        return Err(IoError::MissingHeaders);
    }

    let mut columns = IndexMap::<String, Vec<Scalar>>::with_capacity(headers.len());
    for header in &headers {
        if columns.insert(header.clone(), Vec::new()).is_some() {
            return Err(IoError::DuplicateHeader(header.clone()));
        }
    }

    let mut row_count = 0_usize;
    for record in reader.records() {
        let record = record?;
        for (idx, values) in columns.values_mut().enumerate() {
            values.push(parse_scalar(record.get(idx).unwrap_or_default()));
        }
        row_count += 1;
    }

    let columns = columns
        .into_iter()
        .map(|(name, values)| (name, Column::from_values(values)))
        .collect();
    Ok(DataFrame::new(Index::range(row_count), columns)?)
}

/// Render a frame as CSV: every header and cell is followed by a comma and
/// every line ends in CRLF. Missing cells print as `null`, so a `"null"`
/// string is indistinguishable from a missing cell. Fields containing a
/// comma, a double quote or a line break are quoted RFC 4180 style.
pub fn write_csv_string(frame: &DataFrame) -> Result<String, IoError> {
    if frame.num_columns() == 0 {
        return Ok("\r\n".to_owned());
    }

    let mut writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    let mut header = frame
        .column_names()
        .into_iter()
        .map(str::to_owned)
        .collect::<Vec<_>>();
    header.push(String::new());
    writer.write_record(&header)?;

    for (_, row) in frame.iter_rows() {
        let mut record = row.values().map(ToString::to_string).collect::<Vec<_>>();
        record.push(String::new());
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn read_csv_path(path: impl AsRef<Path>) -> Result<DataFrame, IoError> {
    read_csv_str(&fs::read_to_string(path)?)
}

pub fn write_csv_path(frame: &DataFrame, path: impl AsRef<Path>) -> Result<(), IoError> {
    fs::write(path, write_csv_string(frame)?)?;
    Ok(())
}

/// Read a JSON array of objects. Keys are unioned in first-seen order and
/// heterogeneous records produce ragged columns, as with
/// [`DataFrame::from_rows`].
pub fn read_json_records(input: &str) -> Result<DataFrame, IoError> {
    let Value::Array(items) = serde_json::from_str::<Value>(input)? else {
        return Err(IoError::NotRecordArray);
    };

    let rows = items
        .into_iter()
        .map(|item| match item {
            Value::Object(fields) => fields
                .into_iter()
                .map(|(name, value)| {
                    scalar_from_json(&name, value).map(|scalar| (name, scalar))
                })
                .collect::<Result<Row, IoError>>(),
            _ => Err(IoError::NotRecordArray),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DataFrame::from_rows(rows, None)?)
}

/// Render rows as a JSON array of objects. Non-finite floats become `null`.
pub fn write_json_records(frame: &DataFrame) -> Result<String, IoError> {
    let records = frame
        .iter_rows()
        .map(|(_, row)| {
            Value::Object(
                row.into_iter()
                    .map(|(name, value)| (name, scalar_to_json(&value)))
                    .collect::<Map<_, _>>(),
            )
        })
        .collect::<Vec<_>>();
    Ok(serde_json::to_string(&Value::Array(records))?)
}

fn parse_scalar(field: &str) -> Scalar {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Scalar::Null;
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Scalar::Int64(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Scalar::Float64(value);
    }
    if let Ok(value) = trimmed.parse::<bool>() {
        return Scalar::Bool(value);
    }

    Scalar::Utf8(trimmed.to_owned())
}

/// Convert one JSON value into a scalar; `column` names the field in errors.
/// Integral numbers become `Int64`, other numbers `Float64`.
pub fn scalar_from_json(column: &str, value: Value) -> Result<Scalar, IoError> {
    match value {
        Value::Null => Ok(Scalar::Null),
        Value::Bool(v) => Ok(Scalar::Bool(v)),
        Value::Number(n) => Ok(n
            .as_i64()
            .map(Scalar::Int64)
            .or_else(|| n.as_f64().map(Scalar::Float64))
            .unwrap_or(Scalar::Null)),
        Value::String(v) => Ok(Scalar::Utf8(v)),
        Value::Array(_) | Value::Object(_) => Err(IoError::UnsupportedJsonValue {
            column: column.to_owned(),
        }),
    }
}

#[must_use]
pub fn scalar_to_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::Bool(v) => Value::Bool(*v),
        Scalar::Int64(v) => Value::Number((*v).into()),
        Scalar::Float64(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
        Scalar::Utf8(v) => Value::String(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use lf_frame::{DataFrame, Row};
    use lf_types::{DType, Scalar};

    use super::{
        IoError, read_csv_path, read_csv_str, read_json_records, write_csv_path,
        write_csv_string, write_json_records,
    };

    fn sample() -> DataFrame {
        let rows = vec![
            Row::from_iter([
                ("id".to_owned(), Scalar::Int64(1)),
                ("name".to_owned(), Scalar::from("ann")),
            ]),
            Row::from_iter([
                ("id".to_owned(), Scalar::Int64(2)),
                ("name".to_owned(), Scalar::Null),
            ]),
        ];
        DataFrame::from_rows(rows, None).expect("frame")
    }

    #[test]
    fn csv_writer_uses_trailing_commas_and_crlf() {
        let out = write_csv_string(&sample()).expect("write");
        assert_eq!(out, "id,name,\r\n1,ann,\r\n2,null,\r\n");
    }

    #[test]
    fn csv_writer_quotes_delimiters_and_prints_null_text_as_missing() {
        let rows = vec![Row::from_iter([
            ("a".to_owned(), Scalar::from("x,y")),
            ("b".to_owned(), Scalar::from("null")),
        ])];
        let frame = DataFrame::from_rows(rows, None).expect("frame");

        let out = write_csv_string(&frame).expect("write");
        assert_eq!(out, "a,b,\r\n\"x,y\",null,\r\n");

        let back = read_csv_str(&out).expect("read");
        assert_eq!(back.cell("a", 0).expect("a"), Scalar::from("x,y"));
        assert_eq!(back.cell("b", 0).expect("b"), Scalar::Null);
    }

    #[test]
    fn empty_frame_writes_a_bare_line_break() {
        assert_eq!(write_csv_string(&DataFrame::empty()).expect("write"), "\r\n");
    }

    #[test]
    fn csv_reader_accepts_written_output() {
        let frame = sample();
        let back = read_csv_str(&write_csv_string(&frame).expect("write")).expect("read");
        assert_eq!(back.column_names(), vec!["id", "name"]);
        assert_eq!(back.len(), 2);
        assert_eq!(back.cell("name", 1).expect("cell"), Scalar::Null);
        assert_eq!(back.column("id").expect("id").dtype(), DType::Int64);
    }

    #[test]
    fn csv_reader_keeps_header_order_and_infers_types() {
        let frame = read_csv_str("z,a\n1,1.5\n2,\n").expect("read");
        assert_eq!(frame.column_names(), vec!["z", "a"]);
        assert_eq!(frame.column("a").expect("a").dtype(), DType::Float64);
        assert_eq!(frame.cell("a", 1).expect("cell"), Scalar::Null);
    }

    #[test]
    fn csv_reader_rejects_duplicate_headers() {
        let err = read_csv_str("a,a\n1,2\n").expect_err("must fail");
        assert!(matches!(err, IoError::DuplicateHeader(name) if name == "a"));
    }

    #[test]
    fn csv_files_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame.csv");
        write_csv_path(&sample(), &path).expect("write");
        let back = read_csv_path(&path).expect("read");
        assert_eq!(back.cell("name", 0).expect("cell"), Scalar::from("ann"));
    }

    #[test]
    fn json_records_union_keys_in_arrival_order() {
        let frame = read_json_records(r#"[{"b":1,"a":"x"},{"c":2.5}]"#).expect("read");
        assert_eq!(frame.column_names(), vec!["b", "a", "c"]);
        assert_eq!(frame.column("c").expect("c").values(), &[Scalar::Float64(2.5)]);

        let out = write_json_records(&frame).expect("write");
        assert_eq!(
            out,
            r#"[{"b":1,"a":"x","c":2.5},{"b":null,"a":null,"c":null}]"#
        );
    }

    #[test]
    fn json_records_reject_nested_values() {
        let err = read_json_records(r#"[{"a":[1]}]"#).expect_err("must fail");
        assert!(matches!(err, IoError::UnsupportedJsonValue { column } if column == "a"));
        assert!(matches!(
            read_json_records(r#"{"a":1}"#),
            Err(IoError::NotRecordArray)
        ));
    }
}
