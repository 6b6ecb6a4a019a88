use std::error::Error;

use chrono::{NaiveDate, NaiveDateTime};

/// How timestamps are rendered for the database, and the first format
/// tried when parsing the source files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column types the loader knows how to infer from a CSV sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Double,
    Timestamp,
    Text,
}

impl ColumnType {
    /// The PostgreSQL type name used in DDL.
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// Double-quote an SQL identifier, doubling any embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Infer one column per header entry from the records of the first chunk.
///
/// Columns named in `datetime_columns` become TIMESTAMP; every name in that
/// list must exist in the header.  The rest are BIGINT when every non-empty
/// sample value parses as an integer, DOUBLE PRECISION when every non-empty
/// value parses as a number, TEXT otherwise.  A column with no non-empty
/// sample value loads as DOUBLE PRECISION, which is what the source data
/// shows for its always-missing columns.
pub fn infer_columns(
    headers: &csv::StringRecord,
    sample: &[csv::StringRecord],
    datetime_columns: &[String],
) -> Result<Vec<Column>, Box<dyn Error>> {
    for name in datetime_columns {
        if !headers.iter().any(|h| h == name) {
            return Err(format!("datetime column '{}' is not in the source header", name).into());
        }
    }

    let mut columns = Vec::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        let ty = if datetime_columns.iter().any(|c| c == name) {
            ColumnType::Timestamp
        } else {
            infer_column_type(sample, idx)
        };
        columns.push(Column {
            name: name.to_owned(),
            ty,
        });
    }
    Ok(columns)
}

fn infer_column_type(sample: &[csv::StringRecord], idx: usize) -> ColumnType {
    let mut seen = false;
    let mut all_int = true;
    let mut all_real = true;
    for record in sample {
        let value = record.get(idx).unwrap_or("").trim();
        if value.is_empty() {
            continue;
        }
        seen = true;
        if all_int && value.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_real && value.parse::<f64>().is_err() {
            all_real = false;
            break;
        }
    }
    if !seen {
        ColumnType::Double
    } else if all_int {
        ColumnType::BigInt
    } else if all_real {
        ColumnType::Double
    } else {
        ColumnType::Text
    }
}

/// Parse a timestamp the way the source files write them: date + time,
/// with a date-only fallback that means midnight.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, Box<dyn Error>> {
    for format in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    Err(format!("cannot parse '{}' as a timestamp", value).into())
}

/// Normalize one CSV field for the database: canonical number and timestamp
/// rendering, text passed through untouched.  Empty fields stay empty and
/// load as NULL.
pub fn normalize(value: &str, ty: ColumnType) -> Result<String, Box<dyn Error>> {
    let v = value.trim();
    match ty {
        ColumnType::Text => Ok(value.to_owned()),
        _ if v.is_empty() => Ok(String::new()),
        ColumnType::BigInt => {
            let n: i64 = v
                .parse()
                .map_err(|_| format!("'{}' is not an integer", value))?;
            Ok(n.to_string())
        }
        ColumnType::Double => {
            let x: f64 = v
                .parse()
                .map_err(|_| format!("'{}' is not a number", value))?;
            Ok(x.to_string())
        }
        ColumnType::Timestamp => Ok(parse_timestamp(v)?.format(TIMESTAMP_FORMAT).to_string()),
    }
}

/// Render the CREATE TABLE statement for an inferred schema.  Every column
/// is nullable; the source files carry missing values.
pub fn create_table_sql(table: &str, columns: &[Column]) -> String {
    let cols: Vec<String> = columns
        .iter()
        .map(|c| format!("    {} {}", quote_ident(&c.name), c.ty.sql()))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        quote_ident(table),
        cols.join(",\n")
    )
}

/// Render the COPY statement a chunk is appended with.
pub fn copy_sql(table: &str, columns: &[Column]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
        quote_ident(table),
        cols.join(", ")
    )
}
