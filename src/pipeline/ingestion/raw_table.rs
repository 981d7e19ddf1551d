//! Untyped tabular input as it arrives from an upload.
//!
//! A [`RawTable`] keeps the source header untouched; column renaming and
//! numeric coercion happen later in the processing stage.

use serde_json::{Map, Value};

use crate::error::{GradeError, Result};

/// One cell as read from the source, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    /// JSON integer, kept exact so identifiers above 2^53 survive
    Integer(i64),
    Number(f64),
    Empty,
}

impl RawValue {
    pub fn from_cell(cell: &str) -> Self {
        if cell.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(cell.to_string())
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawValue::Empty,
            Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Integer(i),
                // u64 above i64::MAX: text keeps the digits and lets coercion decide
                None if n.is_u64() => RawValue::Text(n.to_string()),
                None => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Empty),
            },
            Value::String(s) => RawValue::from_cell(s),
            // Booleans, arrays and objects are never numeric; keep them as text so coercion rejects them
            other => RawValue::Text(other.to_string()),
        }
    }
}

/// Cells of one source line, positionally aligned with [`RawTable::columns`].
pub type RawRow = Vec<RawValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { columns, rows }
    }

    /// Parse CSV bytes with a header row. The delimiter (`,` or `;`) is
    /// detected from the header line.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let header_start = first_non_blank_line(bytes).ok_or(GradeError::EmptyInput)?;
        let bytes = &bytes[header_start..];
        let header_line = bytes.split(|b| *b == b'\n').next().unwrap_or(bytes);
        let delimiter = detect_delimiter(header_line);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::None)
            .from_reader(bytes);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.iter().all(|c| c.trim().is_empty()) {
            return Err(GradeError::EmptyInput);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            // Ragged lines are padded so every row lines up with the header
            let row: RawRow = (0..columns.len())
                .map(|i| record.get(i).map(RawValue::from_cell).unwrap_or(RawValue::Empty))
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Build a table from a JSON array of flat objects. The header is the
    /// union of keys in first-seen order.
    pub fn from_json_records(records: &[Map<String, Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).map(RawValue::from).unwrap_or(RawValue::Empty))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Byte offset of the first line holding anything but whitespace.
fn first_non_blank_line(bytes: &[u8]) -> Option<usize> {
    let mut offset = 0;
    for line in bytes.split(|b| *b == b'\n') {
        if line.iter().any(|b| !b.is_ascii_whitespace()) {
            return Some(offset);
        }
        offset += line.len() + 1;
    }
    None
}

/// Semicolon wins only when it appears more often than the comma.
pub fn detect_delimiter(header_line: &[u8]) -> u8 {
    let commas = header_line.iter().filter(|b| **b == b',').count();
    let semicolons = header_line.iter().filter(|b| **b == b';').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comma_csv_is_parsed_with_header() {
        let table = RawTable::from_csv_bytes(b"X,Y,Z,Teneur%\n1,2,3,4.5\n").unwrap();
        assert_eq!(table.columns, vec!["X", "Y", "Z", "Teneur%"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0][3], RawValue::Text("4.5".to_string()));
    }

    #[test]
    fn semicolon_delimiter_is_detected() {
        let table = RawTable::from_csv_bytes(b"id;x;y;z;teneur\r\n7;1,5;2;3;0.4\r\n").unwrap();
        assert_eq!(table.columns.len(), 5);
        // Decimal comma stays inside the cell; coercion decides what to do with it
        assert_eq!(table.rows[0][1], RawValue::Text("1,5".to_string()));
    }

    #[test]
    fn bom_is_stripped_from_first_header() {
        let table = RawTable::from_csv_bytes(b"\xEF\xBB\xBFx,y,z,teneur\n1,2,3,4\n").unwrap();
        assert_eq!(table.columns[0], "x");
    }

    #[test]
    fn header_is_read_after_leading_blank_lines() {
        let table = RawTable::from_csv_bytes(b"   \r\n\n\t\nx;y;z;teneur\n1;2;3;4\n").unwrap();
        assert_eq!(table.columns, vec!["x", "y", "z", "teneur"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0][3], RawValue::Text("4".to_string()));

        let table = RawTable::from_csv_bytes(b"\xEF\xBB\xBF\n\nx,y,z,teneur\n1,2,3,4\n").unwrap();
        assert_eq!(table.columns[0], "x");
    }

    #[test]
    fn short_rows_are_padded_with_empty_cells() {
        let table = RawTable::from_csv_bytes(b"x,y,z,teneur\n1,2\n").unwrap();
        assert_eq!(table.rows[0].len(), 4);
        assert_eq!(table.rows[0][2], RawValue::Empty);
        assert_eq!(table.rows[0][3], RawValue::Empty);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(RawTable::from_csv_bytes(b""), Err(GradeError::EmptyInput)));
        assert!(matches!(RawTable::from_csv_bytes(b"\n  \n"), Err(GradeError::EmptyInput)));
    }

    #[test]
    fn json_records_union_their_keys() {
        let records = vec![
            json!({"x": 1.0, "y": 2, "z": "3"}).as_object().unwrap().clone(),
            json!({"x": 4.0, "teneur": null, "extra": true}).as_object().unwrap().clone(),
        ];
        let table = RawTable::from_json_records(&records);

        assert_eq!(table.columns, vec!["x", "y", "z", "teneur", "extra"]);
        assert_eq!(table.rows[0][0], RawValue::Number(1.0));
        assert_eq!(table.rows[0][1], RawValue::Integer(2));
        assert_eq!(table.rows[0][2], RawValue::Text("3".to_string()));
        assert_eq!(table.rows[1][1], RawValue::Empty);
        assert_eq!(table.rows[1][3], RawValue::Empty);
        assert_eq!(table.rows[1][4], RawValue::Text("true".to_string()));
    }

    #[test]
    fn json_integers_beyond_float_precision_stay_exact() {
        let records = vec![json!({"id": 9007199254740993_i64, "big": 18446744073709551615_u64})]
            .into_iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect::<Vec<_>>();
        let table = RawTable::from_json_records(&records);

        assert_eq!(table.rows[0][0], RawValue::Integer(9_007_199_254_740_993));
        assert_eq!(table.rows[0][1], RawValue::Text("18446744073709551615".to_string()));
    }
}
