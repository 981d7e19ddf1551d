use serde::Serialize;
use tracing::debug;

use crate::pipeline::ingestion::raw_table::RawValue;
use crate::pipeline::processing::normalize::{CanonicalKey, NormalizedRow};

/// A row whose required fields are all finite numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRow {
    /// Explicit identifier from the source, when it coerced to an integer
    pub id: Option<i64>,
    pub x_coord: f64,
    pub y_coord: f64,
    pub z_coord: f64,
    pub teneur: f64,
}

/// Why a single field failed coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionFailure {
    Empty,
    NotNumeric(String),
    NonFinite,
}

/// A dropped row. Never fatal to the batch; kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRejected {
    /// Zero-based position of the row in the incoming table
    pub row_index: usize,
    pub failures: Vec<(CanonicalKey, CoercionFailure)>,
}

#[derive(Debug, Clone, Default)]
pub struct CoercionOutcome {
    pub rows: Vec<ValidatedRow>,
    pub rejected: Vec<RowRejected>,
    pub received: usize,
}

impl CoercionOutcome {
    pub fn retained(&self) -> usize {
        self.rows.len()
    }

    pub fn dropped(&self) -> usize {
        self.received - self.retained()
    }
}

/// Coerce a raw cell to a finite `f64`.
pub fn coerce_float(value: &RawValue) -> Result<f64, CoercionFailure> {
    let parsed = match value {
        RawValue::Empty => return Err(CoercionFailure::Empty),
        RawValue::Integer(i) => *i as f64,
        RawValue::Number(n) => *n,
        RawValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(CoercionFailure::Empty);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| CoercionFailure::NotNumeric(trimmed.to_string()))?
        }
    };
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(CoercionFailure::NonFinite)
    }
}

/// Largest magnitude below which every integer has an exact `f64`.
const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

/// Coerce a raw cell to an integer identifier. Integral floats such as
/// `"12.0"` are accepted while they are exact; anything else is treated as
/// no identifier.
pub fn coerce_id(value: &RawValue) -> Option<i64> {
    match value {
        RawValue::Integer(i) => return Some(*i),
        RawValue::Text(text) => {
            if let Ok(id) = text.trim().parse::<i64>() {
                return Some(id);
            }
        }
        _ => {}
    }
    let as_float = coerce_float(value).ok()?;
    if as_float.fract() == 0.0 && as_float.abs() <= MAX_EXACT_FLOAT_ID {
        Some(as_float as i64)
    } else {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RowCoercer;

impl RowCoercer {
    pub fn new() -> Self {
        Self
    }

    /// Validate one row; every required field is attempted so the rejection
    /// lists all failing fields, not only the first.
    pub fn coerce_row(&self, row: &NormalizedRow) -> Result<ValidatedRow, Vec<(CanonicalKey, CoercionFailure)>> {
        let mut failures = Vec::new();
        let mut field = |key: CanonicalKey, value: &RawValue| match coerce_float(value) {
            Ok(v) => v,
            Err(e) => {
                failures.push((key, e));
                f64::NAN
            }
        };

        let x_coord = field(CanonicalKey::XCoord, &row.x_coord);
        let y_coord = field(CanonicalKey::YCoord, &row.y_coord);
        let z_coord = field(CanonicalKey::ZCoord, &row.z_coord);
        let teneur = field(CanonicalKey::Teneur, &row.teneur);

        if !failures.is_empty() {
            return Err(failures);
        }

        Ok(ValidatedRow {
            id: row.id.as_ref().and_then(coerce_id),
            x_coord,
            y_coord,
            z_coord,
            teneur,
        })
    }

    pub fn coerce(&self, rows: &[NormalizedRow]) -> CoercionOutcome {
        let mut outcome = CoercionOutcome {
            received: rows.len(),
            ..Default::default()
        };

        for (row_index, row) in rows.iter().enumerate() {
            match self.coerce_row(row) {
                Ok(valid) => outcome.rows.push(valid),
                Err(failures) => {
                    debug!(row_index, ?failures, "Dropping row that failed numeric coercion");
                    outcome.rejected.push(RowRejected { row_index, failures });
                }
            }
        }

        outcome
    }
}
