//! Column-name normalization across inconsistent CSV schemas.
//!
//! Source headers such as `X`, `x coord`, `Teneur (%)` or `grade` are mapped
//! onto the five canonical keys. Columns that match no synonym are ignored.
//!
//! When two source columns resolve to the same canonical key, the column that
//! appears later in the header wins. This is long-standing behaviour that
//! uploads rely on; it is kept as-is and covered by a test.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::constants::{COL_ID, COL_TENEUR, COL_X, COL_Y, COL_Z};
use crate::error::{GradeError, Result};
use crate::pipeline::ingestion::raw_table::{RawRow, RawTable, RawValue};

static DISALLOWED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("static pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalKey {
    Id,
    XCoord,
    YCoord,
    ZCoord,
    Teneur,
}

impl CanonicalKey {
    /// Keys that must be present for an ingest to proceed.
    pub const REQUIRED: [CanonicalKey; 4] = [
        CanonicalKey::XCoord,
        CanonicalKey::YCoord,
        CanonicalKey::ZCoord,
        CanonicalKey::Teneur,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalKey::Id => COL_ID,
            CanonicalKey::XCoord => COL_X,
            CanonicalKey::YCoord => COL_Y,
            CanonicalKey::ZCoord => COL_Z,
            CanonicalKey::Teneur => COL_TENEUR,
        }
    }

    /// Match an already-normalized column name against the synonym sets.
    pub fn from_normalized(name: &str) -> Option<Self> {
        match name {
            "id" => Some(CanonicalKey::Id),
            "x" | "x_coord" | "xcoordinate" => Some(CanonicalKey::XCoord),
            "y" | "y_coord" | "ycoordinate" => Some(CanonicalKey::YCoord),
            "z" | "z_coord" | "zcoordinate" => Some(CanonicalKey::ZCoord),
            "teneur" | "teneur_" | "teneurpercent" | "teneur_percent" | "grade" => {
                Some(CanonicalKey::Teneur)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-case, trim, `%` → `percent`, spaces → `_`, then drop anything outside `[a-z0-9_]`.
pub fn normalize_column_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let replaced = lowered.trim().replace('%', "percent").replace(' ', "_");
    DISALLOWED_CHARS.replace_all(&replaced, "").into_owned()
}

/// A row restricted to the canonical keys.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub id: Option<RawValue>,
    pub x_coord: RawValue,
    pub y_coord: RawValue,
    pub z_coord: RawValue,
    pub teneur: RawValue,
}

/// Resolved source column index for every canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub id: Option<usize>,
    pub x_coord: usize,
    pub y_coord: usize,
    pub z_coord: usize,
    pub teneur: usize,
    /// Source columns that matched no synonym
    pub ignored: Vec<String>,
}

impl ColumnMapping {
    pub fn apply(&self, row: &RawRow) -> NormalizedRow {
        let cell = |idx: usize| row.get(idx).cloned().unwrap_or(RawValue::Empty);
        NormalizedRow {
            id: self.id.map(cell),
            x_coord: cell(self.x_coord),
            y_coord: cell(self.y_coord),
            z_coord: cell(self.z_coord),
            teneur: cell(self.teneur),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ColumnNormalizer;

impl ColumnNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Rename pass over the header: every source column that matches a
    /// synonym, in header order, paired with its canonical key.
    pub fn rename_map(&self, columns: &[String]) -> Vec<(String, CanonicalKey)> {
        columns
            .iter()
            .filter_map(|source| {
                CanonicalKey::from_normalized(&normalize_column_name(source)).map(|key| (source.clone(), key))
            })
            .collect()
    }

    /// Resolve each canonical key to one source column, failing when any
    /// required key is missing.
    pub fn resolve(&self, columns: &[String]) -> Result<ColumnMapping> {
        let mut resolved: BTreeMap<CanonicalKey, usize> = BTreeMap::new();
        let mut ignored = Vec::new();

        for (idx, source) in columns.iter().enumerate() {
            let normalized = normalize_column_name(source);
            match CanonicalKey::from_normalized(&normalized) {
                Some(key) => {
                    if let Some(previous) = resolved.insert(key, idx) {
                        warn!(
                            canonical = %key,
                            shadowed = %columns[previous],
                            winner = %source,
                            "Two source columns map to the same canonical key; keeping the later one"
                        );
                    }
                }
                None => ignored.push(source.clone()),
            }
        }

        let missing: Vec<String> = CanonicalKey::REQUIRED
            .iter()
            .filter(|key| !resolved.contains_key(*key))
            .map(|key| key.as_str().to_string())
            .collect();

        if !missing.is_empty() {
            return Err(GradeError::Schema {
                missing,
                found: columns.to_vec(),
            });
        }

        if !ignored.is_empty() {
            debug!(columns = ?ignored, "Ignoring unrecognised columns");
        }

        Ok(ColumnMapping {
            id: resolved.get(&CanonicalKey::Id).copied(),
            x_coord: resolved[&CanonicalKey::XCoord],
            y_coord: resolved[&CanonicalKey::YCoord],
            z_coord: resolved[&CanonicalKey::ZCoord],
            teneur: resolved[&CanonicalKey::Teneur],
            ignored,
        })
    }

    /// Resolve the header and project every row onto the canonical keys.
    pub fn normalize_table(&self, table: &RawTable) -> Result<Vec<NormalizedRow>> {
        let mapping = self.resolve(&table.columns)?;
        Ok(table.rows.iter().map(|row| mapping.apply(row)).collect())
    }
}
