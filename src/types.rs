use serde::{Deserialize, Serialize};

/// A persisted drill-hole sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: i64,
    pub x_coord: f64,
    pub y_coord: f64,
    pub z_coord: f64,
    pub teneur: f64,
}

/// Coordinates a grade is predicted for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    pub x_coord: f64,
    pub y_coord: f64,
    pub z_coord: f64,
}

impl FeaturePoint {
    pub fn new(x_coord: f64, y_coord: f64, z_coord: f64) -> Self {
        Self {
            x_coord,
            y_coord,
            z_coord,
        }
    }

    pub fn to_vec(self) -> Vec<f64> {
        vec![self.x_coord, self.y_coord, self.z_coord]
    }
}

/// Summary returned to the caller after an ingest call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub rows_received: usize,
    pub rows_inserted: usize,
    pub rows_dropped: usize,
    pub duplicate_ids_handled: usize,
    /// Next identifier the reconciler would have handed out; diagnostic only.
    /// `None` when the id space above the largest stored id is used up.
    pub next_available_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "predicted_teneur")]
    pub predicted_value: f64,
    #[serde(rename = "model")]
    pub model_name: String,
}
