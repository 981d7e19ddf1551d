//! Pre-fitted transform artifacts.
//!
//! Each artifact is the fitted parameter set of a scikit-learn estimator,
//! exported as JSON. Parameters are validated while deserializing, so a loaded
//! artifact is always internally consistent; only the width of the incoming
//! vector is checked per call.

use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("expected {expected} input features, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("stage produced a non-finite value")]
    NonFinite,
}

/// A fitted feature transform.
pub trait Transform {
    fn n_features_in(&self) -> usize;

    fn transform(&self, input: ArrayView1<'_, f64>) -> Result<Array1<f64>, TransformError>;
}

/// A fitted regressor producing one scalar per sample.
pub trait Regressor {
    fn n_features_in(&self) -> usize;

    fn predict(&self, input: ArrayView1<'_, f64>) -> Result<f64, TransformError>;
}

fn check_width(expected: usize, input: &ArrayView1<'_, f64>) -> Result<(), TransformError> {
    if input.len() == expected {
        Ok(())
    } else {
        Err(TransformError::ShapeMismatch {
            expected,
            got: input.len(),
        })
    }
}

fn finite(output: Array1<f64>) -> Result<Array1<f64>, TransformError> {
    if output.iter().all(|v| v.is_finite()) {
        Ok(output)
    } else {
        Err(TransformError::NonFinite)
    }
}

fn to_array2(rows: Vec<Vec<f64>>, what: &str) -> Result<Array2<f64>, String> {
    let n_rows = rows.len();
    let n_cols = rows.first().map(Vec::len).unwrap_or(0);
    if n_rows == 0 || n_cols == 0 {
        return Err(format!("{what} must be a non-empty matrix"));
    }
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(format!("{what} rows have inconsistent lengths"));
    }
    Array2::from_shape_vec((n_rows, n_cols), rows.into_iter().flatten().collect()).map_err(|e| format!("{what}: {e}"))
}

// ---------------------------------------------------------------------------
// Polynomial expansion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct PolynomialParams {
    n_features_in: usize,
    degree: u32,
    #[serde(default = "default_true")]
    include_bias: bool,
    #[serde(default)]
    interaction_only: bool,
}

fn default_true() -> bool {
    true
}

/// Monomial expansion matching `sklearn.preprocessing.PolynomialFeatures`
/// output ordering.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PolynomialParams")]
pub struct PolynomialFeatures {
    pub n_features_in: usize,
    pub degree: u32,
    pub include_bias: bool,
    pub interaction_only: bool,
    /// Feature indices multiplied together for each output column
    terms: Vec<Vec<usize>>,
}

impl TryFrom<PolynomialParams> for PolynomialFeatures {
    type Error = String;

    fn try_from(p: PolynomialParams) -> Result<Self, Self::Error> {
        Self::new(p.n_features_in, p.degree, p.include_bias, p.interaction_only)
    }
}

impl PolynomialFeatures {
    pub fn new(n_features_in: usize, degree: u32, include_bias: bool, interaction_only: bool) -> Result<Self, String> {
        if n_features_in == 0 {
            return Err("n_features_in must be at least 1".to_string());
        }
        if degree == 0 && !include_bias {
            return Err("degree 0 without bias produces no features".to_string());
        }

        let first_degree = if include_bias { 0 } else { 1 };
        let mut terms = Vec::new();
        for d in first_degree..=degree as usize {
            let mut current = Vec::with_capacity(d);
            push_combinations(0, n_features_in, d, !interaction_only, &mut current, &mut terms);
        }

        Ok(Self {
            n_features_in,
            degree,
            include_bias,
            interaction_only,
            terms,
        })
    }

    pub fn n_output_features(&self) -> usize {
        self.terms.len()
    }
}

/// Lexicographic combinations of `k` indices out of `n`.
fn push_combinations(
    start: usize,
    n: usize,
    k: usize,
    with_replacement: bool,
    current: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if current.len() == k {
        out.push(current.clone());
        return;
    }
    for i in start..n {
        current.push(i);
        let next = if with_replacement { i } else { i + 1 };
        push_combinations(next, n, k, with_replacement, current, out);
        current.pop();
    }
}

impl Transform for PolynomialFeatures {
    fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    fn transform(&self, input: ArrayView1<'_, f64>) -> Result<Array1<f64>, TransformError> {
        check_width(self.n_features_in, &input)?;
        let out: Array1<f64> = self
            .terms
            .iter()
            .map(|term| term.iter().map(|&i| input[i]).product::<f64>())
            .collect();
        finite(out)
    }
}

// ---------------------------------------------------------------------------
// Standard scaling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ScalerParams {
    n_features_in: usize,
    #[serde(default)]
    mean: Option<Vec<f64>>,
    #[serde(default)]
    scale: Option<Vec<f64>>,
}

/// `sklearn.preprocessing.StandardScaler`: `(x - mean) / scale`.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ScalerParams")]
pub struct StandardScaler {
    pub n_features_in: usize,
    pub mean: Option<Array1<f64>>,
    pub scale: Option<Array1<f64>>,
}

impl TryFrom<ScalerParams> for StandardScaler {
    type Error = String;

    fn try_from(p: ScalerParams) -> Result<Self, Self::Error> {
        Self::new(p.n_features_in, p.mean, p.scale)
    }
}

impl StandardScaler {
    pub fn new(n_features_in: usize, mean: Option<Vec<f64>>, scale: Option<Vec<f64>>) -> Result<Self, String> {
        for (name, values) in [("mean", &mean), ("scale", &scale)] {
            if let Some(v) = values {
                if v.len() != n_features_in {
                    return Err(format!("{name} has {} entries, expected {n_features_in}", v.len()));
                }
            }
        }
        // Zero variance features are left unscaled, as at fit time
        let scale = scale.map(|s| s.into_iter().map(|v| if v == 0.0 { 1.0 } else { v }).collect());
        Ok(Self {
            n_features_in,
            mean: mean.map(Array1::from),
            scale,
        })
    }
}

impl Transform for StandardScaler {
    fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    fn transform(&self, input: ArrayView1<'_, f64>) -> Result<Array1<f64>, TransformError> {
        check_width(self.n_features_in, &input)?;
        let mut out = input.to_owned();
        if let Some(mean) = &self.mean {
            out -= mean;
        }
        if let Some(scale) = &self.scale {
            out /= scale;
        }
        finite(out)
    }
}

// ---------------------------------------------------------------------------
// Principal component projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct PcaParams {
    mean: Vec<f64>,
    components: Vec<Vec<f64>>,
    #[serde(default)]
    whiten: bool,
    #[serde(default)]
    explained_variance: Option<Vec<f64>>,
}

/// `sklearn.decomposition.PCA` projection onto fitted components.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PcaParams")]
pub struct Pca {
    pub mean: Array1<f64>,
    /// `n_components x n_features`
    pub components: Array2<f64>,
    pub whiten: bool,
    pub explained_variance: Option<Array1<f64>>,
}

impl TryFrom<PcaParams> for Pca {
    type Error = String;

    fn try_from(p: PcaParams) -> Result<Self, Self::Error> {
        Self::new(p.mean, p.components, p.whiten, p.explained_variance)
    }
}

impl Pca {
    pub fn new(
        mean: Vec<f64>,
        components: Vec<Vec<f64>>,
        whiten: bool,
        explained_variance: Option<Vec<f64>>,
    ) -> Result<Self, String> {
        let components = to_array2(components, "components")?;
        if mean.len() != components.ncols() {
            return Err(format!(
                "mean has {} entries but components have {} columns",
                mean.len(),
                components.ncols()
            ));
        }
        if whiten {
            match &explained_variance {
                Some(ev) if ev.len() == components.nrows() && ev.iter().all(|v| *v > 0.0) => {}
                Some(_) => return Err("explained_variance must be positive, one per component".to_string()),
                None => return Err("whiten requires explained_variance".to_string()),
            }
        }
        Ok(Self {
            mean: Array1::from(mean),
            components,
            whiten,
            explained_variance: explained_variance.map(Array1::from),
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }
}

impl Transform for Pca {
    fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn transform(&self, input: ArrayView1<'_, f64>) -> Result<Array1<f64>, TransformError> {
        check_width(self.mean.len(), &input)?;
        let centered = &input - &self.mean;
        let mut projected = self.components.dot(&centered);
        if self.whiten {
            if let Some(ev) = &self.explained_variance {
                projected /= &ev.mapv(f64::sqrt);
            }
        }
        finite(projected)
    }
}

// ---------------------------------------------------------------------------
// Nearest-neighbour regression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NeighborWeights {
    #[default]
    Uniform,
    Distance,
}

#[derive(Debug, Clone, Deserialize)]
struct KnnParams {
    fit_x: Vec<Vec<f64>>,
    fit_y: Vec<f64>,
    n_neighbors: usize,
    #[serde(default)]
    weights: NeighborWeights,
    #[serde(default = "default_p")]
    p: f64,
}

fn default_p() -> f64 {
    2.0
}

/// `sklearn.neighbors.KNeighborsRegressor` with a Minkowski metric.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "KnnParams")]
pub struct KNeighborsRegressor {
    pub fit_x: Array2<f64>,
    pub fit_y: Array1<f64>,
    pub n_neighbors: usize,
    pub weights: NeighborWeights,
    pub p: f64,
}

impl TryFrom<KnnParams> for KNeighborsRegressor {
    type Error = String;

    fn try_from(p: KnnParams) -> Result<Self, Self::Error> {
        Self::new(p.fit_x, p.fit_y, p.n_neighbors, p.weights, p.p)
    }
}

impl KNeighborsRegressor {
    pub fn new(
        fit_x: Vec<Vec<f64>>,
        fit_y: Vec<f64>,
        n_neighbors: usize,
        weights: NeighborWeights,
        p: f64,
    ) -> Result<Self, String> {
        let fit_x = to_array2(fit_x, "fit_x")?;
        if fit_y.len() != fit_x.nrows() {
            return Err(format!("fit_y has {} targets for {} samples", fit_y.len(), fit_x.nrows()));
        }
        if n_neighbors == 0 || n_neighbors > fit_x.nrows() {
            return Err(format!(
                "n_neighbors must be between 1 and {} (got {n_neighbors})",
                fit_x.nrows()
            ));
        }
        if !(p >= 1.0) || !p.is_finite() {
            return Err(format!("p must be a finite value >= 1 (got {p})"));
        }
        Ok(Self {
            fit_x,
            fit_y: Array1::from(fit_y),
            n_neighbors,
            weights,
            p,
        })
    }

    fn distance(&self, a: ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> f64 {
        let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
        if self.p == 2.0 {
            diffs.map(|d| d * d).sum::<f64>().sqrt()
        } else if self.p == 1.0 {
            diffs.sum()
        } else {
            diffs.map(|d| d.powf(self.p)).sum::<f64>().powf(1.0 / self.p)
        }
    }

    /// Indices and distances of the `n_neighbors` closest fitted samples.
    /// Ties on distance keep the lower sample index first.
    pub fn kneighbors(&self, input: ArrayView1<'_, f64>) -> Result<Vec<(usize, f64)>, TransformError> {
        check_width(self.fit_x.ncols(), &input)?;
        let mut dists: Vec<(usize, f64)> = self
            .fit_x
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| (i, self.distance(row, &input)))
            .collect();
        dists.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        dists.truncate(self.n_neighbors);
        Ok(dists)
    }
}

impl Regressor for KNeighborsRegressor {
    fn n_features_in(&self) -> usize {
        self.fit_x.ncols()
    }

    fn predict(&self, input: ArrayView1<'_, f64>) -> Result<f64, TransformError> {
        let neighbors = self.kneighbors(input)?;

        let value = match self.weights {
            NeighborWeights::Uniform => {
                neighbors.iter().map(|(i, _)| self.fit_y[*i]).sum::<f64>() / neighbors.len() as f64
            }
            NeighborWeights::Distance => {
                let exact: Vec<f64> = neighbors
                    .iter()
                    .filter(|(_, d)| *d == 0.0)
                    .map(|(i, _)| self.fit_y[*i])
                    .collect();
                if !exact.is_empty() {
                    // Exact matches take all the weight
                    exact.iter().sum::<f64>() / exact.len() as f64
                } else {
                    let (num, den) = neighbors.iter().fold((0.0, 0.0), |(num, den), (i, d)| {
                        (num + self.fit_y[*i] / d, den + 1.0 / d)
                    });
                    num / den
                }
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(TransformError::NonFinite)
        }
    }
}
