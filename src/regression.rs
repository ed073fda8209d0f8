/// Ordinary least squares on standardized features
///
/// Consumes the labeled dataset produced by the regression sweep and explains
/// `missing_frac` from the run's stage probabilities and average transit time.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::error::RegressionError;
use crate::models::{RegressionTable, SupplyPath};

/// Singular values below this are treated as zero in the least-squares solve
const SINGULAR_VALUE_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Serialize)]
pub struct RegressionFit {
    pub path: SupplyPath,
    pub rows: usize,
    pub feature_names: Vec<&'static str>,
    /// One coefficient per standardized feature
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub r_squared: f64,
}

impl RegressionFit {
    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.feature_names
            .iter()
            .position(|feature| *feature == name)
            .and_then(|index| self.coefficients.get(index).copied())
    }
}

/// Center each column and scale it to unit population variance.
/// Constant columns (spread within rounding of the mean) become all zeros.
fn standardize(features: &mut DMatrix<f64>) {
    let rows = features.nrows() as f64;
    for mut column in features.column_iter_mut() {
        let mean = column.sum() / rows;
        let variance = column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / rows;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 || std_dev <= 10.0 * f64::EPSILON * mean.abs() {
            column.fill(0.0);
            continue;
        }
        for value in column.iter_mut() {
            *value = (*value - mean) / std_dev;
        }
    }
}

pub fn fit_standardized_ols(table: &RegressionTable) -> Result<RegressionFit, RegressionError> {
    if table.rows.is_empty() {
        return Err(RegressionError::EmptyTable);
    }
    let names = table.feature_names();
    let width = names.len();

    let mut values = Vec::with_capacity(table.rows.len() * width);
    for (index, row) in table.rows.iter().enumerate() {
        let features = row.features();
        if features.len() != width {
            return Err(RegressionError::RowWidth {
                row: index,
                expected: width,
                found: features.len(),
            });
        }
        values.extend(features);
    }

    let mut design = DMatrix::from_row_slice(table.rows.len(), width, &values);
    standardize(&mut design);

    let targets = DVector::from_vec(table.targets());
    let intercept = targets.mean();
    let centered = targets.map(|y| y - intercept);

    // Constant target: the intercept alone is an exact fit
    let tolerance = 10.0 * f64::EPSILON * intercept.abs();
    if centered.iter().all(|y| y.abs() <= tolerance) {
        return Ok(RegressionFit {
            path: table.path,
            rows: table.rows.len(),
            feature_names: names.to_vec(),
            coefficients: vec![0.0; width],
            intercept,
            r_squared: 1.0,
        });
    }

    let svd = design.clone().svd(true, true);
    let coefficients = svd
        .solve(&centered, SINGULAR_VALUE_EPS)
        .map_err(|e| RegressionError::Solve(e.to_string()))?;

    let residuals = &centered - &design * &coefficients;
    let ss_res = residuals.norm_squared();
    let ss_tot = centered.norm_squared();
    let r_squared = 1.0 - ss_res / ss_tot;

    Ok(RegressionFit {
        path: table.path,
        rows: table.rows.len(),
        feature_names: names.to_vec(),
        coefficients: coefficients.iter().copied().collect(),
        intercept,
        r_squared,
    })
}
