use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Per-feature min-max scaling onto [0, 1]
///
/// `scaled = x * scale + offset` with `scale = 1 / (max - min)` and
/// `offset = -min * scale`. A constant feature keeps `scale = 1` so it maps
/// to 0 instead of dividing by zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    data_min: Vec<f64>,
    data_max: Vec<f64>,
    scale: Vec<f64>,
    offset: Vec<f64>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.scale.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.scale.len()
    }

    pub fn data_min(&self) -> &[f64] {
        &self.data_min
    }

    pub fn data_max(&self) -> &[f64] {
        &self.data_max
    }

    /// Learns per-column minimum and maximum from (rows, features) data
    pub fn fit(&mut self, data: ArrayView2<f64>) -> Result<()> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(ForecastError::InsufficientData("cannot fit a scaler on empty data".to_string()));
        }

        self.data_min = data
            .axis_iter(Axis(1))
            .map(|col| col.fold(f64::INFINITY, |a, &b| a.min(b)))
            .collect();
        self.data_max = data
            .axis_iter(Axis(1))
            .map(|col| col.fold(f64::NEG_INFINITY, |a, &b| a.max(b)))
            .collect();
        self.scale = self
            .data_min
            .iter()
            .zip(&self.data_max)
            .map(|(min, max)| {
                let range = max - min;
                if range > 0.0 {
                    1.0 / range
                } else {
                    1.0
                }
            })
            .collect();
        self.offset = self
            .data_min
            .iter()
            .zip(&self.scale)
            .map(|(min, scale)| -min * scale)
            .collect();

        Ok(())
    }

    pub fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check(data.ncols())?;
        let mut scaled = data.to_owned();
        for (mut col, (scale, offset)) in scaled.axis_iter_mut(Axis(1)).zip(self.scale.iter().zip(&self.offset)) {
            col.mapv_inplace(|x| x * scale + offset);
        }
        Ok(scaled)
    }

    pub fn fit_transform(&mut self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(data)?;
        self.transform(data)
    }

    pub fn inverse_transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check(data.ncols())?;
        let mut restored = data.to_owned();
        for (mut col, (scale, offset)) in restored.axis_iter_mut(Axis(1)).zip(self.scale.iter().zip(&self.offset)) {
            col.mapv_inplace(|x| (x - offset) / scale);
        }
        Ok(restored)
    }

    /// Maps scaled values of a single feature back to its original unit
    pub fn inverse_transform_column(&self, column: usize, values: ArrayView1<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ForecastError::ScalerNotFitted);
        }
        let (scale, offset) = match (self.scale.get(column), self.offset.get(column)) {
            (Some(&scale), Some(&offset)) => (scale, offset),
            _ => {
                return Err(ForecastError::ShapeMismatch {
                    expected: format!("column index below {}", self.num_features()),
                    actual: format!("column {}", column),
                })
            }
        };

        let mut restored = Array1::zeros(values.len());
        Zip::from(&mut restored)
            .and(&values)
            .for_each(|out, &x| *out = (x - offset) / scale);
        Ok(restored)
    }

    fn check(&self, features: usize) -> Result<()> {
        if !self.is_fitted() {
            return Err(ForecastError::ScalerNotFitted);
        }
        if features != self.num_features() {
            return Err(ForecastError::ShapeMismatch {
                expected: format!("{} features", self.num_features()),
                actual: format!("{} features", features),
            });
        }
        Ok(())
    }
}
