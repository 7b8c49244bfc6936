//! Fixed-length sliding windows over a series.

use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use std::ops::Range;

use crate::error::{ForecastError, Result};

/// Input windows paired with the observation that follows each of them
#[derive(Clone, Debug, PartialEq)]
pub struct WindowedDataset {
    /// (windows, window_len, features)
    pub inputs: Array3<f64>,
    /// (windows, target features)
    pub targets: Array2<f64>,
    /// Row of the source series holding the first target
    pub first_target_row: usize,
}

/// Slides a window of `window_len` rows over `data` with stride 1.
///
/// Window i covers rows `[i, i + window_len)` and its target is row
/// `i + window_len`, giving `rows - window_len` pairs. Fails when the
/// window is empty or does not leave at least one target row.
pub fn create_sequences(data: ArrayView2<f64>, window_len: usize) -> Result<WindowedDataset> {
    let (rows, features) = data.dim();
    if window_len == 0 {
        return Err(ForecastError::InsufficientData("window length must be positive".to_string()));
    }
    if rows <= window_len {
        return Err(ForecastError::InsufficientData(format!(
            "{} rows cannot form a window of {} plus a target",
            rows, window_len
        )));
    }

    let count = rows - window_len;
    let mut inputs = Array3::zeros((count, window_len, features));
    for (i, mut window) in inputs.axis_iter_mut(Axis(0)).enumerate() {
        window.assign(&data.slice(s![i..i + window_len, ..]));
    }
    let targets = data.slice(s![window_len.., ..]).to_owned();

    Ok(WindowedDataset {
        inputs,
        targets,
        first_target_row: window_len,
    })
}

impl WindowedDataset {
    pub fn len(&self) -> usize {
        self.inputs.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn window_len(&self) -> usize {
        self.inputs.len_of(Axis(1))
    }

    pub fn num_features(&self) -> usize {
        self.inputs.len_of(Axis(2))
    }

    /// Shifts the recorded target rows, for windows built over a slice of a larger series
    pub fn with_row_offset(mut self, offset: usize) -> Self {
        self.first_target_row += offset;
        self
    }

    /// Series rows of the targets, in window order
    pub fn target_rows(&self) -> Range<usize> {
        self.first_target_row..self.first_target_row + self.len()
    }

    /// A contiguous run of windows
    pub fn slice(&self, range: Range<usize>) -> WindowedDataset {
        WindowedDataset {
            inputs: self.inputs.slice(s![range.clone(), .., ..]).to_owned(),
            targets: self.targets.slice(s![range.clone(), ..]).to_owned(),
            first_target_row: self.first_target_row + range.start,
        }
    }

    /// Keeps every input feature but only one target feature
    pub fn target_column(&self, column: usize) -> Result<WindowedDataset> {
        if column >= self.targets.ncols() {
            return Err(ForecastError::ShapeMismatch {
                expected: format!("target column below {}", self.targets.ncols()),
                actual: format!("column {}", column),
            });
        }
        Ok(WindowedDataset {
            inputs: self.inputs.clone(),
            targets: self.targets.slice(s![.., column..column + 1]).to_owned(),
            first_target_row: self.first_target_row,
        })
    }

    /// Gathers arbitrary windows into a mini-batch
    pub fn select(&self, indices: &[usize]) -> (Array3<f64>, Array2<f64>) {
        (
            self.inputs.select(Axis(0), indices),
            self.targets.select(Axis(0), indices),
        )
    }
}
