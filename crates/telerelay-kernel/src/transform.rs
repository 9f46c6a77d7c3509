//! Linear joint transform and gripper transform.
//!
//! [`LinearTransform`] computes `dest = matrix · mapped + offsets` with a
//! plain floating-point matrix-vector product.  Nothing is clamped here;
//! range enforcement belongs to the
//! [`SafetyValidator`][crate::validator::SafetyValidator].
//!
//! # Example
//!
//! ```rust
//! use telerelay_kernel::transform::LinearTransform;
//!
//! // Swap two joints and flip the sign of the second.
//! let t = LinearTransform::from_rows(&[vec![0.0, 1.0], vec![-1.0, 0.0]], None, 2, 2).unwrap();
//! assert_eq!(t.apply(&[0.25, 0.5]), vec![0.5, -0.25]);
//! ```

use telerelay_types::ConfigError;

// ────────────────────────────────────────────────────────────────────────────
// LinearTransform
// ────────────────────────────────────────────────────────────────────────────

/// Fixed `M×N` matrix plus an `M`-length offset vector.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTransform {
    rows: usize,
    cols: usize,
    /// Row-major coefficients, `rows * cols` long.
    coefficients: Vec<f64>,
    offsets: Vec<f64>,
}

impl LinearTransform {
    /// `n×n` identity with zero offsets.
    pub fn identity(n: usize) -> Self {
        let mut coefficients = vec![0.0; n * n];
        for i in 0..n {
            coefficients[i * n + i] = 1.0;
        }
        Self {
            rows: n,
            cols: n,
            coefficients,
            offsets: vec![0.0; n],
        }
    }

    /// Build from nested rows, checking that the matrix is exactly
    /// `expected_rows × expected_cols` and every entry is finite.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MatrixShape`] – wrong row count or a ragged row.
    /// - [`ConfigError::NonFiniteMatrix`] – NaN or infinite coefficient.
    /// - [`ConfigError::OffsetLength`] – `offsets` is not `expected_rows` long.
    pub fn from_rows(
        matrix: &[Vec<f64>],
        offsets: Option<&[f64]>,
        expected_rows: usize,
        expected_cols: usize,
    ) -> Result<Self, ConfigError> {
        if matrix.len() != expected_rows {
            return Err(ConfigError::MatrixShape(format!(
                "matrix has {} rows, destination has {} joints",
                matrix.len(),
                expected_rows
            )));
        }
        let mut coefficients = Vec::with_capacity(expected_rows * expected_cols);
        for (r, row) in matrix.iter().enumerate() {
            if row.len() != expected_cols {
                return Err(ConfigError::MatrixShape(format!(
                    "row {r} has {} columns, mapped vector has {} joints",
                    row.len(),
                    expected_cols
                )));
            }
            for (c, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(ConfigError::NonFiniteMatrix { row: r, col: c });
                }
                coefficients.push(value);
            }
        }
        let mut transform = Self {
            rows: expected_rows,
            cols: expected_cols,
            coefficients,
            offsets: vec![0.0; expected_rows],
        };
        if let Some(offsets) = offsets {
            transform = transform.with_offsets(offsets)?;
        }
        Ok(transform)
    }

    /// Replace the offset vector.
    pub fn with_offsets(mut self, offsets: &[f64]) -> Result<Self, ConfigError> {
        if offsets.len() != self.rows {
            return Err(ConfigError::OffsetLength {
                expected: self.rows,
                got: offsets.len(),
            });
        }
        if let Some(index) = offsets.iter().position(|v| !v.is_finite()) {
            return Err(ConfigError::NonFiniteOffset(index));
        }
        self.offsets = offsets.to_vec();
        Ok(self)
    }

    /// Number of output joints (M).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of input joints (N).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `matrix · x + offsets`.  Inputs shorter than N read missing entries as
    /// NaN.
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        self.coefficients
            .chunks_exact(self.cols.max(1))
            .zip(&self.offsets)
            .map(|(row, offset)| {
                let dot: f64 = row
                    .iter()
                    .enumerate()
                    .map(|(c, a)| a * x.get(c).copied().unwrap_or(f64::NAN))
                    .sum();
                dot + offset
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GripperTransform
// ────────────────────────────────────────────────────────────────────────────

/// `clamp(g * scale + offset, 0, 1)` for the gripper channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GripperTransform {
    scale: f64,
    offset: f64,
}

impl GripperTransform {
    pub fn new(scale: f64, offset: f64) -> Result<Self, ConfigError> {
        if !scale.is_finite() || !offset.is_finite() {
            return Err(ConfigError::InvalidGripper(format!(
                "scale {scale} and offset {offset} must be finite"
            )));
        }
        Ok(Self { scale, offset })
    }

    pub fn apply(&self, gripper: f64) -> f64 {
        (gripper * self.scale + self.offset).clamp(0.0, 1.0)
    }
}

impl Default for GripperTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_exact() {
        let t = LinearTransform::identity(3);
        let x = [0.1, -2.5, 1e-9];
        assert_eq!(t.apply(&x), x.to_vec());
    }

    #[test]
    fn non_square_matrix_changes_length() {
        // 1×2: sum the two mapped joints.
        let t = LinearTransform::from_rows(&[vec![1.0, 1.0]], None, 1, 2).unwrap();
        assert_eq!(t.apply(&[0.25, 0.5]), vec![0.75]);
    }

    #[test]
    fn offsets_are_added_after_matrix() {
        let t = LinearTransform::from_rows(&[vec![2.0]], Some(&[0.5]), 1, 1).unwrap();
        assert_eq!(t.apply(&[1.0]), vec![2.5]);
    }

    #[test]
    fn wrong_row_count_is_config_error() {
        let result = LinearTransform::from_rows(&[vec![1.0]], None, 2, 1);
        assert!(matches!(result, Err(ConfigError::MatrixShape(_))));
    }

    #[test]
    fn ragged_row_is_config_error() {
        let result = LinearTransform::from_rows(&[vec![1.0, 0.0], vec![1.0]], None, 2, 2);
        assert!(matches!(result, Err(ConfigError::MatrixShape(_))));
    }

    #[test]
    fn nan_coefficient_is_config_error() {
        let result = LinearTransform::from_rows(&[vec![f64::NAN]], None, 1, 1);
        assert_eq!(result, Err(ConfigError::NonFiniteMatrix { row: 0, col: 0 }));
    }

    #[test]
    fn offset_length_mismatch_is_config_error() {
        let result = LinearTransform::identity(2).with_offsets(&[0.1]);
        assert_eq!(
            result,
            Err(ConfigError::OffsetLength {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn no_clamping_in_linear_transform() {
        let t = LinearTransform::from_rows(&[vec![100.0]], None, 1, 1).unwrap();
        assert_eq!(t.apply(&[1.0]), vec![100.0]);
    }

    #[test]
    fn gripper_scale_and_offset() {
        let g = GripperTransform::new(2.0, 0.1).unwrap();
        assert!((g.apply(0.4) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn gripper_is_clamped_to_unit_range() {
        let g = GripperTransform::new(2.0, 0.5).unwrap();
        assert_eq!(g.apply(0.8), 1.0);
        let g = GripperTransform::new(1.0, -0.5).unwrap();
        assert_eq!(g.apply(0.2), 0.0);
    }

    #[test]
    fn default_gripper_is_identity_inside_range() {
        assert_eq!(GripperTransform::default().apply(0.3), 0.3);
    }
}
