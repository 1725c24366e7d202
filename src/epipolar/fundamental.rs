//! Fundamental matrix estimation from two-view point correspondences.
//!
//! Implements the unnormalized 8-point method: every correspondence
//! contributes one linear constraint on the nine entries of `F`, the
//! constraints are stacked into a design matrix, and the solution is the
//! null-space direction recovered from a singular value decomposition.
//! A single closed-form solve, no iteration, no randomness.
//!
//! Input points must be in centered coordinates (relative to the image
//! midpoint). The method is sensitive to coordinate scale, which is why the
//! caller centers the data before it reaches this module.

use crate::epipolar::EpipolarError;
use log::debug;
use nalgebra::{DMatrix, Matrix3, Point2};

/// Minimum number of correspondences for a unique linear solve up to scale.
pub const MIN_CORRESPONDENCES: usize = 8;

/// Singular values this far below the largest one (relatively) are treated
/// as numerically zero when checking for a rank-deficient design matrix.
const DEGENERACY_TOLERANCE: f64 = 1e-10;

/// A fundamental matrix recovered from point correspondences, together with
/// the singular-value spectrum of the design matrix.
///
/// The spectrum is advisory: a rank-deficient configuration (for example,
/// all points collinear) is not a hard failure of the solve, but it makes
/// the recovered matrix ambiguous. [`FundamentalEstimate::is_near_degenerate`]
/// flags that situation so the caller can warn or abort.
#[derive(Debug, Clone)]
pub struct FundamentalEstimate {
    /// The estimated fundamental matrix, defined up to scale and sign.
    pub matrix: Matrix3<f64>,
    /// Singular values of the design matrix, sorted ascending.
    pub singular_values: Vec<f64>,
}

impl FundamentalEstimate {
    /// Smallest singular value of the design matrix.
    ///
    /// Close to zero for consistent correspondences; its magnitude relative
    /// to the rest of the spectrum measures how well the data pins down `F`.
    pub fn smallest_singular_value(&self) -> f64 {
        self.singular_values[0]
    }

    /// Whether the null space of the design matrix is effectively more than
    /// one-dimensional, i.e. the smallest singular value is not unique.
    ///
    /// True when the second-smallest singular value is negligible relative
    /// to the largest. The solve still returns a least-squares-optimal
    /// matrix in that case; it is just not the only one.
    pub fn is_near_degenerate(&self) -> bool {
        match (self.singular_values.get(1), self.singular_values.last()) {
            (Some(second), Some(largest)) => *second <= DEGENERACY_TOLERANCE * largest,
            _ => true,
        }
    }
}

/// Estimates the fundamental matrix relating two camera views.
///
/// `points1[i]` in the first image corresponds to `points2[i]` in the
/// second, both in centered coordinates. The returned matrix satisfies
/// `q^T * F * p ≈ 0` for every corresponding pair `(p, q)` and is defined
/// up to an arbitrary nonzero scale and sign; consumers must not rely on
/// its magnitude.
///
/// Each correspondence `(p, q)` contributes the design row
/// `[p.x*q.x, p.y*q.x, q.x, p.x*q.y, p.y*q.y, q.y, p.x, p.y, 1]`,
/// the expansion of `q^T * F * p = 0` with the second image's coordinates
/// leading each block. This interleave fixes which of `F` and `F^T` maps
/// points to lines in which image, so it has to match the conventions in
/// [`crate::epipolar::projection`].
///
/// The solution vector is the right-singular vector for the smallest
/// singular value, reshaped row-major into 3x3. nalgebra orders singular
/// values descending; the scan below keeps the first minimal index in that
/// native order, so ties resolve deterministically. No scale normalization
/// and no rank-2 projection are applied afterwards.
///
/// # Arguments
///
/// * `points1` - Centered points in the first image.
/// * `points2` - Corresponding centered points in the second image.
///
/// # Errors
///
/// * [`EpipolarError::MismatchedCorrespondenceCount`] if the slices differ
///   in length.
/// * [`EpipolarError::InsufficientCorrespondences`] if fewer than
///   [`MIN_CORRESPONDENCES`] pairs are supplied.
/// * [`EpipolarError::SvdFailed`] if the decomposition does not produce
///   singular vectors.
///
/// # Examples
///
/// ```rust
/// use epipolar_tools::epipolar::estimate_fundamental_matrix;
/// use nalgebra::{Point2, Vector3};
///
/// // A stereo pair translated along x: matching points share their y
/// // coordinate and shift horizontally with inverse depth.
/// let mut points1 = Vec::new();
/// let mut points2 = Vec::new();
/// for i in 0..8 {
///     let x = -140.0 + 37.0 * i as f64;
///     let y = -90.0 + 26.0 * i as f64;
///     let depth = 2.0 + 0.4 * ((i * 3) % 5) as f64;
///     points1.push(Point2::new(x, y));
///     points2.push(Point2::new(x + 120.0 / depth, y));
/// }
///
/// let estimate = estimate_fundamental_matrix(&points1, &points2).unwrap();
/// let f = estimate.matrix;
/// for (p, q) in points1.iter().zip(points2.iter()) {
///     let residual = Vector3::new(q.x, q.y, 1.0).transpose()
///         * f
///         * Vector3::new(p.x, p.y, 1.0);
///     assert!(residual[0].abs() < 1e-6);
/// }
/// ```
pub fn estimate_fundamental_matrix(
    points1: &[Point2<f64>],
    points2: &[Point2<f64>],
) -> Result<FundamentalEstimate, EpipolarError> {
    if points1.len() != points2.len() {
        return Err(EpipolarError::MismatchedCorrespondenceCount {
            left: points1.len(),
            right: points2.len(),
        });
    }
    let n = points1.len();
    if n < MIN_CORRESPONDENCES {
        return Err(EpipolarError::InsufficientCorrespondences { got: n });
    }

    debug!("Solving for the fundamental matrix from {n} correspondences");

    // The thin SVD of an n x 9 matrix keeps only min(n, 9) right-singular
    // vectors, so with exactly 8 rows the null-space row of V^T would be
    // missing. Zero rows added below do not change the row space.
    let rows = n.max(9);
    let mut design = DMatrix::<f64>::zeros(rows, 9);
    for (i, (p, q)) in points1.iter().zip(points2.iter()).enumerate() {
        design[(i, 0)] = p.x * q.x;
        design[(i, 1)] = p.y * q.x;
        design[(i, 2)] = q.x;
        design[(i, 3)] = p.x * q.y;
        design[(i, 4)] = p.y * q.y;
        design[(i, 5)] = q.y;
        design[(i, 6)] = p.x;
        design[(i, 7)] = p.y;
        design[(i, 8)] = 1.0;
    }

    let svd = design.svd(true, true);
    let v_t = svd.v_t.ok_or(EpipolarError::SvdFailed)?;

    let mut min_index = 0;
    for (i, sigma) in svd.singular_values.iter().enumerate() {
        if *sigma < svd.singular_values[min_index] {
            min_index = i;
        }
    }
    debug!(
        "Smallest singular value {:.3e} at index {min_index}",
        svd.singular_values[min_index]
    );

    let solution = v_t.row(min_index);
    let mut matrix = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            matrix[(r, c)] = solution[3 * r + c];
        }
    }

    let mut singular_values: Vec<f64> = svd.singular_values.iter().copied().collect();
    singular_values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Ok(FundamentalEstimate {
        matrix,
        singular_values,
    })
}

/// Estimates the fundamental matrix, discarding the diagnostics.
///
/// Convenience wrapper around [`estimate_fundamental_matrix`] for callers
/// that only need the matrix itself.
pub fn solve_fundamental_matrix(
    points1: &[Point2<f64>],
    points2: &[Point2<f64>],
) -> Result<Matrix3<f64>, EpipolarError> {
    estimate_fundamental_matrix(points1, points2).map(|estimate| estimate.matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Rotation3, Vector3};

    fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
        Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
    }

    /// Synthetic two-view geometry with a zero principal point, so the
    /// projected pixel coordinates are natively centered. Returns the
    /// correspondences and the ground-truth fundamental matrix.
    fn synthetic_pair() -> (Vec<Point2<f64>>, Vec<Point2<f64>>, Matrix3<f64>) {
        let focal = 800.0;
        let k = Matrix3::new(focal, 0.0, 0.0, 0.0, focal, 0.0, 0.0, 0.0, 1.0);
        let k_inv = k.try_inverse().unwrap();

        let rot = Rotation3::from_euler_angles(0.03, -0.05, 0.02);
        let t = Vector3::new(0.25, -0.06, 0.04);

        // F = K^{-T} [t]x R K^{-1} for pc2 = R * pc1 + t.
        let f_true = k_inv.transpose() * skew(&t) * rot.matrix() * k_inv;

        let mut points1 = Vec::new();
        let mut points2 = Vec::new();
        // Two depth planes so the scene is not planar-degenerate.
        for z in 1..3 {
            for y in 0..3 {
                for x in 0..4 {
                    let pw = Vector3::new(
                        x as f64 * 0.3 - 0.45,
                        y as f64 * 0.3 - 0.3,
                        z as f64 * 1.5 + 2.0,
                    );
                    let pc1 = pw;
                    let pc2 = rot * pw + t;
                    points1.push(Point2::new(
                        focal * pc1.x / pc1.z,
                        focal * pc1.y / pc1.z,
                    ));
                    points2.push(Point2::new(
                        focal * pc2.x / pc2.z,
                        focal * pc2.y / pc2.z,
                    ));
                }
            }
        }

        (points1, points2, f_true)
    }

    fn epipolar_residual(f: &Matrix3<f64>, p1: &Point2<f64>, p2: &Point2<f64>) -> f64 {
        let x1 = Vector3::new(p1.x, p1.y, 1.0);
        let x2 = Vector3::new(p2.x, p2.y, 1.0);
        let value = x2.transpose() * f * x1;
        value[0].abs() / (f.norm() * x1.norm() * x2.norm())
    }

    #[test]
    fn test_epipolar_constraint_holds_for_estimating_points() {
        let (points1, points2, _) = synthetic_pair();
        let f = solve_fundamental_matrix(&points1, &points2).unwrap();

        for (p1, p2) in points1.iter().zip(points2.iter()) {
            let residual = epipolar_residual(&f, p1, p2);
            assert!(residual < 1e-9, "residual too large: {residual}");
        }
    }

    #[test]
    fn test_scale_and_sign_invariance() {
        let (points1, points2, _) = synthetic_pair();
        let f = solve_fundamental_matrix(&points1, &points2).unwrap();
        let f_scaled = f * -3.7;

        for (p1, p2) in points1.iter().zip(points2.iter()) {
            let residual = epipolar_residual(&f_scaled, p1, p2);
            assert!(residual < 1e-9, "residual too large after scaling: {residual}");
        }
    }

    #[test]
    fn test_noiseless_estimate_is_singular() {
        let (points1, points2, _) = synthetic_pair();
        let f = solve_fundamental_matrix(&points1, &points2).unwrap();

        let f_unit = f / f.norm();
        assert!(
            f_unit.determinant().abs() < 1e-8,
            "det(F) = {} for noiseless data",
            f_unit.determinant()
        );
    }

    #[test]
    fn test_minimal_eight_points_recover_ground_truth() {
        let (points1, points2, f_true) = synthetic_pair();

        // Eight well-spread pairs, four from each depth plane.
        let picks = [0, 3, 8, 11, 12, 15, 20, 23];
        let p1: Vec<_> = picks.iter().map(|&i| points1[i]).collect();
        let p2: Vec<_> = picks.iter().map(|&i| points2[i]).collect();

        let f = solve_fundamental_matrix(&p1, &p2).unwrap();

        let f_unit = f / f.norm();
        let g_unit = f_true / f_true.norm();
        let error = (f_unit - g_unit).norm().min((f_unit + g_unit).norm());
        assert!(error < 1e-5, "recovered F deviates from ground truth: {error}");
    }

    #[test]
    fn test_insufficient_correspondences_rejected() {
        let (points1, points2, _) = synthetic_pair();
        let result = solve_fundamental_matrix(&points1[..7], &points2[..7]);
        assert!(matches!(
            result,
            Err(EpipolarError::InsufficientCorrespondences { got: 7 })
        ));
    }

    #[test]
    fn test_mismatched_correspondence_counts_rejected() {
        let (points1, points2, _) = synthetic_pair();
        let result = solve_fundamental_matrix(&points1[..9], &points2[..8]);
        assert!(matches!(
            result,
            Err(EpipolarError::MismatchedCorrespondenceCount { left: 9, right: 8 })
        ));
    }

    #[test]
    fn test_healthy_configuration_not_flagged_degenerate() {
        let (points1, points2, _) = synthetic_pair();
        let estimate = estimate_fundamental_matrix(&points1, &points2).unwrap();
        assert!(!estimate.is_near_degenerate());
        assert!(estimate.smallest_singular_value() >= 0.0);
    }

    #[test]
    fn test_repeated_correspondence_flagged_degenerate() {
        // One correspondence repeated eight times: the design matrix has
        // rank 1 and the smallest singular value is far from unique.
        let points1 = vec![Point2::new(120.0, -40.0); 8];
        let points2 = vec![Point2::new(95.0, -33.0); 8];
        let estimate = estimate_fundamental_matrix(&points1, &points2).unwrap();
        assert!(estimate.is_near_degenerate());
    }

    #[test]
    fn test_singular_values_sorted_ascending() {
        let (points1, points2, _) = synthetic_pair();
        let estimate = estimate_fundamental_matrix(&points1, &points2).unwrap();
        for pair in estimate.singular_values.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }
}
