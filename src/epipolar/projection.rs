//! Epipolar line projection and display sampling.
//!
//! Given a fundamental matrix, every point in one image induces a line in
//! the other image on which its correspondence must lie. This module
//! computes those line coefficients and samples endpoints for drawing.

use log::debug;
use nalgebra::{Matrix3, Point2, Vector3};

/// Coefficients `(a, b, c)` of an epipolar line `a*x + b*y + c = 0` in the
/// target image's centered coordinate frame.
///
/// Lines inherit the scale ambiguity of the fundamental matrix: the
/// coefficients are only meaningful up to a common nonzero factor, so
/// consumers evaluate directions and incidence, never magnitudes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpipolarLine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl EpipolarLine {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        EpipolarLine { a, b, c }
    }

    /// Builds a line from homogeneous coefficients `F * (x, y, 1)^T`.
    pub fn from_homogeneous(coefficients: &Vector3<f64>) -> Self {
        EpipolarLine {
            a: coefficients.x,
            b: coefficients.y,
            c: coefficients.z,
        }
    }

    /// Signed residual of `point` against the line, zero for incident points.
    pub fn evaluate(&self, point: &Point2<f64>) -> f64 {
        self.a * point.x + self.b * point.y + self.c
    }

    /// Two endpoints spanning the centered image extents, for drawing.
    ///
    /// When `|b| >= |a|` the line is sampled at `x = -half_width` and
    /// `x = half_width`, solving `y = -(a*x + c) / b`. Otherwise the line is
    /// near-vertical and the roles swap: it is sampled at
    /// `y = -half_height` and `y = half_height`, solving
    /// `x = -(b*y + c) / a`. The divisor is always the coefficient of
    /// larger magnitude, so a vanishing `b` never causes a near-zero
    /// division.
    ///
    /// Returns `None` for a degenerate line with `a = b = 0`, which has no
    /// direction to draw.
    pub fn endpoints(&self, half_width: f64, half_height: f64) -> Option<[Point2<f64>; 2]> {
        if self.b.abs() >= self.a.abs() {
            if self.b == 0.0 {
                debug!("Skipping degenerate epipolar line with a = b = 0");
                return None;
            }
            let y_at = |x: f64| -(self.a * x + self.c) / self.b;
            Some([
                Point2::new(-half_width, y_at(-half_width)),
                Point2::new(half_width, y_at(half_width)),
            ])
        } else {
            let x_at = |y: f64| -(self.b * y + self.c) / self.a;
            Some([
                Point2::new(x_at(-half_height), -half_height),
                Point2::new(x_at(half_height), half_height),
            ])
        }
    }
}

/// Computes the epipolar lines induced in the target image by points of the
/// source image.
///
/// For each source point `(x, y)` the coefficients are
/// `(a, b, c)^T = F * (x, y, 1)^T`. The output preserves the input order,
/// so `lines[i]` belongs to `source_points[i]` and index-based color
/// pairing with the corresponding markers stays consistent downstream.
///
/// Directionality follows the defining relation `q^T * F * p = 0` with `p`
/// in the first image and `q` in the second: pass `F` with first-image
/// points to obtain lines in the second image, and `F^T` with second-image
/// points to obtain lines in the first. Swapping the two yields overlays
/// that look plausible but are geometrically wrong.
pub fn project_epipolar_lines(
    fundamental: &Matrix3<f64>,
    source_points: &[Point2<f64>],
) -> Vec<EpipolarLine> {
    source_points
        .iter()
        .map(|point| {
            let coefficients = fundamental * Vector3::new(point.x, point.y, 1.0);
            EpipolarLine::from_homogeneous(&coefficients)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Rotation3, Vector3};

    fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
        Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
    }

    fn synthetic_pair() -> (Vec<Point2<f64>>, Vec<Point2<f64>>, Matrix3<f64>) {
        let focal = 800.0;
        let k = Matrix3::new(focal, 0.0, 0.0, 0.0, focal, 0.0, 0.0, 0.0, 1.0);
        let k_inv = k.try_inverse().unwrap();

        let rot = Rotation3::from_euler_angles(0.03, -0.05, 0.02);
        let t = Vector3::new(0.25, -0.06, 0.04);
        let f_true = k_inv.transpose() * skew(&t) * rot.matrix() * k_inv;

        let mut points1 = Vec::new();
        let mut points2 = Vec::new();
        for z in 1..3 {
            for y in 0..3 {
                for x in 0..4 {
                    let pw = Vector3::new(
                        x as f64 * 0.3 - 0.45,
                        y as f64 * 0.3 - 0.3,
                        z as f64 * 1.5 + 2.0,
                    );
                    let pc2 = rot * pw + t;
                    points1.push(Point2::new(focal * pw.x / pw.z, focal * pw.y / pw.z));
                    points2.push(Point2::new(focal * pc2.x / pc2.z, focal * pc2.y / pc2.z));
                }
            }
        }

        (points1, points2, f_true)
    }

    #[test]
    fn test_projection_applies_matrix_to_homogeneous_point() {
        let f = Matrix3::identity();
        let lines = project_epipolar_lines(&f, &[Point2::new(2.0, 3.0)]);
        assert_eq!(lines.len(), 1);
        assert_relative_eq!(lines[0].a, 2.0);
        assert_relative_eq!(lines[0].b, 3.0);
        assert_relative_eq!(lines[0].c, 1.0);
    }

    #[test]
    fn test_transpose_duality() {
        let (points1, points2, f) = synthetic_pair();

        // Lines in the second image from first-image points.
        let lines2 = project_epipolar_lines(&f, &points1);
        for (line, q) in lines2.iter().zip(points2.iter()) {
            let scale = (line.a * line.a + line.b * line.b).sqrt();
            assert!(line.evaluate(q).abs() / scale < 1e-6);
        }

        // Lines in the first image from second-image points.
        let f_t = f.transpose();
        let lines1 = project_epipolar_lines(&f_t, &points2);
        for (line, p) in lines1.iter().zip(points1.iter()) {
            let scale = (line.a * line.a + line.b * line.b).sqrt();
            assert!(line.evaluate(p).abs() / scale < 1e-6);
        }
    }

    #[test]
    fn test_lines_preserve_input_order() {
        let (points1, points2, f) = synthetic_pair();
        let lines = project_epipolar_lines(&f, &points1);
        assert_eq!(lines.len(), points1.len());

        for (i, line) in lines.iter().enumerate() {
            let scale = (line.a * line.a + line.b * line.b).sqrt();
            assert!(
                line.evaluate(&points2[i]).abs() / scale < 1e-6,
                "line {i} does not match its correspondence"
            );
        }
    }

    #[test]
    fn test_horizontal_line_sampling() {
        let line = EpipolarLine::new(0.001, 1.0, -5.0);
        let [p0, p1] = line.endpoints(320.0, 240.0).unwrap();

        assert_relative_eq!(p0.x, -320.0);
        assert_relative_eq!(p1.x, 320.0);
        assert_relative_eq!(p0.y, -(0.001 * -320.0 - 5.0));
        assert_relative_eq!(p1.y, -(0.001 * 320.0 - 5.0));
        assert!(p0.y.is_finite() && p1.y.is_finite());
    }

    #[test]
    fn test_near_vertical_line_sampling_is_finite() {
        let line = EpipolarLine::new(1.0, 1e-15, 0.3);
        let [p0, p1] = line.endpoints(320.0, 240.0).unwrap();

        assert!(p0.x.is_finite() && p0.y.is_finite());
        assert!(p1.x.is_finite() && p1.y.is_finite());
        assert_relative_eq!(p0.y, -240.0);
        assert_relative_eq!(p1.y, 240.0);
        // x stays near the line's offset instead of exploding.
        assert!(p0.x.abs() < 1.0 && p1.x.abs() < 1.0);
    }

    #[test]
    fn test_exactly_vertical_line_sampling() {
        let line = EpipolarLine::new(2.0, 0.0, -100.0);
        let [p0, p1] = line.endpoints(320.0, 240.0).unwrap();
        assert_relative_eq!(p0.x, 50.0);
        assert_relative_eq!(p1.x, 50.0);
    }

    #[test]
    fn test_degenerate_line_has_no_endpoints() {
        assert!(EpipolarLine::new(0.0, 0.0, 5.0).endpoints(320.0, 240.0).is_none());
        assert!(EpipolarLine::new(0.0, 0.0, 0.0).endpoints(320.0, 240.0).is_none());
    }
}
