//! Bray-Curtis dissimilarity.
//!
//! For two samples with abundance vectors x and y:
//!
//! ```text
//! d(x, y) = Σ|x_k - y_k| / Σ(x_k + y_k)
//! ```
//!
//! The result lies in [0, 1] for non-negative data: 0 for identical
//! profiles, 1 for samples sharing no feature. Joint absences do not
//! contribute, and two all-zero samples are defined to be at distance 0.

use super::DissimilarityMetric;

/// Bray-Curtis dissimilarity metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrayCurtis;

impl DissimilarityMetric for BrayCurtis {
    fn name(&self) -> &str {
        "bray_curtis"
    }

    fn dissimilarity(&self, x: &[f64], y: &[f64]) -> f64 {
        bray_curtis(x, y)
    }
}

/// Bray-Curtis dissimilarity between two equal-length abundance vectors.
pub fn bray_curtis(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    let (mut numerator, mut denominator) = scaled_sums(x, y, 1.0);
    if !denominator.is_finite() {
        // Sums overflowed: rescale so the largest entry is 1.
        let largest = x.iter().chain(y).fold(0.0_f64, |m, &v| m.max(v));
        (numerator, denominator) = scaled_sums(x, y, largest);
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn scaled_sums(x: &[f64], y: &[f64], scale: f64) -> (f64, f64) {
    x.iter().zip(y).fold((0.0, 0.0), |(num, den), (&a, &b)| {
        let (a, b) = (a / scale, b / scale);
        (num + (a - b).abs(), den + a + b)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_distance_is_zero() {
        let x = [3.0, 0.0, 7.5, 1.0];
        assert_eq!(bray_curtis(&x, &x), 0.0);
    }

    #[test]
    fn test_disjoint_support_is_one() {
        assert_eq!(bray_curtis(&[10.0, 0.0], &[0.0, 10.0]), 1.0);
        assert_eq!(bray_curtis(&[1.0, 2.0, 0.0, 0.0], &[0.0, 0.0, 5.0, 4.0]), 1.0);
    }

    #[test]
    fn test_known_value() {
        // |10-8| + |0-2| = 4, total = 20
        assert!((bray_curtis(&[10.0, 0.0], &[8.0, 2.0]) - 0.2).abs() < 1e-15);
        assert!((bray_curtis(&[8.0, 2.0], &[2.0, 8.0]) - 0.6).abs() < 1e-15);
    }

    #[test]
    fn test_all_zero_samples() {
        assert_eq!(bray_curtis(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_huge_values_do_not_overflow() {
        let d = bray_curtis(&[1e308, 1e308], &[1e308, 0.0]);
        assert!((d - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(bray_curtis(&[f64::MAX, 0.0], &[0.0, f64::MAX]), 1.0);
    }

    #[test]
    fn test_symmetric() {
        let x = [1.0, 4.0, 0.0, 2.0];
        let y = [0.0, 3.0, 6.0, 2.0];
        assert_eq!(bray_curtis(&x, &y), bray_curtis(&y, &x));
    }
}
