//! Stem geometry

use std::f64::consts::PI;

/// Basal area (m²) of a stem from its diameter at breast height (cm)
///
/// `π/4 · (d/100)²`, no rounding. Diameters are validated upstream.
pub fn compute_g(diameter_cm: f64) -> f64 {
    let d_m = diameter_cm / 100.0;
    PI / 4.0 * d_m * d_m
}

/// Quadratic mean diameter (cm) from total basal area (m²) and stem count
///
/// `sqrt(4·G / (π·N)) × 100`; `None` for an empty population.
pub fn quadratic_mean_diameter(g_total_m2: f64, n: usize) -> Option<f64> {
    if n == 0 {
        return None;
    }
    Some((4.0 * g_total_m2 / (PI * n as f64)).sqrt() * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basal_area_formula() {
        for d in [0.0, 7.5, 20.0, 45.0, 120.0] {
            assert_eq!(compute_g(d), PI / 4.0 * (d / 100.0) * (d / 100.0));
        }
        assert_eq!(compute_g(0.0), 0.0);
        assert_relative_eq!(compute_g(20.0), 0.0314159, epsilon = 1e-7);
    }

    #[test]
    fn test_dg_reproduces_equal_diameters() {
        let g_total = 4.0 * compute_g(20.0);
        assert_relative_eq!(g_total, 0.1256637, epsilon = 1e-7);
        assert_relative_eq!(quadratic_mean_diameter(g_total, 4).unwrap(), 20.0, epsilon = 1e-9);
        assert_eq!(quadratic_mean_diameter(0.0, 0), None);
    }

    #[test]
    fn test_dg_weights_towards_large_stems() {
        // 10 cm and 30 cm: arithmetic mean 20, Dg = sqrt((100 + 900) / 2) ≈ 22.36
        let g_total = compute_g(10.0) + compute_g(30.0);
        assert_relative_eq!(quadratic_mean_diameter(g_total, 2).unwrap(), 500f64.sqrt(), epsilon = 1e-9);
    }
}
