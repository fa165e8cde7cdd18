//! Normalized associated Legendre functions and the spin-weighted combinations
//! built from them.
//!
//! `λ_lm(θ) = sqrt((2l+1)/4π · (l-m)!/(l+m)!) P_l^m(cos θ)` with the
//! Condon–Shortley phase. Columns of fixed `m` are produced by the standard
//! three-term recurrence in `l`, started from `λ_mm` evaluated in log space
//! and carried with a running exponent so high orders near the poles neither
//! overflow nor flush to zero prematurely.

use std::f64::consts::PI;

const RESCALE: f64 = 1e150;

/// Spin weight handled by the spin transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spin {
    /// Gradient-like fields.
    One,
    /// Polarization-like fields.
    Two,
}

impl Spin {
    /// Numerical spin weight.
    pub fn value(self) -> usize {
        match self {
            Spin::One => 1,
            Spin::Two => 2,
        }
    }
}

/// Per-`m` starting values `ln|λ_mm| - m ln(sin θ)`.
#[derive(Debug, Clone)]
pub(crate) struct LegendreTable {
    lmax: usize,
    log_mm: Vec<f64>,
}

impl LegendreTable {
    pub(crate) fn new(lmax: usize) -> Self {
        let mut log_mm = Vec::with_capacity(lmax + 1);
        let mut acc = -0.5 * (4.0 * PI).ln();
        log_mm.push(acc);
        for k in 1..=lmax {
            acc += 0.5 * ((2 * k + 1) as f64 / (2 * k) as f64).ln();
            log_mm.push(acc);
        }
        Self { lmax, log_mm }
    }

    /// Fills `out[l - m] = λ_lm(θ)` for `l = m..=lmax`.
    pub(crate) fn column(&self, m: usize, cos_theta: f64, sin_theta: f64, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.lmax + 1 - m);
        if m > 0 && sin_theta <= 0.0 {
            out.iter_mut().for_each(|v| *v = 0.0);
            return;
        }
        let mut scale = self.log_mm[m] + if m > 0 { m as f64 * sin_theta.ln() } else { 0.0 };
        let mut factor = scale.exp();
        let mm = (m * m) as f64;
        let mut prev1 = if m % 2 == 1 { -1.0 } else { 1.0 };
        let mut prev2 = 0.0;
        let mut a_prev = 1.0;
        out[0] = prev1 * factor;
        for l in m + 1..=self.lmax {
            let ll = (l * l) as f64;
            let a = ((4.0 * ll - 1.0) / (ll - mm)).sqrt();
            let value = a * (cos_theta * prev1 - prev2 / a_prev);
            prev2 = prev1;
            prev1 = value;
            a_prev = a;
            if value.abs() > RESCALE {
                prev1 /= RESCALE;
                prev2 /= RESCALE;
                scale += RESCALE.ln();
                factor = scale.exp();
            }
            out[l - m] = prev1 * factor;
        }
    }
}

/// `sqrt((2l+1)/(2l-1) · (l² - m²))`, the coefficient of `λ_{l-1,m}` in the
/// derivative relation `sin θ ∂_θ λ_lm = l cos θ λ_lm - fac_lm λ_{l-1,m}`.
#[inline]
pub(crate) fn derivative_factor(l: usize, m: usize) -> f64 {
    if l == 0 {
        return 0.0;
    }
    let (lf, mf) = (l as f64, m as f64);
    ((2.0 * lf + 1.0) / (2.0 * lf - 1.0) * (lf * lf - mf * mf)).sqrt()
}

/// Real functions `(F+, F-)` such that the spin-`s` harmonics satisfy
/// `(₊ₛY ± ₋ₛY)/2 = (F+, i F-) e^{imφ}` up to the shared phase convention.
///
/// `lambda` holds `λ_lm` for `l = m..=lmax`; entries below the spin are zero.
pub(crate) fn spin_factors(
    spin: Spin,
    m: usize,
    cos_theta: f64,
    sin_theta: f64,
    lambda: &[f64],
    plus: &mut [f64],
    minus: &mut [f64],
) {
    let s = spin.value();
    let mf = m as f64;
    let inv_sin = 1.0 / sin_theta;
    let inv_sin2 = inv_sin * inv_sin;
    for (offset, value) in lambda.iter().enumerate() {
        let l = m + offset;
        if l < s {
            plus[offset] = 0.0;
            minus[offset] = 0.0;
            continue;
        }
        let lf = l as f64;
        let previous = if offset > 0 { lambda[offset - 1] } else { 0.0 };
        let fac = derivative_factor(l, m);
        match spin {
            Spin::One => {
                let norm = 1.0 / (lf * (lf + 1.0)).sqrt();
                let dtheta = (lf * cos_theta * value - fac * previous) * inv_sin;
                plus[offset] = -norm * dtheta;
                minus[offset] = norm * mf * value * inv_sin;
            }
            Spin::Two => {
                let k = 2.0 / ((lf - 1.0) * lf * (lf + 1.0) * (lf + 2.0)).sqrt();
                plus[offset] = k
                    * (((mf * mf - lf) * inv_sin2 - 0.5 * lf * (lf - 1.0)) * value
                        + cos_theta * inv_sin2 * fac * previous);
                minus[offset] =
                    k * mf * inv_sin2 * (-(lf - 1.0) * cos_theta * value + fac * previous);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_order_closed_forms() {
        let table = LegendreTable::new(3);
        let theta: f64 = 0.7;
        let (c, s) = (theta.cos(), theta.sin());
        let mut col0 = vec![0.0; 4];
        table.column(0, c, s, &mut col0);
        assert!((col0[0] - 1.0 / (4.0 * PI).sqrt()).abs() < 1e-15);
        assert!((col0[1] - (3.0 / (4.0 * PI)).sqrt() * c).abs() < 1e-15);
        let p20 = (5.0 / (4.0 * PI)).sqrt() * 0.5 * (3.0 * c * c - 1.0);
        assert!((col0[2] - p20).abs() < 1e-14);

        let mut col1 = vec![0.0; 3];
        table.column(1, c, s, &mut col1);
        assert!((col1[0] + (3.0 / (8.0 * PI)).sqrt() * s).abs() < 1e-15);

        let mut col2 = vec![0.0; 2];
        table.column(2, c, s, &mut col2);
        let p22 = 0.25 * (15.0 / (2.0 * PI)).sqrt() * s * s;
        assert!((col2[0] - p22).abs() < 1e-14);
    }

    #[test]
    fn high_orders_stay_finite() {
        let lmax = 3000;
        let table = LegendreTable::new(lmax);
        let theta: f64 = 0.01;
        let m = 2500;
        let mut col = vec![0.0; lmax + 1 - m];
        table.column(m, theta.cos(), theta.sin(), &mut col);
        assert!(col.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn spin_two_vanishes_below_quadrupole() {
        let table = LegendreTable::new(4);
        let theta: f64 = 1.1;
        let mut lambda = vec![0.0; 5];
        table.column(0, theta.cos(), theta.sin(), &mut lambda);
        let mut plus = vec![1.0; 5];
        let mut minus = vec![1.0; 5];
        spin_factors(Spin::Two, 0, theta.cos(), theta.sin(), &lambda, &mut plus, &mut minus);
        assert_eq!(plus[0], 0.0);
        assert_eq!(plus[1], 0.0);
        assert!(plus[2] != 0.0);
        assert!(minus.iter().all(|v| *v == 0.0));
    }
}
