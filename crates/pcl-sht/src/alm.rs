//! Packed spherical-harmonic coefficient storage.

use num_complex::Complex64;
use pcl_core::errors::{ErrorInfo, PclError};
use serde::{Deserialize, Serialize};

/// Harmonic coefficients `a_lm` for `0 <= m <= l <= lmax`.
///
/// Storage follows the packed m-major order `idx(l, m) = m(2 lmax + 1 - m)/2 + l`,
/// so every fixed-`m` column is contiguous. Negative orders are implied by
/// the reality of the underlying field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alm {
    lmax: usize,
    coeffs: Vec<Complex64>,
}

impl Alm {
    /// Number of stored coefficients for `lmax`.
    pub fn size(lmax: usize) -> usize {
        (lmax + 1) * (lmax + 2) / 2
    }

    /// All-zero coefficients.
    pub fn zeros(lmax: usize) -> Self {
        Self {
            lmax,
            coeffs: vec![Complex64::new(0.0, 0.0); Self::size(lmax)],
        }
    }

    /// Wraps a packed coefficient vector.
    pub fn from_coeffs(lmax: usize, coeffs: Vec<Complex64>) -> Result<Self, PclError> {
        if coeffs.len() != Self::size(lmax) {
            return Err(PclError::Config(
                ErrorInfo::new("alm-size", "coefficient count does not match lmax")
                    .with_context("lmax", lmax)
                    .with_context("expected", Self::size(lmax))
                    .with_context("found", coeffs.len()),
            ));
        }
        Ok(Self { lmax, coeffs })
    }

    /// Band limit.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Packed index of `(l, m)`.
    #[inline]
    pub fn index(&self, l: usize, m: usize) -> usize {
        debug_assert!(m <= l && l <= self.lmax);
        m * (2 * self.lmax + 1 - m) / 2 + l
    }

    /// Coefficient `a_lm`.
    pub fn get(&self, l: usize, m: usize) -> Complex64 {
        self.coeffs[self.index(l, m)]
    }

    /// Overwrites coefficient `a_lm`.
    pub fn set(&mut self, l: usize, m: usize, value: Complex64) {
        let index = self.index(l, m);
        self.coeffs[index] = value;
    }

    /// Packed coefficients.
    pub fn coeffs(&self) -> &[Complex64] {
        &self.coeffs
    }

    /// Contiguous slice holding `a_lm` for `l = m..=lmax`.
    pub fn column(&self, m: usize) -> &[Complex64] {
        let start = self.index(m, m);
        &self.coeffs[start..start + self.lmax + 1 - m]
    }

    /// Adds `other` in place; both sides must share `lmax`.
    pub fn add_assign(&mut self, other: &Alm) {
        debug_assert_eq!(self.lmax, other.lmax);
        for (a, b) in self.coeffs.iter_mut().zip(&other.coeffs) {
            *a += *b;
        }
    }

    /// Subtracts `other` in place; both sides must share `lmax`.
    pub fn sub_assign(&mut self, other: &Alm) {
        debug_assert_eq!(self.lmax, other.lmax);
        for (a, b) in self.coeffs.iter_mut().zip(&other.coeffs) {
            *a -= *b;
        }
    }

    /// Returns a copy with every `a_lm` multiplied by `filter(l)`.
    pub fn filtered(&self, filter: impl Fn(usize) -> f64) -> Alm {
        let factors: Vec<f64> = (0..=self.lmax).map(filter).collect();
        let mut out = self.clone();
        for m in 0..=self.lmax {
            let start = out.index(m, m);
            for (offset, value) in out.coeffs[start..start + self.lmax + 1 - m]
                .iter_mut()
                .enumerate()
            {
                *value *= factors[m + offset];
            }
        }
        out
    }
}

/// Angular cross power `C_l = Σ_m a_lm conj(b_lm) / (2l + 1)`, real part, `l = 0..=lmax`.
pub fn cross_power(a: &Alm, b: &Alm) -> Result<Vec<f64>, PclError> {
    if a.lmax() != b.lmax() {
        return Err(PclError::Config(
            ErrorInfo::new("lmax-mismatch", "cross power needs coefficients with equal lmax")
                .with_context("left", a.lmax())
                .with_context("right", b.lmax()),
        ));
    }
    let lmax = a.lmax();
    let mut cl = vec![0.0; lmax + 1];
    for m in 0..=lmax {
        let weight = if m == 0 { 1.0 } else { 2.0 };
        for ((l, x), y) in (m..=lmax).zip(a.column(m)).zip(b.column(m)) {
            cl[l] += weight * (x.re * y.re + x.im * y.im);
        }
    }
    for (l, value) in cl.iter_mut().enumerate() {
        *value /= (2 * l + 1) as f64;
    }
    Ok(cl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_index_is_m_major() {
        let alm = Alm::zeros(4);
        assert_eq!(alm.index(0, 0), 0);
        assert_eq!(alm.index(4, 0), 4);
        assert_eq!(alm.index(1, 1), 5);
        assert_eq!(alm.index(4, 4), Alm::size(4) - 1);
    }

    #[test]
    fn cross_power_counts_negative_orders() {
        let mut a = Alm::zeros(2);
        a.set(2, 0, Complex64::new(1.0, 0.0));
        a.set(2, 1, Complex64::new(0.0, 2.0));
        let cl = cross_power(&a, &a).unwrap();
        assert!((cl[2] - (1.0 + 2.0 * 4.0) / 5.0).abs() < 1e-15);
        assert_eq!(cl[0], 0.0);
    }

    #[test]
    fn filter_scales_each_multipole() {
        let mut a = Alm::zeros(3);
        a.set(3, 2, Complex64::new(1.0, -1.0));
        let b = a.filtered(|l| l as f64);
        assert_eq!(b.get(3, 2), Complex64::new(3.0, -3.0));
    }
}
