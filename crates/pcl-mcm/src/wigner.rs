//! Wigner 3j symbols for a full range of the first angular momentum.
//!
//! Uses the three-term recurrence of Schulten and Gordon in `j1` for fixed
//! `(j2, j3, m2, m3)`, run forward from the lower end and backward from the
//! upper end, matched in the middle and normalized with
//! `Σ (2 j1 + 1) f² = 1`.

const RESCALE: f64 = 1e100;

/// All symbols `(L j2 j3; -m2-m3 m2 m3)` for `L = lmin..=lmax`.
///
/// By cyclic symmetry this equals `(j2 j3 L; m2 m3 -m2-m3)`, which is how
/// the coupling kernels index it.
#[derive(Debug, Clone, PartialEq)]
pub struct Wigner3jFamily {
    lmin: usize,
    values: Vec<f64>,
}

impl Wigner3jFamily {
    /// Smallest `L` with a (possibly) non-zero symbol.
    pub fn lmin(&self) -> usize {
        self.lmin
    }

    /// Largest `L`, `j2 + j3`.
    pub fn lmax(&self) -> usize {
        self.lmin + self.values.len().saturating_sub(1)
    }

    /// Symbol at `L`, zero outside the triangle.
    #[inline]
    pub fn get(&self, l: usize) -> f64 {
        if l < self.lmin {
            return 0.0;
        }
        self.values.get(l - self.lmin).copied().unwrap_or(0.0)
    }

    /// Values for `L = lmin..=lmax`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn empty() -> Self {
        Self {
            lmin: 0,
            values: Vec::new(),
        }
    }
}

fn a_coeff(j: f64, j2: f64, j3: f64, m1: f64) -> f64 {
    let d = j2 - j3;
    let s = j2 + j3 + 1.0;
    ((j * j - d * d) * (s * s - j * j) * (j * j - m1 * m1)).max(0.0).sqrt()
}

fn b_coeff(j: f64, j2: f64, j3: f64, m1: f64, m2: f64, m3: f64) -> f64 {
    -(2.0 * j + 1.0) * (j2 * (j2 + 1.0) * m1 - j3 * (j3 + 1.0) * m1 - j * (j + 1.0) * (m3 - m2))
}

/// Symbols `(L la lb; -ma-mb ma mb)` for every allowed `L`.
///
/// Returns an empty family when `|ma| > la`, `|mb| > lb` or the orders
/// cannot close.
pub fn wigner3j_family(la: usize, lb: usize, ma: i64, mb: i64) -> Wigner3jFamily {
    if ma.unsigned_abs() as usize > la || mb.unsigned_abs() as usize > lb {
        return Wigner3jFamily::empty();
    }
    let m1 = -(ma + mb);
    let lmin = la.abs_diff(lb).max(m1.unsigned_abs() as usize);
    let lmax = la + lb;
    if lmin > lmax {
        return Wigner3jFamily::empty();
    }
    let n = lmax - lmin + 1;
    let (j2, j3) = (la as f64, lb as f64);
    let (m1f, m2f, m3f) = (m1 as f64, ma as f64, mb as f64);
    let sign_top = if (la as i64 - lb as i64 - m1).rem_euclid(2) == 0 {
        1.0
    } else {
        -1.0
    };
    if n == 1 {
        return Wigner3jFamily {
            lmin,
            values: vec![sign_top / ((2 * lmin + 1) as f64).sqrt()],
        };
    }

    let a = |j: usize| a_coeff(j as f64, j2, j3, m1f);
    let b = |j: usize| b_coeff(j as f64, j2, j3, m1f, m2f, m3f);

    let mid = lmin + n / 2;

    // Forward from lmin up to mid + 1.
    let forward_end = (mid + 1).min(lmax);
    let mut forward = vec![0.0; forward_end - lmin + 1];
    forward[0] = 1.0;
    if forward.len() > 1 {
        forward[1] = if lmin == 0 {
            m2f / (j2 * (j2 + 1.0)).sqrt()
        } else {
            -b(lmin) / (lmin as f64 * a(lmin + 1))
        };
    }
    for j in lmin + 1..forward_end {
        let k = j - lmin;
        let next = -(b(j) * forward[k] + (j + 1) as f64 * a(j) * forward[k - 1])
            / (j as f64 * a(j + 1));
        forward[k + 1] = next;
        if next.abs() > RESCALE {
            forward.iter_mut().for_each(|v| *v /= RESCALE);
        }
    }

    // Backward from lmax down to mid - 1.
    let backward_start = mid.saturating_sub(1).max(lmin);
    let mut backward = vec![0.0; lmax - backward_start + 1];
    let top = backward.len() - 1;
    backward[top] = 1.0;
    if top >= 1 {
        backward[top - 1] = -b(lmax) / ((lmax + 1) as f64 * a(lmax));
    }
    for j in (backward_start + 1..lmax).rev() {
        let k = j - backward_start;
        let prev = -(j as f64 * a(j + 1) * backward[k + 1] + b(j) * backward[k])
            / ((j + 1) as f64 * a(j));
        backward[k - 1] = prev;
        if prev.abs() > RESCALE {
            backward.iter_mut().for_each(|v| *v /= RESCALE);
        }
    }

    // Least-squares match over the shared points.
    let (mut num, mut den) = (0.0, 0.0);
    for j in backward_start..=forward_end {
        let f = forward[j - lmin];
        let g = backward[j - backward_start];
        num += f * g;
        den += g * g;
    }
    let ratio = if den > 0.0 { num / den } else { 0.0 };

    let mut values = Vec::with_capacity(n);
    values.extend_from_slice(&forward[..=mid - lmin]);
    values.extend(backward[mid + 1 - backward_start..].iter().map(|g| g * ratio));

    let norm: f64 = values
        .iter()
        .enumerate()
        .map(|(k, v)| (2 * (lmin + k) + 1) as f64 * v * v)
        .sum();
    let last = values[n - 1];
    let scale = if norm > 0.0 { 1.0 / norm.sqrt() } else { 0.0 };
    let scale = if last * sign_top < 0.0 { -scale } else { scale };
    values.iter_mut().for_each(|v| *v *= scale);
    Wigner3jFamily { lmin, values }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_closed_forms() {
        let family = wigner3j_family(1, 1, 0, 0);
        assert_eq!(family.lmin(), 0);
        assert!((family.get(0) + 1.0 / 3f64.sqrt()).abs() < 1e-14);
        assert!(family.get(1).abs() < 1e-14);
        assert!((family.get(2) - (2.0 / 15.0f64).sqrt()).abs() < 1e-14);

        let family = wigner3j_family(2, 2, 2, -2);
        assert!((family.get(0) - 1.0 / 5f64.sqrt()).abs() < 1e-14);
    }

    #[test]
    fn rejects_orders_above_degree() {
        assert!(wigner3j_family(1, 3, 2, -2).values().is_empty());
        assert_eq!(wigner3j_family(1, 3, 2, -2).get(3), 0.0);
    }
}
