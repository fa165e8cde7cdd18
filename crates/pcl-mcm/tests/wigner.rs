use pcl_mcm::wigner3j_family;
use proptest::prelude::*;

fn factorial(n: i64) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// Racah's closed form, exact enough for small momenta.
fn racah(j1: i64, j2: i64, j3: i64, m1: i64, m2: i64, m3: i64) -> f64 {
    if m1 + m2 + m3 != 0 || j3 < (j1 - j2).abs() || j3 > j1 + j2 {
        return 0.0;
    }
    if m1.abs() > j1 || m2.abs() > j2 || m3.abs() > j3 {
        return 0.0;
    }
    let triangle = factorial(j1 + j2 - j3) * factorial(j1 - j2 + j3) * factorial(-j1 + j2 + j3)
        / factorial(j1 + j2 + j3 + 1);
    let orders = factorial(j1 + m1)
        * factorial(j1 - m1)
        * factorial(j2 + m2)
        * factorial(j2 - m2)
        * factorial(j3 + m3)
        * factorial(j3 - m3);
    let k_min = 0.max(j2 - j3 - m1).max(j1 - j3 + m2);
    let k_max = (j1 + j2 - j3).min(j1 - m1).min(j2 + m2);
    let mut sum = 0.0;
    for k in k_min..=k_max {
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        sum += sign
            / (factorial(k)
                * factorial(j3 - j2 + k + m1)
                * factorial(j3 - j1 + k - m2)
                * factorial(j1 + j2 - j3 - k)
                * factorial(j1 - k - m1)
                * factorial(j2 - k + m2));
    }
    let phase = if (j1 - j2 - m3).rem_euclid(2) == 0 { 1.0 } else { -1.0 };
    phase * (triangle * orders).sqrt() * sum
}

fn momenta() -> impl Strategy<Value = (i64, i64, i64, i64)> {
    (0i64..=9, 0i64..=9).prop_flat_map(|(la, lb)| (Just(la), Just(lb), -la..=la, -lb..=lb))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn recursion_matches_racah((la, lb, ma, mb) in momenta()) {
        let family = wigner3j_family(la as usize, lb as usize, ma, mb);
        for l in 0..=(la + lb) {
            let expected = racah(l, la, lb, -ma - mb, ma, mb);
            let got = family.get(l as usize);
            prop_assert!((got - expected).abs() < 1e-10, "L={} got {} expected {}", l, got, expected);
        }
    }

    #[test]
    fn families_are_normalized((la, lb, ma, mb) in momenta()) {
        let family = wigner3j_family(la as usize, lb as usize, ma, mb);
        prop_assume!(!family.values().is_empty());
        let norm: f64 = (family.lmin()..=family.lmax())
            .map(|l| (2 * l + 1) as f64 * family.get(l).powi(2))
            .sum();
        prop_assert!((norm - 1.0).abs() < 1e-12);
    }
}

#[test]
fn large_momenta_stay_finite_and_normalized() {
    let family = wigner3j_family(900, 1100, 2, -2);
    assert_eq!(family.lmin(), 200);
    assert_eq!(family.lmax(), 2000);
    assert!(family.values().iter().all(|v| v.is_finite()));
    let norm: f64 = (family.lmin()..=family.lmax())
        .map(|l| (2 * l + 1) as f64 * family.get(l).powi(2))
        .sum();
    assert!((norm - 1.0).abs() < 1e-10);
}
