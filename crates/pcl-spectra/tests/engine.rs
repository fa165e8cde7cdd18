mod common;

use common::{binning, coupling_config, masked_windows, sky, LMAX};
use pcl_core::{AnalysisMode, Convention, PclError, RngHandle, SpectrumLabel};
use pcl_map::{Map, Window, WindowPair};
use pcl_mcm::{build_coupling_and_binning, BinningScheme};
use pcl_sht::{analyze, AnalysisConfig};
use pcl_spectra::{bin, estimate_spectra, BandpowerOracle, Engine};

fn analysis(mode: AnalysisMode) -> AnalysisConfig {
    AnalysisConfig {
        lmax: LMAX,
        niter: 3,
        mode,
    }
}

fn two_skies() -> (Map, Map) {
    let mut rng = RngHandle::from_seed(11);
    (sky(&mut rng).unwrap(), sky(&mut rng).unwrap())
}

#[test]
fn transposed_labels_swap_operands() {
    let (a, b) = two_skies();
    let engine = Engine::new(masked_windows(50.0), None, binning(), &coupling_config()).unwrap();
    let ab = engine.bandpowers(&a, Some(&b), &SpectrumLabel::ALL).unwrap();
    let ba = engine.bandpowers(&b, Some(&a), &SpectrumLabel::ALL).unwrap();
    for (label, transposed) in [
        (SpectrumLabel::ET, SpectrumLabel::TE),
        (SpectrumLabel::BT, SpectrumLabel::TB),
        (SpectrumLabel::EB, SpectrumLabel::BE),
    ] {
        for (x, y) in ab.get(label).unwrap().iter().zip(ba.get(transposed).unwrap()) {
            assert!((x - y).abs() < 1e-12 * (1.0 + y.abs()), "{label}: {x} vs {y}");
        }
    }
    assert_eq!(ab.centres, vec![3.0, 6.0, 9.0]);
}

#[test]
fn auto_spectra_are_reproducible() {
    let (a, _) = two_skies();
    let engine = Engine::new(masked_windows(50.0), None, binning(), &coupling_config()).unwrap();
    let first = engine.bandpowers(&a, None, &SpectrumLabel::ALL).unwrap();
    let second = engine.bandpowers(&a, None, &SpectrumLabel::ALL).unwrap();
    assert_eq!(first, second);
}

#[test]
fn full_sky_bandpowers_match_binned_input_power() {
    let (a, _) = two_skies();
    let windows = WindowPair::same(Window::ones(*a.pixelization()));
    let engine = Engine::new(windows.clone(), None, binning(), &coupling_config()).unwrap();
    let bandpowers = engine.bandpowers(&a, None, &[SpectrumLabel::TT]).unwrap();
    let alms = analyze(&a, &windows, &analysis(AnalysisMode::Standard)).unwrap();
    let raw = estimate_spectra(&alms, &alms, &[SpectrumLabel::TT]).unwrap();
    let expected = engine.operator().binning().average(&raw.spectra[&SpectrumLabel::TT], |_| 1.0);
    for (x, y) in bandpowers.get(SpectrumLabel::TT).unwrap().iter().zip(&expected) {
        assert!((x - y).abs() < 1e-3 * y.abs());
    }
}

#[test]
fn mismatched_settings_are_configuration_errors() {
    let (a, _) = two_skies();
    let windows = masked_windows(50.0);
    let operator = build_coupling_and_binning(&windows, None, &binning(), &coupling_config()).unwrap();
    let alms = analyze(&a, &windows, &analysis(AnalysisMode::Standard)).unwrap();
    let raw = estimate_spectra(&alms, &alms, &[SpectrumLabel::TT]).unwrap();
    assert!(bin(&raw, &operator, &binning(), LMAX, Convention::Cl).is_ok());

    let code = |result: Result<_, PclError>| match result {
        Err(PclError::Config(info)) => info.code,
        other => panic!("expected a configuration error, got {other:?}"),
    };
    assert_eq!(code(bin(&raw, &operator, &binning(), LMAX - 1, Convention::Cl)), "lmax-mismatch");
    assert_eq!(code(bin(&raw, &operator, &binning(), LMAX, Convention::Dl)), "convention-mismatch");
    let other = BinningScheme::uniform(2, 5).unwrap();
    assert_eq!(code(bin(&raw, &operator, &other, LMAX, Convention::Cl)), "binning-mismatch");

    let pure = analyze(&a, &windows, &analysis(AnalysisMode::Purified)).unwrap();
    let raw_pure = estimate_spectra(&pure, &pure, &[SpectrumLabel::TT]).unwrap();
    assert_eq!(code(bin(&raw_pure, &operator, &binning(), LMAX, Convention::Cl)), "mode-mismatch");
    assert!(matches!(estimate_spectra(&alms, &pure, &[SpectrumLabel::TT]), Err(PclError::Config(_))));
}

#[test]
fn scalar_maps_need_a_spin0_operator() {
    let (a, _) = two_skies();
    let scalar = Map::from_components(*a.pixelization(), vec![a.component(0).to_vec()]).unwrap();
    let mut config = coupling_config();
    config.spin0_only = true;
    let engine = Engine::new(masked_windows(50.0), None, binning(), &config).unwrap();
    let tt = engine.bandpowers(&scalar, None, &[SpectrumLabel::TT]).unwrap();
    assert_eq!(tt.spectra.len(), 1);
    let err = engine.bandpowers(&scalar, None, &[SpectrumLabel::TE]).unwrap_err();
    assert_eq!(err.info().code, "missing-field");
}

#[test]
fn purified_engine_produces_all_spectra() {
    let (a, _) = two_skies();
    let mut config = coupling_config();
    config.mode = AnalysisMode::Purified;
    let engine = Engine::new(masked_windows(50.0), None, binning(), &config).unwrap();
    let bandpowers = engine.bandpowers(&a, None, &SpectrumLabel::ALL).unwrap();
    assert_eq!(bandpowers.spectra.len(), 9);
    assert!(bandpowers.spectra.values().flatten().all(|v| v.is_finite()));
}
