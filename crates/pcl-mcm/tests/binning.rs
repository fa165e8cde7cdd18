use pcl_core::PclError;
use pcl_mcm::{create_binning_file, Bin, BinningScheme};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn uniform_bins_are_contiguous(bin_size in 1usize..60, n_bins in 1usize..80) {
        let scheme = BinningScheme::uniform(bin_size, n_bins).unwrap();
        prop_assert_eq!(scheme.len(), n_bins);
        prop_assert_eq!(scheme.bins()[0].lower, 2);
        for pair in scheme.bins().windows(2) {
            prop_assert_eq!(pair[1].lower, pair[0].upper + 1);
        }
        for bin in scheme.bins() {
            prop_assert_eq!(bin.width(), bin_size);
            prop_assert!(bin.centre >= bin.lower as f64 && bin.centre <= bin.upper as f64);
        }
    }

    #[test]
    fn restriction_keeps_bins_below_lmax(bin_size in 1usize..20, n_bins in 1usize..30, lmax in 3usize..400) {
        let scheme = BinningScheme::uniform(bin_size, n_bins).unwrap();
        match scheme.restrict(lmax) {
            Ok(restricted) => {
                prop_assert!(restricted.bins().iter().all(|bin| bin.upper < lmax));
                prop_assert!(restricted.len() <= scheme.len());
            }
            Err(err) => prop_assert!(matches!(err, PclError::Degenerate(_))),
        }
    }
}

#[test]
fn binning_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binning.dat");
    let written = create_binning_file(&path, 40, 100).unwrap();
    let read = BinningScheme::read(&path).unwrap();
    assert_eq!(written, read);
    assert_eq!(read.bins()[99], Bin { lower: 3962, upper: 4001, centre: 3981.5 });
    assert_eq!(written.content_hash().unwrap(), read.content_hash().unwrap());
}

#[test]
fn parse_skips_comments_and_raises_low_bins() {
    let scheme = BinningScheme::parse("# lo hi centre\n0 9 4.5\n\n10 19 14.5\n20 29 24.5\n").unwrap();
    let restricted = scheme.restrict(25).unwrap();
    assert_eq!(restricted.len(), 2);
    assert_eq!(restricted.bins()[0].lower, 2);
    assert_eq!(restricted.bins()[0].centre, 4.5);
}

#[test]
fn malformed_schemes_are_rejected() {
    assert!(matches!(BinningScheme::parse("2 5\n"), Err(PclError::Serde(_))));
    assert!(matches!(BinningScheme::parse("2 5 x\n"), Err(PclError::Serde(_))));
    assert!(matches!(BinningScheme::parse("2 5 3\n7 9 8\n"), Err(PclError::Config(_))));
    assert!(matches!(BinningScheme::parse("2 5 9\n"), Err(PclError::Config(_))));
    assert!(matches!(BinningScheme::parse("# nothing\n"), Err(PclError::Degenerate(_))));
    assert!(matches!(BinningScheme::uniform(0, 3), Err(PclError::Config(_))));
}

#[test]
fn bin_average_applies_factor() {
    let scheme = BinningScheme::uniform(2, 2).unwrap();
    let values = vec![0.0, 0.0, 1.0, 3.0, 5.0, 7.0];
    assert_eq!(scheme.average(&values, |_| 1.0), vec![2.0, 6.0]);
    assert_eq!(scheme.average(&values, |l| l as f64), vec![(2.0 + 9.0) / 2.0, (20.0 + 35.0) / 2.0]);
}
