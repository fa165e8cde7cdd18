//! Raw pseudo spectra and their binned, deconvolved bandpowers.

use std::collections::BTreeMap;

use pcl_core::errors::{ErrorInfo, PclError};
use pcl_core::labels::{AnalysisMode, Convention, SpectrumLabel};
use pcl_mcm::{BinningScheme, CouplingOperator};
use pcl_sht::{cross_power, HarmonicCoefficients};
use serde::{Deserialize, Serialize};

/// Coupled pseudo spectra indexed from `ℓ = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpectra {
    /// Band limit of the spectra.
    pub lmax: usize,
    /// Analysis mode of the coefficients.
    pub mode: AnalysisMode,
    /// One spectrum per requested label.
    pub spectra: BTreeMap<SpectrumLabel, Vec<f64>>,
}

/// Deconvolved bandpowers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bandpowers {
    /// Convention of the values.
    pub convention: Convention,
    /// Representative multipole of each bin.
    pub centres: Vec<f64>,
    /// One bandpower vector per label.
    pub spectra: BTreeMap<SpectrumLabel, Vec<f64>>,
}

impl Bandpowers {
    /// Bandpowers of `label`.
    pub fn get(&self, label: SpectrumLabel) -> Result<&[f64], PclError> {
        self.spectra.get(&label).map(Vec::as_slice).ok_or_else(|| {
            PclError::Config(
                ErrorInfo::new("missing-spectrum", "spectrum was not requested").with_context("label", label),
            )
        })
    }
}

/// Cross spectra of `alm_a` and `alm_b` for `labels`.
///
/// The first letter of a label selects the field of `alm_a` and the second
/// the field of `alm_b`, so `ET` pairs E of `alm_a` with T of `alm_b`.
pub fn estimate_spectra(
    alm_a: &HarmonicCoefficients,
    alm_b: &HarmonicCoefficients,
    labels: &[SpectrumLabel],
) -> Result<RawSpectra, PclError> {
    if labels.is_empty() {
        return Err(PclError::config("no-spectra", "at least one spectrum label is required"));
    }
    if alm_a.lmax() != alm_b.lmax() {
        return Err(PclError::Config(
            ErrorInfo::new("lmax-mismatch", "coefficients were analyzed with different lmax")
                .with_context("first", alm_a.lmax())
                .with_context("second", alm_b.lmax()),
        ));
    }
    if alm_a.mode() != alm_b.mode() {
        return Err(PclError::config(
            "mode-mismatch",
            "cannot cross standard and purified coefficients",
        ));
    }
    let mut spectra = BTreeMap::new();
    for &label in labels {
        let (first, second) = label.fields();
        spectra.insert(label, cross_power(alm_a.field(first)?, alm_b.field(second)?)?);
    }
    Ok(RawSpectra {
        lmax: alm_a.lmax(),
        mode: alm_a.mode(),
        spectra,
    })
}

fn mismatch(code: &str, message: &str, built: impl ToString, requested: impl ToString) -> PclError {
    PclError::Config(
        ErrorInfo::new(code, message)
            .with_context("operator", built)
            .with_context("requested", requested)
            .with_hint("bin with the settings the coupling operator was built with"),
    )
}

/// Bins `raw` in `convention` and deconvolves it with `operator`.
///
/// Every setting must match the operator: `lmax`, the convention, the
/// binning (after restriction to `lmax`) and the analysis mode.
pub fn bin(
    raw: &RawSpectra,
    operator: &CouplingOperator,
    binning: &BinningScheme,
    lmax: usize,
    convention: Convention,
) -> Result<Bandpowers, PclError> {
    if lmax != operator.lmax() {
        return Err(mismatch("lmax-mismatch", "lmax differs from the operator's", operator.lmax(), lmax));
    }
    if convention != operator.convention() {
        return Err(mismatch(
            "convention-mismatch",
            "Cl/Dl convention differs from the operator's",
            format!("{:?}", operator.convention()),
            format!("{convention:?}"),
        ));
    }
    if raw.mode != operator.mode() {
        return Err(mismatch(
            "mode-mismatch",
            "analysis mode differs from the operator's kernels",
            format!("{:?}", operator.mode()),
            format!("{:?}", raw.mode),
        ));
    }
    if raw.lmax < lmax {
        return Err(PclError::Config(
            ErrorInfo::new("raw-lmax-too-small", "raw spectra stop below lmax")
                .with_context("raw", raw.lmax)
                .with_context("lmax", lmax),
        ));
    }
    let restricted = binning.restrict(lmax)?;
    let hash = restricted.content_hash()?;
    if hash != operator.key().binning {
        return Err(mismatch(
            "binning-mismatch",
            "binning differs from the operator's",
            &operator.key().binning,
            hash,
        ));
    }
    let binned: BTreeMap<SpectrumLabel, Vec<f64>> = raw
        .spectra
        .iter()
        .map(|(&label, values)| (label, restricted.average(values, |l| convention.factor(l))))
        .collect();
    let spectra = operator.deconvolve(&binned)?;
    log::debug!("binned {} spectra into {} bandpowers", spectra.len(), restricted.len());
    Ok(Bandpowers {
        convention,
        centres: restricted.centres(),
        spectra,
    })
}
