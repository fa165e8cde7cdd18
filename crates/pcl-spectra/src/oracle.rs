//! Pluggable bandpower estimators.
//!
//! [`BandpowerOracle`] is the contract a cross-check implementation has to
//! satisfy; [`Engine`] is the estimator built from this workspace.

use std::sync::Arc;

use pcl_core::errors::PclError;
use pcl_core::labels::SpectrumLabel;
use pcl_map::{Map, WindowPair};
use pcl_mcm::{build_coupling_and_binning, BinningScheme, CouplingConfig, CouplingOperator};
use pcl_sht::{analyze, AnalysisConfig, HarmonicCoefficients};

use crate::engine::{bin, estimate_spectra, Bandpowers};

/// Maps in, bandpowers out.
pub trait BandpowerOracle {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Bandpowers of `first` x `second` (auto spectra when `second` is `None`).
    fn bandpowers(
        &self,
        first: &Map,
        second: Option<&Map>,
        labels: &[SpectrumLabel],
    ) -> Result<Bandpowers, PclError>;
}

/// Pseudo-Cl estimator holding one shared coupling operator.
#[derive(Debug, Clone)]
pub struct Engine {
    windows: WindowPair,
    second_windows: Option<WindowPair>,
    binning: BinningScheme,
    operator: Arc<CouplingOperator>,
    niter: usize,
}

impl Engine {
    /// Builds the coupling operator for the windows and wraps it.
    pub fn new(
        windows: WindowPair,
        second_windows: Option<WindowPair>,
        binning: BinningScheme,
        config: &CouplingConfig,
    ) -> Result<Self, PclError> {
        let operator = build_coupling_and_binning(&windows, second_windows.as_ref(), &binning, config)?;
        Ok(Self {
            windows,
            second_windows,
            binning,
            operator: Arc::new(operator),
            niter: config.niter,
        })
    }

    /// Reuses an operator built (or loaded) elsewhere.
    pub fn with_operator(
        windows: WindowPair,
        second_windows: Option<WindowPair>,
        binning: BinningScheme,
        operator: Arc<CouplingOperator>,
    ) -> Self {
        let niter = operator.key().niter;
        Self {
            windows,
            second_windows,
            binning,
            operator,
            niter,
        }
    }

    /// The shared operator.
    pub fn operator(&self) -> &Arc<CouplingOperator> {
        &self.operator
    }

    /// Analysis settings matching the operator.
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            lmax: self.operator.lmax(),
            niter: self.niter,
            mode: self.operator.mode(),
        }
    }

    /// Harmonic coefficients of `map` under the first (or second) windows.
    pub fn analyze(&self, map: &Map, second: bool) -> Result<HarmonicCoefficients, PclError> {
        let windows = match (&self.second_windows, second) {
            (Some(other), true) => other,
            _ => &self.windows,
        };
        analyze(map, windows, &self.analysis_config())
    }
}

impl BandpowerOracle for Engine {
    fn name(&self) -> &str {
        "pcl-engine"
    }

    fn bandpowers(
        &self,
        first: &Map,
        second: Option<&Map>,
        labels: &[SpectrumLabel],
    ) -> Result<Bandpowers, PclError> {
        let alm_a = self.analyze(first, false)?;
        let alm_b = match second {
            Some(map) => self.analyze(map, true)?,
            None if self.second_windows.is_some() => self.analyze(first, true)?,
            None => alm_a.clone(),
        };
        let raw = estimate_spectra(&alm_a, &alm_b, labels)?;
        bin(
            &raw,
            &self.operator,
            &self.binning,
            self.operator.lmax(),
            self.operator.convention(),
        )
    }
}
