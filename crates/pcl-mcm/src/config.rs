//! Configuration of the coupling builder.

use pcl_core::errors::{ErrorInfo, PclError};
use pcl_core::hash::hash_f64_arrays;
use pcl_core::labels::{AnalysisMode, Convention};
use serde::{Deserialize, Serialize};

fn default_niter() -> usize {
    3
}

fn default_l3_pad() -> usize {
    2000
}

/// Beam (or transfer function) `b_ℓ` of each field, indexed from `ℓ = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beams {
    /// Beam of the first field.
    pub first: Vec<f64>,
    /// Beam of the second field.
    pub second: Vec<f64>,
}

impl Beams {
    /// Hash identifying both beams bit-exactly.
    pub fn content_hash(&self) -> String {
        hash_f64_arrays("beams", [self.first.as_slice(), self.second.as_slice()])
    }
}

/// Parameters of the mode-coupling and binning operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Band limit of the estimated spectra.
    pub lmax: usize,
    /// Refinement iterations used for the window transforms.
    #[serde(default = "default_niter")]
    pub niter: usize,
    /// Standard or pure-B coupling kernels.
    #[serde(default)]
    pub mode: AnalysisMode,
    /// Convention of the bandpowers the operator deconvolves.
    #[serde(default)]
    pub convention: Convention,
    /// Extra window multipoles beyond `lmax` entering the coupling sums.
    #[serde(default = "default_l3_pad")]
    pub l3_pad: usize,
    /// Build the temperature block only.
    #[serde(default)]
    pub spin0_only: bool,
    /// Optional beams; unit beams when absent.
    #[serde(default)]
    pub beams: Option<Beams>,
}

impl CouplingConfig {
    /// Standard configuration at `lmax` with default settings elsewhere.
    pub fn new(lmax: usize) -> Self {
        Self {
            lmax,
            niter: default_niter(),
            mode: AnalysisMode::Standard,
            convention: Convention::Cl,
            l3_pad: default_l3_pad(),
            spin0_only: false,
            beams: None,
        }
    }

    /// Checks parameters that do not depend on the windows.
    pub fn validate(&self) -> Result<(), PclError> {
        if self.lmax < 2 {
            return Err(PclError::Config(
                ErrorInfo::new("lmax-too-small", "coupling needs lmax >= 2")
                    .with_context("lmax", self.lmax),
            ));
        }
        if let Some(beams) = &self.beams {
            for (name, beam) in [("first", &beams.first), ("second", &beams.second)] {
                if beam.len() <= self.lmax {
                    return Err(PclError::Config(
                        ErrorInfo::new("beam-too-short", "beam must cover 0..=lmax")
                            .with_context("beam", name)
                            .with_context("len", beam.len())
                            .with_context("lmax", self.lmax),
                    ));
                }
                if beam.iter().any(|b| !b.is_finite()) {
                    return Err(PclError::Config(
                        ErrorInfo::new("beam-not-finite", "beam values must be finite")
                            .with_context("beam", name),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Product `b1_ℓ b2_ℓ` for `ℓ = 0..=lmax`.
    pub(crate) fn beam_product(&self) -> Vec<f64> {
        match &self.beams {
            Some(beams) => (0..=self.lmax)
                .map(|l| beams.first[l] * beams.second[l])
                .collect(),
            None => vec![1.0; self.lmax + 1],
        }
    }
}
