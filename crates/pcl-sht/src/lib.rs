#![deny(missing_docs)]
#![doc = "Spherical harmonic analysis and synthesis on ring pixelizations, with windowed and purified E/B analysis."]

pub mod alm;
pub mod analysis;
pub mod legendre;
pub mod transform;

pub use alm::{cross_power, Alm};
pub use analysis::{analyze, spinned_windows, AnalysisConfig, HarmonicCoefficients, SpinnedWindows};
pub use legendre::Spin;
pub use transform::HarmonicTransform;
