#![deny(missing_docs)]
#![doc = "Spectra engine: raw cross spectra, binned and deconvolved bandpowers, oracles and ensembles."]

/// Raw spectra and bandpower binning.
pub mod engine;
/// Parallel Monte-Carlo ensembles.
pub mod ensemble;
/// Estimator contract and the engine implementing it.
pub mod oracle;
/// Theory spectrum tables.
pub mod theory;

pub use engine::{bin, estimate_spectra, Bandpowers, RawSpectra};
pub use ensemble::{run_ensemble, EnsembleSummary, Realization};
pub use oracle::{BandpowerOracle, Engine};
pub use theory::{parse_theory, read_theory};
