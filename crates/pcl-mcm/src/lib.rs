#![deny(missing_docs)]
#![doc = "Mode-coupling matrices of apodized windows and the binned deconvolution operator built from them."]

/// Multipole binning schemes and binning files.
pub mod binning;
/// Coupling builder configuration and beams.
pub mod config;
/// Window spectra and unbinned coupling kernels.
pub mod coupling;
/// Binned, inverted coupling operator and its cache.
pub mod operator;
/// Wigner 3j families by recursion.
pub mod wigner;

pub use binning::{create_binning_file, Bin, BinningScheme};
pub use config::{Beams, CouplingConfig};
pub use coupling::{coupling_matrices, window_power_spectra, CouplingMatrices, WindowSpectra};
pub use operator::{
    build_coupling_and_binning, load_or_build, BlockKind, CouplingOperator, OperatorBlock,
    OperatorKey, MAX_CONDITION, OPERATOR_SCHEMA,
};
pub use wigner::{wigner3j_family, Wigner3jFamily};
