#![deny(missing_docs)]
#![doc = "K-space filter zeroing bands of horizontal and vertical Fourier modes of CAR maps."]

pub mod filter;

pub use filter::{kspace_filter, wavenumbers, KspaceFilter, KspaceMask};
