pub mod binning;
pub mod kspace;
pub mod mcm;
pub mod spectra;
pub mod window;
