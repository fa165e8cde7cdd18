//! Multipole binning schemes and the plain-text binning file.
//!
//! A binning file holds one bin per line as `lower upper centre`, with
//! inclusive bounds. Lines starting with `#` and blank lines are ignored.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use pcl_core::errors::{ErrorInfo, PclError};
use pcl_core::hash::stable_hash_string;
use serde::{Deserialize, Serialize};

/// One contiguous multipole range `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    /// First multipole of the bin.
    pub lower: usize,
    /// Last multipole of the bin (inclusive).
    pub upper: usize,
    /// Representative multipole.
    pub centre: f64,
}

impl Bin {
    /// Number of multipoles in the bin.
    pub fn width(&self) -> usize {
        self.upper + 1 - self.lower
    }
}

/// Ordered, contiguous, non-overlapping bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningScheme {
    bins: Vec<Bin>,
}

fn binning_error(code: &str, message: &str, index: usize) -> PclError {
    PclError::Config(ErrorInfo::new(code, message).with_context("bin", index))
}

impl BinningScheme {
    /// Validates and wraps `bins`.
    pub fn new(bins: Vec<Bin>) -> Result<Self, PclError> {
        if bins.is_empty() {
            return Err(PclError::degenerate("no-bins", "binning scheme has no bins"));
        }
        for (index, bin) in bins.iter().enumerate() {
            if bin.upper < bin.lower {
                return Err(binning_error("inverted-bin", "bin upper bound below lower bound", index));
            }
            if !(bin.centre >= bin.lower as f64 && bin.centre <= bin.upper as f64) {
                return Err(binning_error(
                    "centre-outside-bin",
                    "representative multipole lies outside its bin",
                    index,
                ));
            }
            if index > 0 && bin.lower != bins[index - 1].upper + 1 {
                return Err(binning_error(
                    "non-contiguous-bins",
                    "bins must be contiguous and increasing",
                    index,
                ));
            }
        }
        Ok(Self { bins })
    }

    /// `n_bins` bins of width `bin_size` starting at multipole 2.
    pub fn uniform(bin_size: usize, n_bins: usize) -> Result<Self, PclError> {
        if bin_size == 0 {
            return Err(PclError::config("invalid-bin-size", "bin size must be positive"));
        }
        let bins = (0..n_bins)
            .map(|k| {
                let lower = 2 + k * bin_size;
                let upper = lower + bin_size - 1;
                Bin {
                    lower,
                    upper,
                    centre: (lower + upper) as f64 / 2.0,
                }
            })
            .collect();
        Self::new(bins)
    }

    /// Bins in order.
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Always false for a validated scheme.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Representative multipoles.
    pub fn centres(&self) -> Vec<f64> {
        self.bins.iter().map(|bin| bin.centre).collect()
    }

    /// Bins usable with a band limit `lmax`: upper bound strictly below `lmax`,
    /// lower bound raised to 2.
    pub fn restrict(&self, lmax: usize) -> Result<Self, PclError> {
        let bins: Vec<Bin> = self
            .bins
            .iter()
            .filter(|bin| bin.upper < lmax && bin.upper >= 2)
            .map(|bin| Bin {
                lower: bin.lower.max(2),
                upper: bin.upper,
                centre: bin.centre.max(bin.lower.max(2) as f64),
            })
            .collect();
        if bins.is_empty() {
            return Err(PclError::Degenerate(
                ErrorInfo::new("no-bins", "no bin fits below lmax")
                    .with_context("lmax", lmax)
                    .with_hint("increase lmax or use narrower bins"),
            ));
        }
        if bins.len() < self.bins.len() {
            log::info!(
                "binning restricted to {} of {} bins below lmax={}",
                bins.len(),
                self.bins.len(),
                lmax
            );
        }
        Self::new(bins)
    }

    /// Content hash of the scheme.
    pub fn content_hash(&self) -> Result<String, PclError> {
        stable_hash_string(self)
    }

    /// Parses the text format.
    pub fn parse(text: &str) -> Result<Self, PclError> {
        let mut bins = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(PclError::Serde(
                    ErrorInfo::new("binning-columns", "expected `lower upper centre`")
                        .with_context("line", line_no + 1),
                ));
            }
            let parse_bound = |raw: &str| -> Result<usize, PclError> {
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
                    .map(|v| v as usize)
                    .ok_or_else(|| {
                        PclError::Serde(
                            ErrorInfo::new("binning-value", "bin bounds must be non-negative integers")
                                .with_context("line", line_no + 1)
                                .with_context("value", raw),
                        )
                    })
            };
            let centre = fields[2].parse::<f64>().map_err(|err| {
                PclError::Serde(
                    ErrorInfo::new("binning-value", err.to_string()).with_context("line", line_no + 1),
                )
            })?;
            bins.push(Bin {
                lower: parse_bound(fields[0])?,
                upper: parse_bound(fields[1])?,
                centre,
            });
        }
        Self::new(bins)
    }

    /// Renders the text format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for bin in &self.bins {
            let _ = writeln!(out, "{} {} {}", bin.lower, bin.upper, bin.centre);
        }
        out
    }

    /// Reads a binning file.
    pub fn read(path: &Path) -> Result<Self, PclError> {
        let text = fs::read_to_string(path).map_err(|err| {
            PclError::Serde(
                ErrorInfo::new("binning-read", err.to_string()).with_context("path", path.display()),
            )
        })?;
        Self::parse(&text)
    }

    /// Writes a binning file.
    pub fn write(&self, path: &Path) -> Result<(), PclError> {
        fs::write(path, self.to_text()).map_err(|err| {
            PclError::Serde(
                ErrorInfo::new("binning-write", err.to_string()).with_context("path", path.display()),
            )
        })
    }

    /// Bin-averages `values[l]` (indexed from `l = 0`) after multiplying by `factor(l)`.
    pub fn average(&self, values: &[f64], factor: impl Fn(usize) -> f64) -> Vec<f64> {
        self.bins
            .iter()
            .map(|bin| {
                let sum: f64 = (bin.lower..=bin.upper).map(|l| values[l] * factor(l)).sum();
                sum / bin.width() as f64
            })
            .collect()
    }
}

/// Writes a uniform binning file of `n_bins` bins of width `bin_size`.
pub fn create_binning_file(path: &Path, bin_size: usize, n_bins: usize) -> Result<BinningScheme, PclError> {
    let scheme = BinningScheme::uniform(bin_size, n_bins)?;
    scheme.write(path)?;
    Ok(scheme)
}
