//! Field, spectrum and convention labels shared by every stage of the estimator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, PclError};

/// Harmonic field component of a temperature/polarization map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    /// Temperature (spin 0).
    T,
    /// Gradient-like polarization (spin 2).
    E,
    /// Curl-like polarization (spin 2).
    B,
}

impl Field {
    /// Position of the field in a `[T, E, B]` coefficient set.
    pub fn index(self) -> usize {
        match self {
            Field::T => 0,
            Field::E => 1,
            Field::B => 2,
        }
    }

    /// Whether the field is built from the spin-2 part of the map.
    pub fn is_spin2(self) -> bool {
        !matches!(self, Field::T)
    }
}

/// Label of a (cross) power spectrum, first letter from the first operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpectrumLabel {
    /// Temperature auto/cross spectrum.
    TT,
    /// First field T, second field E.
    TE,
    /// First field T, second field B.
    TB,
    /// First field E, second field T.
    ET,
    /// First field B, second field T.
    BT,
    /// E-mode spectrum.
    EE,
    /// First field E, second field B.
    EB,
    /// First field B, second field E.
    BE,
    /// B-mode spectrum.
    BB,
}

impl SpectrumLabel {
    /// The nine spin0/spin2 spectra in canonical order.
    pub const ALL: [SpectrumLabel; 9] = [
        SpectrumLabel::TT,
        SpectrumLabel::TE,
        SpectrumLabel::TB,
        SpectrumLabel::ET,
        SpectrumLabel::BT,
        SpectrumLabel::EE,
        SpectrumLabel::EB,
        SpectrumLabel::BE,
        SpectrumLabel::BB,
    ];

    /// Spin-2 x spin-2 spectra in the order used by the coupling block.
    pub const SPIN2_BLOCK: [SpectrumLabel; 4] = [
        SpectrumLabel::EE,
        SpectrumLabel::EB,
        SpectrumLabel::BE,
        SpectrumLabel::BB,
    ];

    /// Returns `(first, second)` operand fields.
    pub fn fields(self) -> (Field, Field) {
        use Field::*;
        match self {
            SpectrumLabel::TT => (T, T),
            SpectrumLabel::TE => (T, E),
            SpectrumLabel::TB => (T, B),
            SpectrumLabel::ET => (E, T),
            SpectrumLabel::BT => (B, T),
            SpectrumLabel::EE => (E, E),
            SpectrumLabel::EB => (E, B),
            SpectrumLabel::BE => (B, E),
            SpectrumLabel::BB => (B, B),
        }
    }

    /// Builds the label from its operand fields.
    pub fn from_fields(first: Field, second: Field) -> Self {
        use Field::*;
        match (first, second) {
            (T, T) => SpectrumLabel::TT,
            (T, E) => SpectrumLabel::TE,
            (T, B) => SpectrumLabel::TB,
            (E, T) => SpectrumLabel::ET,
            (B, T) => SpectrumLabel::BT,
            (E, E) => SpectrumLabel::EE,
            (E, B) => SpectrumLabel::EB,
            (B, E) => SpectrumLabel::BE,
            (B, B) => SpectrumLabel::BB,
        }
    }

    /// Label obtained by swapping the operands (TE <-> ET, ...).
    pub fn transposed(self) -> Self {
        let (a, b) = self.fields();
        Self::from_fields(b, a)
    }

    /// Canonical text form (`"TE"`).
    pub fn as_str(self) -> &'static str {
        match self {
            SpectrumLabel::TT => "TT",
            SpectrumLabel::TE => "TE",
            SpectrumLabel::TB => "TB",
            SpectrumLabel::ET => "ET",
            SpectrumLabel::BT => "BT",
            SpectrumLabel::EE => "EE",
            SpectrumLabel::EB => "EB",
            SpectrumLabel::BE => "BE",
            SpectrumLabel::BB => "BB",
        }
    }
}

impl fmt::Display for SpectrumLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpectrumLabel {
    type Err = PclError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SpectrumLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                PclError::Config(
                    ErrorInfo::new("unknown-spectrum", "unknown spectrum label")
                        .with_context("label", value),
                )
            })
    }
}

/// Spectrum convention used when binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Convention {
    /// Raw angular power `C_ℓ`.
    #[default]
    Cl,
    /// Rescaled `D_ℓ = ℓ(ℓ+1) C_ℓ / 2π`.
    Dl,
}

impl Convention {
    /// Multiplicative factor applied to `C_ℓ` at multipole `ell`.
    pub fn factor(self, ell: usize) -> f64 {
        match self {
            Convention::Cl => 1.0,
            Convention::Dl => {
                let l = ell as f64;
                l * (l + 1.0) / (2.0 * std::f64::consts::PI)
            }
        }
    }
}

impl FromStr for Convention {
    type Err = PclError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Cl" | "cl" => Ok(Convention::Cl),
            "Dl" | "dl" => Ok(Convention::Dl),
            other => Err(PclError::Config(
                ErrorInfo::new("unknown-convention", "spectrum convention must be Cl or Dl")
                    .with_context("value", other),
            )),
        }
    }
}

/// Harmonic analysis variant shared by the analyzer and the coupling builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisMode {
    /// Plain transforms of the window-multiplied map.
    #[default]
    Standard,
    /// E/B purification using the window's spin-1 and spin-2 derivatives.
    Purified,
}

impl AnalysisMode {
    /// Whether this is the purified variant.
    pub fn is_pure(self) -> bool {
        matches!(self, AnalysisMode::Purified)
    }
}
