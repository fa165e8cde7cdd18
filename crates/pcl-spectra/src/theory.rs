//! Tabulated theory spectra `ell TT EE BB TE`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use pcl_core::errors::{ErrorInfo, PclError};
use pcl_core::labels::{Convention, SpectrumLabel};

const COLUMNS: [SpectrumLabel; 4] = [
    SpectrumLabel::TT,
    SpectrumLabel::EE,
    SpectrumLabel::BB,
    SpectrumLabel::TE,
];

fn table_error(code: &str, message: impl Into<String>, line: usize) -> PclError {
    PclError::Serde(ErrorInfo::new(code, message).with_context("line", line))
}

/// Parses a theory table into `C_ℓ` arrays indexed from `ℓ = 0`.
///
/// Rows must hold contiguous multipoles; values below the first tabulated
/// multipole are zero. `stored` is the convention of the table, `D_ℓ`
/// values are converted to `C_ℓ`. All nine labels are returned: `ET`
/// copies `TE` and the parity-odd spectra are zero.
pub fn parse_theory(text: &str, stored: Convention) -> Result<BTreeMap<SpectrumLabel, Vec<f64>>, PclError> {
    let mut columns: BTreeMap<SpectrumLabel, Vec<f64>> =
        COLUMNS.iter().map(|&label| (label, Vec::new())).collect();
    let mut next_ell: Option<usize> = None;
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(|raw| {
                raw.parse::<f64>()
                    .map_err(|err| table_error("theory-value", err.to_string(), line_no))
            })
            .collect::<Result<Vec<f64>, PclError>>()?;
        if values.len() < 5 {
            return Err(table_error("theory-columns", "expected `ell TT EE BB TE`", line_no));
        }
        let ell = values[0];
        if !(ell >= 0.0 && ell.fract() == 0.0) {
            return Err(table_error("theory-ell", "multipoles must be non-negative integers", line_no));
        }
        let ell = ell as usize;
        match next_ell {
            None => {
                for column in columns.values_mut() {
                    column.resize(ell, 0.0);
                }
            }
            Some(expected) if expected != ell => {
                return Err(table_error("theory-not-contiguous", "multipoles must be contiguous", line_no));
            }
            Some(_) => {}
        }
        let factor = stored.factor(ell);
        for (label, value) in COLUMNS.iter().zip(&values[1..5]) {
            let cl = if factor > 0.0 { value / factor } else { 0.0 };
            if let Some(column) = columns.get_mut(label) {
                column.push(cl);
            }
        }
        next_ell = Some(ell + 1);
    }
    let Some(len) = next_ell else {
        return Err(PclError::degenerate("empty-theory", "theory table has no rows"));
    };
    let te = columns.get(&SpectrumLabel::TE).cloned().unwrap_or_default();
    columns.insert(SpectrumLabel::ET, te);
    for label in [
        SpectrumLabel::TB,
        SpectrumLabel::BT,
        SpectrumLabel::EB,
        SpectrumLabel::BE,
    ] {
        columns.insert(label, vec![0.0; len]);
    }
    Ok(columns)
}

/// Reads a theory table from disk.
pub fn read_theory(path: &Path, stored: Convention) -> Result<BTreeMap<SpectrumLabel, Vec<f64>>, PclError> {
    let text = fs::read_to_string(path).map_err(|err| {
        PclError::Serde(ErrorInfo::new("theory-read", err.to_string()).with_context("path", path.display()))
    })?;
    parse_theory(&text, stored)
}
