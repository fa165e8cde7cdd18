//! Scalar and (T, Q, U) maps, windows and window pairs.

use std::sync::Arc;

use pcl_core::errors::{ErrorInfo, PclError};
use pcl_core::hash::hash_f64_arrays;
use serde::{Deserialize, Serialize};

use crate::geometry::Pixelization;

/// A scalar (`ncomp = 1`) or polarized (`ncomp = 3`, T/Q/U) sky map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    pixelization: Pixelization,
    data: Vec<Vec<f64>>,
}

impl Map {
    /// Creates a zero-filled map with `ncomp` components.
    pub fn zeros(pixelization: Pixelization, ncomp: usize) -> Result<Self, PclError> {
        check_ncomp(ncomp)?;
        let npix = pixelization.npix();
        Ok(Self {
            pixelization,
            data: vec![vec![0.0; npix]; ncomp],
        })
    }

    /// Wraps existing component arrays after validating their shape.
    pub fn from_components(
        pixelization: Pixelization,
        data: Vec<Vec<f64>>,
    ) -> Result<Self, PclError> {
        check_ncomp(data.len())?;
        let npix = pixelization.npix();
        if let Some(bad) = data.iter().position(|component| component.len() != npix) {
            return Err(PclError::Geometry(
                ErrorInfo::new("component-length", "component length differs from npix")
                    .with_context("component", bad)
                    .with_context("expected", npix)
                    .with_context("found", data[bad].len()),
            ));
        }
        Ok(Self { pixelization, data })
    }

    /// Builds a single-component map by evaluating `f(theta, phi)` at pixel centres.
    pub fn from_fn(pixelization: Pixelization, f: impl Fn(f64, f64) -> f64) -> Self {
        let values = pixelization
            .pixel_angles()
            .into_iter()
            .map(|(theta, phi)| f(theta, phi))
            .collect();
        Self {
            pixelization,
            data: vec![values],
        }
    }

    /// Pixelization metadata.
    pub fn pixelization(&self) -> &Pixelization {
        &self.pixelization
    }

    /// Number of components (1 or 3).
    pub fn ncomp(&self) -> usize {
        self.data.len()
    }

    /// Number of pixels per component.
    pub fn npix(&self) -> usize {
        self.pixelization.npix()
    }

    /// Read access to component `index`.
    pub fn component(&self, index: usize) -> &[f64] {
        &self.data[index]
    }

    /// Write access to component `index`.
    pub fn component_mut(&mut self, index: usize) -> &mut [f64] {
        &mut self.data[index]
    }

    /// All components.
    pub fn components(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Consumes the map and returns its component arrays.
    pub fn into_components(self) -> Vec<Vec<f64>> {
        self.data
    }

    /// Content hash covering the pixelization and every value bit-exactly.
    pub fn content_hash(&self) -> String {
        hash_f64_arrays(
            &self.pixelization.describe(),
            self.data.iter().map(Vec::as_slice),
        )
    }
}

fn check_ncomp(ncomp: usize) -> Result<(), PclError> {
    if ncomp == 1 || ncomp == 3 {
        Ok(())
    } else {
        Err(PclError::Geometry(
            ErrorInfo::new("invalid-ncomp", "maps carry either 1 or 3 components")
                .with_context("ncomp", ncomp),
        ))
    }
}

/// Multiplicative taper with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pixelization: Pixelization,
    values: Vec<f64>,
}

impl Window {
    /// Validates `values` (finite, within `[0, 1]`) and wraps them.
    pub fn new(pixelization: Pixelization, values: Vec<f64>) -> Result<Self, PclError> {
        if values.len() != pixelization.npix() {
            return Err(PclError::Geometry(
                ErrorInfo::new("window-length", "window length differs from npix")
                    .with_context("expected", pixelization.npix())
                    .with_context("found", values.len()),
            ));
        }
        if let Some(index) = values
            .iter()
            .position(|v| !v.is_finite() || *v < 0.0 || *v > 1.0 + 1e-12)
        {
            return Err(PclError::Config(
                ErrorInfo::new("window-range", "window values must lie in [0, 1]")
                    .with_context("pixel", index)
                    .with_context("value", values[index]),
            ));
        }
        Ok(Self {
            pixelization,
            values,
        })
    }

    /// Full-coverage window (all ones).
    pub fn ones(pixelization: Pixelization) -> Self {
        let npix = pixelization.npix();
        Self {
            pixelization,
            values: vec![1.0; npix],
        }
    }

    /// Interprets the first component of a map as a window.
    pub fn from_map(map: &Map) -> Result<Self, PclError> {
        Self::new(*map.pixelization(), map.component(0).to_vec())
    }

    /// Pixelization metadata.
    pub fn pixelization(&self) -> &Pixelization {
        &self.pixelization
    }

    /// Window values in map order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Whether every value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Pointwise product with another window on the same pixelization.
    pub fn product(&self, other: &Window) -> Result<Window, PclError> {
        self.pixelization.ensure_same(&other.pixelization)?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a * b)
            .collect();
        Ok(Window {
            pixelization: self.pixelization,
            values,
        })
    }

    /// Copies the window into a single-component map.
    pub fn to_map(&self) -> Map {
        Map {
            pixelization: self.pixelization,
            data: vec![self.values.clone()],
        }
    }

    /// Content hash identifying the window bit-exactly.
    pub fn content_hash(&self) -> String {
        hash_f64_arrays(&self.pixelization.describe(), [self.values.as_slice()])
    }
}

/// The `(spin-0, spin-2)` window pair consumed by spin0-and-2 routines.
///
/// Windows are reference counted so that one pair can be shared by many
/// analyses without copying pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPair {
    spin0: Arc<Window>,
    spin2: Arc<Window>,
}

impl WindowPair {
    /// Pairs a temperature window with a polarization window.
    pub fn new(spin0: Window, spin2: Window) -> Result<Self, PclError> {
        spin0.pixelization().ensure_same(spin2.pixelization())?;
        Ok(Self {
            spin0: Arc::new(spin0),
            spin2: Arc::new(spin2),
        })
    }

    /// Uses the same window for temperature and polarization.
    pub fn same(window: Window) -> Self {
        let shared = Arc::new(window);
        Self {
            spin0: Arc::clone(&shared),
            spin2: shared,
        }
    }

    /// Temperature window.
    pub fn spin0(&self) -> &Window {
        &self.spin0
    }

    /// Polarization window.
    pub fn spin2(&self) -> &Window {
        &self.spin2
    }

    /// Pixelization shared by both windows.
    pub fn pixelization(&self) -> &Pixelization {
        self.spin0.pixelization()
    }

    /// Hash pair `(spin0, spin2)` identifying the windows.
    pub fn content_hash(&self) -> (String, String) {
        (self.spin0.content_hash(), self.spin2.content_hash())
    }

    /// Fails with a degenerate-input error when either window is all zero.
    pub fn ensure_nonzero(&self) -> Result<(), PclError> {
        for (name, window) in [("spin0", &self.spin0), ("spin2", &self.spin2)] {
            if window.is_zero() {
                return Err(PclError::Degenerate(
                    ErrorInfo::new("empty-window", "window is identically zero")
                        .with_context("window", name)
                        .with_hint("reduce the apodization radius or enlarge the mask"),
                ));
            }
        }
        Ok(())
    }
}
