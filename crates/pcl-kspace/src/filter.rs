//! Fourier-space stripe filter.
//!
//! Wavenumbers follow `l = 2π · fftfreq(n, d)` with `d` the pixel size in
//! radians: `lx` along right ascension (columns), `ly` along declination
//! (rows). `vk_mask` zeroes every column whose `lx` lies strictly inside the
//! range, `hk_mask` every row whose `ly` does. The zeroed set is closed under
//! `k -> -k`, so a real map stays exactly real.

use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;
use pcl_core::errors::{ErrorInfo, PclError};
use pcl_map::{CarGeometry, Map, Pixelization};
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

/// Wavenumber bands to remove; `None` leaves that axis untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KspaceMask {
    /// `[lo, hi]` band of `lx` (vertical stripes).
    #[serde(default)]
    pub vk_mask: Option<[f64; 2]>,
    /// `[lo, hi]` band of `ly` (horizontal stripes).
    #[serde(default)]
    pub hk_mask: Option<[f64; 2]>,
}

/// `2π · fftfreq(n, d)`.
pub fn wavenumbers(n: usize, d: f64) -> Vec<f64> {
    let scale = 2.0 * PI / (n as f64 * d);
    (0..n)
        .map(|j| {
            let k = if j <= (n - 1) / 2 { j as f64 } else { j as f64 - n as f64 };
            k * scale
        })
        .collect()
}

fn zeroed(l: &[f64], band: Option<[f64; 2]>) -> Vec<bool> {
    let n = l.len();
    let inside = |value: f64| band.is_some_and(|[lo, hi]| value > lo && value < hi);
    (0..n)
        .map(|j| inside(l[j]) || inside(l[(n - j) % n]))
        .collect()
}

/// Filter bound to one CAR geometry, reusable across maps.
pub struct KspaceFilter {
    geometry: CarGeometry,
    zero_cols: Vec<bool>,
    zero_rows: Vec<bool>,
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for KspaceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KspaceFilter")
            .field("geometry", &self.geometry)
            .field("zero_cols", &self.zero_cols.iter().filter(|z| **z).count())
            .field("zero_rows", &self.zero_rows.iter().filter(|z| **z).count())
            .finish()
    }
}

fn car_geometry(pixelization: &Pixelization) -> Result<CarGeometry, PclError> {
    match pixelization {
        Pixelization::Car(geometry) => Ok(*geometry),
        other => Err(PclError::Geometry(
            ErrorInfo::new("kspace-requires-car", "k-space filtering needs a rectangular patch")
                .with_context("pixelization", other.describe()),
        )),
    }
}

impl KspaceFilter {
    /// Plans the transforms and the zeroed modes for maps on `pixelization`.
    pub fn new(pixelization: &Pixelization, mask: &KspaceMask) -> Result<Self, PclError> {
        let geometry = car_geometry(pixelization)?;
        let (ny, nx) = (geometry.ny(), geometry.nx());
        let d = geometry.res_rad();
        let zero_cols = zeroed(&wavenumbers(nx, d), mask.vk_mask);
        let zero_rows = zeroed(&wavenumbers(ny, d), mask.hk_mask);
        let mut planner = FftPlanner::new();
        Ok(Self {
            geometry,
            zero_cols,
            zero_rows,
            row_forward: planner.plan_fft_forward(nx),
            row_inverse: planner.plan_fft_inverse(nx),
            col_forward: planner.plan_fft_forward(ny),
            col_inverse: planner.plan_fft_inverse(ny),
        })
    }

    /// Whether the filter leaves every mode untouched.
    pub fn is_identity(&self) -> bool {
        !self.zero_cols.iter().chain(&self.zero_rows).any(|z| *z)
    }

    /// Number of zeroed `(columns, rows)` of the 2D spectrum.
    pub fn zeroed_modes(&self) -> (usize, usize) {
        let count = |flags: &[bool]| flags.iter().filter(|z| **z).count();
        (count(&self.zero_cols), count(&self.zero_rows))
    }

    fn columns(&self, data: &mut [Complex64], fft: &Arc<dyn Fft<f64>>) {
        let (ny, nx) = (self.geometry.ny(), self.geometry.nx());
        let mut column = vec![Complex64::new(0.0, 0.0); ny];
        for j in 0..nx {
            for i in 0..ny {
                column[i] = data[i * nx + j];
            }
            fft.process(&mut column);
            for i in 0..ny {
                data[i * nx + j] = column[i];
            }
        }
    }

    fn filter_component(&self, values: &[f64]) -> Vec<f64> {
        let (ny, nx) = (self.geometry.ny(), self.geometry.nx());
        let mut data: Vec<Complex64> = values.iter().map(|v| Complex64::new(*v, 0.0)).collect();
        for row in data.chunks_mut(nx) {
            self.row_forward.process(row);
        }
        self.columns(&mut data, &self.col_forward);
        for (i, row) in data.chunks_mut(nx).enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                if self.zero_rows[i] || self.zero_cols[j] {
                    *value = Complex64::new(0.0, 0.0);
                }
            }
        }
        self.columns(&mut data, &self.col_inverse);
        for row in data.chunks_mut(nx) {
            self.row_inverse.process(row);
        }
        let norm = (nx * ny) as f64;
        data.iter().map(|c| c.re / norm).collect()
    }

    /// Filters every component of `map`.
    pub fn apply(&self, map: &Map) -> Result<Map, PclError> {
        let geometry = car_geometry(map.pixelization())?;
        if geometry != self.geometry {
            return Err(PclError::Geometry(
                ErrorInfo::new("kspace-geometry", "map geometry differs from the planned filter")
                    .with_context("map", map.pixelization().describe()),
            ));
        }
        if self.is_identity() {
            return Ok(map.clone());
        }
        let components = map
            .components()
            .par_iter()
            .map(|values| self.filter_component(values))
            .collect();
        Map::from_components(*map.pixelization(), components)
    }
}

/// Zeroes the `vk_mask` / `hk_mask` wavenumber bands of a CAR map.
///
/// Bands outside the representable wavenumbers leave the map unchanged.
pub fn kspace_filter(map: &Map, mask: &KspaceMask) -> Result<Map, PclError> {
    let filter = KspaceFilter::new(map.pixelization(), mask)?;
    let (cols, rows) = filter.zeroed_modes();
    log::debug!("k-space filter zeroes {cols} columns and {rows} rows");
    filter.apply(map)
}
