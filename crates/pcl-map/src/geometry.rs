//! Pixelizations supported by the estimator and their iso-latitude ring layout.
//!
//! Both families are described as a list of [`Ring`]s: every ring has a
//! constant colatitude and equally spaced pixels in longitude. The harmonic
//! transforms only ever see rings, which is what lets a single analysis
//! engine serve the equal-area sphere and rectangular sky patches.

use std::f64::consts::PI;

use pcl_core::errors::{ErrorInfo, PclError};
use serde::{Deserialize, Serialize};

fn geometry_error(code: &str, message: impl Into<String>) -> PclError {
    PclError::Geometry(ErrorInfo::new(code, message))
}

/// One iso-latitude ring of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    /// Colatitude of the ring in radians.
    pub theta: f64,
    /// Cosine of the colatitude.
    pub cos_theta: f64,
    /// Sine of the colatitude (computed without cancellation near the poles).
    pub sin_theta: f64,
    /// Longitude of the first pixel in radians.
    pub phi0: f64,
    /// Number of samples on the full `2π` circle.
    pub nphi: usize,
    /// Index of the first pixel of the ring in the map.
    pub offset: usize,
    /// Number of pixels stored for the ring (`<= nphi`).
    pub len: usize,
    /// Quadrature weight (solid angle) of each pixel of the ring.
    pub weight: f64,
}

impl Ring {
    /// Longitude spacing between neighbouring pixels.
    pub fn dphi(&self) -> f64 {
        2.0 * PI / self.nphi as f64
    }

    /// Longitude of the `j`-th pixel of the ring.
    pub fn phi(&self, j: usize) -> f64 {
        self.phi0 + j as f64 * self.dphi()
    }

    /// Whether the ring covers the full circle.
    pub fn is_full(&self) -> bool {
        self.len == self.nphi
    }
}

/// Equal-area HEALPix tessellation in RING ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HealpixGeometry {
    nside: usize,
}

impl HealpixGeometry {
    /// Creates the geometry for a power-of-two `nside`.
    pub fn new(nside: usize) -> Result<Self, PclError> {
        if nside == 0 || !nside.is_power_of_two() {
            return Err(PclError::Geometry(
                ErrorInfo::new("invalid-nside", "nside must be a positive power of two")
                    .with_context("nside", nside),
            ));
        }
        Ok(Self { nside })
    }

    /// Resolution parameter.
    pub fn nside(&self) -> usize {
        self.nside
    }

    /// Total number of pixels, `12 nside²`.
    pub fn npix(&self) -> usize {
        12 * self.nside * self.nside
    }

    /// Number of iso-latitude rings, `4 nside - 1`.
    pub fn nrings(&self) -> usize {
        4 * self.nside - 1
    }

    /// Highest multipole the pixelization can support, `3 nside - 1`.
    pub fn lmax_limit(&self) -> usize {
        3 * self.nside - 1
    }

    /// Approximate pixel size in radians.
    pub fn pixel_size(&self) -> f64 {
        (4.0 * PI / self.npix() as f64).sqrt()
    }

    /// Description of ring `index` (0-based, north to south).
    pub fn ring(&self, index: usize) -> Ring {
        let nside = self.nside;
        let ns = nside as f64;
        let npix = self.npix();
        let i = index + 1;
        let weight = 4.0 * PI / npix as f64;
        let (one_minus_z, z, nphi, phi0, offset) = if i < nside {
            let fi = i as f64;
            let omz = fi * fi / (3.0 * ns * ns);
            (omz, 1.0 - omz, 4 * i, PI / (4.0 * fi), 2 * i * (i - 1))
        } else if i <= 3 * nside {
            let z = 4.0 / 3.0 - 2.0 * i as f64 / (3.0 * ns);
            let phi0 = if (i - nside) % 2 == 0 {
                PI / (4.0 * ns)
            } else {
                0.0
            };
            let offset = 2 * nside * (nside - 1) + (i - nside) * 4 * nside;
            (1.0 - z, z, 4 * nside, phi0, offset)
        } else {
            let ii = 4 * nside - i;
            let fi = ii as f64;
            let omz = fi * fi / (3.0 * ns * ns);
            let z = -(1.0 - omz);
            (1.0 - z, z, 4 * ii, PI / (4.0 * fi), npix - 2 * ii * (ii + 1))
        };
        let sin_theta = (one_minus_z * (1.0 + z)).max(0.0).sqrt();
        Ring {
            theta: sin_theta.atan2(z),
            cos_theta: z,
            sin_theta,
            phi0,
            nphi,
            offset,
            len: nphi,
            weight,
        }
    }
}

/// Rectangular sky patch in a plate-carrée (CAR) projection.
///
/// Pixel centres sit at `dec0 + (i + ½)·res` and `ra0 + (j + ½)·res`; data is
/// stored row-major with rows of constant declination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarGeometry {
    ra0: f64,
    dec0: f64,
    res_arcmin: f64,
    ny: usize,
    nx: usize,
}

impl CarGeometry {
    /// Creates a patch spanning `[ra0, ra1] x [dec0, dec1]` degrees at `res_arcmin`.
    pub fn new(ra0: f64, ra1: f64, dec0: f64, dec1: f64, res_arcmin: f64) -> Result<Self, PclError> {
        if !(res_arcmin.is_finite() && res_arcmin > 0.0) {
            return Err(geometry_error("invalid-resolution", "resolution must be positive"));
        }
        if !(ra1 > ra0 && dec1 > dec0) {
            return Err(PclError::Geometry(
                ErrorInfo::new("invalid-box", "patch bounds must be increasing")
                    .with_context("ra", format!("[{ra0}, {ra1}]"))
                    .with_context("dec", format!("[{dec0}, {dec1}]")),
            ));
        }
        if dec0 < -90.0 || dec1 > 90.0 || ra1 - ra0 > 360.0 {
            return Err(geometry_error(
                "invalid-box",
                "patch must lie within dec [-90, 90] and span at most 360 degrees of ra",
            ));
        }
        let res_deg = res_arcmin / 60.0;
        let ny = ((dec1 - dec0) / res_deg).round() as usize;
        let nx = ((ra1 - ra0) / res_deg).round() as usize;
        if ny == 0 || nx == 0 {
            return Err(geometry_error(
                "empty-patch",
                "patch is smaller than a single pixel",
            ));
        }
        let geometry = Self {
            ra0,
            dec0,
            res_arcmin,
            ny,
            nx,
        };
        if nx > geometry.nphi_full() {
            return Err(geometry_error(
                "patch-wraps",
                "patch is wider than the full circle at this resolution",
            ));
        }
        Ok(geometry)
    }

    /// Number of rows (declination samples).
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Number of columns (right ascension samples).
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Pixel resolution in arcminutes.
    pub fn res_arcmin(&self) -> f64 {
        self.res_arcmin
    }

    /// Pixel resolution in radians.
    pub fn res_rad(&self) -> f64 {
        (self.res_arcmin / 60.0).to_radians()
    }

    /// Total number of pixels.
    pub fn npix(&self) -> usize {
        self.ny * self.nx
    }

    /// Highest multipole supported by the resolution, `floor(180 / res_deg)`.
    pub fn lmax_limit(&self) -> usize {
        (180.0 / (self.res_arcmin / 60.0)).floor() as usize
    }

    /// Number of samples on a full iso-latitude circle at this resolution.
    pub fn nphi_full(&self) -> usize {
        (360.0 / (self.res_arcmin / 60.0)).round() as usize
    }

    /// Declination of row `i` in degrees.
    pub fn dec(&self, i: usize) -> f64 {
        self.dec0 + (i as f64 + 0.5) * self.res_arcmin / 60.0
    }

    /// Right ascension of column `j` in degrees.
    pub fn ra(&self, j: usize) -> f64 {
        self.ra0 + (j as f64 + 0.5) * self.res_arcmin / 60.0
    }

    /// Description of row `i` as a partial ring.
    pub fn ring(&self, i: usize) -> Ring {
        let half = 0.5 * self.res_rad();
        let dec = self.dec(i).to_radians();
        let nphi = self.nphi_full();
        let dphi = 2.0 * PI / nphi as f64;
        let top = (dec + half).min(0.5 * PI);
        let bottom = (dec - half).max(-0.5 * PI);
        Ring {
            theta: 0.5 * PI - dec,
            cos_theta: dec.sin(),
            sin_theta: dec.cos(),
            phi0: self.ra(0).to_radians(),
            nphi,
            offset: i * self.nx,
            len: self.nx,
            weight: dphi * (top.sin() - bottom.sin()),
        }
    }
}

/// Map family and its metadata, immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pixelization {
    /// Full-sky equal-area HEALPix map.
    Healpix(HealpixGeometry),
    /// Rectangular CAR patch.
    Car(CarGeometry),
}

impl Pixelization {
    /// HEALPix pixelization at `nside`.
    pub fn healpix(nside: usize) -> Result<Self, PclError> {
        Ok(Pixelization::Healpix(HealpixGeometry::new(nside)?))
    }

    /// CAR patch covering the given box.
    pub fn car(ra0: f64, ra1: f64, dec0: f64, dec1: f64, res_arcmin: f64) -> Result<Self, PclError> {
        Ok(Pixelization::Car(CarGeometry::new(
            ra0, ra1, dec0, dec1, res_arcmin,
        )?))
    }

    /// Number of pixels per component.
    pub fn npix(&self) -> usize {
        match self {
            Pixelization::Healpix(g) => g.npix(),
            Pixelization::Car(g) => g.npix(),
        }
    }

    /// Highest multipole the pixelization supports.
    pub fn lmax_limit(&self) -> usize {
        match self {
            Pixelization::Healpix(g) => g.lmax_limit(),
            Pixelization::Car(g) => g.lmax_limit(),
        }
    }

    /// Typical pixel size in radians.
    pub fn pixel_size(&self) -> f64 {
        match self {
            Pixelization::Healpix(g) => g.pixel_size(),
            Pixelization::Car(g) => g.res_rad(),
        }
    }

    /// All rings, north to south, covering every pixel exactly once.
    pub fn rings(&self) -> Vec<Ring> {
        match self {
            Pixelization::Healpix(g) => (0..g.nrings()).map(|i| g.ring(i)).collect(),
            Pixelization::Car(g) => (0..g.ny()).map(|i| g.ring(i)).collect(),
        }
    }

    /// Short label used in hashes and log lines.
    pub fn describe(&self) -> String {
        match self {
            Pixelization::Healpix(g) => format!("healpix(nside={})", g.nside()),
            Pixelization::Car(g) => format!(
                "car(ny={}, nx={}, res={}', ra0={}, dec0={})",
                g.ny, g.nx, g.res_arcmin, g.ra0, g.dec0
            ),
        }
    }

    /// Pixel centres as `(theta, phi)` in radians, in map order.
    pub fn pixel_angles(&self) -> Vec<(f64, f64)> {
        let mut angles = vec![(0.0, 0.0); self.npix()];
        for ring in self.rings() {
            for j in 0..ring.len {
                angles[ring.offset + j] = (ring.theta, ring.phi(j));
            }
        }
        angles
    }

    /// Pixel centres as unit vectors, in map order.
    pub fn pixel_vectors(&self) -> Vec<[f64; 3]> {
        let mut vectors = vec![[0.0; 3]; self.npix()];
        for ring in self.rings() {
            for j in 0..ring.len {
                let phi = ring.phi(j);
                vectors[ring.offset + j] = [
                    ring.sin_theta * phi.cos(),
                    ring.sin_theta * phi.sin(),
                    ring.cos_theta,
                ];
            }
        }
        vectors
    }

    /// Returns an error unless `other` describes the same pixels.
    pub fn ensure_same(&self, other: &Pixelization) -> Result<(), PclError> {
        if self == other {
            Ok(())
        } else {
            Err(PclError::Geometry(
                ErrorInfo::new("pixelization-mismatch", "maps use different pixelizations")
                    .with_context("left", self.describe())
                    .with_context("right", other.describe()),
            ))
        }
    }
}

/// Angular distance between two unit vectors, accurate at small separations.
pub fn angular_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    let chord = (dx * dx + dy * dy + dz * dz).sqrt();
    2.0 * (0.5 * chord).min(1.0).asin()
}

/// Unit vector pointing at longitude/latitude given in degrees.
pub fn lonlat_to_vector(lon_deg: f64, lat_deg: f64) -> [f64; 3] {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healpix_rings_cover_every_pixel_once() {
        let geometry = HealpixGeometry::new(4).unwrap();
        let mut seen = vec![0usize; geometry.npix()];
        for i in 0..geometry.nrings() {
            let ring = geometry.ring(i);
            for j in 0..ring.len {
                seen[ring.offset + j] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }

    #[test]
    fn healpix_rings_are_symmetric_about_equator() {
        let geometry = HealpixGeometry::new(8).unwrap();
        let n = geometry.nrings();
        for i in 0..n {
            let north = geometry.ring(i);
            let south = geometry.ring(n - 1 - i);
            assert!((north.cos_theta + south.cos_theta).abs() < 1e-14);
            assert_eq!(north.nphi, south.nphi);
        }
    }

    #[test]
    fn car_weights_sum_to_patch_area() {
        let geometry = CarGeometry::new(-10.0, 10.0, -5.0, 5.0, 30.0).unwrap();
        let total: f64 = (0..geometry.ny())
            .map(|i| {
                let ring = geometry.ring(i);
                ring.weight * ring.len as f64
            })
            .sum();
        let expected = 20f64.to_radians() * (5f64.to_radians().sin() * 2.0);
        assert!((total - expected).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_power_of_two_nside() {
        assert!(HealpixGeometry::new(12).is_err());
    }
}
