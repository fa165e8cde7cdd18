//! Binary masks: disc queries, ring neighbourhoods and simulated point-source holes.

use pcl_core::errors::{ErrorInfo, PclError};
use pcl_core::rng::RngHandle;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::{angular_distance, lonlat_to_vector, Pixelization, Ring};
use crate::map::Map;

/// Ring bookkeeping used to find the pixels surrounding a given pixel.
#[derive(Debug, Clone)]
pub(crate) struct RingLookup {
    rings: Vec<Ring>,
    ring_of: Vec<u32>,
}

impl RingLookup {
    pub(crate) fn new(pixelization: &Pixelization) -> Self {
        let rings = pixelization.rings();
        let mut ring_of = vec![0u32; pixelization.npix()];
        for (index, ring) in rings.iter().enumerate() {
            for slot in &mut ring_of[ring.offset..ring.offset + ring.len] {
                *slot = index as u32;
            }
        }
        Self { rings, ring_of }
    }

    pub(crate) fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Pixels in the same and the two adjacent rings closest in longitude.
    pub(crate) fn neighbours(&self, pixel: usize) -> Vec<usize> {
        let r = self.ring_of[pixel] as usize;
        let ring = &self.rings[r];
        let phi = ring.phi(pixel - ring.offset);
        let lo = r.saturating_sub(1);
        let hi = (r + 1).min(self.rings.len() - 1);
        let mut out = Vec::with_capacity(9);
        for other in &self.rings[lo..=hi] {
            let centre = ((phi - other.phi0) / other.dphi()).round() as i64;
            for k in centre - 1..=centre + 1 {
                let index = if other.is_full() {
                    k.rem_euclid(other.nphi as i64) as usize
                } else if k >= 0 && (k as usize) < other.len {
                    k as usize
                } else {
                    continue;
                };
                let candidate = other.offset + index;
                if candidate != pixel && !out.contains(&candidate) {
                    out.push(candidate);
                }
            }
        }
        out
    }
}

/// Indices of the pixels whose centres lie within `radius` (radians) of `centre`.
pub fn query_disc(pixelization: &Pixelization, centre: [f64; 3], radius: f64) -> Vec<usize> {
    let theta_c = centre[2].clamp(-1.0, 1.0).acos();
    let mut hits = Vec::new();
    for ring in pixelization.rings() {
        if (ring.theta - theta_c).abs() > radius + 1e-12 {
            continue;
        }
        for j in 0..ring.len {
            let phi = ring.phi(j);
            let v = [
                ring.sin_theta * phi.cos(),
                ring.sin_theta * phi.sin(),
                ring.cos_theta,
            ];
            if angular_distance(&v, &centre) <= radius {
                hits.push(ring.offset + j);
            }
        }
    }
    hits
}

/// Binary mask equal to one inside a disc centred at `(lon, lat)` degrees.
pub fn disc_mask(pixelization: Pixelization, lon_deg: f64, lat_deg: f64, radius_deg: f64) -> Map {
    let centre = lonlat_to_vector(lon_deg, lat_deg);
    let radius = radius_deg.to_radians();
    Map::from_fn(pixelization, |theta, phi| {
        let v = [theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()];
        if angular_distance(&v, &centre) <= radius {
            1.0
        } else {
            0.0
        }
    })
}

fn default_seed() -> u64 {
    1
}

/// Parameters for simulated point-source holes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceMaskConfig {
    /// Number of circular holes to punch.
    pub n_holes: usize,
    /// Radius of each hole in arcminutes.
    pub hole_radius_arcmin: f64,
    /// Seed for the hole centres.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Copies `binary` and zeroes `n_holes` discs centred on observed pixels.
///
/// Hole centres are drawn uniformly among the observed pixels, so every hole
/// overlaps the observed region and only ever removes coverage.
pub fn simulate_source_mask(binary: &Map, config: &SourceMaskConfig) -> Result<Map, PclError> {
    if binary.ncomp() != 1 {
        return Err(PclError::Config(
            ErrorInfo::new("mask-ncomp", "source masks are built from scalar masks")
                .with_context("ncomp", binary.ncomp()),
        ));
    }
    if !(config.hole_radius_arcmin.is_finite() && config.hole_radius_arcmin >= 0.0) {
        return Err(PclError::config(
            "invalid-hole-radius",
            "hole radius must be a non-negative number of arcminutes",
        ));
    }
    let observed: Vec<usize> = binary
        .component(0)
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.5)
        .map(|(index, _)| index)
        .collect();
    if observed.is_empty() {
        return Err(PclError::degenerate(
            "empty-mask",
            "cannot place source holes in an empty mask",
        ));
    }
    let pixelization = *binary.pixelization();
    let vectors = pixelization.pixel_vectors();
    let radius = (config.hole_radius_arcmin / 60.0).to_radians();
    let mut rng = RngHandle::from_seed(config.seed);
    let mut mask = binary.clone();
    for _ in 0..config.n_holes {
        let centre = observed[rng.gen_range(0..observed.len())];
        for pixel in query_disc(&pixelization, vectors[centre], radius) {
            mask.component_mut(0)[pixel] = 0.0;
        }
    }
    log::debug!(
        "punched {} holes of {}' into {}",
        config.n_holes,
        config.hole_radius_arcmin,
        pixelization.describe()
    );
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healpix_neighbours_are_close() {
        let pix = Pixelization::healpix(8).unwrap();
        let lookup = RingLookup::new(&pix);
        let vectors = pix.pixel_vectors();
        for pixel in [0usize, 100, 383, 700] {
            let neighbours = lookup.neighbours(pixel);
            assert!(neighbours.len() >= 5);
            for n in neighbours {
                assert!(angular_distance(&vectors[pixel], &vectors[n]) < 3.0 * pix.pixel_size());
            }
        }
    }

    #[test]
    fn disc_mask_contains_centre() {
        let pix = Pixelization::healpix(16).unwrap();
        let mask = disc_mask(pix, 30.0, 50.0, 10.0);
        let observed = mask.component(0).iter().filter(|v| **v > 0.0).count();
        let expected = (1.0 - 10f64.to_radians().cos()) / 2.0 * pix.npix() as f64;
        assert!((observed as f64 - expected).abs() < 0.2 * expected);
    }
}
