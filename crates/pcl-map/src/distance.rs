//! Angular distance from observed pixels to the edge of a binary mask.

use rayon::prelude::*;

use crate::geometry::{angular_distance, Pixelization};
use crate::masks::RingLookup;

/// Masked pixels that touch at least one observed pixel.
pub(crate) fn boundary_pixels(lookup: &RingLookup, observed: &[bool]) -> Vec<usize> {
    let mut is_boundary = vec![false; observed.len()];
    for (pixel, _) in observed.iter().enumerate().filter(|(_, seen)| **seen) {
        for neighbour in lookup.neighbours(pixel) {
            if !observed[neighbour] {
                is_boundary[neighbour] = true;
            }
        }
    }
    is_boundary
        .iter()
        .enumerate()
        .filter_map(|(pixel, flag)| flag.then_some(pixel))
        .collect()
}

/// Distance in degrees from every pixel to the nearest masked pixel.
///
/// Masked pixels get zero. Observed pixels farther than `horizon_deg` from
/// every masked pixel (or all pixels of a mask without holes) get
/// `f64::INFINITY`; the exact value past the horizon is never needed.
pub fn distance_to_mask(pixelization: &Pixelization, observed: &[bool], horizon_deg: f64) -> Vec<f64> {
    let lookup = RingLookup::new(pixelization);
    let vectors = pixelization.pixel_vectors();
    let mut boundary: Vec<(f64, [f64; 3])> = boundary_pixels(&lookup, observed)
        .into_iter()
        .map(|pixel| {
            let v = vectors[pixel];
            (v[2].clamp(-1.0, 1.0).acos(), v)
        })
        .collect();
    boundary.sort_by(|a, b| a.0.total_cmp(&b.0));
    log::debug!(
        "distance transform over {} boundary pixels of {}",
        boundary.len(),
        pixelization.describe()
    );

    let horizon = horizon_deg.to_radians() + 2.0 * pixelization.pixel_size();
    observed
        .par_iter()
        .enumerate()
        .map(|(pixel, seen)| {
            if !*seen {
                return 0.0;
            }
            let v = &vectors[pixel];
            let theta = v[2].clamp(-1.0, 1.0).acos();
            let start = boundary.partition_point(|(t, _)| *t < theta - horizon);
            let nearest = boundary[start..]
                .iter()
                .take_while(|(t, _)| *t <= theta + horizon)
                .map(|(_, b)| angular_distance(v, b))
                .fold(f64::INFINITY, f64::min);
            if nearest.is_finite() {
                nearest.to_degrees()
            } else {
                f64::INFINITY
            }
        })
        .collect()
}
