//! Smooth tapering of binary masks into analysis windows.

use std::f64::consts::PI;

use pcl_core::errors::{ErrorInfo, PclError, Warning};
use serde::{Deserialize, Serialize};

use crate::distance::distance_to_mask;
use crate::geometry::Pixelization;
use crate::map::{Map, Window};

/// Taper profile applied across the mask edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApodizationKind {
    /// `x - sin(2πx)/(2π)` in the normalized edge distance `x`.
    C1,
    /// `½ - ½cos(πx)` in the normalized edge distance `x`.
    C2,
    /// Separable cosine ramps along the edges of a CAR patch.
    Rectangle,
}

/// Apodization profile and radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApodizationConfig {
    /// Taper profile.
    pub kind: ApodizationKind,
    /// Taper radius in degrees.
    pub radius_deg: f64,
}

/// Window produced by [`build_window`] plus the non-fatal conditions it hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ApodizedWindow {
    /// Resulting window.
    pub window: Window,
    /// Warnings raised while tapering.
    pub warnings: Vec<Warning>,
}

fn taper(kind: ApodizationKind, x: f64) -> f64 {
    if x >= 1.0 {
        return 1.0;
    }
    match kind {
        ApodizationKind::C1 => x - (2.0 * PI * x).sin() / (2.0 * PI),
        ApodizationKind::C2 | ApodizationKind::Rectangle => 0.5 - 0.5 * (PI * x).cos(),
    }
}

fn exceeds_region(pixelization: Pixelization, radius_deg: f64) -> Result<ApodizedWindow, PclError> {
    let warning = Warning::emit(
        "apodization-exceeds-region",
        format!("apodization radius {radius_deg} deg exceeds the observed region; window is zero"),
    );
    Ok(ApodizedWindow {
        window: Window::new(pixelization, vec![0.0; pixelization.npix()])?,
        warnings: vec![warning],
    })
}

/// Tapers a binary mask into a window.
///
/// Pixels with value above one half count as observed. An empty mask is a
/// degenerate input; a radius so large that no pixel survives untapered
/// yields an all-zero window together with an `apodization-exceeds-region`
/// warning.
pub fn build_window(mask: &Map, config: &ApodizationConfig) -> Result<ApodizedWindow, PclError> {
    if !(config.radius_deg.is_finite() && config.radius_deg >= 0.0) {
        return Err(PclError::Config(
            ErrorInfo::new("invalid-apodization-radius", "radius must be non-negative")
                .with_context("radius_deg", config.radius_deg),
        ));
    }
    let pixelization = *mask.pixelization();
    let observed: Vec<bool> = mask.component(0).iter().map(|v| *v > 0.5).collect();
    if !observed.iter().any(|seen| *seen) {
        return Err(PclError::Degenerate(
            ErrorInfo::new("empty-mask", "binary mask has no observed pixel")
                .with_hint("check the mask footprint before apodizing"),
        ));
    }
    let binary: Vec<f64> = observed.iter().map(|seen| if *seen { 1.0 } else { 0.0 }).collect();
    if config.radius_deg == 0.0 {
        return Ok(ApodizedWindow {
            window: Window::new(pixelization, binary)?,
            warnings: Vec::new(),
        });
    }

    let values = match config.kind {
        ApodizationKind::C1 | ApodizationKind::C2 => {
            let distance = distance_to_mask(&pixelization, &observed, config.radius_deg);
            if !distance.iter().any(|d| *d >= config.radius_deg) {
                return exceeds_region(pixelization, config.radius_deg);
            }
            distance
                .iter()
                .map(|d| taper(config.kind, d / config.radius_deg))
                .collect::<Vec<_>>()
        }
        ApodizationKind::Rectangle => {
            let car = match pixelization {
                Pixelization::Car(car) => car,
                Pixelization::Healpix(_) => {
                    return Err(PclError::Geometry(
                        ErrorInfo::new(
                            "rectangle-requires-car",
                            "rectangle apodization is defined on CAR patches only",
                        )
                        .with_context("pixelization", pixelization.describe()),
                    ))
                }
            };
            let ramp = (config.radius_deg / (car.res_arcmin() / 60.0)) as usize;
            if 2 * ramp >= car.nx() || 2 * ramp >= car.ny() {
                return exceeds_region(pixelization, config.radius_deg);
            }
            let edge = |index: usize, n: usize| {
                let from_edge = index.min(n - 1 - index);
                if ramp == 0 {
                    1.0
                } else {
                    taper(ApodizationKind::Rectangle, from_edge as f64 / ramp as f64)
                }
            };
            let nx = car.nx();
            binary
                .iter()
                .enumerate()
                .map(|(pixel, b)| b * edge(pixel / nx, car.ny()) * edge(pixel % nx, nx))
                .collect()
        }
    };
    log::info!(
        "apodized {} with {:?} radius {} deg",
        pixelization.describe(),
        config.kind,
        config.radius_deg
    );
    Ok(ApodizedWindow {
        window: Window::new(pixelization, values)?,
        warnings: Vec::new(),
    })
}
