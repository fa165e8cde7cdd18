use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use pcl_core::errors::Warning;
use pcl_map::{build_window, read_map, simulate_source_mask, write_map, ApodizationConfig, Map, Window};
use serde::Serialize;

use crate::config::{load_config, write_json, WindowConfig};

#[derive(Args, Debug)]
pub struct WindowArgs {
    /// YAML pipeline configuration with a `window` section.
    #[arg(long)]
    pub config: PathBuf,
    /// Binary survey mask (1 observed, 0 masked).
    #[arg(long)]
    pub mask: PathBuf,
    /// Output directory for the windows.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Serialize)]
struct WindowSummary {
    spin0: String,
    spin2: String,
    observed_fraction: f64,
    warnings: Vec<Warning>,
}

/// Point-source holes as a window: zero inside each hole, one elsewhere.
fn source_holes(mask: &Map, config: &WindowConfig) -> Result<Option<Window>, Box<dyn Error>> {
    let Some(sources) = &config.sources else {
        return Ok(None);
    };
    let holed = simulate_source_mask(mask, sources)?;
    let values: Vec<f64> = mask
        .component(0)
        .iter()
        .zip(holed.component(0))
        .map(|(&m, &h)| if m != 0.0 && h == 0.0 { 0.0 } else { 1.0 })
        .collect();
    let holes = Map::from_components(*mask.pixelization(), vec![values])?;
    let holes = match &config.source_apodization {
        Some(apodization) => build_window(&holes, apodization)?.window,
        None => Window::from_map(&holes)?,
    };
    Ok(Some(holes))
}

pub fn run(args: &WindowArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let config = load_config(&args.config)?;
    let Some(window_config) = &config.window else {
        return Err(format!("{} has no `window` section", args.config.display()).into());
    };
    let mask = read_map(&args.mask)?;
    let holes = source_holes(&mask, window_config)?;

    let mut warnings = Vec::new();
    let mut taper = |apodization: &ApodizationConfig| -> Result<Window, Box<dyn Error>> {
        let tapered = build_window(&mask, apodization)?;
        warnings.extend(tapered.warnings);
        Ok(match &holes {
            Some(holes) => tapered.window.product(holes)?,
            None => tapered.window,
        })
    };
    let spin0 = taper(&window_config.apodization)?;
    let spin2 = match &window_config.spin2_apodization {
        Some(apodization) => Some(taper(apodization)?),
        None => None,
    };

    write_map(&spin0.to_map(), &args.out.join("window_spin0.bin"))?;
    if let Some(spin2) = &spin2 {
        write_map(&spin2.to_map(), &args.out.join("window_spin2.bin"))?;
    }
    let npix = spin0.values().len().max(1) as f64;
    let summary = WindowSummary {
        spin0: spin0.content_hash(),
        spin2: spin2.as_ref().unwrap_or(&spin0).content_hash(),
        observed_fraction: spin0.values().iter().filter(|&&v| v > 0.0).count() as f64 / npix,
        warnings,
    };
    write_json(&args.out.join("window.json"), &summary)?;
    log::info!(
        "window written to {} (observed fraction {:.4})",
        args.out.display(),
        summary.observed_fraction
    );
    Ok(())
}
