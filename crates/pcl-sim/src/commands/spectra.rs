use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use pcl_core::labels::{Convention, SpectrumLabel};
use pcl_kspace::{kspace_filter, KspaceMask};
use pcl_map::{read_map, Map};
use pcl_mcm::{BinningScheme, BlockKind};
use pcl_spectra::{read_theory, BandpowerOracle, Engine};
use serde::Serialize;

use super::mcm::{operator_for, WindowFiles};
use crate::config::{load_config, write_json};

#[derive(Args, Debug)]
pub struct SpectraArgs {
    /// YAML pipeline configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Map of the first field (`[T]` or `[T, Q, U]`).
    #[arg(long)]
    pub map: PathBuf,
    /// Map of the second field; auto spectra when omitted.
    #[arg(long)]
    pub second_map: Option<PathBuf>,
    #[command(flatten)]
    pub windows: WindowFiles,
    /// Binning file.
    #[arg(long)]
    pub binning: PathBuf,
    /// Directory holding the operator cache; defaults to the output directory.
    #[arg(long)]
    pub cache: Option<PathBuf>,
    /// Theory table (`ell TT EE BB TE`) to bin with the operator.
    #[arg(long)]
    pub theory: Option<PathBuf>,
    /// Convention the theory table is stored in: "Cl" or "Dl".
    #[arg(long, default_value = "Dl")]
    pub theory_convention: String,
    /// Output directory for bandpowers.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Serialize)]
struct BinnedTheory<'a> {
    convention: Convention,
    centres: &'a [f64],
    spectra: BTreeMap<SpectrumLabel, Vec<f64>>,
}

fn prepare(map: Map, mask: &KspaceMask) -> Result<Map, Box<dyn Error>> {
    if *mask == KspaceMask::default() {
        return Ok(map);
    }
    Ok(kspace_filter(&map, mask)?)
}

pub fn run(args: &SpectraArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let config = load_config(&args.config)?;
    let binning = BinningScheme::read(&args.binning)?;
    let (first, second) = args.windows.load()?;
    let cache = args.cache.as_ref().unwrap_or(&args.out);
    fs::create_dir_all(cache)?;
    let operator = operator_for(cache, &config, &first, second.as_ref(), &binning)?;

    let labels: Vec<SpectrumLabel> = if !config.spectra.is_empty() {
        config.spectra.clone()
    } else if operator.block(BlockKind::Spin2xSpin2).is_ok() {
        SpectrumLabel::ALL.to_vec()
    } else {
        vec![SpectrumLabel::TT]
    };

    let map = prepare(read_map(&args.map)?, &config.kspace)?;
    let second_map = match &args.second_map {
        Some(path) => Some(prepare(read_map(path)?, &config.kspace)?),
        None => None,
    };

    let engine = Engine::with_operator(first, second, binning, Arc::new(operator));
    let bandpowers = engine.bandpowers(&map, second_map.as_ref(), &labels)?;
    write_json(&args.out.join("bandpowers.json"), &bandpowers)?;
    log::info!(
        "{} estimated {} spectra in {} bins",
        engine.name(),
        bandpowers.spectra.len(),
        bandpowers.centres.len()
    );

    if let Some(path) = &args.theory {
        let stored: Convention = args.theory_convention.parse()?;
        let theory = read_theory(path, stored)?;
        let binned = engine.operator().apply_bbl(&theory)?;
        write_json(
            &args.out.join("theory_binned.json"),
            &BinnedTheory {
                convention: engine.operator().convention(),
                centres: &bandpowers.centres,
                spectra: binned,
            },
        )?;
    }
    Ok(())
}
