use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use pcl_core::errors::PclError;
use pcl_map::{read_map, Window, WindowPair};
use pcl_mcm::{load_or_build, BinningScheme, CouplingOperator};

use crate::config::{load_config, PipelineConfig};

/// Window files of one or two fields.
#[derive(Args, Debug, Clone)]
pub struct WindowFiles {
    /// Spin-0 window of the first field.
    #[arg(long)]
    pub window: PathBuf,
    /// Spin-2 window of the first field; the spin-0 window when omitted.
    #[arg(long)]
    pub window_spin2: Option<PathBuf>,
    /// Spin-0 window of the second field for cross spectra.
    #[arg(long)]
    pub second_window: Option<PathBuf>,
    /// Spin-2 window of the second field.
    #[arg(long, requires = "second_window")]
    pub second_window_spin2: Option<PathBuf>,
}

fn load_pair(spin0: &Path, spin2: Option<&Path>) -> Result<WindowPair, PclError> {
    let spin0 = Window::from_map(&read_map(spin0)?)?;
    match spin2 {
        Some(path) => WindowPair::new(spin0, Window::from_map(&read_map(path)?)?),
        None => Ok(WindowPair::same(spin0)),
    }
}

impl WindowFiles {
    /// Reads the first field's windows and, when given, the second field's.
    pub fn load(&self) -> Result<(WindowPair, Option<WindowPair>), PclError> {
        let first = load_pair(&self.window, self.window_spin2.as_deref())?;
        let second = match &self.second_window {
            Some(path) => Some(load_pair(path, self.second_window_spin2.as_deref())?),
            None => None,
        };
        Ok((first, second))
    }
}

#[derive(Args, Debug)]
pub struct McmArgs {
    /// YAML pipeline configuration.
    #[arg(long)]
    pub config: PathBuf,
    #[command(flatten)]
    pub windows: WindowFiles,
    /// Binning file.
    #[arg(long)]
    pub binning: PathBuf,
    /// Output directory for the operator cache.
    #[arg(long)]
    pub out: PathBuf,
}

/// Loads the operator cached in `dir` or builds and caches it.
pub fn operator_for(
    dir: &Path,
    config: &PipelineConfig,
    first: &WindowPair,
    second: Option<&WindowPair>,
    binning: &BinningScheme,
) -> Result<CouplingOperator, PclError> {
    load_or_build(&dir.join("operator.bin"), first, second, binning, &config.coupling)
}

pub fn run(args: &McmArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let config = load_config(&args.config)?;
    let binning = BinningScheme::read(&args.binning)?;
    let (first, second) = args.windows.load()?;
    let operator = operator_for(&args.out, &config, &first, second.as_ref(), &binning)?;
    fs::write(args.out.join("operator.json"), operator.to_json_bytes()?)?;
    log::info!(
        "operator {} with {} bins and {} blocks in {}",
        operator.content_hash()?,
        operator.binning().len(),
        operator.blocks().len(),
        args.out.display()
    );
    Ok(())
}
