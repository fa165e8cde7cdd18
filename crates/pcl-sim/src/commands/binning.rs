use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use pcl_mcm::create_binning_file;

#[derive(Args, Debug)]
pub struct BinningArgs {
    /// Width of every bin in multipoles.
    #[arg(long, default_value_t = 40)]
    pub bin_size: usize,
    /// Number of bins, starting at multipole 2.
    #[arg(long, default_value_t = 100)]
    pub n_bins: usize,
    /// Output binning file.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &BinningArgs) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let scheme = create_binning_file(&args.out, args.bin_size, args.n_bins)?;
    log::info!(
        "wrote {} bins up to multipole {} to {}",
        scheme.len(),
        scheme.bins().last().map_or(0, |bin| bin.upper),
        args.out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcl_mcm::BinningScheme;

    #[test]
    fn writes_readable_binning_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("bins").join("binning.dat");
        run(&BinningArgs {
            bin_size: 10,
            n_bins: 5,
            out: out.clone(),
        })
        .unwrap();
        let scheme = BinningScheme::read(&out).unwrap();
        assert_eq!(scheme.len(), 5);
        assert_eq!(scheme.bins()[4].upper, 51);
    }
}
