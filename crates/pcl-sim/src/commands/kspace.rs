use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use pcl_kspace::{KspaceFilter, KspaceMask};
use pcl_map::{read_map, write_map};

fn band(values: Option<&[f64]>) -> Option<[f64; 2]> {
    values.map(|v| [v[0], v[1]])
}

#[derive(Args, Debug)]
pub struct KspaceArgs {
    /// CAR map to filter.
    #[arg(long = "in")]
    pub input: PathBuf,
    /// `lx` band to remove (vertical stripes).
    #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
    pub vk_mask: Option<Vec<f64>>,
    /// `ly` band to remove (horizontal stripes).
    #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
    pub hk_mask: Option<Vec<f64>>,
    /// Filtered map output.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &KspaceArgs) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let map = read_map(&args.input)?;
    let mask = KspaceMask {
        vk_mask: band(args.vk_mask.as_deref()),
        hk_mask: band(args.hk_mask.as_deref()),
    };
    let filter = KspaceFilter::new(map.pixelization(), &mask)?;
    let (columns, rows) = filter.zeroed_modes();
    log::info!("zeroing {columns} lx columns and {rows} ly rows");
    write_map(&filter.apply(&map)?, &args.out)?;
    Ok(())
}
