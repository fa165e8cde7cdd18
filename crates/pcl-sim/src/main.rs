use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    binning::{self, BinningArgs},
    kspace::{self, KspaceArgs},
    mcm::{self, McmArgs},
    spectra::{self, SpectraArgs},
    window::{self, WindowArgs},
};

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "pcl-sim", about = "Pseudo-Cl power spectrum pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a uniform multipole binning file.
    Binning(BinningArgs),
    /// Apodize a binary mask (optionally with point-source holes) into a window.
    Window(WindowArgs),
    /// Build or load the cached mode-coupling and binning operator.
    Mcm(McmArgs),
    /// Estimate deconvolved bandpowers of one or two maps.
    Spectra(SpectraArgs),
    /// Remove Fourier stripes from a CAR map.
    Kspace(KspaceArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Binning(args) => binning::run(&args),
        Command::Window(args) => window::run(&args),
        Command::Mcm(args) => mcm::run(&args),
        Command::Spectra(args) => spectra::run(&args),
        Command::Kspace(args) => kspace::run(&args),
    }
}
