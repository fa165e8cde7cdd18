//! Monte-Carlo ensembles of bandpowers sharing one estimator.

use std::collections::BTreeMap;
use std::time::Instant;

use pcl_core::errors::{ErrorInfo, PclError};
use pcl_core::labels::SpectrumLabel;
use pcl_core::rng::RngHandle;
use pcl_map::Map;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::Bandpowers;
use crate::oracle::BandpowerOracle;

/// Mean and standard deviation of every bandpower over the realizations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSummary {
    /// Number of realizations.
    pub realizations: usize,
    /// Representative multipoles.
    pub centres: Vec<f64>,
    /// Per-bin mean.
    pub mean: BTreeMap<SpectrumLabel, Vec<f64>>,
    /// Per-bin population standard deviation.
    pub std: BTreeMap<SpectrumLabel, Vec<f64>>,
}

/// Maps of one realization: the first field and an optional second one.
pub type Realization = (Map, Option<Map>);

/// Runs `n_sims` realizations in parallel.
///
/// Realization `i` draws from `RngHandle::substream(seed, i)`, so results do
/// not depend on thread scheduling.
pub fn run_ensemble<O, F>(
    oracle: &O,
    n_sims: usize,
    seed: u64,
    labels: &[SpectrumLabel],
    simulate: F,
) -> Result<EnsembleSummary, PclError>
where
    O: BandpowerOracle + Sync,
    F: Fn(&mut RngHandle) -> Result<Realization, PclError> + Sync,
{
    if n_sims == 0 {
        return Err(PclError::Degenerate(
            ErrorInfo::new("empty-ensemble", "ensemble needs at least one realization")
                .with_context("oracle", oracle.name()),
        ));
    }
    let started = Instant::now();
    let runs = (0..n_sims)
        .into_par_iter()
        .map(|index| {
            let mut rng = RngHandle::substream(seed, index as u64);
            let (first, second) = simulate(&mut rng)?;
            oracle.bandpowers(&first, second.as_ref(), labels)
        })
        .collect::<Result<Vec<Bandpowers>, PclError>>()?;
    log::info!(
        "{} realizations through {} in {:?}",
        n_sims,
        oracle.name(),
        started.elapsed()
    );
    Ok(summarize(&runs))
}

fn summarize(runs: &[Bandpowers]) -> EnsembleSummary {
    let n = runs.len() as f64;
    let mut mean = BTreeMap::new();
    let mut std = BTreeMap::new();
    for (&label, values) in &runs[0].spectra {
        let mut m = vec![0.0; values.len()];
        for run in runs {
            for (acc, v) in m.iter_mut().zip(&run.spectra[&label]) {
                *acc += v / n;
            }
        }
        let mut s = vec![0.0; values.len()];
        for run in runs {
            for ((acc, v), mu) in s.iter_mut().zip(&run.spectra[&label]).zip(&m) {
                *acc += (v - mu).powi(2) / n;
            }
        }
        mean.insert(label, m);
        std.insert(label, s.into_iter().map(f64::sqrt).collect());
    }
    EnsembleSummary {
        realizations: runs.len(),
        centres: runs[0].centres.clone(),
        mean,
        std,
    }
}
