//! Binned coupling operator: `mbb_inv` and `Bbl` per spin block, plus the
//! on-disk cache keyed by everything the operator depends on.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use nalgebra::{DMatrix, DVector, SVD};
use pcl_core::errors::{ErrorInfo, PclError};
use pcl_core::hash::stable_hash_string;
use pcl_core::labels::{AnalysisMode, Convention, SpectrumLabel};
use pcl_core::provenance::SchemaVersion;
use pcl_core::serde::to_canonical_json_bytes;
use pcl_map::WindowPair;
use serde::{Deserialize, Serialize};

use crate::binning::BinningScheme;
use crate::config::CouplingConfig;
use crate::coupling::{coupling_matrices, window_power_spectra, CouplingMatrices};

/// Schema of serialized operators.
pub const OPERATOR_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Largest accepted condition number of a binned coupling block.
pub const MAX_CONDITION: f64 = 1e12;

/// Spin combination of a coupling block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    /// TT.
    Spin0xSpin0,
    /// TE and TB, each deconvolved with the same matrix.
    Spin0xSpin2,
    /// ET and BT, each deconvolved with the same matrix.
    Spin2xSpin0,
    /// EE, EB, BE and BB deconvolved jointly.
    Spin2xSpin2,
}

impl BlockKind {
    /// Block that deconvolves `label`.
    pub fn for_label(label: SpectrumLabel) -> Self {
        let (first, second) = label.fields();
        match (first.is_spin2(), second.is_spin2()) {
            (false, false) => BlockKind::Spin0xSpin0,
            (false, true) => BlockKind::Spin0xSpin2,
            (true, false) => BlockKind::Spin2xSpin0,
            (true, true) => BlockKind::Spin2xSpin2,
        }
    }

    /// Labels handled by the block.
    pub fn labels(self) -> &'static [SpectrumLabel] {
        match self {
            BlockKind::Spin0xSpin0 => &[SpectrumLabel::TT],
            BlockKind::Spin0xSpin2 => &[SpectrumLabel::TE, SpectrumLabel::TB],
            BlockKind::Spin2xSpin0 => &[SpectrumLabel::ET, SpectrumLabel::BT],
            BlockKind::Spin2xSpin2 => &SpectrumLabel::SPIN2_BLOCK,
        }
    }
}

/// Inverse binned coupling and bandpower window functions of one block.
///
/// For the spin-2 block both matrices act on the stacked `[EE, EB, BE, BB]`
/// vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorBlock {
    /// Inverse of the binned coupling matrix.
    pub mbb_inv: DMatrix<f64>,
    /// Bandpower window functions, columns indexed by `ℓ = 2..=lmax`.
    pub bbl: DMatrix<f64>,
}

/// Everything an operator depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorKey {
    /// `(spin0, spin2)` window hashes of the first field.
    pub first_windows: (String, String),
    /// `(spin0, spin2)` window hashes of the second field.
    pub second_windows: (String, String),
    /// Band limit.
    pub lmax: usize,
    /// Refinement iterations of the window transforms.
    pub niter: usize,
    /// Standard or pure kernels.
    pub mode: AnalysisMode,
    /// Bandpower convention.
    pub convention: Convention,
    /// Hash of the binning restricted to `lmax`.
    pub binning: String,
    /// Hash of the beams, if any.
    pub beams: Option<String>,
    /// Window multipoles beyond `lmax`.
    pub l3_pad: usize,
    /// Whether only the TT block was built.
    pub spin0_only: bool,
}

impl OperatorKey {
    /// Key of the operator `build_coupling_and_binning` would produce.
    pub fn new(
        first: &WindowPair,
        second: Option<&WindowPair>,
        binning: &BinningScheme,
        config: &CouplingConfig,
    ) -> Result<Self, PclError> {
        let second = second.unwrap_or(first);
        Ok(Self {
            first_windows: first.content_hash(),
            second_windows: second.content_hash(),
            lmax: config.lmax,
            niter: config.niter,
            mode: config.mode,
            convention: config.convention,
            binning: binning.restrict(config.lmax)?.content_hash()?,
            beams: config.beams.as_ref().map(|beams| beams.content_hash()),
            l3_pad: config.l3_pad,
            spin0_only: config.spin0_only,
        })
    }
}

/// Deconvolution operator shared read-only by every spectrum estimate made
/// with the same windows, binning and band limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingOperator {
    schema: SchemaVersion,
    key: OperatorKey,
    binning: BinningScheme,
    blocks: BTreeMap<BlockKind, OperatorBlock>,
}

#[derive(Clone, Copy)]
enum Stage {
    Theory,
    Bandpowers,
}

impl Stage {
    fn matrix(self, block: &OperatorBlock) -> &DMatrix<f64> {
        match self {
            Stage::Theory => &block.bbl,
            Stage::Bandpowers => &block.mbb_inv,
        }
    }
}

impl CouplingOperator {
    /// Identity of the operator.
    pub fn key(&self) -> &OperatorKey {
        &self.key
    }

    /// Band limit.
    pub fn lmax(&self) -> usize {
        self.key.lmax
    }

    /// Kernel variant.
    pub fn mode(&self) -> AnalysisMode {
        self.key.mode
    }

    /// Bandpower convention.
    pub fn convention(&self) -> Convention {
        self.key.convention
    }

    /// Binning restricted to `lmax`.
    pub fn binning(&self) -> &BinningScheme {
        &self.binning
    }

    /// Blocks present (TT only for spin-0 operators).
    pub fn blocks(&self) -> &BTreeMap<BlockKind, OperatorBlock> {
        &self.blocks
    }

    /// Block for `kind`.
    pub fn block(&self, kind: BlockKind) -> Result<&OperatorBlock, PclError> {
        self.blocks.get(&kind).ok_or_else(|| {
            PclError::Config(
                ErrorInfo::new("missing-block", "operator was built without this spin block")
                    .with_context("block", format!("{kind:?}"))
                    .with_hint("rebuild the operator with spin0_only disabled"),
            )
        })
    }

    /// Content hash of the full operator state.
    pub fn content_hash(&self) -> Result<String, PclError> {
        stable_hash_string(self)
    }

    /// Binned expectation `Bbl · (f_ℓ C_ℓ)` of theory spectra indexed from `ℓ = 0`.
    ///
    /// Labels of the spin-2 block that are absent from `theory` are taken as zero.
    pub fn apply_bbl(
        &self,
        theory: &BTreeMap<SpectrumLabel, Vec<f64>>,
    ) -> Result<BTreeMap<SpectrumLabel, Vec<f64>>, PclError> {
        let lmax = self.lmax();
        let convention = self.convention();
        let prepared = theory
            .iter()
            .map(|(&label, values)| {
                if values.len() <= lmax {
                    return Err(PclError::Config(
                        ErrorInfo::new("theory-too-short", "theory spectrum must cover 0..=lmax")
                            .with_context("label", label)
                            .with_context("len", values.len())
                            .with_context("lmax", lmax),
                    ));
                }
                let weighted: Vec<f64> = (2..=lmax).map(|l| values[l] * convention.factor(l)).collect();
                Ok((label, weighted))
            })
            .collect::<Result<BTreeMap<_, _>, PclError>>()?;
        self.apply(&prepared, Stage::Theory)
    }

    /// Deconvolved bandpowers `mbb_inv · p_b` from binned pseudo spectra.
    ///
    /// Spin-2 x spin-2 labels must be supplied together.
    pub fn deconvolve(
        &self,
        binned: &BTreeMap<SpectrumLabel, Vec<f64>>,
    ) -> Result<BTreeMap<SpectrumLabel, Vec<f64>>, PclError> {
        let n_bins = self.binning.len();
        if let Some((label, values)) = binned.iter().find(|(_, values)| values.len() != n_bins) {
            return Err(PclError::Config(
                ErrorInfo::new("bandpower-length", "binned spectrum length differs from the bin count")
                    .with_context("label", label)
                    .with_context("len", values.len())
                    .with_context("bins", n_bins),
            ));
        }
        let spin2 = SpectrumLabel::SPIN2_BLOCK
            .iter()
            .filter(|label| binned.contains_key(label))
            .count();
        if spin2 != 0 && spin2 != SpectrumLabel::SPIN2_BLOCK.len() {
            return Err(PclError::Config(
                ErrorInfo::new("incomplete-spin2-block", "EE, EB, BE and BB are deconvolved jointly")
                    .with_hint("request all four spin-2 x spin-2 spectra"),
            ));
        }
        self.apply(binned, Stage::Bandpowers)
    }

    fn apply(
        &self,
        input: &BTreeMap<SpectrumLabel, Vec<f64>>,
        stage: Stage,
    ) -> Result<BTreeMap<SpectrumLabel, Vec<f64>>, PclError> {
        let mut output = BTreeMap::new();
        for (&label, values) in input {
            let kind = BlockKind::for_label(label);
            if kind == BlockKind::Spin2xSpin2 {
                continue;
            }
            let matrix = stage.matrix(self.block(kind)?);
            let result = matrix * DVector::from_column_slice(values);
            output.insert(label, result.as_slice().to_vec());
        }
        if SpectrumLabel::SPIN2_BLOCK.iter().any(|label| input.contains_key(label)) {
            let matrix = stage.matrix(self.block(BlockKind::Spin2xSpin2)?);
            let width = matrix.ncols() / 4;
            let mut stacked = DVector::zeros(matrix.ncols());
            for (k, label) in SpectrumLabel::SPIN2_BLOCK.iter().enumerate() {
                if let Some(values) = input.get(label) {
                    stacked.rows_mut(k * width, width).copy_from_slice(values);
                }
            }
            let result = matrix * stacked;
            let n_bins = result.len() / 4;
            for (k, label) in SpectrumLabel::SPIN2_BLOCK.iter().enumerate() {
                output.insert(*label, result.rows(k * n_bins, n_bins).iter().copied().collect());
            }
        }
        Ok(output)
    }

    /// Canonical JSON rendering for inspection.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, PclError> {
        to_canonical_json_bytes(self)
    }

    /// Writes the binary cache file.
    pub fn save(&self, path: &Path) -> Result<(), PclError> {
        let bytes = bincode::serialize(self).map_err(|err| PclError::serde("operator-encode", err))?;
        fs::write(path, bytes).map_err(|err| {
            PclError::Serde(
                ErrorInfo::new("operator-write", err.to_string()).with_context("path", path.display()),
            )
        })
    }

    /// Reads a cache file and checks that it was built for `expected`.
    pub fn load(path: &Path, expected: &OperatorKey) -> Result<Self, PclError> {
        let bytes = fs::read(path).map_err(|err| {
            PclError::Serde(
                ErrorInfo::new("operator-read", err.to_string()).with_context("path", path.display()),
            )
        })?;
        let operator: CouplingOperator =
            bincode::deserialize(&bytes).map_err(|err| PclError::serde("operator-decode", err))?;
        if !OPERATOR_SCHEMA.is_compatible(&operator.schema) {
            return Err(PclError::Serde(
                ErrorInfo::new("operator-schema", "cached operator has an incompatible schema")
                    .with_context("found", format!("{:?}", operator.schema)),
            ));
        }
        if &operator.key != expected {
            return Err(PclError::Config(
                ErrorInfo::new("operator-key-mismatch", "cached operator was built for other inputs")
                    .with_context("path", path.display())
                    .with_hint("delete the cache or rebuild with the current windows and settings"),
            ));
        }
        Ok(operator)
    }
}

/// Binned rows `M_bℓ' = (1/n_b) Σ_{ℓ∈b} M_ℓℓ' f_ℓ / f_ℓ'`.
fn bin_rows(matrix: &DMatrix<f64>, binning: &BinningScheme, convention: Convention) -> DMatrix<f64> {
    let ncols = matrix.ncols();
    let mut binned = DMatrix::zeros(binning.len(), ncols);
    for (b, bin) in binning.bins().iter().enumerate() {
        let norm = bin.width() as f64;
        for l in bin.lower..=bin.upper {
            let fl = convention.factor(l);
            for j in 0..ncols {
                binned[(b, j)] += matrix[(l - 2, j)] * fl / convention.factor(j + 2) / norm;
            }
        }
    }
    binned
}

/// Sums binned rows over the columns of each bin.
fn bin_columns(rows: &DMatrix<f64>, binning: &BinningScheme) -> DMatrix<f64> {
    let mut binned = DMatrix::zeros(rows.nrows(), binning.len());
    for (c, bin) in binning.bins().iter().enumerate() {
        for l in bin.lower..=bin.upper {
            for r in 0..rows.nrows() {
                binned[(r, c)] += rows[(r, l - 2)];
            }
        }
    }
    binned
}

/// `[[pp, 0, 0, mm], [0, pp, -mm, 0], [0, -mm, pp, 0], [mm, 0, 0, pp]]`
/// over `[EE, EB, BE, BB]`.
fn assemble_spin2(pp: &DMatrix<f64>, mm: &DMatrix<f64>) -> DMatrix<f64> {
    const LAYOUT: [[(f64, f64); 4]; 4] = [
        [(1.0, 0.0), (0.0, 0.0), (0.0, 0.0), (0.0, 1.0)],
        [(0.0, 0.0), (1.0, 0.0), (0.0, -1.0), (0.0, 0.0)],
        [(0.0, 0.0), (0.0, -1.0), (1.0, 0.0), (0.0, 0.0)],
        [(0.0, 1.0), (0.0, 0.0), (0.0, 0.0), (1.0, 0.0)],
    ];
    let (r, c) = pp.shape();
    let mut out = DMatrix::zeros(4 * r, 4 * c);
    for (i, row) in LAYOUT.iter().enumerate() {
        for (j, &(a, b)) in row.iter().enumerate() {
            if a == 0.0 && b == 0.0 {
                continue;
            }
            let block = pp * a + mm * b;
            out.view_mut((i * r, j * c), (r, c)).copy_from(&block);
        }
    }
    out
}

/// Inverse of a binned block after a conditioning check.
fn invert_checked(kind: BlockKind, mbb: &DMatrix<f64>) -> Result<DMatrix<f64>, PclError> {
    let singular = |code: &str, message: &str| {
        PclError::Numerical(
            ErrorInfo::new(code, message)
                .with_context("block", format!("{kind:?}"))
                .with_hint("the windows overlap too little; enlarge the mask or lower lmax"),
        )
    };
    if mbb.iter().any(|v| !v.is_finite()) {
        return Err(singular("non-finite-coupling", "binned coupling matrix has non-finite entries"));
    }
    let svd = SVD::try_new(mbb.clone(), false, false, f64::EPSILON, 10_000)
        .ok_or_else(|| singular("svd-not-converged", "singular value decomposition did not converge"))?;
    let largest = svd.singular_values.max();
    let smallest = svd.singular_values.min();
    let condition = largest / smallest;
    if smallest <= 0.0 || !condition.is_finite() || condition > MAX_CONDITION {
        return Err(PclError::Numerical(
            ErrorInfo::new("singular-coupling", "binned coupling matrix is numerically singular")
                .with_context("block", format!("{kind:?}"))
                .with_context("condition", condition)
                .with_hint("the windows overlap too little; enlarge the mask or lower lmax"),
        ));
    }
    log::debug!("{kind:?} block condition number {condition:.3e}");
    mbb.clone()
        .try_inverse()
        .ok_or_else(|| singular("singular-coupling", "binned coupling matrix is not invertible"))
}

fn binned_block(
    kind: BlockKind,
    unbinned: &DMatrix<f64>,
    binning: &BinningScheme,
    convention: Convention,
) -> Result<OperatorBlock, PclError> {
    let rows = bin_rows(unbinned, binning, convention);
    let mbb_inv = invert_checked(kind, &bin_columns(&rows, binning))?;
    let bbl = &mbb_inv * rows;
    Ok(OperatorBlock { mbb_inv, bbl })
}

fn spin2_block(
    matrices: &CouplingMatrices,
    binning: &BinningScheme,
    convention: Convention,
) -> Result<Option<OperatorBlock>, PclError> {
    let (Some(pp), Some(mm)) = (&matrices.mpp, &matrices.mmm) else {
        return Ok(None);
    };
    let rows_pp = bin_rows(pp, binning, convention);
    let rows_mm = bin_rows(mm, binning, convention);
    let mbb = assemble_spin2(&bin_columns(&rows_pp, binning), &bin_columns(&rows_mm, binning));
    let mbb_inv = invert_checked(BlockKind::Spin2xSpin2, &mbb)?;
    let bbl = &mbb_inv * assemble_spin2(&rows_pp, &rows_mm);
    Ok(Some(OperatorBlock { mbb_inv, bbl }))
}

fn ensure_windows(pair: &WindowPair, spin0_only: bool) -> Result<(), PclError> {
    if spin0_only {
        if pair.spin0().is_zero() {
            return Err(PclError::Degenerate(
                ErrorInfo::new("empty-window", "window is identically zero")
                    .with_context("window", "spin0")
                    .with_hint("reduce the apodization radius or enlarge the mask"),
            ));
        }
        return Ok(());
    }
    pair.ensure_nonzero()
}

/// Builds the mode-coupling matrices of `first` x `second` (auto when
/// `second` is `None`) and composes them with `binning` into the
/// deconvolution operator.
///
/// `binning` is restricted to bins below `config.lmax`. Near-singular
/// binned blocks fail with a `Numerical` error.
pub fn build_coupling_and_binning(
    first: &WindowPair,
    second: Option<&WindowPair>,
    binning: &BinningScheme,
    config: &CouplingConfig,
) -> Result<CouplingOperator, PclError> {
    config.validate()?;
    let other = second.unwrap_or(first);
    first.pixelization().ensure_same(other.pixelization())?;
    ensure_windows(first, config.spin0_only)?;
    ensure_windows(other, config.spin0_only)?;
    let limit = first.pixelization().lmax_limit();
    if config.lmax > limit {
        return Err(PclError::Config(
            ErrorInfo::new("lmax-exceeds-pixelization", "lmax is above the pixelization's band limit")
                .with_context("lmax", config.lmax)
                .with_context("limit", limit),
        ));
    }
    let restricted = binning.restrict(config.lmax)?;
    let key = OperatorKey::new(first, Some(other), binning, config)?;

    let started = Instant::now();
    let lmax_w = (config.lmax + config.l3_pad).min(limit);
    let spectra = window_power_spectra(first, other, lmax_w, config.niter)?;
    let matrices = coupling_matrices(&spectra, config)?;

    let mut blocks = BTreeMap::new();
    blocks.insert(
        BlockKind::Spin0xSpin0,
        binned_block(BlockKind::Spin0xSpin0, &matrices.m00, &restricted, config.convention)?,
    );
    for (kind, unbinned) in [
        (BlockKind::Spin0xSpin2, &matrices.m02),
        (BlockKind::Spin2xSpin0, &matrices.m20),
    ] {
        if let Some(unbinned) = unbinned {
            blocks.insert(kind, binned_block(kind, unbinned, &restricted, config.convention)?);
        }
    }
    if let Some(block) = spin2_block(&matrices, &restricted, config.convention)? {
        blocks.insert(BlockKind::Spin2xSpin2, block);
    }
    log::info!(
        "built {:?} coupling operator: lmax={} bins={} blocks={} in {:?}",
        config.mode,
        config.lmax,
        restricted.len(),
        blocks.len(),
        started.elapsed()
    );
    Ok(CouplingOperator {
        schema: OPERATOR_SCHEMA,
        key,
        binning: restricted,
        blocks,
    })
}

/// Loads the operator cached at `path` when its key matches, otherwise
/// builds it and writes the cache.
pub fn load_or_build(
    path: &Path,
    first: &WindowPair,
    second: Option<&WindowPair>,
    binning: &BinningScheme,
    config: &CouplingConfig,
) -> Result<CouplingOperator, PclError> {
    if path.exists() {
        let key = OperatorKey::new(first, second, binning, config)?;
        match CouplingOperator::load(path, &key) {
            Ok(operator) => {
                log::info!("reusing cached coupling operator {}", path.display());
                return Ok(operator);
            }
            Err(PclError::Config(info)) => {
                log::warn!("ignoring stale operator cache {}: {}", path.display(), info);
            }
            Err(err) => return Err(err),
        }
    }
    let operator = build_coupling_and_binning(first, second, binning, config)?;
    operator.save(path)?;
    Ok(operator)
}
