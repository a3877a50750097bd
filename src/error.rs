use thiserror::Error;

use crate::kernel::KernelId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Candidate list of spectrum {spectrum} references unknown kernel {kernel}")]
    UnknownKernel { spectrum: usize, kernel: KernelId },
    #[error("Invalid fragment mass tolerance: {0}")]
    InvalidTolerance(f64),
    #[error("Cannot convert mass {0} to a bin when {1}")]
    MassToBin(f64, String),
    #[error("m/z ({0}) and intensities ({1}) arrays must have the same length")]
    ExperimentalSpectrumShape(usize, usize),
    #[error("Invalid peptide sequence: {0}")]
    InvalidPeptideSequence(String),
    #[error("Empty theoretical spectrum")]
    EmptyTheoreticalSpectrum,
    #[error("Search cancelled after {processed} spectra")]
    Cancelled { processed: usize },
}
