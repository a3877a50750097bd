pub mod binning;
pub mod candidates;
pub mod configuration;
pub mod error;
pub mod kernel;
/// Injectable progress reporting
pub mod progress;
/// Peptide-spectrum match scoring by mass bin intersection
pub mod scorer;
pub mod scoring_result;
pub mod spectrum;

pub use candidates::CandidateList;
pub use configuration::Configuration;
pub use error::Error;
pub use kernel::{Kernel, KernelId, KernelLibrary};
pub use scorer::Scorer;
pub use scoring_result::{Identifications, SearchResult, SearchStatistics, SpectrumMatch};
pub use spectrum::Spectrum;
