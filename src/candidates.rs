use std::collections::{hash_map, HashMap};

use crate::{
    error::Error,
    kernel::{KernelId, KernelLibrary},
};

/// Per-spectrum shortlist of kernels worth scoring.
///
/// A spectrum index without an entry has no candidates and gets no identification at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    candidates: HashMap<usize, Vec<KernelId>>,
}

impl CandidateList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spectrum: usize, kernels: Vec<KernelId>) -> Option<Vec<KernelId>> {
        self.candidates.insert(spectrum, kernels)
    }

    pub fn get(&self, spectrum: usize) -> Option<&[KernelId]> {
        self.candidates.get(&spectrum).map(Vec::as_slice)
    }

    pub fn contains(&self, spectrum: usize) -> bool {
        self.candidates.contains_key(&spectrum)
    }

    /// Number of spectra with an entry.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, usize, Vec<KernelId>> {
        self.candidates.iter()
    }

    /// Checks that every referenced kernel exists in `kernels`.
    ///
    /// Entries are visited in spectrum index order, so the reported violation is the one a
    /// sequential search would hit first.
    pub fn validate(&self, kernels: &KernelLibrary) -> Result<(), Error> {
        let mut spectra: Vec<&usize> = self.candidates.keys().collect();
        spectra.sort_unstable();

        for &spectrum in spectra {
            if let Some(&kernel) = self.candidates[&spectrum]
                .iter()
                .find(|&&kernel| !kernels.contains(kernel))
            {
                return Err(Error::UnknownKernel { spectrum, kernel });
            }
        }
        Ok(())
    }
}

impl FromIterator<(usize, Vec<KernelId>)> for CandidateList {
    fn from_iter<T: IntoIterator<Item = (usize, Vec<KernelId>)>>(iter: T) -> Self {
        Self {
            candidates: iter.into_iter().collect(),
        }
    }
}
