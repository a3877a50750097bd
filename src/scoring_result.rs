use std::collections::HashMap;
use std::time::Duration;

use crate::kernel::KernelId;

/// Outcome of scoring one spectrum against its candidates.
///
/// `winners` is empty when no candidate exceeded the floor, `score` then equals the floor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpectrumMatch {
    pub winners: Vec<KernelId>,
    pub score: usize,
}

/// Winning kernels and best scores keyed by spectrum index.
///
/// Both maps always share the same key set: the spectra that had a candidate list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifications {
    pub ids: HashMap<usize, Vec<KernelId>>,
    pub scores: HashMap<usize, usize>,
}

impl Identifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spectrum: usize, spectrum_match: SpectrumMatch) {
        self.ids.insert(spectrum, spectrum_match.winners);
        self.scores.insert(spectrum, spectrum_match.score);
    }

    pub fn get(&self, spectrum: usize) -> Option<(&[KernelId], usize)> {
        let winners = self.ids.get(&spectrum)?;
        let score = self.scores.get(&spectrum)?;
        Some((winners.as_slice(), *score))
    }

    pub fn contains(&self, spectrum: usize) -> bool {
        self.ids.contains_key(&spectrum)
    }

    /// Number of evaluated spectra.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Spectra with at least one winner.
    pub fn identified(&self) -> usize {
        self.ids.values().filter(|winners| !winners.is_empty()).count()
    }

    /// Absorbs a shard computed over a disjoint range of spectra.
    pub fn merge(&mut self, other: Identifications) {
        self.ids.extend(other.ids);
        self.scores.extend(other.scores);
    }
}

/// Run statistics handed to the reporter next to the identifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    /// Number of spectra.
    pub spectra: usize,
    /// Number of kernels in the library.
    pub kernels: usize,
    /// Spectra with a candidate list entry.
    pub evaluated: usize,
    /// Spectra with at least one winner.
    pub identified: usize,
    pub search_time: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub identifications: Identifications,
    pub statistics: SearchStatistics,
}
