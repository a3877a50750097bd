use std::cmp::Ordering as ScoreOrdering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    binning::MassBin,
    candidates::CandidateList,
    configuration::Configuration,
    error::Error,
    kernel::KernelLibrary,
    progress::{notify_observer, NoProgress, ProgressObserver},
    scoring_result::{Identifications, SearchResult, SearchStatistics, SpectrumMatch},
    spectrum::Spectrum,
};

/// Number of kernel bins present in the spectrum.
///
/// The spectrum is a set while the kernel is a multiset: a bin repeated in the kernel counts
/// once per occurrence.
///
/// # Arguments
/// * `spectrum_bins` - Bins of the spectrum.
/// * `kernel_bins` - Bins of the kernel, duplicates included.
///
pub fn intersection_count(spectrum_bins: &HashSet<MassBin>, kernel_bins: &[MassBin]) -> usize {
    kernel_bins
        .iter()
        .filter(|bin| spectrum_bins.contains(bin))
        .count()
}

/// Matches spectra against their candidate kernels.
///
/// For every spectrum with a candidate list entry, all candidates are scored and the ones
/// reaching the best score above the floor are kept. Spectra without an entry are skipped.
pub struct Scorer<'a> {
    floor: usize,
    progress_interval: usize,
    chunk_size: usize,
    kernels: &'a KernelLibrary,
    candidates: &'a CandidateList,
    observer: &'a dyn ProgressObserver,
    cancellation: Option<&'a AtomicBool>,
}

impl<'a> Scorer<'a> {
    /// Creates a new Scorer.
    ///
    /// Arguments:
    /// * `config` - Supplies the floor, the progress interval and the shard size.
    /// * `kernels` - The kernel library.
    /// * `candidates` - Kernel ids to score per spectrum index.
    ///
    pub fn new(
        config: &Configuration,
        kernels: &'a KernelLibrary,
        candidates: &'a CandidateList,
    ) -> Self {
        Self {
            floor: config.floor,
            progress_interval: config.progress_interval,
            chunk_size: config.chunk_size.max(1),
            kernels,
            candidates,
            observer: &NoProgress,
            cancellation: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    /// The flag is checked before each spectrum, once set the search stops with [`Error::Cancelled`].
    pub fn with_cancellation(mut self, cancellation: &'a AtomicBool) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Scores a spectrum against its candidates.
    ///
    /// Returns `None` if the spectrum has no candidate list entry.
    ///
    /// # Arguments
    /// * `index` - Index of the spectrum, used to look up its candidates.
    /// * `spectrum` - The spectrum.
    ///
    pub fn score_spectrum(
        &self,
        index: usize,
        spectrum: &Spectrum,
    ) -> Result<Option<SpectrumMatch>, Error> {
        let candidates = match self.candidates.get(index) {
            Some(candidates) => candidates,
            None => return Ok(None),
        };

        let mut best = self.floor;
        let mut winners = Vec::new();

        // No early exit, any later candidate may tie or beat the current best
        for &kernel_id in candidates {
            let kernel = self.kernels.get(kernel_id).ok_or(Error::UnknownKernel {
                spectrum: index,
                kernel: kernel_id,
            })?;

            let score = intersection_count(spectrum.bins(), kernel.bins());
            match score.cmp(&best) {
                ScoreOrdering::Greater => {
                    best = score;
                    winners.clear();
                    winners.push(kernel_id);
                }
                ScoreOrdering::Equal if score > self.floor => winners.push(kernel_id),
                _ => {}
            }
        }

        Ok(Some(SpectrumMatch {
            winners,
            score: best,
        }))
    }

    /// Identifies all spectra in a single sequential pass.
    pub fn identify(&self, spectra: &[Spectrum]) -> Result<Identifications, Error> {
        debug!(
            "identifying {} spectra against {} kernels",
            spectra.len(),
            self.kernels.len()
        );
        let processed = AtomicUsize::new(0);
        let identifications = self.score_shard(0, spectra, &processed, spectra.len())?;
        self.finish(&processed);
        Ok(identifications)
    }

    /// Identifies all spectra, shards of `chunk_size` spectra are scored in parallel.
    ///
    /// Each shard covers its own index range, so shards are merged without coordination.
    /// The result equals the one of [`Scorer::identify`].
    pub fn par_identify(&self, spectra: &[Spectrum]) -> Result<Identifications, Error> {
        debug!(
            "identifying {} spectra against {} kernels in shards of {}",
            spectra.len(),
            self.kernels.len(),
            self.chunk_size
        );
        let processed = AtomicUsize::new(0);
        let total = spectra.len();

        let identifications = spectra
            .par_chunks(self.chunk_size)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                self.score_shard(chunk_index * self.chunk_size, chunk, &processed, total)
            })
            .try_reduce(Identifications::new, |mut left, right| {
                left.merge(right);
                Ok(left)
            })?;

        self.finish(&processed);
        Ok(identifications)
    }

    /// Runs a parallel identification and collects the run statistics.
    pub fn search(&self, spectra: &[Spectrum]) -> Result<SearchResult, Error> {
        let start = Instant::now();
        let identifications = self.par_identify(spectra)?;

        let statistics = SearchStatistics {
            spectra: spectra.len(),
            kernels: self.kernels.len(),
            evaluated: identifications.len(),
            identified: identifications.identified(),
            search_time: start.elapsed(),
        };
        info!(
            "evaluated {} of {} spectra, {} with a match above floor {} in {:?}",
            statistics.evaluated,
            statistics.spectra,
            statistics.identified,
            self.floor,
            statistics.search_time
        );

        Ok(SearchResult {
            identifications,
            statistics,
        })
    }

    /// Scores a contiguous run of spectra starting at index `offset`.
    fn score_shard(
        &self,
        offset: usize,
        spectra: &[Spectrum],
        processed: &AtomicUsize,
        total: usize,
    ) -> Result<Identifications, Error> {
        let mut shard = Identifications::new();
        for (position, spectrum) in spectra.iter().enumerate() {
            if let Some(cancellation) = self.cancellation {
                if cancellation.load(Ordering::Relaxed) {
                    return Err(Error::Cancelled {
                        processed: processed.load(Ordering::Relaxed),
                    });
                }
            }

            let index = offset + position;
            if let Some(spectrum_match) = self.score_spectrum(index, spectrum)? {
                shard.insert(index, spectrum_match);
            }
            self.advance(processed, total);
        }
        Ok(shard)
    }

    fn advance(&self, processed: &AtomicUsize, total: usize) {
        let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.progress_interval > 0 && count % self.progress_interval == 0 {
            notify_observer(self.observer, |observer| observer.on_progress(count, total));
        }
    }

    fn finish(&self, processed: &AtomicUsize) {
        let count = processed.load(Ordering::Relaxed);
        notify_observer(self.observer, |observer| observer.on_finish(count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Kernel, KernelId};
    use crate::progress::tests::{PanickingObserver, RecordingObserver};

    fn config(floor: usize) -> Configuration {
        let mut config = Configuration::default();
        config.floor = floor;
        config
    }

    fn sorted(mut ids: Vec<KernelId>) -> Vec<KernelId> {
        ids.sort_unstable();
        ids
    }

    /// Deterministic synthetic search space.
    fn synthetic_run(
        num_spectra: usize,
        num_kernels: usize,
    ) -> (Vec<Spectrum>, KernelLibrary, CandidateList) {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |modulo: u64| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % modulo) as u32
        };

        let kernels: KernelLibrary = (0..num_kernels)
            .map(|id| (id, Kernel::new((0..20).map(|_| next(60)).collect())))
            .collect();
        let spectra: Vec<Spectrum> = (0..num_spectra)
            .map(|_| (0..30).map(|_| next(60)).collect())
            .collect();
        // Every third spectrum has no entry
        let candidates: CandidateList = (0..num_spectra)
            .filter(|index| index % 3 != 0)
            .map(|index| {
                let kernel_ids: Vec<KernelId> =
                    (0..8).map(|_| next(num_kernels as u64) as usize).collect();
                (index, kernel_ids)
            })
            .collect();

        (spectra, kernels, candidates)
    }

    #[test]
    fn test_intersection_count_counts_kernel_duplicates() {
        let spectrum = HashSet::from([10, 11, 12]);
        assert_eq!(intersection_count(&spectrum, &[11, 12, 13]), 2);
        assert_eq!(intersection_count(&spectrum, &[10, 10, 11]), 3);
        assert_eq!(intersection_count(&spectrum, &[]), 0);
        assert_eq!(intersection_count(&HashSet::new(), &[10, 10]), 0);
    }

    #[test]
    fn test_best_kernel_wins() {
        let spectra = vec![Spectrum::from_bins([10, 11, 12])];
        let kernels: KernelLibrary = [
            (0, Kernel::new(vec![11, 12, 13])),
            (1, Kernel::new(vec![10, 10, 11])),
        ]
        .into_iter()
        .collect();
        let candidates: CandidateList = [(0, vec![0, 1])].into_iter().collect();

        let identifications = Scorer::new(&config(2), &kernels, &candidates)
            .identify(&spectra)
            .unwrap();

        assert_eq!(identifications.get(0), Some((&[1][..], 3)));
    }

    #[test]
    fn test_no_candidate_above_floor() {
        let spectra = vec![Spectrum::from_bins([1, 2, 3])];
        let kernels: KernelLibrary = [(0, Kernel::new(vec![9, 9]))].into_iter().collect();
        let candidates: CandidateList = [(0, vec![0])].into_iter().collect();

        let identifications = Scorer::new(&config(5), &kernels, &candidates)
            .identify(&spectra)
            .unwrap();

        assert!(identifications.contains(0));
        assert_eq!(identifications.ids[&0], Vec::<KernelId>::new());
        assert_eq!(identifications.scores[&0], 5);
    }

    #[test]
    fn test_score_equal_to_floor_is_not_a_winner() {
        let spectra = vec![Spectrum::from_bins([1, 2, 3])];
        let kernels: KernelLibrary = [(0, Kernel::new(vec![1, 2, 3]))].into_iter().collect();
        let candidates: CandidateList = [(0, vec![0])].into_iter().collect();

        let identifications = Scorer::new(&config(3), &kernels, &candidates)
            .identify(&spectra)
            .unwrap();

        assert_eq!(identifications.get(0), Some((&[][..], 3)));
    }

    #[test]
    fn test_spectrum_without_candidates_is_absent() {
        let spectra: Vec<Spectrum> = (0..8).map(|_| Spectrum::from_bins([1, 2])).collect();
        let kernels: KernelLibrary = [(0, Kernel::new(vec![1, 2]))].into_iter().collect();
        let candidates: CandidateList = [(0, vec![0]), (3, vec![])].into_iter().collect();

        let scorer = Scorer::new(&config(0), &kernels, &candidates);
        for identifications in [
            scorer.identify(&spectra).unwrap(),
            scorer.par_identify(&spectra).unwrap(),
        ] {
            assert!(!identifications.ids.contains_key(&7));
            assert!(!identifications.scores.contains_key(&7));
            // Present with an empty candidate list
            assert_eq!(identifications.get(3), Some((&[][..], 0)));
            assert_eq!(identifications.len(), 2);
        }
    }

    #[test]
    fn test_ties_keep_all_winners() {
        let spectra = vec![Spectrum::from_bins(0..10)];
        let kernels: KernelLibrary = [
            (4, Kernel::new(vec![0, 1, 2, 3, 4, 5])),
            (8, Kernel::new(vec![1, 2, 3])),
            (9, Kernel::new(vec![4, 5, 6, 7, 8, 9, 20])),
        ]
        .into_iter()
        .collect();
        let candidates: CandidateList = [(0, vec![8, 4, 9])].into_iter().collect();

        let identifications = Scorer::new(&config(5), &kernels, &candidates)
            .identify(&spectra)
            .unwrap();

        let (winners, score) = identifications.get(0).unwrap();
        assert_eq!(score, 6);
        assert_eq!(sorted(winners.to_vec()), vec![4, 9]);
    }

    #[test]
    fn test_duplicate_candidate_is_reported_twice() {
        let spectra = vec![Spectrum::from_bins(0..10)];
        let kernels: KernelLibrary = [(1, Kernel::new((0..7).collect()))].into_iter().collect();
        let candidates: CandidateList = [(0, vec![1, 1])].into_iter().collect();

        let identifications = Scorer::new(&config(5), &kernels, &candidates)
            .identify(&spectra)
            .unwrap();

        assert_eq!(identifications.get(0), Some((&[1, 1][..], 7)));
    }

    #[test]
    fn test_candidate_order_does_not_matter() {
        let (spectra, kernels, candidates) = synthetic_run(60, 40);
        let reversed: CandidateList = candidates
            .iter()
            .map(|(&index, kernel_ids)| {
                (index, kernel_ids.iter().rev().copied().collect::<Vec<_>>())
            })
            .collect();

        let config = config(3);
        let forward = Scorer::new(&config, &kernels, &candidates)
            .identify(&spectra)
            .unwrap();
        let backward = Scorer::new(&config, &kernels, &reversed)
            .identify(&spectra)
            .unwrap();

        assert_eq!(forward.scores, backward.scores);
        for (index, winners) in forward.ids {
            assert_eq!(sorted(winners), sorted(backward.ids[&index].clone()));
        }
    }

    #[test]
    fn test_winners_are_exactly_the_maximal_candidates() {
        let (spectra, kernels, candidates) = synthetic_run(90, 50);
        let floor = 4;
        let identifications = Scorer::new(&config(floor), &kernels, &candidates)
            .identify(&spectra)
            .unwrap();

        for (index, spectrum) in spectra.iter().enumerate() {
            let Some(kernel_ids) = candidates.get(index) else {
                assert!(!identifications.contains(index));
                continue;
            };
            let scores: Vec<usize> = kernel_ids
                .iter()
                .map(|&id| intersection_count(spectrum.bins(), kernels.get(id).unwrap().bins()))
                .collect();
            let max = scores.iter().copied().max().unwrap_or(0);

            let (winners, score) = identifications.get(index).unwrap();
            if max > floor {
                let expected: Vec<KernelId> = kernel_ids
                    .iter()
                    .zip(&scores)
                    .filter(|(_, &score)| score == max)
                    .map(|(&id, _)| id)
                    .collect();
                assert_eq!(score, max);
                assert_eq!(sorted(winners.to_vec()), sorted(expected));
            } else {
                assert!(winners.is_empty());
                assert_eq!(score, floor);
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (spectra, kernels, candidates) = synthetic_run(500, 120);
        let config = config(3).with_chunk_size(7);
        let scorer = Scorer::new(&config, &kernels, &candidates);

        let sequential = scorer.identify(&spectra).unwrap();
        let parallel = scorer.par_identify(&spectra).unwrap();
        assert_eq!(sequential, parallel);
        // Deterministic across runs
        assert_eq!(parallel, scorer.par_identify(&spectra).unwrap());
    }

    #[test]
    fn test_unknown_kernel_fails_the_run() {
        let spectra: Vec<Spectrum> = (0..20).map(|_| Spectrum::from_bins([1])).collect();
        let kernels: KernelLibrary = [(0, Kernel::new(vec![1]))].into_iter().collect();
        let candidates: CandidateList = [(2, vec![0]), (11, vec![0, 99])].into_iter().collect();

        let config = config(0).with_chunk_size(4);
        let scorer = Scorer::new(&config, &kernels, &candidates);

        assert!(matches!(
            scorer.identify(&spectra),
            Err(Error::UnknownKernel {
                spectrum: 11,
                kernel: 99
            })
        ));
        assert!(matches!(
            scorer.par_identify(&spectra),
            Err(Error::UnknownKernel {
                spectrum: 11,
                kernel: 99
            })
        ));
        assert!(scorer.search(&spectra).is_err());
    }

    #[test]
    fn test_empty_inputs() {
        let kernels = KernelLibrary::new();
        let candidates = CandidateList::new();
        let scorer = Scorer::new(&config(5), &kernels, &candidates);

        assert!(scorer.identify(&[]).unwrap().is_empty());
        assert!(scorer.par_identify(&[]).unwrap().is_empty());

        let spectra = vec![Spectrum::from_bins([1, 2])];
        let result = scorer.search(&spectra).unwrap();
        assert!(result.identifications.is_empty());
        assert_eq!(result.statistics.spectra, 1);
        assert_eq!(result.statistics.kernels, 0);
    }

    #[test]
    fn test_observer_cadence() {
        let (spectra, kernels, candidates) = synthetic_run(25, 10);
        let config = config(3).with_progress_interval(10).with_chunk_size(3);

        let observer = RecordingObserver::default();
        let scorer = Scorer::new(&config, &kernels, &candidates).with_observer(&observer);
        scorer.identify(&spectra).unwrap();
        assert_eq!(*observer.progress.lock().unwrap(), vec![10, 20]);
        assert_eq!(observer.finished.load(Ordering::Relaxed), 1);

        let observer = RecordingObserver::default();
        let scorer = Scorer::new(&config, &kernels, &candidates).with_observer(&observer);
        scorer.par_identify(&spectra).unwrap();
        let mut progress = observer.progress.lock().unwrap().clone();
        progress.sort_unstable();
        assert_eq!(progress, vec![10, 20]);
        assert_eq!(observer.finished.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_observer_disabled() {
        let (spectra, kernels, candidates) = synthetic_run(25, 10);
        let config = config(3).with_progress_interval(0);

        let observer = RecordingObserver::default();
        Scorer::new(&config, &kernels, &candidates)
            .with_observer(&observer)
            .identify(&spectra)
            .unwrap();
        assert!(observer.progress.lock().unwrap().is_empty());
        assert_eq!(observer.finished.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_panicking_observer_does_not_affect_results() {
        let (spectra, kernels, candidates) = synthetic_run(50, 20);
        let config = config(3).with_progress_interval(1).with_chunk_size(5);

        let expected = Scorer::new(&config, &kernels, &candidates)
            .identify(&spectra)
            .unwrap();
        let scorer =
            Scorer::new(&config, &kernels, &candidates).with_observer(&PanickingObserver);
        assert_eq!(scorer.identify(&spectra).unwrap(), expected);
        assert_eq!(scorer.par_identify(&spectra).unwrap(), expected);
    }

    #[test]
    fn test_cancellation() {
        let (spectra, kernels, candidates) = synthetic_run(30, 10);
        let config = config(3);
        let cancelled = AtomicBool::new(true);
        let scorer = Scorer::new(&config, &kernels, &candidates).with_cancellation(&cancelled);

        assert!(matches!(
            scorer.identify(&spectra),
            Err(Error::Cancelled { processed: 0 })
        ));
        assert!(matches!(
            scorer.par_identify(&spectra),
            Err(Error::Cancelled { .. })
        ));

        cancelled.store(false, Ordering::Relaxed);
        assert_eq!(scorer.identify(&spectra).unwrap().len(), candidates.len());
    }

    #[test]
    fn test_search_statistics() {
        let spectra = vec![
            Spectrum::from_bins(0..10),
            Spectrum::from_bins([1]),
            Spectrum::from_bins([2]),
        ];
        let kernels: KernelLibrary = [(0, Kernel::new((0..8).collect())), (1, Kernel::new(vec![]))]
            .into_iter()
            .collect();
        let candidates: CandidateList = [(0, vec![0, 1]), (1, vec![0])].into_iter().collect();

        let result = Scorer::new(&config(5), &kernels, &candidates)
            .search(&spectra)
            .unwrap();

        assert_eq!(result.statistics.spectra, 3);
        assert_eq!(result.statistics.kernels, 2);
        assert_eq!(result.statistics.evaluated, 2);
        assert_eq!(result.statistics.identified, 1);
        assert_eq!(result.identifications.get(0), Some((&[0][..], 8)));
        assert_eq!(result.identifications.get(1), Some((&[][..], 5)));
    }

    #[test]
    fn test_peptide_kernels_end_to_end() {
        let config = Configuration::default();
        let kernels =
            KernelLibrary::from_peptides(&config, [("PEPTIDEK", 2), ("SAMPLERK", 2)]).unwrap();

        // Spectrum made of the fragments of the first peptide
        let spectra = vec![Spectrum::from_bins(kernels.get(0).unwrap().bins().iter().copied())];
        let candidates: CandidateList = [(0, vec![1, 0])].into_iter().collect();

        let identifications = Scorer::new(&config, &kernels, &candidates)
            .identify(&spectra)
            .unwrap();

        let (winners, score) = identifications.get(0).unwrap();
        assert_eq!(winners, &[0]);
        assert_eq!(score, kernels.get(0).unwrap().len());
    }
}
