use std::collections::{hash_map, HashMap};

use ndarray::Array1;
use rustyms::{
    system::{e, usize::Charge},
    CompoundPeptidoformIon, Fragment, MassMode,
};
use tracing::debug;

use crate::{
    binning::{kernel_binning, MassBin},
    configuration::Configuration,
    error::Error,
};

pub type KernelId = usize;

/// Candidate fragmentation pattern: the bins of its expected product ions.
///
/// Bins are an ordered multiset. Two fragments quantized into the same bin are both kept
/// and each counts when scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Kernel {
    bins: Vec<MassBin>,
    peptide: Option<String>,
}

impl Kernel {
    pub fn new(bins: Vec<MassBin>) -> Self {
        Self {
            bins,
            peptide: None,
        }
    }

    /// Generates the kernel of a peptide from its theoretical fragments.
    ///
    /// # Arguments
    /// * `config` - Fragmentation model, fragment charge bound and tolerance.
    /// * `peptide` - ProForma sequence.
    /// * `charge` - Precursor charge. Fragments are generated up to `charge - 1`, at least 1.
    ///
    pub fn from_peptide(
        config: &Configuration,
        peptide: &str,
        charge: usize,
    ) -> Result<Self, Error> {
        let proforma = CompoundPeptidoformIon::pro_forma(peptide, None)
            .map_err(|err| Error::InvalidPeptideSequence(err.to_string()))?;

        let fragment_charge = charge
            .saturating_sub(1)
            .max(1)
            .min(config.max_fragment_charge);

        let fragments = proforma.generate_theoretical_fragments(
            Charge::new::<e>(fragment_charge),
            &config.fragmentation_model,
        );

        let mz = theoretical_fragment_mz(&fragments, fragment_charge);
        if mz.is_empty() {
            return Err(Error::EmptyTheoreticalSpectrum);
        }

        let bins = kernel_binning(&mz, config.fragment_mass_tolerance)?;
        Ok(Self {
            bins,
            peptide: Some(peptide.to_string()),
        })
    }

    pub fn bins(&self) -> &[MassBin] {
        &self.bins
    }

    /// ProForma sequence the kernel was generated from, if any.
    pub fn peptide(&self) -> Option<&str> {
        self.peptide.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Sorted m/z values of all fragments up to `max_charge`.
fn theoretical_fragment_mz(fragments: &[Fragment], max_charge: usize) -> Array1<f64> {
    let mut mz: Vec<f64> = fragments
        .iter()
        .filter(|f| f.charge.value <= max_charge)
        .filter_map(|f| f.mz(MassMode::Monoisotopic).map(|mz| mz.value))
        .collect();

    mz.sort_by(|a, b| a.total_cmp(b));

    Array1::from(mz)
}

/// All kernels of a run, addressed by id.
#[derive(Debug, Clone, Default)]
pub struct KernelLibrary {
    kernels: HashMap<KernelId, Kernel>,
}

impl KernelLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a library from `(proforma, precursor charge)` pairs, ids follow the input order.
    pub fn from_peptides<'a>(
        config: &Configuration,
        peptides: impl IntoIterator<Item = (&'a str, usize)>,
    ) -> Result<Self, Error> {
        let kernels = peptides
            .into_iter()
            .enumerate()
            .map(|(id, (peptide, charge))| {
                Ok((id, Kernel::from_peptide(config, peptide, charge)?))
            })
            .collect::<Result<HashMap<KernelId, Kernel>, Error>>()?;
        debug!("generated {} kernels", kernels.len());
        Ok(Self { kernels })
    }

    /// Inserts a kernel, returning the one previously stored under `id`.
    pub fn insert(&mut self, id: KernelId, kernel: Kernel) -> Option<Kernel> {
        self.kernels.insert(id, kernel)
    }

    pub fn get(&self, id: KernelId) -> Option<&Kernel> {
        self.kernels.get(&id)
    }

    pub fn contains(&self, id: KernelId) -> bool {
        self.kernels.contains_key(&id)
    }

    /// Total kernel count.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, KernelId, Kernel> {
        self.kernels.iter()
    }
}

impl FromIterator<(KernelId, Kernel)> for KernelLibrary {
    fn from_iter<T: IntoIterator<Item = (KernelId, Kernel)>>(iter: T) -> Self {
        Self {
            kernels: iter.into_iter().collect(),
        }
    }
}
