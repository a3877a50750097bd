use std::collections::HashSet;

use ndarray::{Array1, Axis};

use crate::{
    binning::{spectrum_binning, MassBin},
    configuration::Configuration,
    error::Error,
};

/// Observed spectrum reduced to the set of mass bins it covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spectrum {
    bins: HashSet<MassBin>,
}

impl Spectrum {
    pub fn from_bins(bins: impl IntoIterator<Item = MassBin>) -> Self {
        Self {
            bins: bins.into_iter().collect(),
        }
    }

    /// Creates a spectrum from its peaks, dropping peaks below the configured minimum intensity.
    ///
    /// Arguments:
    /// * `config` - Supplies the minimum intensity and the fragment mass tolerance.
    /// * `mz` - The m/z values of the peaks.
    /// * `intensities` - The intensities of the peaks.
    ///
    pub fn from_peaks(
        config: &Configuration,
        mz: &Array1<f64>,
        intensities: &Array1<f64>,
    ) -> Result<Self, Error> {
        if mz.len() != intensities.len() {
            return Err(Error::ExperimentalSpectrumShape(mz.len(), intensities.len()));
        }

        let considerable_peaks_indexes = intensities
            .iter()
            .enumerate()
            .filter(|(_, &intensity)| intensity >= config.minimum_intensity)
            .map(|(index, _)| index)
            .collect::<Vec<usize>>();

        let bins = spectrum_binning(
            &mz.select(Axis(0), &considerable_peaks_indexes),
            config.fragment_mass_tolerance,
        )?;

        Ok(Self { bins })
    }

    pub fn bins(&self) -> &HashSet<MassBin> {
        &self.bins
    }

    pub fn contains(&self, bin: &MassBin) -> bool {
        self.bins.contains(bin)
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

impl FromIterator<MassBin> for Spectrum {
    fn from_iter<T: IntoIterator<Item = MassBin>>(iter: T) -> Self {
        Self::from_bins(iter)
    }
}
