use rustyms::model::FragmentationModel;

/// Default floor threshold a kernel has to exceed to be reported as a winner.
pub const DEFAULT_FLOOR: usize = 5;

/// Default number of processed spectra between two progress notifications.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10_000;

pub enum FragmentationMethod {
    CID,
    HCD,
    ETD,
}

#[allow(clippy::from_over_into)]
impl Into<FragmentationModel> for FragmentationMethod {
    fn into(self) -> FragmentationModel {
        match self {
            FragmentationMethod::CID | FragmentationMethod::HCD => {
                FragmentationModel::cid_hcd().clone()
            }
            FragmentationMethod::ETD => FragmentationModel::etd().clone(),
        }
    }
}

/// Clears the neutral losses of the listed ion series.
macro_rules! strip_neutral_losses {
    ($model:ident, $($series:ident),+) => {
        $(
            let mut series = $model.$series.clone();
            series.neutral_losses.clear();
            $model = $model.$series(series);
        )+
    };
}

pub struct Configuration {
    /// Used to generate kernels from peptide sequences.
    pub fragmentation_model: FragmentationModel,
    /// Width of a mass bin in Dalton. Only consumed by the quantizer.
    pub fragment_mass_tolerance: f64,
    /// Scores at or below the floor never produce a winner.
    pub floor: usize,
    pub minimum_intensity: f64,
    pub max_fragment_charge: usize,
    /// Spectra between progress notifications, `0` disables them.
    pub progress_interval: usize,
    /// Spectra per shard when scoring in parallel.
    pub chunk_size: usize,
}

impl Configuration {
    pub fn new(
        fragment_mass_tolerance: f64,
        floor: usize,
        fragmentation: FragmentationMethod,
        use_neutral_loss_ions: bool,
        max_fragment_charge: usize,
        minimum_intensity: f64,
    ) -> Self {
        let mut fragmentation_model: FragmentationModel = fragmentation.into();

        if !use_neutral_loss_ions {
            strip_neutral_losses!(fragmentation_model, a, b, c, x, y, z);
        }

        Self {
            fragmentation_model,
            fragment_mass_tolerance,
            floor,
            minimum_intensity,
            max_fragment_charge,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            chunk_size: 1024,
        }
    }

    pub fn with_progress_interval(mut self, progress_interval: usize) -> Self {
        self.progress_interval = progress_interval;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(0.4, DEFAULT_FLOOR, FragmentationMethod::CID, false, 3, 0.0)
    }
}
