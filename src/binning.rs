use std::collections::HashSet;

use ndarray::Array1;

use crate::error::Error;

/// Integer-quantized mass. Two masses in the same bin are considered a match.
pub type MassBin = u32;

/// Quantizes a mass to its bin by rounding `mass / tolerance` half up.
///
/// Arguments:
/// * `mass` - Mass or m/z value in Dalton.
/// * `tolerance` - Fragment mass tolerance, i.e. the width of a bin.
///
pub fn quantize_mass(mass: f64, tolerance: f64) -> Result<MassBin, Error> {
    if !tolerance.is_finite() || tolerance <= 0.0 {
        return Err(Error::InvalidTolerance(tolerance));
    }
    if !mass.is_finite() || mass < 0.0 {
        return Err(Error::MassToBin(mass, "mass is negative or not finite".to_string()));
    }

    let bin = (0.5 + mass / tolerance).floor();
    if bin > MassBin::MAX as f64 {
        return Err(Error::MassToBin(
            mass,
            format!("bin {bin} exceeds {}", MassBin::MAX),
        ));
    }
    Ok(bin as MassBin)
}

/// Bins the spectrum side. Each bin is kept once, whatever the number of peaks falling into it.
///
/// Arguments:
/// * `mz` - The m/z values of the experimental spectrum.
/// * `tolerance` - Fragment mass tolerance.
///
pub fn spectrum_binning(mz: &Array1<f64>, tolerance: f64) -> Result<HashSet<MassBin>, Error> {
    mz.iter()
        .map(|mz| quantize_mass(*mz, tolerance))
        .collect()
}

/// Bins the kernel side. Order is preserved and repeated bins are kept, each one counts when scoring.
///
/// Arguments:
/// * `mz` - The theoretical m/z values.
/// * `tolerance` - Fragment mass tolerance.
///
pub fn kernel_binning(mz: &Array1<f64>, tolerance: f64) -> Result<Vec<MassBin>, Error> {
    mz.iter()
        .map(|mz| quantize_mass(*mz, tolerance))
        .collect()
}
