//! Fraction assignment for preparative runs.

/// Added to the zero-based index of the last boundary below a row's volume.
///
/// Reproduces the fraction numbering shown by the AKTA control software.
/// Observed against instrument output, not derived; keep it fixed until it is
/// validated against a fresh export.
pub const FRACTION_OFFSET: u32 = 2;

/// Fraction number for one volume given the fraction-boundary volumes.
///
/// Returns 1 when no boundary lies strictly below `volume`.
pub fn fraction_for(volume: f64, boundaries: &[f64]) -> u32 {
    boundaries
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b < volume)
        .map(|(i, _)| i as u32 + FRACTION_OFFSET)
        .max()
        .unwrap_or(1)
}

/// Fraction numbers for every volume. Non-decreasing in volume.
pub fn assign_fractions(volumes: &[f64], boundaries: &[f64]) -> Vec<u32> {
    volumes.iter().map(|&v| fraction_for(v, boundaries)).collect()
}
