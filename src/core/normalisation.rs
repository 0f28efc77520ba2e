//! Normalization conventions shared by the retrieval networks.
//!
//! The TOA networks were trained against min/max-scaled inputs and outputs,
//! the TOC network against standard-score inputs with a global scale factor.
//! The two conventions are not interchangeable even where both variables are
//! min/max bounded; each network only inverts the scaling it was trained with.

/// Scale `value` from `[min, max]` into `[-1, 1]`.
pub fn normalize_minmax(value: f64, min: f64, max: f64) -> f64 {
    2.0 * (value - min) / (max - min) - 1.0
}

/// Invert [`normalize_minmax`]: map a network output back into `[min, max]`.
pub fn denormalize_minmax(norm: f64, min: f64, max: f64) -> f64 {
    0.5 * (norm + 1.0) * (max - min) + min
}

/// Standard-score scaling with a global normalisation factor.
pub fn normalize_standard(value: f64, mean: f64, stddev: f64, factor: f64) -> f64 {
    factor * (value - mean) / stddev
}

/// Invert [`normalize_standard`]. Requires `factor != 0`.
pub fn denormalize_standard(norm: f64, mean: f64, stddev: f64, factor: f64) -> f64 {
    norm * stddev / factor + mean
}

/// Cosine of the sun/view relative azimuth, both angles in decimal degrees.
pub fn cos_relative_azimuth(sun_azimuth: f64, view_azimuth: f64) -> f64 {
    (sun_azimuth - view_azimuth).to_radians().cos()
}
