//! Per-pixel value carriers exchanged with the raster framework.
//!
//! These are plain fixed-size records: the external reader fills one input
//! record per pixel, the retrieval fills one result record per pixel, and
//! neither side retains the other's buffers.

use crate::types::{RetrievalFlags, TOA_BAND_COUNT, TOC_BAND_COUNT};

/// Sun/view geometry of one pixel, all angles in decimal degrees.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub sun_zenith: f64,
    pub sun_azimuth: f64,
    pub view_zenith: f64,
    pub view_azimuth: f64,
}

impl Geometry {
    pub fn is_finite(&self) -> bool {
        self.sun_zenith.is_finite()
            && self.sun_azimuth.is_finite()
            && self.view_zenith.is_finite()
            && self.view_azimuth.is_finite()
    }
}

/// Input record for the TOA retrieval: per-band radiances plus the solar
/// spectral flux needed to convert them to reflectances.
#[derive(Debug, Clone)]
pub struct ToaPixel {
    pub geometry: Geometry,
    pub radiances: [f64; TOA_BAND_COUNT],
    pub solar_flux: [f64; TOA_BAND_COUNT],
}

impl ToaPixel {
    /// True when every input the retrieval consumes is a usable number and
    /// the reflectance conversion denominator is strictly positive.
    pub fn is_valid(&self) -> bool {
        if !self.geometry.is_finite() {
            return false;
        }
        let cos_theta_s = self.geometry.sun_zenith.to_radians().cos();
        if !cos_theta_s.is_finite() || cos_theta_s <= 0.0 {
            return false;
        }
        self.radiances.iter().all(|r| r.is_finite())
            && self.solar_flux.iter().all(|e| e.is_finite() && *e > 0.0)
    }
}

/// Input record for the TOC retrieval: reflectances are assumed already
/// atmospherically corrected upstream. The aerosol pair is carried through
/// to the output product; only the vegetation index enters the computation.
#[derive(Debug, Clone)]
pub struct TocPixel {
    pub geometry: Geometry,
    pub reflectances: [f64; TOC_BAND_COUNT],
    pub aerosol_alpha: f64,
    pub aerosol_optical_thickness: f64,
    pub vegetation_index: f64,
}

impl TocPixel {
    pub fn is_valid(&self) -> bool {
        self.geometry.is_finite()
            && self.reflectances.iter().all(|r| r.is_finite())
            && self.aerosol_alpha.is_finite()
            && self.aerosol_optical_thickness.is_finite()
            && self.vegetation_index.is_finite()
    }
}

/// TOA result record: retrieved variables, their uncertainty sigmas and the
/// quality flag bitmask.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToaRetrievalResult {
    pub lai: f32,
    pub fcover: f32,
    pub fapar: f32,
    pub lai_x_cab: f32,
    pub sigma_lai: f32,
    pub sigma_fcover: f32,
    pub sigma_fapar: f32,
    pub sigma_lai_x_cab: f32,
    pub flags: RetrievalFlags,
}

/// TOC result record: retrieved variables, the fAPAR mismatch against the
/// externally supplied vegetation index, and the quality flag bitmask.
#[derive(Debug, Clone, Copy, Default)]
pub struct TocRetrievalResult {
    pub lai: f32,
    pub fcover: f32,
    pub fapar: f32,
    pub lai_x_cab: f32,
    pub delta_fapar: f32,
    pub flags: RetrievalFlags,
}

/// Standard TOA reflectance conversion.
///
/// `reflectance = pi * radiance / (solar_flux * cos(sun_zenith))`, with the
/// sun zenith given in decimal degrees.
pub fn toa_reflectance(radiance: f64, solar_flux: f64, sun_zenith_deg: f64) -> f64 {
    std::f64::consts::PI * radiance / (solar_flux * sun_zenith_deg.to_radians().cos())
}
