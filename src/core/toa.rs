//! Top-of-atmosphere retrieval.
//!
//! Four independent single-output networks map one normalized 16-element
//! input vector (3 geometry + 13 spectral channels) to LAI, fCover, fAPAR
//! and LAIxCab. Spectral inputs arrive as radiances and are converted to
//! reflectances before normalization; every retrieved value gets a quadratic
//! uncertainty sigma unless it left the training database range.

use crate::core::normalisation::{cos_relative_azimuth, denormalize_minmax, normalize_minmax};
use crate::core::pixel::{toa_reflectance, ToaPixel, ToaRetrievalResult};
use crate::io::auxdata::{
    ToaInputStatistics, ToaOutputStatistics, UncertaintyPolynomials,
};
use crate::io::config::ToaProcessorConfig;
use crate::io::network::FeedForwardNet;
use crate::types::{
    BiophysVariable, RetrievalFlags, VegError, VegResult, TOA_BAND_COUNT, TOA_INPUT_WIDTH,
};

/// The TOA retrieval algorithm with all dependencies bound.
///
/// Instances are immutable after [`build`](ToaRetrievalBuilder::build) and
/// safe to share read-only across worker threads; the per-pixel path does no
/// I/O and keeps no mutable state.
#[derive(Debug)]
pub struct ToaRetrieval {
    input_statistics: ToaInputStatistics,
    output_statistics: ToaOutputStatistics,
    uncertainty: UncertaintyPolynomials,
    /// One single-output network per variable, indexed like
    /// [`BiophysVariable::ALL`].
    networks: [FeedForwardNet; 4],
}

/// Collects the four collaborator dependencies of [`ToaRetrieval`].
///
/// `build` refuses to produce an algorithm until every dependency is
/// supplied and the network vector widths match, so a half-wired retrieval
/// cannot exist.
#[derive(Debug, Default)]
pub struct ToaRetrievalBuilder {
    input_statistics: Option<ToaInputStatistics>,
    output_statistics: Option<ToaOutputStatistics>,
    uncertainty: Option<UncertaintyPolynomials>,
    networks: [Option<FeedForwardNet>; 4],
}

impl ToaRetrievalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_statistics(mut self, statistics: ToaInputStatistics) -> Self {
        self.input_statistics = Some(statistics);
        self
    }

    pub fn output_statistics(mut self, statistics: ToaOutputStatistics) -> Self {
        self.output_statistics = Some(statistics);
        self
    }

    pub fn uncertainty(mut self, polynomials: UncertaintyPolynomials) -> Self {
        self.uncertainty = Some(polynomials);
        self
    }

    /// Bind the trained network for one variable.
    pub fn network(mut self, variable: BiophysVariable, net: FeedForwardNet) -> Self {
        let index = BiophysVariable::ALL.iter().position(|v| *v == variable).unwrap();
        self.networks[index] = Some(net);
        self
    }

    pub fn build(self) -> VegResult<ToaRetrieval> {
        let input_statistics = self.input_statistics.ok_or_else(|| {
            VegError::Configuration("TOA retrieval is missing its input statistics".to_string())
        })?;
        let output_statistics = self.output_statistics.ok_or_else(|| {
            VegError::Configuration("TOA retrieval is missing its output statistics".to_string())
        })?;
        let uncertainty = self.uncertainty.ok_or_else(|| {
            VegError::Configuration(
                "TOA retrieval is missing its uncertainty polynomials".to_string(),
            )
        })?;

        let mut networks = Vec::with_capacity(4);
        for (slot, variable) in self.networks.into_iter().zip(BiophysVariable::ALL) {
            let net = slot.ok_or_else(|| {
                VegError::Configuration(format!(
                    "TOA retrieval is missing the {} network",
                    variable
                ))
            })?;
            if net.input_size() != TOA_INPUT_WIDTH || net.output_size() != 1 {
                return Err(VegError::Configuration(format!(
                    "{} network has shape {} -> {}, the TOA retrieval needs {} -> 1",
                    variable,
                    net.input_size(),
                    net.output_size(),
                    TOA_INPUT_WIDTH
                )));
            }
            networks.push(net);
        }
        let networks: [FeedForwardNet; 4] = networks.try_into().unwrap();

        log::info!("TOA retrieval assembled with 4 networks");
        Ok(ToaRetrieval {
            input_statistics,
            output_statistics,
            uncertainty,
            networks,
        })
    }
}

impl ToaRetrieval {
    pub fn builder() -> ToaRetrievalBuilder {
        ToaRetrievalBuilder::new()
    }

    /// Load every auxiliary table and network named by a parsed processor
    /// configuration and assemble the retrieval.
    pub fn from_config(config: &ToaProcessorConfig) -> VegResult<Self> {
        Self::builder()
            .input_statistics(ToaInputStatistics::load(&config.input_statistics)?)
            .output_statistics(ToaOutputStatistics::load(&config.output_statistics)?)
            .uncertainty(UncertaintyPolynomials::load(&config.uncertainty)?)
            .network(BiophysVariable::Lai, FeedForwardNet::load(&config.nn_lai)?)
            .network(BiophysVariable::FCover, FeedForwardNet::load(&config.nn_fcover)?)
            .network(BiophysVariable::Fapar, FeedForwardNet::load(&config.nn_fapar)?)
            .network(BiophysVariable::LaiXCab, FeedForwardNet::load(&config.nn_lai_x_cab)?)
            .build()
    }

    /// Normalized network input vector for one pixel.
    fn input_vector(&self, pixel: &ToaPixel) -> [f64; TOA_INPUT_WIDTH] {
        let geometry = &pixel.geometry;
        let mut vector = [0.0; TOA_INPUT_WIDTH];
        vector[0] = geometry.sun_zenith.to_radians();
        vector[1] = geometry.view_zenith.to_radians();
        vector[2] = cos_relative_azimuth(geometry.sun_azimuth, geometry.view_azimuth);
        for band in 0..TOA_BAND_COUNT {
            vector[3 + band] = toa_reflectance(
                pixel.radiances[band],
                pixel.solar_flux[band],
                geometry.sun_zenith,
            );
        }
        for (i, entry) in vector.iter_mut().enumerate() {
            let bounds = self.input_statistics.channel(i);
            *entry = normalize_minmax(*entry, bounds.min, bounds.max);
        }
        vector
    }

    /// Retrieve the four variables and their uncertainties for one pixel.
    pub fn retrieve(&self, pixel: &ToaPixel) -> ToaRetrievalResult {
        let mut result = ToaRetrievalResult::default();
        if !pixel.is_valid() {
            result.flags.set(RetrievalFlags::INVALID);
            return result;
        }

        let vector = self.input_vector(pixel);
        let mut values = [0.0f32; 4];
        let mut sigmas = [0.0f32; 4];
        let mut flags = RetrievalFlags::none();

        for (i, variable) in BiophysVariable::ALL.iter().enumerate() {
            let norm = self.networks[i].evaluate(&vector)[0];
            let bounds = self.output_statistics.bounds(*variable);
            let mut value = denormalize_minmax(norm, bounds.min, bounds.max);

            // range check precedes clamping: a negative result is reported
            // as 0 but keeps its flag
            let out_of_range = value < bounds.min || value > bounds.max;
            if out_of_range {
                flags.set(variable.out_of_range_flag());
            }
            if value < 0.0 {
                value = 0.0;
            }

            values[i] = value as f32;
            sigmas[i] = if out_of_range {
                0.0
            } else {
                self.uncertainty.sigma(*variable, value) as f32
            };
        }

        result.lai = values[0];
        result.fcover = values[1];
        result.fapar = values[2];
        result.lai_x_cab = values[3];
        result.sigma_lai = sigmas[0];
        result.sigma_fcover = sigmas[1];
        result.sigma_fapar = sigmas[2];
        result.sigma_lai_x_cab = sigmas[3];
        result.flags = flags;
        result
    }

    /// Retrieve a whole tile of pixels sequentially.
    pub fn retrieve_tile(&self, pixels: &[ToaPixel]) -> Vec<ToaRetrievalResult> {
        log::debug!("Retrieving TOA tile of {} pixels", pixels.len());
        pixels.iter().map(|pixel| self.retrieve(pixel)).collect()
    }

    /// Retrieve a whole tile of pixels across the rayon thread pool.
    #[cfg(feature = "parallel")]
    pub fn retrieve_tile_parallel(&self, pixels: &[ToaPixel]) -> Vec<ToaRetrievalResult> {
        use rayon::prelude::*;

        log::debug!("Retrieving TOA tile of {} pixels in parallel", pixels.len());
        pixels.par_iter().map(|pixel| self.retrieve(pixel)).collect()
    }
}
