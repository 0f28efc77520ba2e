//! Top-of-canopy retrieval.
//!
//! One four-output network maps a normalized 14-element input vector
//! (3 geometry + 11 reflectance channels) to all four variables at once.
//! Inputs are standardized with a single shared mean/stddev and a global
//! normalisation factor; instead of an uncertainty polynomial, the variant
//! reports the mismatch between the retrieved fAPAR and an externally
//! supplied vegetation index.
//!
//! The trained output order is [fAPAR, fCover, LAI, LAIxCab]. That ordering
//! is part of the model contract and must not be rearranged here.

use crate::core::normalisation::{
    cos_relative_azimuth, denormalize_standard, normalize_standard,
};
use crate::core::pixel::{TocPixel, TocRetrievalResult};
use crate::io::auxdata::{load_normalisation_factor, TocInputStatistics, TocOutputStatistics};
use crate::io::config::TocProcessorConfig;
use crate::io::network::FeedForwardNet;
use crate::types::{
    BiophysVariable, RetrievalFlags, VegError, VegResult, TOC_BAND_COUNT, TOC_INPUT_WIDTH,
};

/// Position of each variable in the network output vector.
const OUTPUT_ORDER: [BiophysVariable; 4] = [
    BiophysVariable::Fapar,
    BiophysVariable::FCover,
    BiophysVariable::Lai,
    BiophysVariable::LaiXCab,
];

/// The TOC retrieval algorithm with all dependencies bound.
///
/// Immutable after [`build`](TocRetrievalBuilder::build); safe to share
/// read-only across worker threads.
#[derive(Debug)]
pub struct TocRetrieval {
    input_statistics: TocInputStatistics,
    output_statistics: TocOutputStatistics,
    normalisation_factor: f64,
    network: FeedForwardNet,
}

/// Collects the dependencies of [`TocRetrieval`].
#[derive(Debug, Default)]
pub struct TocRetrievalBuilder {
    input_statistics: Option<TocInputStatistics>,
    output_statistics: Option<TocOutputStatistics>,
    normalisation_factor: Option<f64>,
    network: Option<FeedForwardNet>,
}

impl TocRetrievalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_statistics(mut self, statistics: TocInputStatistics) -> Self {
        self.input_statistics = Some(statistics);
        self
    }

    pub fn output_statistics(mut self, statistics: TocOutputStatistics) -> Self {
        self.output_statistics = Some(statistics);
        self
    }

    pub fn normalisation_factor(mut self, factor: f64) -> Self {
        self.normalisation_factor = Some(factor);
        self
    }

    pub fn network(mut self, net: FeedForwardNet) -> Self {
        self.network = Some(net);
        self
    }

    pub fn build(self) -> VegResult<TocRetrieval> {
        let input_statistics = self.input_statistics.ok_or_else(|| {
            VegError::Configuration("TOC retrieval is missing its input statistics".to_string())
        })?;
        let output_statistics = self.output_statistics.ok_or_else(|| {
            VegError::Configuration("TOC retrieval is missing its output statistics".to_string())
        })?;
        let normalisation_factor = self.normalisation_factor.ok_or_else(|| {
            VegError::Configuration(
                "TOC retrieval is missing its normalisation factor".to_string(),
            )
        })?;
        if normalisation_factor == 0.0 || !normalisation_factor.is_finite() {
            return Err(VegError::Configuration(format!(
                "normalisation factor must be finite and non-zero, got {}",
                normalisation_factor
            )));
        }
        let network = self.network.ok_or_else(|| {
            VegError::Configuration("TOC retrieval is missing its network".to_string())
        })?;
        if network.input_size() != TOC_INPUT_WIDTH || network.output_size() != 4 {
            return Err(VegError::Configuration(format!(
                "TOC network has shape {} -> {}, the retrieval needs {} -> 4",
                network.input_size(),
                network.output_size(),
                TOC_INPUT_WIDTH
            )));
        }

        log::info!(
            "TOC retrieval assembled (normalisation factor {})",
            normalisation_factor
        );
        Ok(TocRetrieval {
            input_statistics,
            output_statistics,
            normalisation_factor,
            network,
        })
    }
}

impl TocRetrieval {
    pub fn builder() -> TocRetrievalBuilder {
        TocRetrievalBuilder::new()
    }

    /// Load every auxiliary table and the network named by a parsed
    /// processor configuration and assemble the retrieval.
    pub fn from_config(config: &TocProcessorConfig) -> VegResult<Self> {
        Self::builder()
            .normalisation_factor(load_normalisation_factor(&config.normalisation_factor)?)
            .input_statistics(TocInputStatistics::load(&config.input_statistics)?)
            .output_statistics(TocOutputStatistics::load(&config.output_statistics)?)
            .network(FeedForwardNet::load(&config.nn)?)
            .build()
    }

    /// Normalized network input vector for one pixel. Every channel shares
    /// the same mean/stddev and factor.
    fn input_vector(&self, pixel: &TocPixel) -> [f64; TOC_INPUT_WIDTH] {
        let geometry = &pixel.geometry;
        let mut vector = [0.0; TOC_INPUT_WIDTH];
        vector[0] = geometry.sun_zenith.to_radians();
        vector[1] = geometry.view_zenith.to_radians();
        vector[2] = cos_relative_azimuth(geometry.sun_azimuth, geometry.view_azimuth);
        vector[3..3 + TOC_BAND_COUNT].copy_from_slice(&pixel.reflectances);
        for entry in vector.iter_mut() {
            *entry = normalize_standard(
                *entry,
                self.input_statistics.mean,
                self.input_statistics.stddev,
                self.normalisation_factor,
            );
        }
        vector
    }

    /// Retrieve the four variables and the fAPAR mismatch for one pixel.
    pub fn retrieve(&self, pixel: &TocPixel) -> TocRetrievalResult {
        let mut result = TocRetrievalResult::default();
        if !pixel.is_valid() {
            result.flags.set(RetrievalFlags::INVALID);
            return result;
        }

        let vector = self.input_vector(pixel);
        let outputs = self.network.evaluate(&vector);

        let mut flags = RetrievalFlags::none();
        let mut fapar_value = 0.0;
        for (slot, variable) in OUTPUT_ORDER.iter().enumerate() {
            let stats = self.output_statistics.statistics(*variable);
            let mut value = denormalize_standard(
                outputs[slot],
                stats.mean,
                stats.stddev,
                self.normalisation_factor,
            );

            // range check precedes clamping, as in the TOA variant
            if value < stats.min || value > stats.max {
                flags.set(variable.out_of_range_flag());
            }
            if value < 0.0 {
                value = 0.0;
            }

            match variable {
                BiophysVariable::Fapar => {
                    fapar_value = value;
                    result.fapar = value as f32;
                }
                BiophysVariable::FCover => result.fcover = value as f32,
                BiophysVariable::Lai => result.lai = value as f32,
                BiophysVariable::LaiXCab => result.lai_x_cab = value as f32,
            }
        }

        // mismatch against the externally supplied vegetation index, taken
        // on the reported fAPAR
        result.delta_fapar = (pixel.vegetation_index - fapar_value) as f32;
        result.flags = flags;
        result
    }

    /// Retrieve a whole tile of pixels sequentially.
    pub fn retrieve_tile(&self, pixels: &[TocPixel]) -> Vec<TocRetrievalResult> {
        log::debug!("Retrieving TOC tile of {} pixels", pixels.len());
        pixels.iter().map(|pixel| self.retrieve(pixel)).collect()
    }

    /// Retrieve a whole tile of pixels across the rayon thread pool.
    #[cfg(feature = "parallel")]
    pub fn retrieve_tile_parallel(&self, pixels: &[TocPixel]) -> Vec<TocRetrievalResult> {
        use rayon::prelude::*;

        log::debug!("Retrieving TOC tile of {} pixels in parallel", pixels.len());
        pixels.par_iter().map(|pixel| self.retrieve(pixel)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pixel::Geometry;
    use approx::assert_abs_diff_eq;

    /// Single-layer 14 -> 4 net with zero weights: outputs its biases.
    fn constant_net(biases: [f64; 4]) -> FeedForwardNet {
        let mut text = format!("topology: {} 4\n", TOC_INPUT_WIDTH);
        for _ in 0..4 {
            text.push_str(&vec!["0"; TOC_INPUT_WIDTH].join(" "));
            text.push('\n');
        }
        text.push_str(&format!(
            "{} {} {} {}\n",
            biases[0], biases[1], biases[2], biases[3]
        ));
        FeedForwardNet::from_str(&text).unwrap()
    }

    fn test_pixel() -> TocPixel {
        TocPixel {
            geometry: Geometry {
                sun_zenith: 35.0,
                sun_azimuth: 120.0,
                view_zenith: 20.0,
                view_azimuth: 280.0,
            },
            reflectances: [
                0.045, 0.052, 0.071, 0.089, 0.134, 0.176, 0.223, 0.287, 0.334, 0.341, 0.352,
            ],
            aerosol_alpha: 1.15,
            aerosol_optical_thickness: 0.21,
            vegetation_index: 0.3,
        }
    }

    fn retrieval_with_biases(biases: [f64; 4]) -> TocRetrieval {
        // same numbers as the documented defaults, supplied inline
        use crate::io::auxdata::VariableStatistics;
        let output_statistics = TocOutputStatistics::from_statistics([
            VariableStatistics {
                mean: 2.138990,
                stddev: 2.104450,
                min: 0.000446,
                max: 7.997280,
            },
            VariableStatistics {
                mean: 0.383559,
                stddev: 0.306029,
                min: 0.000029,
                max: 0.999962,
            },
            VariableStatistics {
                mean: 0.431057,
                stddev: 0.312998,
                min: 0.0000046,
                max: 0.958482,
            },
            VariableStatistics {
                mean: 106.258,
                stddev: 112.272,
                min: 0.00167,
                max: 594.623,
            },
        ]);
        TocRetrieval::builder()
            .input_statistics(TocInputStatistics::new(0.181415, 0.212805))
            .output_statistics(output_statistics)
            .normalisation_factor(0.66)
            .network(constant_net(biases))
            .build()
            .unwrap()
    }

    #[test]
    fn test_in_range_retrieval_and_mismatch() {
        // output order is [fAPAR, fCover, LAI, LAIxCab]; the fAPAR bias was
        // chosen so the retrieval lands on 0.11680036
        let retrieval =
            retrieval_with_biases([-0.6626540182365384, 0.1, 0.25, -0.3]);
        let result = retrieval.retrieve(&test_pixel());

        assert!(result.flags.is_empty());
        assert_abs_diff_eq!(result.fapar as f64, 0.11680036, epsilon = 1e-6);
        assert_abs_diff_eq!(result.fcover as f64, 0.4299270303030303, epsilon = 1e-6);
        assert_abs_diff_eq!(result.lai as f64, 2.936130151515152, epsilon = 1e-6);
        assert_abs_diff_eq!(result.lai_x_cab as f64, 55.22527272727272, epsilon = 1e-4);
        assert_abs_diff_eq!(result.delta_fapar as f64, 0.18319964, epsilon = 1e-6);
    }

    #[test]
    fn test_out_of_range_is_flagged_and_mismatch_uses_reported_value() {
        // a strongly negative fAPAR output leaves the training range and is
        // reported as zero, so the mismatch equals the vegetation index
        let retrieval = retrieval_with_biases([-2.0, 0.1, 0.25, -0.3]);
        let result = retrieval.retrieve(&test_pixel());

        assert!(result.flags.contains(RetrievalFlags::FAPAR_OUT_OF_RANGE));
        assert_eq!(result.fapar, 0.0);
        assert_abs_diff_eq!(result.delta_fapar as f64, 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_output_order_is_fixed() {
        // distinct biases land on distinct variables in trained order
        let retrieval = retrieval_with_biases([0.0, 0.0, 0.25, 0.0]);
        let result = retrieval.retrieve(&test_pixel());
        // only the third output slot moved away from its mean
        assert_abs_diff_eq!(result.fapar as f64, 0.431057, epsilon = 1e-6);
        assert_abs_diff_eq!(result.fcover as f64, 0.383559, epsilon = 1e-6);
        assert_abs_diff_eq!(result.lai as f64, 2.936130151515152, epsilon = 1e-6);
        assert_abs_diff_eq!(result.lai_x_cab as f64, 106.258, epsilon = 1e-4);
    }

    #[test]
    fn test_invalid_pixel_short_circuits() {
        let retrieval = retrieval_with_biases([0.0, 0.0, 0.0, 0.0]);
        let mut pixel = test_pixel();
        pixel.reflectances[3] = f64::NAN;
        let result = retrieval.retrieve(&pixel);
        assert_eq!(result.flags.bits(), 1);
        assert_eq!(result.fapar, 0.0);
        assert_eq!(result.delta_fapar, 0.0);
    }

    #[test]
    fn test_builder_rejects_zero_factor() {
        let err = TocRetrieval::builder()
            .input_statistics(TocInputStatistics::defaults())
            .output_statistics(TocOutputStatistics::defaults())
            .normalisation_factor(0.0)
            .network(constant_net([0.0; 4]))
            .build()
            .unwrap_err();
        assert!(matches!(err, VegError::Configuration(_)));
    }

    #[test]
    fn test_builder_rejects_wrong_network_shape() {
        let single_output = FeedForwardNet::from_str(&format!(
            "topology: {} 1\n{}\n0.0\n",
            TOC_INPUT_WIDTH,
            vec!["0"; TOC_INPUT_WIDTH].join(" ")
        ))
        .unwrap();
        let err = TocRetrieval::builder()
            .input_statistics(TocInputStatistics::defaults())
            .output_statistics(TocOutputStatistics::defaults())
            .normalisation_factor(0.66)
            .network(single_output)
            .build()
            .unwrap_err();
        match err {
            VegError::Configuration(msg) => assert!(msg.contains("-> 4")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_tile_matches_per_pixel() {
        let retrieval = retrieval_with_biases([-0.5, 0.1, 0.25, -0.3]);
        let pixels = vec![test_pixel(); 5];
        let tile = retrieval.retrieve_tile(&pixels);
        let single = retrieval.retrieve(&pixels[0]);
        for result in tile {
            assert_eq!(result.fapar, single.fapar);
            assert_eq!(result.delta_fapar, single.delta_fapar);
        }
    }
}
