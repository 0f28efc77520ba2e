//! verdin: A Fast, Modular Vegetation Biophysical Retrieval Processor
//!
//! This library turns calibrated satellite radiance/reflectance measurements
//! into vegetation biophysical variables (LAI, fCover, fAPAR, LAIxCab) with
//! per-pixel uncertainty estimates and quality flags. Two retrieval variants
//! are provided: a top-of-atmosphere (TOA) retrieval driven by four
//! single-output neural networks, and a top-of-canopy (TOC) retrieval driven
//! by one four-output network.
//!
//! Raster product I/O is deliberately out of scope: an external tiled driver
//! feeds [`ToaPixel`]/[`TocPixel`] records in and writes the result records
//! out. All auxiliary file and model loading happens during initialization;
//! the per-pixel path is pure computation and safe to run from parallel
//! workers.

pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use crate::core::{
    toa_reflectance, Geometry, ToaPixel, ToaRetrieval, ToaRetrievalBuilder, ToaRetrievalResult,
    TocPixel, TocRetrieval, TocRetrievalBuilder, TocRetrievalResult,
};
pub use io::{
    FeedForwardNet, ToaInputStatistics, ToaOutputStatistics, ToaProcessorConfig,
    TocInputStatistics, TocOutputStatistics, TocProcessorConfig, UncertaintyPolynomials,
};
pub use types::{BiophysVariable, RetrievalFlags, VegError, VegResult};
