//! Core retrieval modules

pub mod normalisation;
pub mod pixel;
pub mod toa;
pub mod toc;

// Re-export main types
pub use pixel::{
    toa_reflectance, Geometry, ToaPixel, ToaRetrievalResult, TocPixel, TocRetrievalResult,
};
pub use toa::{ToaRetrieval, ToaRetrievalBuilder};
pub use toc::{TocRetrieval, TocRetrievalBuilder};
