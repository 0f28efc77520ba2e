//! Auxiliary data loading: coefficient tables, trained networks and
//! processor configuration files. All loading happens once during
//! initialization, strictly before the per-pixel phase.

pub mod auxdata;
pub mod config;
pub mod network;

// Re-export main types
pub use auxdata::{
    load_normalisation_factor, ChannelBounds, TocInputStatistics, TocOutputStatistics,
    ToaInputStatistics, ToaOutputStatistics, UncertaintyPolynomials, VariableStatistics,
};
pub use config::{ToaProcessorConfig, TocProcessorConfig};
pub use network::FeedForwardNet;
