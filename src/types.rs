use std::fmt;

/// Number of spectral channels consumed by the TOA retrieval.
pub const TOA_BAND_COUNT: usize = 13;

/// Number of spectral channels consumed by the TOC retrieval.
pub const TOC_BAND_COUNT: usize = 11;

/// Width of the TOA network input vector (3 geometry + 13 spectral).
pub const TOA_INPUT_WIDTH: usize = 3 + TOA_BAND_COUNT;

/// Width of the TOC network input vector (3 geometry + 11 spectral).
pub const TOC_INPUT_WIDTH: usize = 3 + TOC_BAND_COUNT;

/// Biophysical variables produced by both retrieval variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiophysVariable {
    /// Leaf Area Index
    Lai,
    /// Fraction of vegetation cover
    FCover,
    /// Fraction of absorbed photosynthetically active radiation
    Fapar,
    /// Canopy chlorophyll content (LAI x Cab)
    LaiXCab,
}

impl BiophysVariable {
    /// All four variables, in the order they appear in output products.
    pub const ALL: [BiophysVariable; 4] = [
        BiophysVariable::Lai,
        BiophysVariable::FCover,
        BiophysVariable::Fapar,
        BiophysVariable::LaiXCab,
    ];

    /// Key prefix used in auxiliary property files.
    pub fn key(&self) -> &'static str {
        match self {
            BiophysVariable::Lai => "LAI",
            BiophysVariable::FCover => "fCover",
            BiophysVariable::Fapar => "fAPAR",
            BiophysVariable::LaiXCab => "LAIxCab",
        }
    }

    /// Quality flag raised when this variable leaves its training range.
    pub fn out_of_range_flag(&self) -> RetrievalFlags {
        match self {
            BiophysVariable::Lai => RetrievalFlags::LAI_OUT_OF_RANGE,
            BiophysVariable::FCover => RetrievalFlags::FCOVER_OUT_OF_RANGE,
            BiophysVariable::Fapar => RetrievalFlags::FAPAR_OUT_OF_RANGE,
            BiophysVariable::LaiXCab => RetrievalFlags::LAIXCAB_OUT_OF_RANGE,
        }
    }
}

impl fmt::Display for BiophysVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Per-pixel quality flags, written to the output product as a bitmask band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetrievalFlags(u8);

impl RetrievalFlags {
    /// Input pixel unusable (non-finite input or degenerate illumination).
    pub const INVALID: RetrievalFlags = RetrievalFlags(0x01);
    /// LAI left the training database range.
    pub const LAI_OUT_OF_RANGE: RetrievalFlags = RetrievalFlags(0x02);
    /// fCover left the training database range.
    pub const FCOVER_OUT_OF_RANGE: RetrievalFlags = RetrievalFlags(0x04);
    /// fAPAR left the training database range.
    pub const FAPAR_OUT_OF_RANGE: RetrievalFlags = RetrievalFlags(0x08);
    /// LAIxCab left the training database range.
    pub const LAIXCAB_OUT_OF_RANGE: RetrievalFlags = RetrievalFlags(0x10);

    /// Empty flag set.
    pub fn none() -> Self {
        RetrievalFlags(0)
    }

    /// Raw bitmask value as stored in the flags band.
    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn set(&mut self, flag: RetrievalFlags) {
        self.0 |= flag.0;
    }

    pub fn contains(&self, flag: RetrievalFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RetrievalFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(RetrievalFlags::INVALID) {
            names.push("INVALID");
        }
        if self.contains(RetrievalFlags::LAI_OUT_OF_RANGE) {
            names.push("LAI_OUT_OF_RANGE");
        }
        if self.contains(RetrievalFlags::FCOVER_OUT_OF_RANGE) {
            names.push("FCOVER_OUT_OF_RANGE");
        }
        if self.contains(RetrievalFlags::FAPAR_OUT_OF_RANGE) {
            names.push("FAPAR_OUT_OF_RANGE");
        }
        if self.contains(RetrievalFlags::LAIXCAB_OUT_OF_RANGE) {
            names.push("LAIXCAB_OUT_OF_RANGE");
        }
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Error types for vegetation retrieval processing
#[derive(Debug, thiserror::Error)]
pub enum VegError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for retrieval operations
pub type VegResult<T> = Result<T, VegError>;
