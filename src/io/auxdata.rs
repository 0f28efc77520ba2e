//! Auxiliary coefficient and statistics tables.
//!
//! All tables are `key = value` property files with `#` comments. Every file
//! carries `version` and `description` keys for provenance logging; they are
//! never used in the computation. A missing numeric key falls back to the
//! documented default for that key — campaign files are routinely partial and
//! must not abort the run — while a present but unparseable value is a hard
//! format error.

use crate::types::{BiophysVariable, VegError, VegResult, TOA_BAND_COUNT, TOA_INPUT_WIDTH};
use std::collections::HashMap;
use std::path::Path;

/// Default min/max bounds for the TOA geometry channels, in radians
/// (cos_phi is already dimensionless).
pub const DEFAULT_THETA_S_BOUNDS: (f64, f64) = (0.31792995, 1.04718879);
pub const DEFAULT_THETA_V_BOUNDS: (f64, f64) = (0.0, 0.68590864);
pub const DEFAULT_COS_PHI_BOUNDS: (f64, f64) = (-1.0, 1.0);

/// Default min/max bounds for the 13 TOA reflectance channels.
pub const DEFAULT_TOA_BAND_BOUNDS: [(f64, f64); TOA_BAND_COUNT] = [
    (0.05989, 0.42116),
    (0.04478, 0.40134),
    (0.02546, 0.39083),
    (0.01977, 0.39554),
    (0.01225, 0.40520),
    (0.00847, 0.41615),
    (0.00676, 0.42918),
    (0.00638, 0.43398),
    (0.00587, 0.44224),
    (0.00907, 0.51461),
    (0.00858, 0.52372),
    (0.00676, 0.53277),
    (0.00542, 0.54527),
];

/// Default min/max bounds of the TOA training database outputs.
pub const DEFAULT_TOA_OUTPUT_BOUNDS: [(f64, f64); 4] = [
    (0.000446, 7.99728),    // LAI
    (0.000029, 0.999962),   // fCover
    (0.0000046, 0.958482),  // fAPAR
    (0.00167, 594.623),     // LAIxCab
];

/// Default quadratic uncertainty coefficients (c0, c1, c2) per variable.
pub const DEFAULT_UNCERTAINTY_COEFFS: [(f64, f64, f64); 4] = [
    (0.054, 0.776, -0.0575),    // LAI
    (0.0168, 0.779, -0.667),    // fCover
    (0.0254, 0.618, -0.653),    // fAPAR
    (4.927, 0.654, -0.000948),  // LAIxCab
];

/// Default shared input statistics of the TOC training database.
pub const DEFAULT_TOC_INPUT_MEAN: f64 = 0.181415;
pub const DEFAULT_TOC_INPUT_STDDEV: f64 = 0.212805;

/// Default global normalisation factor of the TOC network.
pub const DEFAULT_NORMALISATION_FACTOR: f64 = 0.66;

/// Default (mean, stddev, min, max) of the TOC training database outputs,
/// indexed like [`BiophysVariable::ALL`].
pub const DEFAULT_TOC_OUTPUT_STATISTICS: [(f64, f64, f64, f64); 4] = [
    (2.138990, 2.104450, 0.000446, 7.997280),      // LAI
    (0.383559, 0.306029, 0.000029, 0.999962),      // fCover
    (0.431057, 0.312998, 0.0000046, 0.958482),     // fAPAR
    (106.258, 112.272, 0.00167, 594.623),          // LAIxCab
];

fn variable_index(variable: BiophysVariable) -> usize {
    BiophysVariable::ALL
        .iter()
        .position(|v| *v == variable)
        .unwrap()
}

/// A parsed `key = value` property file.
#[derive(Debug, Clone)]
struct PropertyFile {
    path: String,
    entries: HashMap<String, String>,
}

impl PropertyFile {
    fn load(path: &Path) -> VegResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut entries = HashMap::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    entries.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => {
                    return Err(VegError::InvalidFormat(format!(
                        "{}: line '{}' is not a key = value pair",
                        path.display(),
                        line
                    )))
                }
            }
        }
        Ok(Self {
            path: path.display().to_string(),
            entries,
        })
    }

    /// Numeric lookup with per-key default substitution.
    fn get_f64_or(&self, key: &str, default: f64) -> VegResult<f64> {
        match self.entries.get(key) {
            Some(raw) => raw.parse::<f64>().map_err(|_| {
                VegError::InvalidFormat(format!(
                    "{}: value '{}' for key '{}' is not a number",
                    self.path, raw, key
                ))
            }),
            None => {
                log::warn!(
                    "{}: key '{}' missing, using default {}",
                    self.path,
                    key,
                    default
                );
                Ok(default)
            }
        }
    }

    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Min/max bounds of one normalized channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelBounds {
    pub min: f64,
    pub max: f64,
}

/// Per-channel min/max statistics of the TOA network inputs.
#[derive(Debug, Clone)]
pub struct ToaInputStatistics {
    theta_s: ChannelBounds,
    theta_v: ChannelBounds,
    cos_phi: ChannelBounds,
    bands: [ChannelBounds; TOA_BAND_COUNT],
    version: String,
    description: String,
}

impl ToaInputStatistics {
    /// Load from a property file. Keys: `theta_s.min/max`, `theta_v.min/max`,
    /// `cos_phi.min/max`, `rho_toa.<1..13>.min/max`.
    pub fn load<P: AsRef<Path>>(path: P) -> VegResult<Self> {
        let props = PropertyFile::load(path.as_ref())?;
        let bounds = |key: &str, default: (f64, f64)| -> VegResult<ChannelBounds> {
            Ok(ChannelBounds {
                min: props.get_f64_or(&format!("{}.min", key), default.0)?,
                max: props.get_f64_or(&format!("{}.max", key), default.1)?,
            })
        };

        let theta_s = bounds("theta_s", DEFAULT_THETA_S_BOUNDS)?;
        let theta_v = bounds("theta_v", DEFAULT_THETA_V_BOUNDS)?;
        let cos_phi = bounds("cos_phi", DEFAULT_COS_PHI_BOUNDS)?;
        let mut bands = [ChannelBounds { min: 0.0, max: 1.0 }; TOA_BAND_COUNT];
        for (i, band) in bands.iter_mut().enumerate() {
            *band = bounds(&format!("rho_toa.{}", i + 1), DEFAULT_TOA_BAND_BOUNDS[i])?;
        }

        let stats = Self {
            theta_s,
            theta_v,
            cos_phi,
            bands,
            version: props.get_string_or("version", "unknown"),
            description: props.get_string_or("description", ""),
        };
        log::info!(
            "Loaded TOA input statistics {} (version {})",
            props.path,
            stats.version
        );
        Ok(stats)
    }

    /// Statistics with every channel at its documented default.
    pub fn defaults() -> Self {
        let to_bounds = |(min, max): (f64, f64)| ChannelBounds { min, max };
        let mut bands = [ChannelBounds { min: 0.0, max: 1.0 }; TOA_BAND_COUNT];
        for (i, band) in bands.iter_mut().enumerate() {
            *band = to_bounds(DEFAULT_TOA_BAND_BOUNDS[i]);
        }
        Self {
            theta_s: to_bounds(DEFAULT_THETA_S_BOUNDS),
            theta_v: to_bounds(DEFAULT_THETA_V_BOUNDS),
            cos_phi: to_bounds(DEFAULT_COS_PHI_BOUNDS),
            bands,
            version: "builtin".to_string(),
            description: "compile-time defaults".to_string(),
        }
    }

    pub fn theta_s(&self) -> ChannelBounds {
        self.theta_s
    }

    pub fn theta_v(&self) -> ChannelBounds {
        self.theta_v
    }

    pub fn cos_phi(&self) -> ChannelBounds {
        self.cos_phi
    }

    pub fn band(&self, index: usize) -> ChannelBounds {
        self.bands[index]
    }

    /// Bounds of the network input channel at `index`, in input-vector order
    /// (theta_s, theta_v, cos_phi, then the 13 spectral channels).
    pub fn channel(&self, index: usize) -> ChannelBounds {
        match index {
            0 => self.theta_s,
            1 => self.theta_v,
            2 => self.cos_phi,
            i if i < TOA_INPUT_WIDTH => self.bands[i - 3],
            i => panic!("TOA input channel index {} out of range", i),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Per-variable min/max statistics of the TOA network outputs.
#[derive(Debug, Clone)]
pub struct ToaOutputStatistics {
    bounds: [ChannelBounds; 4],
    version: String,
    description: String,
}

impl ToaOutputStatistics {
    /// Load from a property file. Keys: `<variable>.min/max` with the
    /// variable names `LAI`, `fCover`, `fAPAR`, `LAIxCab`.
    pub fn load<P: AsRef<Path>>(path: P) -> VegResult<Self> {
        let props = PropertyFile::load(path.as_ref())?;
        let mut bounds = [ChannelBounds { min: 0.0, max: 1.0 }; 4];
        for (i, variable) in BiophysVariable::ALL.iter().enumerate() {
            let default = DEFAULT_TOA_OUTPUT_BOUNDS[i];
            bounds[i] = ChannelBounds {
                min: props.get_f64_or(&format!("{}.min", variable.key()), default.0)?,
                max: props.get_f64_or(&format!("{}.max", variable.key()), default.1)?,
            };
        }
        let stats = Self {
            bounds,
            version: props.get_string_or("version", "unknown"),
            description: props.get_string_or("description", ""),
        };
        log::info!(
            "Loaded TOA output statistics {} (version {})",
            props.path,
            stats.version
        );
        Ok(stats)
    }

    pub fn defaults() -> Self {
        let mut bounds = [ChannelBounds { min: 0.0, max: 1.0 }; 4];
        for (i, (min, max)) in DEFAULT_TOA_OUTPUT_BOUNDS.iter().enumerate() {
            bounds[i] = ChannelBounds {
                min: *min,
                max: *max,
            };
        }
        Self {
            bounds,
            version: "builtin".to_string(),
            description: "compile-time defaults".to_string(),
        }
    }

    /// Build from explicit (min, max) pairs, indexed like
    /// [`BiophysVariable::ALL`].
    pub fn from_bounds(pairs: [(f64, f64); 4]) -> Self {
        let mut bounds = [ChannelBounds { min: 0.0, max: 1.0 }; 4];
        for (i, (min, max)) in pairs.iter().enumerate() {
            bounds[i] = ChannelBounds {
                min: *min,
                max: *max,
            };
        }
        Self {
            bounds,
            version: "inline".to_string(),
            description: String::new(),
        }
    }

    pub fn bounds(&self, variable: BiophysVariable) -> ChannelBounds {
        self.bounds[variable_index(variable)]
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Quadratic uncertainty polynomials `sigma(v) = c0 + c1*v + c2*v^2`,
/// one per TOA variable.
#[derive(Debug, Clone)]
pub struct UncertaintyPolynomials {
    coefficients: [[f64; 3]; 4],
    version: String,
    description: String,
}

impl UncertaintyPolynomials {
    /// Load from a property file. Keys: `<variable>.0/.1/.2`.
    pub fn load<P: AsRef<Path>>(path: P) -> VegResult<Self> {
        let props = PropertyFile::load(path.as_ref())?;
        let mut coefficients = [[0.0; 3]; 4];
        for (i, variable) in BiophysVariable::ALL.iter().enumerate() {
            let (c0, c1, c2) = DEFAULT_UNCERTAINTY_COEFFS[i];
            let defaults = [c0, c1, c2];
            for (order, default) in defaults.iter().enumerate() {
                coefficients[i][order] =
                    props.get_f64_or(&format!("{}.{}", variable.key(), order), *default)?;
            }
        }
        let polys = Self {
            coefficients,
            version: props.get_string_or("version", "unknown"),
            description: props.get_string_or("description", ""),
        };
        log::info!(
            "Loaded uncertainty polynomials {} (version {})",
            props.path,
            polys.version
        );
        Ok(polys)
    }

    pub fn defaults() -> Self {
        let mut coefficients = [[0.0; 3]; 4];
        for (i, (c0, c1, c2)) in DEFAULT_UNCERTAINTY_COEFFS.iter().enumerate() {
            coefficients[i] = [*c0, *c1, *c2];
        }
        Self {
            coefficients,
            version: "builtin".to_string(),
            description: "compile-time defaults".to_string(),
        }
    }

    /// Build from explicit coefficient triples, indexed like
    /// [`BiophysVariable::ALL`].
    pub fn from_coefficients(coefficients: [[f64; 3]; 4]) -> Self {
        Self {
            coefficients,
            version: "inline".to_string(),
            description: String::new(),
        }
    }

    pub fn coefficients(&self, variable: BiophysVariable) -> [f64; 3] {
        self.coefficients[variable_index(variable)]
    }

    /// Evaluate the polynomial for one retrieved value.
    pub fn sigma(&self, variable: BiophysVariable, value: f64) -> f64 {
        let [c0, c1, c2] = self.coefficients(variable);
        c0 + c1 * value + c2 * value * value
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Shared mean/stddev statistics of every TOC input channel.
#[derive(Debug, Clone)]
pub struct TocInputStatistics {
    pub mean: f64,
    pub stddev: f64,
    version: String,
    description: String,
}

impl TocInputStatistics {
    /// Load from a property file. Keys: `input.mean`, `input.stddev`.
    pub fn load<P: AsRef<Path>>(path: P) -> VegResult<Self> {
        let props = PropertyFile::load(path.as_ref())?;
        let stats = Self {
            mean: props.get_f64_or("input.mean", DEFAULT_TOC_INPUT_MEAN)?,
            stddev: props.get_f64_or("input.stddev", DEFAULT_TOC_INPUT_STDDEV)?,
            version: props.get_string_or("version", "unknown"),
            description: props.get_string_or("description", ""),
        };
        log::info!(
            "Loaded TOC input statistics {} (version {})",
            props.path,
            stats.version
        );
        Ok(stats)
    }

    pub fn defaults() -> Self {
        Self {
            mean: DEFAULT_TOC_INPUT_MEAN,
            stddev: DEFAULT_TOC_INPUT_STDDEV,
            version: "builtin".to_string(),
            description: "compile-time defaults".to_string(),
        }
    }

    pub fn new(mean: f64, stddev: f64) -> Self {
        Self {
            mean,
            stddev,
            version: "inline".to_string(),
            description: String::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Full (mean, stddev, min, max) statistics of one TOC output variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableStatistics {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

/// Per-variable statistics of the TOC network outputs.
#[derive(Debug, Clone)]
pub struct TocOutputStatistics {
    statistics: [VariableStatistics; 4],
    version: String,
    description: String,
}

impl TocOutputStatistics {
    /// Load from a property file. Keys: `<variable>.mean/stddev/min/max`.
    pub fn load<P: AsRef<Path>>(path: P) -> VegResult<Self> {
        let props = PropertyFile::load(path.as_ref())?;
        let mut statistics = [VariableStatistics {
            mean: 0.0,
            stddev: 1.0,
            min: 0.0,
            max: 1.0,
        }; 4];
        for (i, variable) in BiophysVariable::ALL.iter().enumerate() {
            let (mean, stddev, min, max) = DEFAULT_TOC_OUTPUT_STATISTICS[i];
            let key = variable.key();
            statistics[i] = VariableStatistics {
                mean: props.get_f64_or(&format!("{}.mean", key), mean)?,
                stddev: props.get_f64_or(&format!("{}.stddev", key), stddev)?,
                min: props.get_f64_or(&format!("{}.min", key), min)?,
                max: props.get_f64_or(&format!("{}.max", key), max)?,
            };
        }
        let stats = Self {
            statistics,
            version: props.get_string_or("version", "unknown"),
            description: props.get_string_or("description", ""),
        };
        log::info!(
            "Loaded TOC output statistics {} (version {})",
            props.path,
            stats.version
        );
        Ok(stats)
    }

    pub fn defaults() -> Self {
        let mut statistics = [VariableStatistics {
            mean: 0.0,
            stddev: 1.0,
            min: 0.0,
            max: 1.0,
        }; 4];
        for (i, (mean, stddev, min, max)) in DEFAULT_TOC_OUTPUT_STATISTICS.iter().enumerate() {
            statistics[i] = VariableStatistics {
                mean: *mean,
                stddev: *stddev,
                min: *min,
                max: *max,
            };
        }
        Self {
            statistics,
            version: "builtin".to_string(),
            description: "compile-time defaults".to_string(),
        }
    }

    /// Build from explicit per-variable statistics, indexed like
    /// [`BiophysVariable::ALL`].
    pub fn from_statistics(statistics: [VariableStatistics; 4]) -> Self {
        Self {
            statistics,
            version: "inline".to_string(),
            description: String::new(),
        }
    }

    pub fn statistics(&self, variable: BiophysVariable) -> VariableStatistics {
        self.statistics[variable_index(variable)]
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Load the global TOC normalisation factor. Key: `norm_factor`.
pub fn load_normalisation_factor<P: AsRef<Path>>(path: P) -> VegResult<f64> {
    let props = PropertyFile::load(path.as_ref())?;
    let factor = props.get_f64_or("norm_factor", DEFAULT_NORMALISATION_FACTOR)?;
    log::info!("Loaded normalisation factor {} from {}", factor, props.path);
    Ok(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file
    }

    #[test]
    fn test_partial_uncertainty_file_falls_back_per_key() {
        // LAI.1 deliberately absent: must fall back to 0.776 while the
        // provided keys and the provenance strings are honored
        let file = write_temp(
            "version = 2.1\n\
             description = campaign uncertainty table\n\
             LAI.0 = 0.1\n\
             LAI.2 = -0.05\n\
             fAPAR.0 = 0.02\n",
        );
        let polys = UncertaintyPolynomials::load(file.path()).unwrap();
        let [c0, c1, c2] = polys.coefficients(BiophysVariable::Lai);
        assert_abs_diff_eq!(c0, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(c1, 0.776, epsilon = 1e-12);
        assert_abs_diff_eq!(c2, -0.05, epsilon = 1e-12);
        assert_eq!(polys.version(), "2.1");
        assert_eq!(polys.description(), "campaign uncertainty table");
    }

    #[test]
    fn test_sigma_polynomial_evaluation() {
        let polys = UncertaintyPolynomials::defaults();
        let value = 3.998863;
        assert_abs_diff_eq!(
            polys.sigma(BiophysVariable::Lai, value),
            0.054 + 0.776 * value - 0.0575 * value * value,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_unparseable_value_is_format_error() {
        let file = write_temp("theta_s.min = banana\n");
        let err = ToaInputStatistics::load(file.path()).unwrap_err();
        match err {
            VegError::InvalidFormat(msg) => {
                assert!(msg.contains("theta_s.min"));
                assert!(msg.contains("banana"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ToaInputStatistics::load("/nonexistent/stats.par").unwrap_err();
        assert!(matches!(err, VegError::Io(_)));
    }

    #[test]
    fn test_toa_input_statistics_channel_order() {
        let file = write_temp(
            "version = 1.4\n\
             theta_s.min = 0.3\n\
             theta_s.max = 1.0\n\
             rho_toa.1.min = 0.06\n\
             rho_toa.1.max = 0.42\n",
        );
        let stats = ToaInputStatistics::load(file.path()).unwrap();
        assert_abs_diff_eq!(stats.theta_s().min, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.channel(0).min, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.channel(0).max, 1.0, epsilon = 1e-12);
        // theta_v missing: default applies
        assert_abs_diff_eq!(stats.theta_v().max, DEFAULT_THETA_V_BOUNDS.1, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.channel(1).max, DEFAULT_THETA_V_BOUNDS.1, epsilon = 1e-12);
        assert_eq!(stats.cos_phi().min, -1.0);
        assert_abs_diff_eq!(stats.band(0).min, 0.06, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.channel(3).min, 0.06, epsilon = 1e-12);
        // last spectral channel defaulted
        assert_abs_diff_eq!(
            stats.channel(15).max,
            DEFAULT_TOA_BAND_BOUNDS[12].1,
            epsilon = 1e-12
        );
        assert_eq!(stats.version(), "1.4");
    }

    #[test]
    fn test_empty_file_yields_all_defaults() {
        let file = write_temp("# nothing but a comment\n");
        let stats = ToaOutputStatistics::load(file.path()).unwrap();
        let lai = stats.bounds(BiophysVariable::Lai);
        assert_abs_diff_eq!(lai.min, DEFAULT_TOA_OUTPUT_BOUNDS[0].0, epsilon = 1e-12);
        assert_abs_diff_eq!(lai.max, DEFAULT_TOA_OUTPUT_BOUNDS[0].1, epsilon = 1e-12);
        assert_eq!(stats.version(), "unknown");
    }

    #[test]
    fn test_toc_statistics_and_factor() {
        let stats_file = write_temp(
            "input.mean = 0.19\n\
             fAPAR.mean = 0.43\n\
             fAPAR.stddev = 0.31\n",
        );
        let input = TocInputStatistics::load(stats_file.path()).unwrap();
        assert_abs_diff_eq!(input.mean, 0.19, epsilon = 1e-12);
        assert_abs_diff_eq!(input.stddev, DEFAULT_TOC_INPUT_STDDEV, epsilon = 1e-12);

        let output = TocOutputStatistics::load(stats_file.path()).unwrap();
        let fapar = output.statistics(BiophysVariable::Fapar);
        assert_abs_diff_eq!(fapar.mean, 0.43, epsilon = 1e-12);
        assert_abs_diff_eq!(fapar.stddev, 0.31, epsilon = 1e-12);
        assert_abs_diff_eq!(fapar.min, DEFAULT_TOC_OUTPUT_STATISTICS[2].2, epsilon = 1e-12);

        let factor_file = write_temp("version = 1.0\n");
        let factor = load_normalisation_factor(factor_file.path()).unwrap();
        assert_abs_diff_eq!(factor, DEFAULT_NORMALISATION_FACTOR, epsilon = 1e-12);
    }

    #[test]
    fn test_line_without_separator_is_format_error() {
        let file = write_temp("just a stray line\n");
        assert!(matches!(
            TocInputStatistics::load(file.path()),
            Err(VegError::InvalidFormat(_))
        ));
    }
}
