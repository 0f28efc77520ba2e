//! Processor configuration files.
//!
//! A configuration is a flat XML document: a root tag holding repeated
//! `<Parameter name=".." value=".."/>` elements whose values name the
//! auxiliary files of one retrieval variant, resolved against an
//! auxiliary-data install directory. The document is parsed into a map and
//! the required parameter categories are validated in one pass; a missing
//! category fails the whole load naming it.

use crate::types::{VegError, VegResult};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(rename = "Parameter", default)]
    parameters: Vec<Parameter>,
}

#[derive(Debug, Deserialize)]
struct Parameter {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value")]
    value: String,
}

fn parse_parameter_map(xml_path: &Path) -> VegResult<HashMap<String, String>> {
    let content = std::fs::read_to_string(xml_path)?;
    let document: ConfigDocument = from_str(&content).map_err(|e| {
        VegError::XmlParsing(format!("configuration {}: {}", xml_path.display(), e))
    })?;
    let mut map = HashMap::new();
    for parameter in document.parameters {
        map.insert(parameter.name, parameter.value);
    }
    Ok(map)
}

fn require_path(
    map: &HashMap<String, String>,
    xml_path: &Path,
    auxdata_dir: &Path,
    category: &str,
) -> VegResult<PathBuf> {
    map.get(category)
        .map(|value| auxdata_dir.join(value))
        .ok_or_else(|| {
            VegError::Configuration(format!(
                "configuration {} is missing the required parameter '{}'",
                xml_path.display(),
                category
            ))
        })
}

/// Resolved auxiliary file paths of the TOA retrieval.
#[derive(Debug, Clone)]
pub struct ToaProcessorConfig {
    pub input_statistics: PathBuf,
    pub output_statistics: PathBuf,
    pub uncertainty: PathBuf,
    pub nn_lai: PathBuf,
    pub nn_fcover: PathBuf,
    pub nn_fapar: PathBuf,
    pub nn_lai_x_cab: PathBuf,
}

impl ToaProcessorConfig {
    /// Parse and validate a TOA configuration. Every path is resolved
    /// against `auxdata_dir`.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(xml_path: P, auxdata_dir: Q) -> VegResult<Self> {
        let xml_path = xml_path.as_ref();
        let auxdata_dir = auxdata_dir.as_ref();
        log::info!("Loading TOA processor configuration {}", xml_path.display());

        let map = parse_parameter_map(xml_path)?;
        let config = Self {
            input_statistics: require_path(&map, xml_path, auxdata_dir, "input_statistics")?,
            output_statistics: require_path(&map, xml_path, auxdata_dir, "output_statistics")?,
            uncertainty: require_path(&map, xml_path, auxdata_dir, "uncertainty")?,
            nn_lai: require_path(&map, xml_path, auxdata_dir, "nn_LAI")?,
            nn_fcover: require_path(&map, xml_path, auxdata_dir, "nn_fCover")?,
            nn_fapar: require_path(&map, xml_path, auxdata_dir, "nn_fAPAR")?,
            nn_lai_x_cab: require_path(&map, xml_path, auxdata_dir, "nn_LAIxCab")?,
        };
        log::debug!("TOA configuration resolved: {:?}", config);
        Ok(config)
    }
}

/// Resolved auxiliary file paths of the TOC retrieval.
#[derive(Debug, Clone)]
pub struct TocProcessorConfig {
    pub normalisation_factor: PathBuf,
    pub input_statistics: PathBuf,
    pub output_statistics: PathBuf,
    pub nn: PathBuf,
}

impl TocProcessorConfig {
    /// Parse and validate a TOC configuration. Every path is resolved
    /// against `auxdata_dir`.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(xml_path: P, auxdata_dir: Q) -> VegResult<Self> {
        let xml_path = xml_path.as_ref();
        let auxdata_dir = auxdata_dir.as_ref();
        log::info!("Loading TOC processor configuration {}", xml_path.display());

        let map = parse_parameter_map(xml_path)?;
        let config = Self {
            normalisation_factor: require_path(&map, xml_path, auxdata_dir, "normalisation_factor")?,
            input_statistics: require_path(&map, xml_path, auxdata_dir, "input_statistics")?,
            output_statistics: require_path(&map, xml_path, auxdata_dir, "output_statistics")?,
            nn: require_path(&map, xml_path, auxdata_dir, "nn_TOC")?,
        };
        log::debug!("TOC configuration resolved: {:?}", config);
        Ok(config)
    }
}
