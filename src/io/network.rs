//! Feed-forward network loader and evaluator.
//!
//! Model files are plain text: `#` comment lines, a `topology:` line listing
//! the layer widths (input, hidden..., output), then for every layer its
//! `out x in` weights in row-major order followed by `out` biases, all
//! whitespace separated. Hidden layers use tanh activations, the output
//! layer is linear.

use crate::types::{VegError, VegResult};
use ndarray::{Array1, Array2};
use std::path::Path;

/// One fully-connected layer.
#[derive(Debug, Clone)]
struct Layer {
    /// `out x in` weight matrix.
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// A trained feed-forward network, loaded once and evaluated per pixel.
///
/// Evaluation is a pure function of the weights and the input vector and
/// allocates its scratch buffers per call, so one loaded model may be shared
/// across worker threads.
#[derive(Debug, Clone)]
pub struct FeedForwardNet {
    layers: Vec<Layer>,
    input_size: usize,
    output_size: usize,
}

impl FeedForwardNet {
    /// Load a trained network from a model file.
    pub fn load<P: AsRef<Path>>(path: P) -> VegResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading network model: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let net = Self::from_str(&content).map_err(|e| {
            VegError::InvalidFormat(format!("network model {}: {}", path.display(), e))
        })?;
        log::info!(
            "Loaded network {} ({} -> {} with {} layers)",
            path.display(),
            net.input_size,
            net.output_size,
            net.layers.len()
        );
        Ok(net)
    }

    /// Parse a network from its textual model format.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> VegResult<Self> {
        // strip comments, then split the file into the topology line and the
        // weight tokens that follow it
        let mut widths: Vec<usize> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        let mut seen_topology = false;
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if !seen_topology {
                let rest = line.strip_prefix("topology:").ok_or_else(|| {
                    VegError::InvalidFormat(
                        "model file must start with a 'topology:' line".to_string(),
                    )
                })?;
                for token in rest.split_whitespace() {
                    let w = token.parse::<usize>().map_err(|_| {
                        VegError::InvalidFormat(format!("unparseable layer width '{}'", token))
                    })?;
                    widths.push(w);
                }
                seen_topology = true;
                continue;
            }
            for token in line.split_whitespace() {
                let value = token.parse::<f64>().map_err(|_| {
                    VegError::InvalidFormat(format!("unparseable weight value '{}'", token))
                })?;
                values.push(value);
            }
        }

        if widths.len() < 2 {
            return Err(VegError::InvalidFormat(format!(
                "topology needs at least an input and an output width, got {:?}",
                widths
            )));
        }
        if widths.iter().any(|w| *w == 0) {
            return Err(VegError::InvalidFormat(
                "topology widths must be non-zero".to_string(),
            ));
        }

        let expected: usize = widths.windows(2).map(|w| w[1] * w[0] + w[1]).sum();
        if values.len() != expected {
            return Err(VegError::InvalidFormat(format!(
                "expected {} weight values for topology {:?}, found {}",
                expected,
                widths,
                values.len()
            )));
        }

        let mut layers = Vec::with_capacity(widths.len() - 1);
        let mut offset = 0;
        for w in widths.windows(2) {
            let (n_in, n_out) = (w[0], w[1]);
            let weights =
                Array2::from_shape_vec((n_out, n_in), values[offset..offset + n_out * n_in].to_vec())
                    .map_err(|e| VegError::InvalidFormat(format!("weight shape: {}", e)))?;
            offset += n_out * n_in;
            let bias = Array1::from_vec(values[offset..offset + n_out].to_vec());
            offset += n_out;
            layers.push(Layer { weights, bias });
        }

        Ok(Self {
            input_size: widths[0],
            output_size: *widths.last().unwrap(),
            layers,
        })
    }

    /// Width of the input vector this model was trained on.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Width of the output vector this model produces.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Map an input vector to an output vector.
    ///
    /// `input.len()` must equal [`input_size`](Self::input_size); a mismatch
    /// is a caller contract violation and panics rather than truncating.
    pub fn evaluate(&self, input: &[f64]) -> Vec<f64> {
        assert_eq!(
            input.len(),
            self.input_size,
            "network input width mismatch: model expects {}, caller passed {}",
            self.input_size,
            input.len()
        );

        let mut activation = Array1::from_vec(input.to_vec());
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = layer.weights.dot(&activation) + &layer.bias;
            if i != last {
                z.mapv_inplace(f64::tanh);
            }
            activation = z;
        }
        activation.to_vec()
    }
}
