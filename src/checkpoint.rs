use std::{
    collections::{BTreeMap, HashMap},
    ffi::OsString,
    fmt, fs,
    path::{Path, PathBuf},
};

use log::{info, warn};
use machine_learning::{
    arch::loss::LossFn,
    builder::Builder,
    optimization::Optimizer,
    specs::{LossFnSpec, OptimizerSpec},
};
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{
    NnueErr, Result,
    config::TrainConfig,
    network::{Network, Topology},
};

const FORMAT: &str = "connect4-nnue";
const VERSION: &str = "1";

const META_FORMAT: &str = "format";
const META_VERSION: &str = "version";
const META_TOPOLOGY: &str = "topology";
const META_OPTIMIZER: &str = "optimizer";
const META_LOSS: &str = "loss";

const OPTIMIZER_PREFIX: &str = "optimizer.";
const TORCH_PREFIX: &str = "seq_stack.";

/// Where the state of a loaded checkpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// There was no file, everything was freshly built from the configuration.
    Fresh,
    /// A file written by `CheckpointStore::save`.
    Native,
    /// A file without metadata, its shape was inferred from the tensors.
    Legacy,
}

/// Everything a training run resumes from.
pub struct Checkpoint {
    pub network: Network,
    pub optimizer: Box<dyn Optimizer>,
    pub loss: Box<dyn LossFn>,
    pub origin: Origin,
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint")
            .field("topology", self.network.topology())
            .field("optimizer", &self.optimizer.spec())
            .field("loss", &self.loss.spec())
            .field("origin", &self.origin)
            .finish()
    }
}

/// Persists networks as safetensors files.
///
/// Layer `i` is stored as `network.layers.{i}.weight` (`[in, out]`) and
/// `network.layers.{i}.bias` (`[out]`), optimizer buffers as `optimizer.{name}`. The topology,
/// optimizer and loss specs go in the metadata as JSON.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writes the whole checkpoint to a sibling temporary file and renames it into place.
    ///
    /// # Arguments
    /// * `network` - The network to persist.
    /// * `optimizer` - The optimizer, its spec and state buffers get persisted.
    /// * `loss` - The loss function, only its spec gets persisted.
    pub fn save(
        &self,
        network: &Network,
        optimizer: Option<&dyn Optimizer>,
        loss: Option<&dyn LossFn>,
    ) -> Result<()> {
        let mut tensors: Vec<(String, Vec<usize>, Vec<u8>)> = Vec::new();

        for (i, layer) in network.layers().into_iter().enumerate() {
            let (fan_in, fan_out) = layer.dim;
            tensors.push((
                format!("network.layers.{i}.weight"),
                vec![fan_in, fan_out],
                to_bytes(layer.weights),
            ));
            tensors.push((
                format!("network.layers.{i}.bias"),
                vec![fan_out],
                to_bytes(layer.biases),
            ));
        }

        let mut metadata = HashMap::from([
            (META_FORMAT.to_string(), FORMAT.to_string()),
            (META_VERSION.to_string(), VERSION.to_string()),
            (
                META_TOPOLOGY.to_string(),
                serde_json::to_string(network.topology())?,
            ),
        ]);

        if let Some(optimizer) = optimizer {
            metadata.insert(
                META_OPTIMIZER.to_string(),
                serde_json::to_string(&optimizer.spec())?,
            );

            for (name, values) in optimizer.state() {
                tensors.push((
                    format!("{OPTIMIZER_PREFIX}{name}"),
                    vec![values.len()],
                    to_bytes(&values),
                ));
            }
        }

        if let Some(loss) = loss {
            metadata.insert(META_LOSS.to_string(), serde_json::to_string(&loss.spec())?);
        }

        let mut views = Vec::with_capacity(tensors.len());
        for (name, shape, data) in &tensors {
            let view = TensorView::new(Dtype::F32, shape.clone(), data)?;
            views.push((name.as_str(), view));
        }

        let bytes = safetensors::serialize(views, &Some(metadata))?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("checkpoint"));
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;

        info!(
            "saved {} parameters to {}",
            network.size(),
            self.path.display()
        );
        Ok(())
    }

    /// Loads the checkpoint, or builds a fresh one if there's no file.
    ///
    /// # Arguments
    /// * `config` - Provides the topology and seed of a fresh network, and the optimizer and
    ///   loss to use when the file doesn't name them.
    ///
    /// # Returns
    /// A `Checkpoint` error if the file exists but can't be read or doesn't describe a
    /// consistent network.
    pub fn load(&self, config: &TrainConfig) -> Result<Checkpoint> {
        let builder = Builder::new();

        if !self.path.exists() {
            let topology = Topology::new(config.encoder()?.width(), config.hidden.clone());
            let network = Network::new(topology, config.seed)?;
            info!(
                "no checkpoint at {}, starting from a fresh network",
                self.path.display()
            );

            return Ok(Checkpoint {
                optimizer: builder.optimizer(config.optimizer, network.size()),
                loss: builder.loss_fn(config.loss),
                network,
                origin: Origin::Fresh,
            });
        }

        let bytes = fs::read(&self.path)?;
        let (_, header) =
            SafeTensors::read_metadata(&bytes).map_err(|e| self.incompatible(e.to_string()))?;
        let tensors =
            SafeTensors::deserialize(&bytes).map_err(|e| self.incompatible(e.to_string()))?;

        let metadata = header.metadata().clone().unwrap_or_default();

        let Some(format) = metadata.get(META_FORMAT) else {
            return self.load_legacy(&tensors, config);
        };

        if format != FORMAT {
            return Err(self.incompatible(format!("unknown format `{format}`")));
        }

        let topology: Topology = self.parse_meta(&metadata, META_TOPOLOGY)?.ok_or_else(|| {
            self.incompatible(format!("missing `{META_TOPOLOGY}` metadata"))
        })?;

        let mut params = Vec::with_capacity(topology.size());
        for (i, (fan_in, fan_out)) in topology.dims().into_iter().enumerate() {
            let weight = format!("network.layers.{i}.weight");
            let bias = format!("network.layers.{i}.bias");

            params.extend(self.read_tensor(&tensors, &weight, &[fan_in, fan_out])?);
            params.extend(self.read_tensor(&tensors, &bias, &[fan_out])?);
        }

        let network = Network::from_params(topology, params)?;

        let optimizer = match self.parse_meta::<OptimizerSpec>(&metadata, META_OPTIMIZER)? {
            Some(spec) => {
                let mut optimizer = builder.optimizer(spec, network.size());

                for name in tensors.names() {
                    let Some(buffer) = name.strip_prefix(OPTIMIZER_PREFIX) else {
                        continue;
                    };

                    let values = self.read_any(&tensors, name)?;
                    optimizer
                        .load_state(buffer, &values)
                        .map_err(|e| self.incompatible(e.to_string()))?;
                }

                optimizer
            }
            None => builder.optimizer(config.optimizer, network.size()),
        };

        let loss = match self.parse_meta::<LossFnSpec>(&metadata, META_LOSS)? {
            Some(spec) => builder.loss_fn(spec),
            None => builder.loss_fn(config.loss),
        };

        info!(
            "loaded {} parameters from {}",
            network.size(),
            self.path.display()
        );

        Ok(Checkpoint {
            network,
            optimizer,
            loss,
            origin: Origin::Native,
        })
    }

    /// Rebuilds a network from a file without metadata, inferring the layers from the tensor
    /// shapes. Tensors named `seq_stack.{k}.weight` are `[out, in]` and get transposed.
    fn load_legacy(&self, tensors: &SafeTensors, config: &TrainConfig) -> Result<Checkpoint> {
        let torch = tensors
            .names()
            .iter()
            .any(|name| name.starts_with(TORCH_PREFIX));

        let (prefix, transposed) = match torch {
            true => (TORCH_PREFIX, true),
            false => ("network.layers.", false),
        };

        // layer index -> weight tensor name, in numeric order
        let mut layers = BTreeMap::new();
        for name in tensors.names() {
            let Some(idx) = name
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(".weight"))
                .and_then(|idx| idx.parse::<usize>().ok())
            else {
                continue;
            };

            layers.insert(idx, name.clone());
        }

        if layers.is_empty() {
            return Err(self.incompatible("no layer tensors found"));
        }

        let mut dims = Vec::with_capacity(layers.len());
        let mut params = Vec::new();

        for (idx, weight) in &layers {
            let view = tensors
                .tensor(weight)
                .map_err(|e| self.incompatible(e.to_string()))?;

            let &[rows, cols] = view.shape() else {
                return Err(self.incompatible(format!("`{weight}` is not a matrix")));
            };

            let (fan_in, fan_out) = if transposed { (cols, rows) } else { (rows, cols) };
            let values = self.read_tensor(tensors, weight, &[rows, cols])?;

            if transposed {
                // [out, in] -> [in, out]
                params.extend(
                    (0..fan_in * fan_out).map(|k| values[(k % fan_out) * fan_in + k / fan_out]),
                );
            } else {
                params.extend(values);
            }

            let bias = format!("{prefix}{idx}.bias");
            params.extend(self.read_tensor(tensors, &bias, &[fan_out])?);
            dims.push((fan_in, fan_out));
        }

        let chained = dims.windows(2).all(|w| w[0].1 == w[1].0);
        if !chained || dims.last().map(|d| d.1) != Some(1) {
            return Err(self.incompatible(format!("layers {dims:?} don't chain into a scalar")));
        }

        let topology = Topology::new(
            dims[0].0,
            dims[..dims.len() - 1].iter().map(|d| d.1).collect(),
        );
        let network = Network::from_params(topology, params)?;

        warn!(
            "{} has no metadata, imported it as {:?} with the configured optimizer and loss",
            self.path.display(),
            network.topology()
        );

        let builder = Builder::new();
        Ok(Checkpoint {
            optimizer: builder.optimizer(config.optimizer, network.size()),
            loss: builder.loss_fn(config.loss),
            network,
            origin: Origin::Legacy,
        })
    }

    fn parse_meta<T: serde::de::DeserializeOwned>(
        &self,
        metadata: &HashMap<String, String>,
        key: &str,
    ) -> Result<Option<T>> {
        metadata
            .get(key)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(|e| self.incompatible(format!("bad `{key}` metadata: {e}")))
    }

    /// Reads an f32 tensor checking its shape.
    fn read_tensor(&self, tensors: &SafeTensors, name: &str, shape: &[usize]) -> Result<Vec<f32>> {
        let view = tensors
            .tensor(name)
            .map_err(|e| self.incompatible(format!("`{name}`: {e}")))?;

        if view.shape() != shape {
            return Err(self.incompatible(format!(
                "`{name}` has shape {:?}, expected {shape:?}",
                view.shape()
            )));
        }

        self.read_any(tensors, name)
    }

    /// Reads an f32 tensor of any shape.
    fn read_any(&self, tensors: &SafeTensors, name: &str) -> Result<Vec<f32>> {
        let view = tensors
            .tensor(name)
            .map_err(|e| self.incompatible(format!("`{name}`: {e}")))?;

        if view.dtype() != Dtype::F32 {
            return Err(self.incompatible(format!(
                "`{name}` is {:?}, expected F32",
                view.dtype()
            )));
        }

        let data = view.data();
        let values = match bytemuck::try_cast_slice::<u8, f32>(data) {
            Ok(values) => values.to_vec(),
            Err(_) => data
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned::<f32>)
                .collect(),
        };

        Ok(values)
    }

    fn incompatible(&self, reason: impl Into<String>) -> NnueErr {
        NnueErr::Checkpoint {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

/// Safetensors data is little endian, as on every target this runs on.
fn to_bytes(values: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(values).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip() {
        let values = [1.5f32, -0.25, f32::MIN_POSITIVE];
        let bytes = to_bytes(&values);

        assert_eq!(bytes.len(), 12);
        let back: Vec<f32> = bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect();
        assert_eq!(back, values);
    }
}
