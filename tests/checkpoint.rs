use std::{collections::HashMap, fs};

use connect4_nnue::{
    NnueErr,
    checkpoint::{CheckpointStore, Origin},
    config::TrainConfig,
    network::{Network, Topology},
};
use machine_learning::{
    arch::loss::{LossFn, Mae},
    optimization::{Adam, GradientDescentWithMomentum, Optimizer},
    specs::{LossFnSpec, OptimizerSpec},
};
use safetensors::{Dtype, tensor::TensorView};
use tempfile::tempdir;

fn config() -> TrainConfig {
    TrainConfig {
        hidden: vec![8, 4],
        seed: 9,
        ..Default::default()
    }
}

fn write_raw(path: &std::path::Path, tensors: &[(&str, Vec<usize>, Vec<f32>)]) {
    let bytes: Vec<(String, Vec<usize>, Vec<u8>)> = tensors
        .iter()
        .map(|(name, shape, values)| {
            let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            (name.to_string(), shape.clone(), data)
        })
        .collect();

    let views: Vec<_> = bytes
        .iter()
        .map(|(name, shape, data)| {
            (
                name.as_str(),
                TensorView::new(Dtype::F32, shape.clone(), data).unwrap(),
            )
        })
        .collect();

    let out = safetensors::serialize(views, &None::<HashMap<String, String>>).unwrap();
    fs::write(path, out).unwrap();
}

#[test]
fn missing_files_start_fresh() {
    let dir = tempdir().unwrap();
    let config = config();
    let store = CheckpointStore::new(dir.path().join("model.safetensors"));

    let checkpoint = store.load(&config).unwrap();
    let fresh = Network::new(Topology::new(98, vec![8, 4]), 9).unwrap();

    assert_eq!(checkpoint.origin, Origin::Fresh);
    assert_eq!(checkpoint.network.topology(), fresh.topology());
    assert_eq!(checkpoint.network.size(), fresh.size());
    assert_eq!(checkpoint.network.params(), fresh.params());
    assert_eq!(checkpoint.optimizer.spec(), config.optimizer);
    assert_eq!(checkpoint.loss.spec(), config.loss);
}

#[test]
fn save_then_load_is_exact() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("model.safetensors"));

    let network = Network::new(Topology::new(98, vec![16, 8]), 3).unwrap();
    let mut optimizer = Adam::new(network.size(), 1e-3, 0.9, 0.999, 1e-8);
    let mut params = network.params().to_vec();
    let grad: Vec<f32> = (0..network.size()).map(|i| (i % 7) as f32 * 0.1).collect();
    optimizer.update_params(&grad, &mut params).unwrap();

    store
        .save(&network, Some(&optimizer), Some(&Mae))
        .unwrap();

    let loaded = store.load(&config()).unwrap();

    assert_eq!(loaded.origin, Origin::Native);
    assert_eq!(loaded.network.topology(), network.topology());
    assert_eq!(loaded.network.params(), network.params());
    assert_eq!(loaded.optimizer.spec(), optimizer.spec());
    assert_eq!(loaded.optimizer.state(), optimizer.state());
    assert_eq!(loaded.loss.spec(), LossFnSpec::Mae);
    assert!(!dir.path().join("model.safetensors.tmp").exists());
}

#[test]
fn missing_optional_parts_use_the_configuration() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("model.safetensors"));
    let network = Network::new(Topology::new(98, vec![4]), 1).unwrap();

    store.save(&network, None, None).unwrap();

    let config = TrainConfig {
        optimizer: OptimizerSpec::GradientDescent { learning_rate: 0.3 },
        loss: LossFnSpec::Mae,
        ..config()
    };
    let loaded = store.load(&config).unwrap();

    assert_eq!(loaded.network.params(), network.params());
    assert_eq!(loaded.optimizer.spec(), config.optimizer);
    assert_eq!(loaded.loss.spec(), LossFnSpec::Mae);
}

#[test]
fn checkpoints_are_rewritten_whole() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("model.safetensors"));

    let big = Network::new(Topology::new(98, vec![32, 16]), 1).unwrap();
    let small = Network::new(Topology::new(98, vec![2]), 2).unwrap();
    let momentum = GradientDescentWithMomentum::new(big.size(), 0.1, 0.9);

    store.save(&big, Some(&momentum), None).unwrap();
    store.save(&small, None, Some(&Mae as &dyn LossFn)).unwrap();

    let loaded = store.load(&config()).unwrap();
    assert_eq!(loaded.network.topology(), small.topology());
    assert_eq!(loaded.network.params(), small.params());
}

#[test]
fn garbage_is_an_error_not_a_cold_start() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.safetensors");
    fs::write(&path, b"definitely not safetensors").unwrap();

    let err = CheckpointStore::new(&path).load(&config()).unwrap_err();
    assert!(matches!(err, NnueErr::Checkpoint { .. }), "{err}");
}

#[test]
fn mismatched_optimizer_state_is_incompatible() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("model.safetensors"));
    let network = Network::new(Topology::new(98, vec![4]), 1).unwrap();
    let optimizer = Adam::new(network.size() + 1, 1e-3, 0.9, 0.999, 1e-8);

    store.save(&network, Some(&optimizer), None).unwrap();

    let err = store.load(&config()).unwrap_err();
    assert!(matches!(err, NnueErr::Checkpoint { .. }), "{err}");
}

#[test]
fn files_without_metadata_infer_their_topology() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy.safetensors");

    write_raw(
        &path,
        &[
            ("network.layers.0.weight", vec![3, 2], vec![1., 2., 3., 4., 5., 6.]),
            ("network.layers.0.bias", vec![2], vec![0.5, -0.5]),
            ("network.layers.1.weight", vec![2, 1], vec![7., 8.]),
            ("network.layers.1.bias", vec![1], vec![9.]),
        ],
    );

    let loaded = CheckpointStore::new(&path).load(&config()).unwrap();

    assert_eq!(loaded.origin, Origin::Legacy);
    assert_eq!(loaded.network.topology(), &Topology::new(3, vec![2]));
    assert_eq!(
        loaded.network.params(),
        &[1., 2., 3., 4., 5., 6., 0.5, -0.5, 7., 8., 9.]
    );
}

#[test]
fn torch_layers_are_transposed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.safetensors");

    // nn.Sequential(Linear(3, 2), ReLU(), Linear(2, 1))
    write_raw(
        &path,
        &[
            ("seq_stack.0.weight", vec![2, 3], vec![1., 2., 3., 4., 5., 6.]),
            ("seq_stack.0.bias", vec![2], vec![0., 1.]),
            ("seq_stack.2.weight", vec![1, 2], vec![-1., 1.]),
            ("seq_stack.2.bias", vec![1], vec![0.25]),
        ],
    );

    let loaded = CheckpointStore::new(&path).load(&config()).unwrap();
    let layers = loaded.network.layers();

    assert_eq!(loaded.origin, Origin::Legacy);
    assert_eq!(loaded.network.topology(), &Topology::new(3, vec![2]));
    assert_eq!(layers[0].weights, &[1., 4., 2., 5., 3., 6.]);
    assert_eq!(layers[0].biases, &[0., 1.]);
    assert_eq!(layers[1].weights, &[-1., 1.]);
    assert_eq!(layers[1].biases, &[0.25]);
}

#[test]
fn legacy_layers_must_chain() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.safetensors");

    write_raw(
        &path,
        &[
            ("network.layers.0.weight", vec![3, 2], vec![0.; 6]),
            ("network.layers.0.bias", vec![2], vec![0.; 2]),
            ("network.layers.1.weight", vec![5, 1], vec![0.; 5]),
            ("network.layers.1.bias", vec![1], vec![0.]),
        ],
    );

    let err = CheckpointStore::new(&path).load(&config()).unwrap_err();
    assert!(matches!(err, NnueErr::Checkpoint { .. }), "{err}");
}
