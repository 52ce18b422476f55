//! Integration tests for the refinement artifact bundle.
//!
//! Builds real on-disk bundles (edge list, safetensors checkpoint,
//! calibration) in a temp directory and drives them through the same
//! loader the pipeline uses, including the corruption modes that must
//! downgrade the system to classifier-only mode.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};
use emograph::pipeline::{load_refinement, load_refinement_or_degrade};
use emograph::EmotionPipeline;
use tempfile::TempDir;

const NUM_LABELS: usize = 3;
const HIDDEN: usize = 4;

/// Capture load-time warnings during tests (`RUST_LOG=emograph=warn`).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("write fixture");
}

/// Write a complete, well-formed gnn/ bundle under `dir`.
fn write_gnn_bundle(dir: &Path) {
    let gnn = dir.join("gnn");
    std::fs::create_dir_all(&gnn).expect("mkdir gnn");

    write(&gnn, "edge_index.json", "[[0,1],[1,0],[1,2],[2,1]]");
    write(&gnn, "edge_weight.json", "[0.6,0.6,0.3,0.3]");
    write(
        &gnn,
        "calibration.json",
        r#"{"version": "cal-2", "per_label_thresholds": [0.8, 0.95, 0.7], "global_threshold": 0.9}"#,
    );

    let device = Device::Cpu;
    let mut tensors = HashMap::new();
    tensors.insert(
        "gcn1.lin.weight".to_string(),
        Tensor::from_vec(vec![0.0f32; HIDDEN], (HIDDEN, 1), &device).expect("w1"),
    );
    tensors.insert(
        "gcn1.bias".to_string(),
        Tensor::from_vec(vec![0.0f32; HIDDEN], HIDDEN, &device).expect("b1"),
    );
    tensors.insert(
        "gcn2.lin.weight".to_string(),
        Tensor::from_vec(vec![0.0f32; HIDDEN], (1, HIDDEN), &device).expect("w2"),
    );
    tensors.insert(
        "gcn2.bias".to_string(),
        Tensor::from_vec(vec![1.0f32], 1, &device).expect("b2"),
    );
    candle_core::safetensors::save(&tensors, gnn.join("model.safetensors")).expect("save");
}

#[test]
fn well_formed_bundle_loads_and_refines() {
    let tmp = TempDir::new().expect("tempdir");
    write_gnn_bundle(tmp.path());

    let (refiner, calibration) =
        load_refinement(tmp.path(), NUM_LABELS, &Device::Cpu).expect("load refinement");

    assert_eq!(refiner.num_nodes(), NUM_LABELS);
    assert_eq!(calibration.version.as_deref(), Some("cal-2"));
    assert_eq!(calibration.threshold_for(1), 0.95);

    // The checkpoint zeroes everything except the layer-2 bias of 1.0, so
    // the delta is exactly 1.0 per node and refined = logit + 0.5.
    let logits = vec![0.0, 2.0, -1.0];
    let refined = refiner.refine(&logits).expect("refine");
    for (r, l) in refined.iter().zip(&logits) {
        assert!((r - (l + 0.5)).abs() < 1e-6);
    }
}

#[test]
fn batch_refinement_preserves_row_order() {
    let tmp = TempDir::new().expect("tempdir");
    write_gnn_bundle(tmp.path());
    let (refiner, _) =
        load_refinement(tmp.path(), NUM_LABELS, &Device::Cpu).expect("load refinement");

    let rows = vec![vec![1.0, 0.0, -1.0], vec![5.0, 5.0, 5.0]];
    let refined = refiner.refine_batch(&rows).expect("refine batch");
    assert_eq!(refined.len(), 2);
    // Residual keeps rows recognizably tied to their inputs.
    assert!((refined[0][0] - 1.5).abs() < 1e-6);
    assert!((refined[1][0] - 5.5).abs() < 1e-6);
}

#[test]
fn missing_bundle_is_an_error_for_the_loader() {
    let tmp = TempDir::new().expect("tempdir");
    // The pipeline absorbs this error and downgrades; the loader itself
    // must report it.
    assert!(load_refinement(tmp.path(), NUM_LABELS, &Device::Cpu).is_err());
}

#[test]
fn missing_checkpoint_fails_the_load() {
    let tmp = TempDir::new().expect("tempdir");
    write_gnn_bundle(tmp.path());
    std::fs::remove_file(tmp.path().join("gnn/model.safetensors")).expect("remove");

    assert!(load_refinement(tmp.path(), NUM_LABELS, &Device::Cpu).is_err());
}

#[test]
fn corrupt_edge_list_fails_the_load() {
    let tmp = TempDir::new().expect("tempdir");
    write_gnn_bundle(tmp.path());
    write(&tmp.path().join("gnn"), "edge_index.json", "not json");

    assert!(load_refinement(tmp.path(), NUM_LABELS, &Device::Cpu).is_err());
}

#[test]
fn calibration_shape_mismatch_fails_the_load() {
    let tmp = TempDir::new().expect("tempdir");
    write_gnn_bundle(tmp.path());
    // Four thresholds against three labels.
    write(
        &tmp.path().join("gnn"),
        "calibration.json",
        r#"{"per_label_thresholds": [0.8, 0.95, 0.7, 0.5], "global_threshold": 0.9}"#,
    );

    assert!(load_refinement(tmp.path(), NUM_LABELS, &Device::Cpu).is_err());
}

#[test]
fn edge_out_of_label_range_fails_the_load() {
    let tmp = TempDir::new().expect("tempdir");
    write_gnn_bundle(tmp.path());
    write(&tmp.path().join("gnn"), "edge_index.json", "[[0,7]]");

    assert!(load_refinement(tmp.path(), NUM_LABELS, &Device::Cpu).is_err());
}

#[test]
fn healthy_bundle_passes_the_fault_boundary() {
    init_tracing();
    let tmp = TempDir::new().expect("tempdir");
    write_gnn_bundle(tmp.path());

    let (refiner, calibration) = load_refinement_or_degrade(tmp.path(), NUM_LABELS, &Device::Cpu);
    assert!(refiner.is_some());
    assert!(calibration.is_some());
}

#[test]
fn corrupt_bundle_downgrades_instead_of_failing() {
    init_tracing();
    let tmp = TempDir::new().expect("tempdir");
    write_gnn_bundle(tmp.path());
    write(&tmp.path().join("gnn"), "edge_index.json", "not json");

    // The boundary absorbs the error: no panic, no Err, refinement and
    // calibration simply unavailable. Downstream, `decide` with no
    // calibration filters on the caller floor alone, so predictions
    // still work in this degraded mode.
    let (refiner, calibration) = load_refinement_or_degrade(tmp.path(), NUM_LABELS, &Device::Cpu);
    assert!(refiner.is_none());
    assert!(calibration.is_none());
}

#[test]
fn absent_bundle_downgrades_instead_of_failing() {
    init_tracing();
    let tmp = TempDir::new().expect("tempdir");

    let (refiner, calibration) = load_refinement_or_degrade(tmp.path(), NUM_LABELS, &Device::Cpu);
    assert!(refiner.is_none());
    assert!(calibration.is_none());
}

#[test]
fn pipeline_load_without_classifier_is_fatal() {
    let tmp = TempDir::new().expect("tempdir");
    // A perfectly healthy refinement bundle does not rescue a missing
    // classifier — there is no degraded mode without one.
    write_gnn_bundle(tmp.path());

    assert!(EmotionPipeline::load(tmp.path()).is_err());
}
