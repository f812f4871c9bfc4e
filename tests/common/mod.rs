#![allow(dead_code)]

use blocksync::node_kind::NUMBER_FIELD;
use blocksync::program::{input_source, FieldValue, NodeId};
use blocksync::{ProgramGraph, SyncConfig, Workspace};
use glam::Vec3;

pub const EPSILON: f32 = 1e-4;

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() <= EPSILON
}

pub fn approx_vec(a: Vec3, b: Vec3) -> bool {
    approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
}

pub fn workspace() -> Workspace {
    Workspace::new(SyncConfig {
        random_seed: Some(42),
        ..Default::default()
    })
}

/// Write a number into the shadow feeding `input`.
pub fn set_number(graph: &mut ProgramGraph, node: NodeId, input: &str, value: f64) {
    let source = input_source(graph, node, input).expect("input has a source");
    graph
        .edit_field(source, NUMBER_FIELD, FieldValue::Number(value))
        .expect("number edit");
}
