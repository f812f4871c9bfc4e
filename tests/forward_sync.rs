mod common;

use blocksync::node_kind::{NodeKind, COLOR_FIELD, MODEL_FIELD, NUMBER_FIELD};
use blocksync::program::{FieldValue, GraphHost};
use blocksync::sync_diagnostics::SyncIssueKind;
use blocksync::{SceneGraph, SyncConfig, SyncEngine};
use common::{approx, approx_vec, set_number, workspace};
use glam::Vec3;
use rstest::rstest;

#[rstest]
#[case(4.0)]
#[case(0.5)]
#[case(2.0)]
fn width_edit_resizes_in_place(#[case] width: f64) {
    let mut ws = workspace();
    let cube = ws.graph.add_node_with_shadows(NodeKind::CreateBox);
    set_number(&mut ws.graph, cube, "WIDTH", 2.0);
    set_number(&mut ws.graph, cube, "HEIGHT", 3.0);
    set_number(&mut ws.graph, cube, "Y", 0.75);
    set_number(&mut ws.graph, cube, "X", -1.0);
    ws.pump();
    let entity = ws.engine.entity_for(&ws.scene, cube).unwrap();
    let before = ws.scene.world_bounds(entity).unwrap();
    assert!(approx_vec(before.size(), Vec3::new(2.0, 3.0, 1.0)));

    set_number(&mut ws.graph, cube, "WIDTH", width);
    ws.pump();

    assert_eq!(ws.engine.entity_for(&ws.scene, cube), Some(entity));
    let after = ws.scene.world_bounds(entity).unwrap();
    assert!(approx_vec(after.size(), Vec3::new(width as f32, 3.0, 1.0)));
    assert!(approx(after.min.y, before.min.y));
    assert!(approx(after.center().x, -1.0));
    // The live scale stays at identity; the size lives in the vertices.
    assert_eq!(ws.scene.get(entity).unwrap().transform.scale, Vec3::ONE);
}

#[test]
fn unrelated_edits_leave_the_scene_untouched() {
    let mut ws = workspace();
    ws.graph.add_node_with_shadows(NodeKind::CreateBox);
    let loose = ws.graph.add_node(NodeKind::Number);
    ws.pump();
    let revision = ws.scene.revision();

    ws.graph
        .edit_field(loose, NUMBER_FIELD, FieldValue::Number(9.0))
        .unwrap();
    assert_eq!(ws.pump(), 1);
    assert_eq!(ws.scene.revision(), revision);
    assert!(ws.engine.diagnostics().is_empty());
}

#[test]
fn model_swap_round_trip_keeps_scale_and_feet() {
    let mut ws = workspace();
    let model = ws.graph.add_node_with_shadows(NodeKind::AddModel);
    ws.graph
        .edit_field(model, MODEL_FIELD, FieldValue::from("crate"))
        .unwrap();
    set_number(&mut ws.graph, model, "SCALE", 2.0);
    set_number(&mut ws.graph, model, "Y", 1.0);
    ws.pump();
    ws.tick();
    let container = ws.engine.entity_for(&ws.scene, model).unwrap();
    let original = ws.scene.world_bounds(container).unwrap();
    assert!(approx(original.min.y, 1.0));
    assert!(approx_vec(original.size(), Vec3::splat(2.0)));

    for asset in ["rock", "crate"] {
        ws.graph
            .edit_field(model, MODEL_FIELD, FieldValue::from(asset))
            .unwrap();
        ws.pump();
        ws.tick();
        ws.pump();

        assert_eq!(ws.engine.entity_for(&ws.scene, model), Some(container));
        let entity = ws.scene.get(container).unwrap();
        assert_eq!(entity.children.len(), 1);
        let root = ws.scene.get(entity.children[0]).unwrap();
        assert_eq!(root.name, asset);
        assert_eq!(root.transform.scale, Vec3::splat(2.0));
        assert!(root.physics.is_none());
        assert!(approx(ws.scene.world_bounds(container).unwrap().min.y, 1.0));
    }

    let restored = ws.scene.world_bounds(container).unwrap();
    assert!(approx_vec(restored.min, original.min));
    assert!(approx_vec(restored.max, original.max));
}

#[test]
fn color_lists_follow_part_name_order() {
    let mut ws = workspace();
    let tree = ws.graph.add_node_with_shadows(NodeKind::AddModel);
    ws.pump();
    ws.tick();

    let list = ws.graph.add_node(NodeKind::ColorList);
    for (slot, hex) in [("ADD1", "#0000ff"), ("ADD0", "#ff0000")] {
        let color = ws.graph.add_node(NodeKind::Color);
        ws.graph
            .edit_field(color, COLOR_FIELD, FieldValue::from(hex))
            .unwrap();
        ws.graph.attach(list, slot, color).unwrap();
    }
    ws.graph.attach(tree, "COLOR", list).unwrap();
    ws.pump();

    let container = ws.engine.entity_for(&ws.scene, tree).unwrap();
    let color_of = |part: &str| {
        ws.scene
            .subtree(container)
            .into_iter()
            .filter_map(|id| ws.scene.get(id))
            .find(|e| e.part.as_deref() == Some(part))
            .and_then(|e| e.material.as_ref())
            .map(|m| m.color.to_hex())
    };
    assert_eq!(color_of("canopy").as_deref(), Some("#ff0000"));
    assert_eq!(color_of("trunk").as_deref(), Some("#0000ff"));
}

#[test]
fn undo_and_redo_of_a_deletion_rebuild_the_entity() {
    let mut ws = workspace();
    let sphere = ws.graph.add_node_with_shadows(NodeKind::CreateSphere);
    set_number(&mut ws.graph, sphere, "Z", 3.0);
    ws.pump();

    ws.graph.delete_node(sphere).unwrap();
    ws.pump();
    assert!(ws.scene.is_empty());
    assert!(ws.graph.node(sphere).is_none());

    assert!(ws.graph.undo());
    ws.pump();
    let entity = ws.engine.entity_for(&ws.scene, sphere).unwrap();
    assert!(approx(ws.scene.get(entity).unwrap().transform.translation.z, 3.0));

    assert!(ws.graph.redo());
    ws.pump();
    assert!(ws.scene.is_empty());
    assert!(ws.engine.resolver().registry().is_empty());
}

#[test]
fn rebuild_all_matches_incremental_sync() {
    let steps = r##"[
        { "op": "create", "kind": "when_started", "shadows": false, "name": "start" },
        { "op": "create", "kind": "create_cylinder", "name": "pillar" },
        { "op": "set_input", "node": "pillar", "input": "HEIGHT", "value": 5 },
        { "op": "connect", "parent": "start", "input": "DO", "child": "pillar" },
        { "op": "create", "kind": "set_sky", "name": "sky" },
        { "op": "set_input", "node": "sky", "input": "COLOR", "value": "#223344" },
        { "op": "connect", "parent": "start", "input": "DO", "child": "sky" }
    ]"##;
    let steps = blocksync::Workspace::parse_steps(steps).unwrap();
    let mut incremental = workspace();
    incremental.run(&steps).unwrap();

    // Same graph, but the scene and engine start from nothing.
    let mut cold = workspace();
    cold.run(&steps).unwrap();
    cold.scene = SceneGraph::new();
    cold.engine = SyncEngine::new(SyncConfig::default());
    assert_eq!(cold.engine.rebuild_all(&cold.graph, &mut cold.scene), 1);

    let pillar = incremental.node("pillar").unwrap();
    let warm_bounds = incremental
        .scene
        .world_bounds(incremental.engine.entity_for(&incremental.scene, pillar).unwrap())
        .unwrap();
    let cold_bounds = cold
        .scene
        .world_bounds(cold.engine.entity_for(&cold.scene, pillar).unwrap())
        .unwrap();
    assert!(approx_vec(warm_bounds.size(), cold_bounds.size()));
    assert!(approx(cold_bounds.size().y, 5.0));
    assert_eq!(cold.scene.environment().sky_color.to_hex(), "#223344");
    assert_eq!(incremental.scene.environment().sky_color.to_hex(), "#223344");
}

#[test]
fn disconnected_models_report_and_recover() {
    let mut ws = workspace();
    let model = ws.graph.add_node_with_shadows(NodeKind::AddModel);
    ws.pump();
    ws.tick();
    let container = ws.engine.entity_for(&ws.scene, model).unwrap();

    ws.graph
        .edit_field(model, MODEL_FIELD, FieldValue::from("ghost"))
        .unwrap();
    ws.pump();
    ws.tick();

    assert_eq!(
        ws.engine
            .diagnostics()
            .count(SyncIssueKind::UnresolvedReference),
        1
    );
    // The old asset stays visible instead of leaving a hole.
    let entity = ws.scene.get(container).unwrap();
    assert!(entity.visible);
    assert_eq!(ws.scene.get(entity.children[0]).unwrap().name, "tree");
}
