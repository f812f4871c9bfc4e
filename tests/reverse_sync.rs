mod common;

use blocksync::node_kind::NodeKind;
use blocksync::program::number_input;
use blocksync::workspace::Workspace;
use common::{approx, approx_vec, workspace};
use glam::Vec3;

fn steps(json: &str) -> Vec<blocksync::workspace::Step> {
    Workspace::parse_steps(json).unwrap()
}

#[test]
fn scale_drags_write_one_resize_instruction() {
    let mut ws = workspace();
    ws.run(&steps(
        r#"[
            { "op": "create", "kind": "create_box", "name": "cube" },
            { "op": "drag", "node": "cube", "mode": "scale", "scale": [2, 1, 1] }
        ]"#,
    ))
    .unwrap();

    let cube = ws.node("cube").unwrap();
    let resizes = ws.graph.nodes_of_kind(NodeKind::Resize);
    assert_eq!(resizes.len(), 1);
    assert_eq!(number_input(&ws.graph, resizes[0], "X"), Some(2.0));
    assert_eq!(number_input(&ws.graph, resizes[0], "Y"), Some(1.0));

    let entity = ws.engine.entity_for(&ws.scene, cube).unwrap();
    let bounds = ws.scene.world_bounds(entity).unwrap();
    assert!(approx_vec(bounds.size(), Vec3::new(2.0, 1.0, 1.0)));
    assert!(approx(bounds.min.y, 0.0));

    ws.run(&steps(
        r#"[{ "op": "drag", "node": "cube", "mode": "scale", "scale": [3, 1, 1] }]"#,
    ))
    .unwrap();
    assert_eq!(ws.graph.nodes_of_kind(NodeKind::Resize), resizes);
    assert_eq!(number_input(&ws.graph, resizes[0], "X"), Some(3.0));
    let bounds = ws.scene.world_bounds(entity).unwrap();
    assert!(approx(bounds.size().x, 3.0));
}

#[test]
fn undoing_a_placed_character_clears_graph_and_scene() {
    let mut ws = workspace();
    ws.run(&steps(
        r#"[
            { "op": "place", "kind": "add_character", "name": "hero", "keys": ["arrow_down"] },
            { "op": "tick" }
        ]"#,
    ))
    .unwrap();
    let hero = ws.node("hero").unwrap();
    assert_eq!(number_input(&ws.graph, hero, "Z"), Some(0.5));
    assert!(ws.engine.entity_for(&ws.scene, hero).is_some());
    assert!(!ws.engine.is_loading());

    ws.run(&steps(r#"[{ "op": "undo" }]"#)).unwrap();
    assert!(ws.graph.is_empty());
    assert!(ws.scene.is_empty());
}

#[test]
fn gestures_show_up_in_the_summary() {
    let mut ws = workspace();
    ws.run(&steps(
        r##"[
            { "op": "place", "kind": "create_sphere", "name": "ball" },
            { "op": "place", "kind": "create_box", "keys": ["escape"] },
            { "op": "pick", "color": "#00ff00", "keys": ["arrow_left", "arrow_left", "arrow_left", "arrow_left"] }
        ]"##,
    ))
    .unwrap();

    let summary = serde_json::to_value(ws.summary()).unwrap();
    let outcomes: Vec<&str> = summary["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["outcome"].as_str().unwrap())
        .collect();
    assert_eq!(outcomes, ["placed", "cancelled", "colored"]);
    // The pick missed the sphere and painted the ground it synthesized.
    assert_eq!(ws.graph.nodes_of_kind(NodeKind::SetGround).len(), 1);
    assert_eq!(ws.graph.nodes_of_kind(NodeKind::WhenStarted).len(), 1);
}
