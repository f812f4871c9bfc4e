// Program graph and its host interface
pub mod node_kind;
pub mod program;
pub mod transaction;

// Scene model
pub mod color;
pub mod mesh_asset;
pub mod primitives;
pub mod scene_graph;
pub mod picking;
pub mod asset_loader;

// Forward sync
pub mod config;
pub mod sync_diagnostics;
pub mod change_classifier;
pub mod entity_resolver;
pub mod geometry;
pub mod material_resolver;
pub mod model_replacer;
pub mod transform;
pub mod sync;
pub mod dispatcher;

// Reverse sync
pub mod reverse_sync;
pub mod workspace;

pub mod cli;

pub use config::SyncConfig;
pub use program::{GraphHost, ProgramGraph};
pub use reverse_sync::ReverseSyncController;
pub use scene_graph::SceneGraph;
pub use sync::SyncEngine;
pub use workspace::Workspace;
