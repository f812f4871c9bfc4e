//! Structured sync diagnostics.
//!
//! Every problem the sync engine hits is recoverable: the graph is edited live
//! and transient invalid states are expected. Instead of failing, the engine
//! records a stable, JSON-serializable diagnostic that the UI can surface
//! without access to Rust logs.

use std::collections::VecDeque;

use serde::Serialize;

use crate::program::NodeId;
use crate::scene_graph::EntityId;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyncIssueKind {
    /// A scene entity could not be traced back to any program node.
    MissingOwner,
    /// An input points at nothing usable; the declared default was substituted.
    UnresolvedReference,
    /// A referenced asset or sub-node is not ready yet.
    TransientUnready,
    /// The entity was disposed before the handler ran.
    StaleEntity,
    /// A mutation could not be attributed to a tracked attribute.
    AmbiguousChange,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncDiagnostic {
    pub kind: SyncIssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<u64>,
    pub message: String,
}

impl SyncDiagnostic {
    pub fn new(kind: SyncIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            node: None,
            entity: None,
            message: message.into(),
        }
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity.0);
        self
    }
}

/// Bounded queue keeping the newest diagnostics.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    entries: VecDeque<SyncDiagnostic>,
    capacity: usize,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    /// Record a diagnostic, logging it once at a level matching its kind.
    pub fn push(&mut self, diagnostic: SyncDiagnostic) {
        match diagnostic.kind {
            SyncIssueKind::MissingOwner | SyncIssueKind::StaleEntity => {
                log::warn!("{:?}: {}", diagnostic.kind, diagnostic.message)
            }
            _ => log::debug!("{:?}: {}", diagnostic.kind, diagnostic.message),
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(diagnostic);
    }

    pub fn report(&mut self, kind: SyncIssueKind, node: Option<NodeId>, message: impl Into<String>) {
        let mut diagnostic = SyncDiagnostic::new(kind, message);
        diagnostic.node = node;
        self.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncDiagnostic> {
        self.entries.iter()
    }

    pub fn count(&self, kind: SyncIssueKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// Remove and return every queued diagnostic, oldest first.
    pub fn drain(&mut self) -> Vec<SyncDiagnostic> {
        self.entries.drain(..).collect()
    }
}
