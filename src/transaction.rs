//! Scoped transaction groups.
//!
//! A [`TransactionGroup`] opens a group on the host when created and closes it
//! when dropped, so every write issued through it lands in one undo step even
//! when the caller bails out early with `?`.

use crate::node_kind::{NodeKind, ShadowDefault, COLOR_FIELD, NUMBER_FIELD};
use crate::program::{FieldValue, GraphError, GraphHost, GroupId, NodeId};

pub struct TransactionGroup<'a> {
    host: &'a mut dyn GraphHost,
    id: GroupId,
    writes: usize,
}

impl<'a> TransactionGroup<'a> {
    pub fn begin(host: &'a mut dyn GraphHost) -> Self {
        let id = host.begin_group();
        log::trace!("begin transaction group {id:?}");
        Self {
            host,
            id,
            writes: 0,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Number of writes issued so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Read-only access to the host while the group is open.
    pub fn host(&self) -> &dyn GraphHost {
        &*self.host
    }

    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        self.writes += 1;
        self.host.create_node(self.id, kind, false)
    }

    pub fn create_shadow(&mut self, kind: NodeKind) -> NodeId {
        self.writes += 1;
        self.host.create_node(self.id, kind, true)
    }

    pub fn set_field(&mut self, node: NodeId, name: &str, value: FieldValue) -> Result<(), GraphError> {
        self.writes += 1;
        self.host.set_field(self.id, node, name, value)
    }

    pub fn connect(&mut self, parent: NodeId, input: &str, child: NodeId) -> Result<(), GraphError> {
        self.writes += 1;
        self.host.connect(self.id, parent, input, child)
    }

    pub fn append_statement(&mut self, parent: NodeId, input: &str, child: NodeId) -> Result<(), GraphError> {
        self.writes += 1;
        self.host.append_statement(self.id, parent, input, child)
    }

    pub fn select_and_reveal(&mut self, node: NodeId) {
        self.host.select_and_reveal(node);
    }

    /// Create a value shadow carrying `default` and plug it into `parent.input`.
    pub fn inject_shadow(
        &mut self,
        parent: NodeId,
        input: &str,
        default: ShadowDefault,
    ) -> Result<NodeId, GraphError> {
        let (kind, field, value) = match default {
            ShadowDefault::Number(v) => (NodeKind::Number, NUMBER_FIELD, FieldValue::Number(v)),
            ShadowDefault::Color(hex) => (NodeKind::Color, COLOR_FIELD, FieldValue::from(hex)),
        };
        let shadow = self.create_shadow(kind);
        self.set_field(shadow, field, value)?;
        self.connect(parent, input, shadow)?;
        Ok(shadow)
    }

    /// Materialize a shadow for every declared input of `node` that lacks one.
    pub fn inject_shadows(&mut self, node: NodeId) -> Vec<NodeId> {
        let Some(kind) = self.host.node(node).map(|n| n.kind) else {
            return Vec::new();
        };
        let mut created = Vec::new();
        for template in kind.slot_templates() {
            let has_shadow = self
                .host
                .node(node)
                .and_then(|n| n.input(template.input))
                .and_then(|slot| slot.shadow)
                .is_some();
            if has_shadow {
                continue;
            }
            match self.inject_shadow(node, template.input, template.shadow) {
                Ok(shadow) => created.push(shadow),
                Err(err) => log::warn!("could not inject shadow for {node}.{}: {err}", template.input),
            }
        }
        created
    }

    /// Close the group explicitly.
    pub fn commit(self) {}
}

impl Drop for TransactionGroup<'_> {
    fn drop(&mut self) {
        log::trace!("end transaction group {:?} ({} writes)", self.id, self.writes);
        self.host.end_group(self.id);
    }
}
