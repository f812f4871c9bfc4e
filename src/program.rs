//! Program graph: typed instruction nodes with fields, value inputs and
//! statement inputs.
//!
//! The sync engine only talks to the graph through [`GraphHost`].
//! [`ProgramGraph`] is the in-memory host used by the CLI and the tests: every
//! write is recorded under a transaction group so `undo`/`redo` treat a whole
//! group as one step, and every committed change is announced as a
//! [`MutationEvent`] in an outbox drained one event at a time.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node_kind::{NodeKind, NUMBER_FIELD, TEXT_FIELD};
use crate::transaction::TransactionGroup;

/// Unique identifier for program nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifier of a transaction group (one undo step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GroupId(pub u64);

/// Scalar value stored in a node field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(t) => t.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Where a node is attached: which input of which parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ParentLink {
    pub node: NodeId,
    pub input: String,
}

/// A value input. A real node, when connected, always wins over the shadow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSlot {
    pub connected: Option<NodeId>,
    pub shadow: Option<NodeId>,
}

impl InputSlot {
    /// The node whose value the input currently carries.
    pub fn effective(&self) -> Option<NodeId> {
        self.connected.or(self.shadow)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub fields: BTreeMap<String, FieldValue>,
    pub inputs: BTreeMap<String, InputSlot>,
    pub statements: BTreeMap<String, Vec<NodeId>>,
    pub enabled: bool,
    /// Default-value placeholder owned by its parent's input.
    pub shadow: bool,
    pub parent: Option<ParentLink>,
}

impl ProgramNode {
    fn new(id: NodeId, kind: NodeKind, shadow: bool) -> Self {
        let fields = kind
            .default_fields()
            .iter()
            .map(|(name, value)| (name.to_string(), FieldValue::from(*value)))
            .collect();
        let statements = kind
            .statement_inputs()
            .iter()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        Self {
            id,
            kind,
            fields,
            inputs: BTreeMap::new(),
            statements,
            enabled: true,
            shadow,
            parent: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn input(&self, name: &str) -> Option<&InputSlot> {
        self.inputs.get(name)
    }

    /// Children of a statement input, in order.
    pub fn statement(&self, name: &str) -> &[NodeId] {
        self.statements.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every node directly attached below this one.
    pub fn child_ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for slot in self.inputs.values() {
            out.extend(slot.connected);
            out.extend(slot.shadow);
        }
        for list in self.statements.values() {
            out.extend(list.iter().copied());
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    FieldChanged,
    NodeCreated,
    NodeDeleted,
    NodeMoved,
    ChildAttached,
    ChildDetached,
    DisabledToggled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventValue {
    Field(FieldValue),
    Parent(ParentLink),
    Node(NodeId),
    Enabled(bool),
}

impl EventValue {
    pub fn as_parent(&self) -> Option<&ParentLink> {
        match self {
            EventValue::Parent(link) => Some(link),
            _ => None,
        }
    }
}

/// A committed graph change, as delivered to the sync engine.
///
/// `name` is the field name for field changes and the input name for
/// attach/detach events; for moves the old/new values carry the parent links.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationEvent {
    pub node: NodeId,
    pub kind: MutationKind,
    pub name: Option<String>,
    pub old_value: Option<EventValue>,
    pub new_value: Option<EventValue>,
}

impl MutationEvent {
    fn new(node: NodeId, kind: MutationKind) -> Self {
        Self {
            node,
            kind,
            name: None,
            old_value: None,
            new_value: None,
        }
    }

    fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    fn values(mut self, old: Option<EventValue>, new: Option<EventValue>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    MissingNode(NodeId),
    #[error("node {node} has no statement input '{input}'")]
    NotAStatementInput { node: NodeId, input: String },
    #[error("node {node} has a statement input '{input}', not a value input")]
    NotAValueInput { node: NodeId, input: String },
    #[error("connecting {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
}

/// Accessors and write primitives the sync engine consumes from the graph host.
pub trait GraphHost {
    fn node(&self, id: NodeId) -> Option<&ProgramNode>;
    /// Unattached, non-shadow nodes.
    fn top_level(&self) -> Vec<NodeId>;
    fn begin_group(&mut self) -> GroupId;
    fn end_group(&mut self, group: GroupId);
    fn create_node(&mut self, group: GroupId, kind: NodeKind, shadow: bool) -> NodeId;
    fn set_field(
        &mut self,
        group: GroupId,
        node: NodeId,
        name: &str,
        value: FieldValue,
    ) -> Result<(), GraphError>;
    /// Connect `child` into a value input; shadows fill the shadow slot.
    fn connect(
        &mut self,
        group: GroupId,
        parent: NodeId,
        input: &str,
        child: NodeId,
    ) -> Result<(), GraphError>;
    fn append_statement(
        &mut self,
        group: GroupId,
        parent: NodeId,
        input: &str,
        child: NodeId,
    ) -> Result<(), GraphError>;
    fn select_and_reveal(&mut self, node: NodeId);
    /// Next committed mutation, in delivery order.
    fn next_event(&mut self) -> Option<MutationEvent>;
}

/// Reversible record of one graph write.
#[derive(Debug, Clone)]
enum GraphOp {
    Insert {
        node: ProgramNode,
        index: Option<usize>,
    },
    Remove {
        node: ProgramNode,
        index: Option<usize>,
    },
    SetField {
        node: NodeId,
        name: String,
        old: Option<FieldValue>,
        new: FieldValue,
    },
    Attach {
        child: NodeId,
        link: ParentLink,
        index: Option<usize>,
        /// Real node bumped out of the slot by this attach.
        displaced: Option<NodeId>,
    },
    Detach {
        child: NodeId,
        link: ParentLink,
        index: Option<usize>,
    },
    SetEnabled {
        node: NodeId,
        old: bool,
        new: bool,
    },
}

#[derive(Debug, Clone)]
struct UndoEntry {
    group: GroupId,
    ops: Vec<GraphOp>,
}

const MAX_UNDO_DEPTH: usize = 100;

/// In-memory program graph host.
#[derive(Debug, Default)]
pub struct ProgramGraph {
    nodes: HashMap<NodeId, ProgramNode>,
    next_id: u64,
    next_group: u64,
    open_group: Option<(GroupId, usize)>,
    undo_stack: VecDeque<UndoEntry>,
    redo_stack: Vec<UndoEntry>,
    outbox: VecDeque<MutationEvent>,
    selected: Option<NodeId>,
    replaying: bool,
}

impl ProgramGraph {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            next_group: 1,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.nodes.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn pending_events(&self) -> usize {
        self.outbox.len()
    }

    /// Drop queued events without delivering them.
    pub fn discard_events(&mut self) {
        self.outbox.clear();
    }

    fn new_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn record(&mut self, group: GroupId, op: GraphOp) {
        if self.replaying {
            return;
        }
        self.redo_stack.clear();
        if let Some(entry) = self.undo_stack.back_mut() {
            if entry.group == group {
                entry.ops.push(op);
                return;
            }
        }
        self.undo_stack.push_back(UndoEntry {
            group,
            ops: vec![op],
        });
        if self.undo_stack.len() > MAX_UNDO_DEPTH {
            self.undo_stack.pop_front();
        }
    }

    /// Run a single write as its own undo step unless a group is already open.
    fn with_implicit_group<T>(&mut self, f: impl FnOnce(&mut Self, GroupId) -> T) -> T {
        let group = self.begin_group();
        let out = f(self, group);
        self.end_group(group);
        out
    }

    fn require(&self, id: NodeId) -> Result<&ProgramNode, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::MissingNode(id))
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() + 1 {
                return false;
            }
            current = self
                .nodes
                .get(&id)
                .and_then(|n| n.parent.as_ref())
                .map(|l| l.node);
        }
        false
    }

    // --- raw primitives (no undo recording) -------------------------------

    /// Detach `child` from its parent without touching the undo log.
    /// Returns the old link and, for statements, the index it held.
    fn raw_detach(&mut self, child: NodeId) -> Option<(ParentLink, Option<usize>)> {
        let link = self.nodes.get_mut(&child)?.parent.take()?;
        let shadow = self.nodes.get(&child).map(|n| n.shadow).unwrap_or(false);
        let mut index = None;
        if let Some(parent) = self.nodes.get_mut(&link.node) {
            if let Some(list) = parent.statements.get_mut(&link.input) {
                if let Some(pos) = list.iter().position(|id| *id == child) {
                    list.remove(pos);
                    index = Some(pos);
                }
            } else if let Some(slot) = parent.inputs.get_mut(&link.input) {
                if slot.connected == Some(child) {
                    slot.connected = None;
                }
                if slot.shadow == Some(child) {
                    slot.shadow = None;
                }
            }
        }
        let event = if shadow {
            MutationEvent::new(link.node, MutationKind::ChildDetached)
                .named(&link.input)
                .values(Some(EventValue::Node(child)), None)
        } else {
            MutationEvent::new(child, MutationKind::NodeMoved)
                .named(&link.input)
                .values(Some(EventValue::Parent(link.clone())), None)
        };
        self.outbox.push_back(event);
        Some((link, index))
    }

    /// Attach `child` under `link`. Returns a real node displaced from a value slot.
    fn raw_attach(&mut self, child: NodeId, link: &ParentLink, index: Option<usize>) -> Option<NodeId> {
        let shadow = self.nodes.get(&child).map(|n| n.shadow).unwrap_or(false);
        let mut displaced = None;
        let Some(parent) = self.nodes.get_mut(&link.node) else {
            return None;
        };
        if parent.kind.is_statement_input(&link.input) {
            let list = parent.statements.entry(link.input.clone()).or_default();
            let at = index.unwrap_or(list.len()).min(list.len());
            list.insert(at, child);
        } else {
            let slot = parent.inputs.entry(link.input.clone()).or_default();
            if shadow {
                slot.shadow = Some(child);
            } else {
                displaced = slot.connected.replace(child);
            }
        }
        if let Some(old) = displaced {
            if let Some(node) = self.nodes.get_mut(&old) {
                node.parent = None;
            }
            self.outbox.push_back(
                MutationEvent::new(old, MutationKind::NodeMoved)
                    .named(&link.input)
                    .values(Some(EventValue::Parent(link.clone())), None),
            );
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(link.clone());
        }
        let event = if shadow {
            MutationEvent::new(link.node, MutationKind::ChildAttached)
                .named(&link.input)
                .values(None, Some(EventValue::Node(child)))
        } else {
            MutationEvent::new(child, MutationKind::NodeMoved)
                .named(&link.input)
                .values(None, Some(EventValue::Parent(link.clone())))
        };
        self.outbox.push_back(event);
        displaced
    }

    fn raw_insert(&mut self, mut node: ProgramNode, index: Option<usize>) {
        let id = node.id;
        let link = node.parent.take();
        self.nodes.insert(id, node);
        self.outbox
            .push_back(MutationEvent::new(id, MutationKind::NodeCreated));
        if let Some(link) = link {
            if self.nodes.contains_key(&link.node) {
                self.raw_attach(id, &link, index);
            }
        }
    }

    fn raw_remove(&mut self, id: NodeId) -> Option<(ProgramNode, Option<usize>)> {
        let detached = self.raw_detach(id);
        let mut node = self.nodes.remove(&id)?;
        let index = detached.as_ref().and_then(|(_, index)| *index);
        let link = detached.map(|(link, _)| link);
        node.parent = link.clone();
        self.outbox.push_back(
            MutationEvent::new(id, MutationKind::NodeDeleted)
                .values(link.map(EventValue::Parent), None),
        );
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some((node, index))
    }

    fn raw_set_field(&mut self, id: NodeId, name: &str, value: Option<FieldValue>) -> Option<FieldValue> {
        let node = self.nodes.get_mut(&id)?;
        let old = match value.clone() {
            Some(v) => node.fields.insert(name.to_string(), v),
            None => node.fields.remove(name),
        };
        self.outbox.push_back(
            MutationEvent::new(id, MutationKind::FieldChanged)
                .named(name)
                .values(old.clone().map(EventValue::Field), value.map(EventValue::Field)),
        );
        old
    }

    fn raw_set_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            let old = node.enabled;
            node.enabled = enabled;
            self.outbox.push_back(
                MutationEvent::new(id, MutationKind::DisabledToggled)
                    .values(Some(EventValue::Enabled(old)), Some(EventValue::Enabled(enabled))),
            );
        }
    }

    fn apply_op(&mut self, op: &GraphOp, forward: bool) {
        match (op, forward) {
            (GraphOp::Insert { node, index }, true) | (GraphOp::Remove { node, index }, false) => {
                self.raw_insert(node.clone(), *index);
            }
            (GraphOp::Insert { node, .. }, false) | (GraphOp::Remove { node, .. }, true) => {
                self.raw_remove(node.id);
            }
            (GraphOp::SetField { node, name, new, .. }, true) => {
                self.raw_set_field(*node, name, Some(new.clone()));
            }
            (GraphOp::SetField { node, name, old, .. }, false) => {
                self.raw_set_field(*node, name, old.clone());
            }
            (GraphOp::Attach { child, link, index, .. }, true) => {
                self.raw_detach(*child);
                self.raw_attach(*child, link, *index);
            }
            (GraphOp::Attach { child, link, displaced, .. }, false) => {
                self.raw_detach(*child);
                if let Some(old) = displaced {
                    self.raw_attach(*old, link, None);
                }
            }
            (GraphOp::Detach { child, .. }, true) => {
                self.raw_detach(*child);
            }
            (GraphOp::Detach { child, link, index }, false) => {
                self.raw_attach(*child, link, *index);
            }
            (GraphOp::SetEnabled { node, new, .. }, true) => self.raw_set_enabled(*node, *new),
            (GraphOp::SetEnabled { node, old, .. }, false) => self.raw_set_enabled(*node, *old),
        }
    }

    // --- user-level edits -------------------------------------------------

    /// Create a node as its own undo step.
    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        self.with_implicit_group(|graph, group| graph.create_node(group, kind, false))
    }

    /// Create a node together with the shadow placeholders its kind declares.
    pub fn add_node_with_shadows(&mut self, kind: NodeKind) -> NodeId {
        let mut txn = TransactionGroup::begin(self);
        let id = txn.create_node(kind);
        txn.inject_shadows(id);
        id
    }

    /// Set a field as its own undo step.
    pub fn edit_field(&mut self, node: NodeId, name: &str, value: FieldValue) -> Result<(), GraphError> {
        self.with_implicit_group(|graph, group| graph.set_field(group, node, name, value))
    }

    /// Connect a value input as its own undo step.
    pub fn attach(&mut self, parent: NodeId, input: &str, child: NodeId) -> Result<(), GraphError> {
        self.with_implicit_group(|graph, group| {
            if graph.require(parent)?.kind.is_statement_input(input) {
                graph.append_statement(group, parent, input, child)
            } else {
                graph.connect(group, parent, input, child)
            }
        })
    }

    /// Detach a real node from its parent, leaving it top-level.
    pub fn detach(&mut self, child: NodeId) -> Result<(), GraphError> {
        self.require(child)?;
        self.with_implicit_group(|graph, group| {
            if let Some((link, index)) = graph.raw_detach(child) {
                graph.record(group, GraphOp::Detach { child, link, index });
            }
        });
        Ok(())
    }

    /// Delete a node and everything attached below it, as one undo step.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.require(id)?;
        self.with_implicit_group(|graph, group| {
            for victim in graph.subtree_post_order(id) {
                if let Some((node, index)) = graph.raw_remove(victim) {
                    graph.record(group, GraphOp::Remove { node, index });
                }
            }
        });
        Ok(())
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), GraphError> {
        let old = self.require(id)?.enabled;
        if old == enabled {
            return Ok(());
        }
        self.with_implicit_group(|graph, group| {
            graph.raw_set_enabled(id, enabled);
            graph.record(group, GraphOp::SetEnabled { node: id, old, new: enabled });
        });
        Ok(())
    }

    /// Nodes below `id` (children before parents), ending with `id` itself.
    pub fn subtree_post_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                out.push(current);
                continue;
            }
            if out.contains(&current) || out.len() > self.nodes.len() {
                continue;
            }
            stack.push((current, true));
            if let Some(node) = self.nodes.get(&current) {
                for child in node.child_ids() {
                    stack.push((child, false));
                }
            }
        }
        out
    }

    /// Reverse the most recent undo step. Returns false when there is none.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_stack.pop_back() else {
            return false;
        };
        log::debug!("undo group {:?} ({} ops)", entry.group, entry.ops.len());
        self.replaying = true;
        for op in entry.ops.iter().rev() {
            self.apply_op(op, false);
        }
        self.replaying = false;
        self.redo_stack.push(entry);
        true
    }

    /// Replay the most recently undone step.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.redo_stack.pop() else {
            return false;
        };
        log::debug!("redo group {:?} ({} ops)", entry.group, entry.ops.len());
        self.replaying = true;
        for op in &entry.ops {
            self.apply_op(op, true);
        }
        self.replaying = false;
        self.undo_stack.push_back(entry);
        true
    }

    /// First top-level node of the given kind.
    pub fn find_top_level(&self, kind: NodeKind) -> Option<NodeId> {
        self.top_level()
            .into_iter()
            .find(|id| self.nodes.get(id).map(|n| n.kind) == Some(kind))
    }

    /// Every node of the given kind, in id order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|id| self.nodes.get(id).map(|n| n.kind) == Some(kind))
            .collect()
    }
}

impl GraphHost for ProgramGraph {
    fn node(&self, id: NodeId) -> Option<&ProgramNode> {
        self.nodes.get(&id)
    }

    fn top_level(&self) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .map(|n| n.parent.is_none() && !n.shadow)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn begin_group(&mut self) -> GroupId {
        if let Some((group, depth)) = self.open_group.as_mut() {
            *depth += 1;
            return *group;
        }
        let group = GroupId(self.next_group);
        self.next_group += 1;
        self.open_group = Some((group, 1));
        group
    }

    fn end_group(&mut self, group: GroupId) {
        match self.open_group.as_mut() {
            Some((open, depth)) if *open == group => {
                *depth -= 1;
                if *depth == 0 {
                    self.open_group = None;
                }
            }
            _ => log::warn!("end_group({group:?}) without a matching begin"),
        }
    }

    fn create_node(&mut self, group: GroupId, kind: NodeKind, shadow: bool) -> NodeId {
        let id = self.new_id();
        let node = ProgramNode::new(id, kind, shadow);
        self.raw_insert(node.clone(), None);
        self.record(group, GraphOp::Insert { node, index: None });
        id
    }

    fn set_field(
        &mut self,
        group: GroupId,
        node: NodeId,
        name: &str,
        value: FieldValue,
    ) -> Result<(), GraphError> {
        self.require(node)?;
        let old = self.raw_set_field(node, name, Some(value.clone()));
        self.record(
            group,
            GraphOp::SetField {
                node,
                name: name.to_string(),
                old,
                new: value,
            },
        );
        Ok(())
    }

    fn connect(
        &mut self,
        group: GroupId,
        parent: NodeId,
        input: &str,
        child: NodeId,
    ) -> Result<(), GraphError> {
        if self.require(parent)?.kind.is_statement_input(input) {
            return Err(GraphError::NotAValueInput {
                node: parent,
                input: input.to_string(),
            });
        }
        self.attach_recorded(group, parent, input, child)
    }

    fn append_statement(
        &mut self,
        group: GroupId,
        parent: NodeId,
        input: &str,
        child: NodeId,
    ) -> Result<(), GraphError> {
        if !self.require(parent)?.kind.is_statement_input(input) {
            return Err(GraphError::NotAStatementInput {
                node: parent,
                input: input.to_string(),
            });
        }
        self.attach_recorded(group, parent, input, child)
    }

    fn select_and_reveal(&mut self, node: NodeId) {
        if self.nodes.contains_key(&node) {
            self.selected = Some(node);
        }
    }

    fn next_event(&mut self) -> Option<MutationEvent> {
        self.outbox.pop_front()
    }
}

impl ProgramGraph {
    fn attach_recorded(
        &mut self,
        group: GroupId,
        parent: NodeId,
        input: &str,
        child: NodeId,
    ) -> Result<(), GraphError> {
        self.require(child)?;
        if self.is_ancestor(child, parent) {
            return Err(GraphError::Cycle { parent, child });
        }
        if let Some((old_link, old_index)) = self.raw_detach(child) {
            self.record(
                group,
                GraphOp::Detach {
                    child,
                    link: old_link,
                    index: old_index,
                },
            );
        }
        let link = ParentLink {
            node: parent,
            input: input.to_string(),
        };
        let displaced = self.raw_attach(child, &link, None);
        let index = self
            .nodes
            .get(&parent)
            .and_then(|p| p.statements.get(input))
            .and_then(|list| list.iter().position(|id| *id == child));
        self.record(
            group,
            GraphOp::Attach {
                child,
                link,
                index,
                displaced,
            },
        );
        Ok(())
    }
}

/// Node currently feeding `input` of `node`: the connected node, else the shadow.
pub fn input_source(host: &dyn GraphHost, node: NodeId, input: &str) -> Option<NodeId> {
    host.node(node)?.input(input)?.effective()
}

/// Numeric value carried by a value input.
pub fn number_input(host: &dyn GraphHost, node: NodeId, input: &str) -> Option<f64> {
    let source = host.node(input_source(host, node, input)?)?;
    match source.kind {
        NodeKind::Number => source.field(NUMBER_FIELD)?.as_number(),
        NodeKind::Text => source.field(TEXT_FIELD)?.as_number(),
        _ => None,
    }
}
