//! Attribute a raw graph mutation to the tracked node and attribute it changes.
//!
//! Value nodes (numbers, colors, color lists, materials) carry no scene state
//! of their own. A change to one is reported against the nearest tracked
//! ancestor, named after the input it hangs off on the last hop. Events are
//! classified against the graph as it is *now*, which may be several commits
//! ahead of the event, so deleted and re-parented nodes are handled from the
//! links the event itself carries.

use crate::node_kind::{AttributeRole, NodeCategory, DO_INPUT};
use crate::program::{EventValue, GraphHost, MutationEvent, MutationKind, NodeId, ParentLink};

/// What changed on the owning node.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeAttribute {
    /// A named field or input with a known role.
    Role { name: String, role: AttributeRole },
    Created,
    Deleted,
    Toggled { enabled: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeTarget {
    pub owner: NodeId,
    pub attribute: ChangeAttribute,
}

impl ChangeTarget {
    fn role(owner: NodeId, name: &str, role: AttributeRole) -> Self {
        Self {
            owner,
            attribute: ChangeAttribute::Role {
                name: name.to_string(),
                role,
            },
        }
    }

    pub fn attribute_role(&self) -> Option<AttributeRole> {
        match &self.attribute {
            ChangeAttribute::Role { role, .. } => Some(*role),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Change(ChangeTarget),
    /// Nothing tracked was touched.
    None,
    /// The change could not be attributed; handled exactly like `None`.
    Ambiguous(String),
}

impl Classification {
    pub fn target(&self) -> Option<&ChangeTarget> {
        match self {
            Classification::Change(target) => Some(target),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.target().is_none()
    }
}

pub struct ChangeClassifier {
    max_depth: usize,
}

impl ChangeClassifier {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn classify(&self, graph: &dyn GraphHost, event: &MutationEvent) -> Classification {
        match event.kind {
            MutationKind::NodeCreated => self.classify_lifecycle(graph, event.node, ChangeAttribute::Created),
            MutationKind::NodeDeleted => self.classify_deleted(event),
            MutationKind::DisabledToggled => {
                let enabled = matches!(event.new_value, Some(EventValue::Enabled(true)));
                self.classify_toggle(graph, event.node, enabled)
            }
            MutationKind::FieldChanged => match event.name.as_deref() {
                Some(name) => self.classify_field(graph, event.node, name),
                None => Classification::Ambiguous(format!("unnamed field change on {}", event.node)),
            },
            MutationKind::ChildAttached | MutationKind::ChildDetached => match event.name.as_deref() {
                Some(input) => self.climb(graph, event.node, input),
                None => Classification::Ambiguous(format!("unnamed input change on {}", event.node)),
            },
            MutationKind::NodeMoved => self.classify_move(graph, event),
        }
    }

    fn classify_lifecycle(&self, graph: &dyn GraphHost, node: NodeId, attribute: ChangeAttribute) -> Classification {
        let Some(n) = graph.node(node) else {
            return Classification::None;
        };
        if n.shadow {
            return Classification::None;
        }
        match n.kind.category() {
            NodeCategory::Object(_) | NodeCategory::Environment(_) => {
                Classification::Change(ChangeTarget { owner: node, attribute })
            }
            // Transform children take effect when attached; value nodes when connected.
            _ => Classification::None,
        }
    }

    /// The node is already gone, so its kind is unknown here. Its detach was
    /// announced by a separate move event, which covers the old owner's
    /// input; this event only retires the node's own entity, if it had one.
    fn classify_deleted(&self, event: &MutationEvent) -> Classification {
        Classification::Change(ChangeTarget {
            owner: event.node,
            attribute: ChangeAttribute::Deleted,
        })
    }

    fn classify_toggle(&self, graph: &dyn GraphHost, node: NodeId, enabled: bool) -> Classification {
        let Some(n) = graph.node(node) else {
            return Classification::None;
        };
        match n.kind.category() {
            NodeCategory::Object(_) | NodeCategory::Environment(_) => Classification::Change(ChangeTarget {
                owner: node,
                attribute: ChangeAttribute::Toggled { enabled },
            }),
            _ => match n.parent.clone() {
                Some(link) => self.climb(graph, link.node, &link.input),
                None => Classification::None,
            },
        }
    }

    fn classify_field(&self, graph: &dyn GraphHost, node: NodeId, name: &str) -> Classification {
        let Some(n) = graph.node(node) else {
            return Classification::None;
        };
        if !n.kind.is_tracked() {
            return match n.parent.clone() {
                Some(link) => self.climb(graph, link.node, &link.input),
                None => Classification::None,
            };
        }
        match n.kind.attribute_role(name) {
            Some(AttributeRole::TransformParam) => self.transform_owner(graph, n.parent.as_ref()),
            Some(role) => Classification::Change(ChangeTarget::role(node, name, role)),
            None => Classification::None,
        }
    }

    fn classify_move(&self, graph: &dyn GraphHost, event: &MutationEvent) -> Classification {
        let new_link = event.new_value.as_ref().and_then(EventValue::as_parent);
        let old_link = event.old_value.as_ref().and_then(EventValue::as_parent);
        if new_link.is_none() && old_link.is_none() {
            return Classification::None;
        }

        let moved_kind = graph.node(event.node).map(|n| n.kind);
        let mut links = Vec::new();
        // An attach that has since been undone would misattribute the change,
        // so a new link only counts while the node still sits under it.
        if let Some(link) = new_link {
            if self.is_within(graph, link.node, event.node) {
                links.push(link);
            }
        }
        links.extend(old_link);

        for link in links {
            let classification = match moved_kind.map(|k| k.category()) {
                Some(NodeCategory::Transform(_)) => self.transform_owner(graph, Some(link)),
                // Objects moving between statement lists keep their entity.
                Some(NodeCategory::Object(_)) | Some(NodeCategory::Environment(_)) => Classification::None,
                _ => self.climb(graph, link.node, &link.input),
            };
            if !classification.is_none() {
                return classification;
            }
        }
        Classification::None
    }

    /// A move/rotate/resize instruction changed: its enclosing object's
    /// child list is what the scene tracks.
    fn transform_owner(&self, graph: &dyn GraphHost, link: Option<&ParentLink>) -> Classification {
        let Some(link) = link else {
            return Classification::None;
        };
        match graph.node(link.node).map(|n| n.kind.category()) {
            Some(NodeCategory::Object(_)) => {
                Classification::Change(ChangeTarget::role(link.node, DO_INPUT, AttributeRole::Children))
            }
            _ => Classification::None,
        }
    }

    /// Walk up from `start.input` to the nearest tracked node and report the
    /// input the walk arrived through.
    fn climb(&self, graph: &dyn GraphHost, start: NodeId, input: &str) -> Classification {
        let mut current = start;
        let mut input = input.to_string();
        for _ in 0..=self.max_depth {
            let Some(node) = graph.node(current) else {
                log::trace!("owner {current} of input {input} no longer exists");
                return Classification::None;
            };
            if node.kind.is_tracked() {
                if matches!(node.kind.category(), NodeCategory::Transform(_)) {
                    return self.transform_owner(graph, node.parent.as_ref());
                }
                return match node.kind.attribute_role(&input) {
                    Some(role) => Classification::Change(ChangeTarget::role(current, &input, role)),
                    None => Classification::Ambiguous(format!(
                        "input {input} of {current} ({}) has no tracked role",
                        node.kind.label()
                    )),
                };
            }
            match &node.parent {
                Some(link) => {
                    current = link.node;
                    input = link.input.clone();
                }
                None => return Classification::None,
            }
        }
        Classification::Ambiguous(format!("input chain above {start} is deeper than {}", self.max_depth))
    }

    /// Whether `node` currently sits in the subtree rooted at `ancestor`.
    pub fn is_within(&self, graph: &dyn GraphHost, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        for _ in 0..=self.max_depth {
            let Some(id) = current else {
                return false;
            };
            if id == ancestor {
                return true;
            }
            current = graph.node(id).and_then(|n| n.parent.as_ref()).map(|l| l.node);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_kind::{NodeKind, COLOR_FIELD, NUMBER_FIELD};
    use crate::program::{FieldValue, ProgramGraph};

    fn drain(graph: &mut ProgramGraph) -> Vec<MutationEvent> {
        std::iter::from_fn(|| graph.next_event()).collect()
    }

    fn classify_all(graph: &mut ProgramGraph) -> Vec<Classification> {
        let classifier = ChangeClassifier::new(16);
        let events = drain(graph);
        events.iter().map(|e| classifier.classify(graph, e)).collect()
    }

    #[test]
    fn shadow_edit_reports_the_owner_input() {
        let mut graph = ProgramGraph::new();
        let cube = graph.add_node_with_shadows(NodeKind::CreateBox);
        drain(&mut graph);
        let width = graph.node(cube).unwrap().input("WIDTH").unwrap().shadow.unwrap();
        graph.edit_field(width, NUMBER_FIELD, FieldValue::Number(4.0)).unwrap();

        let result = classify_all(&mut graph);
        assert_eq!(
            result,
            vec![Classification::Change(ChangeTarget::role(cube, "WIDTH", AttributeRole::Dimension))]
        );
    }

    #[test]
    fn nested_material_color_reports_the_color_input() {
        let mut graph = ProgramGraph::new();
        let cube = graph.add_node_with_shadows(NodeKind::CreateBox);
        let material = graph.add_node_with_shadows(NodeKind::Material);
        graph.attach(cube, "COLOR", material).unwrap();
        drain(&mut graph);
        let base = graph.node(material).unwrap().input("BASE_COLOR").unwrap().shadow.unwrap();
        graph.edit_field(base, COLOR_FIELD, FieldValue::from("#ff0000")).unwrap();

        let result = classify_all(&mut graph);
        assert_eq!(result[0].target().unwrap().owner, cube);
        assert_eq!(result[0].target().unwrap().attribute_role(), Some(AttributeRole::Appearance));
    }

    #[test]
    fn detached_value_still_reports_its_old_owner() {
        let mut graph = ProgramGraph::new();
        let cube = graph.add_node_with_shadows(NodeKind::CreateBox);
        let color = graph.add_node(NodeKind::Color);
        graph.attach(cube, "COLOR", color).unwrap();
        drain(&mut graph);
        graph.detach(color).unwrap();

        let result = classify_all(&mut graph);
        let target = result[0].target().unwrap();
        assert_eq!(target.owner, cube);
        assert_eq!(
            target.attribute,
            ChangeAttribute::Role {
                name: "COLOR".into(),
                role: AttributeRole::Appearance
            }
        );
    }

    #[test]
    fn free_floating_value_edit_is_none() {
        let mut graph = ProgramGraph::new();
        let n = graph.add_node(NodeKind::Number);
        drain(&mut graph);
        graph.edit_field(n, NUMBER_FIELD, FieldValue::Number(2.0)).unwrap();
        assert_eq!(classify_all(&mut graph), vec![Classification::None]);
    }

    #[test]
    fn object_reparent_is_none() {
        let mut graph = ProgramGraph::new();
        let start = graph.add_node(NodeKind::WhenStarted);
        let cube = graph.add_node(NodeKind::CreateBox);
        drain(&mut graph);
        graph.attach(start, DO_INPUT, cube).unwrap();
        assert!(classify_all(&mut graph).iter().all(Classification::is_none));
    }

    #[test]
    fn transform_child_reports_its_object() {
        let mut graph = ProgramGraph::new();
        let cube = graph.add_node_with_shadows(NodeKind::CreateBox);
        let mv = graph.add_node_with_shadows(NodeKind::MoveTo);
        drain(&mut graph);
        graph.attach(cube, DO_INPUT, mv).unwrap();
        let result = classify_all(&mut graph);
        assert_eq!(
            result,
            vec![Classification::Change(ChangeTarget::role(cube, DO_INPUT, AttributeRole::Children))]
        );

        let x = graph.node(mv).unwrap().input("X").unwrap().shadow.unwrap();
        graph.edit_field(x, NUMBER_FIELD, FieldValue::Number(3.0)).unwrap();
        let result = classify_all(&mut graph);
        assert_eq!(result[0].target().unwrap().owner, cube);
    }

    #[test]
    fn undone_creation_reports_deletion() {
        let mut graph = ProgramGraph::new();
        let cube = graph.add_node_with_shadows(NodeKind::CreateBox);
        drain(&mut graph);
        graph.undo();
        let result = classify_all(&mut graph);
        assert!(result.contains(&Classification::Change(ChangeTarget {
            owner: cube,
            attribute: ChangeAttribute::Deleted
        })));
    }

    #[test]
    fn unknown_field_on_tracked_node_is_none() {
        let mut graph = ProgramGraph::new();
        let cube = graph.add_node(NodeKind::CreateBox);
        drain(&mut graph);
        graph.edit_field(cube, "COMMENT", FieldValue::from("hi")).unwrap();
        assert_eq!(classify_all(&mut graph), vec![Classification::None]);
    }
}
