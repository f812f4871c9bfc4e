//! Closed set of program node kinds and their per-kind attribute tables.
//!
//! Every question the sync engine asks about a node type ("which inputs are
//! dimensions?", "which shadow values does a fresh node get?") is answered
//! here, so dispatch never matches on free-form type strings.

use serde::{Deserialize, Serialize};

/// Statement input holding child instructions.
pub const DO_INPUT: &str = "DO";
/// Field holding the asset name on model and character nodes.
pub const MODEL_FIELD: &str = "MODELS";
/// Field holding the map name on map nodes.
pub const MAP_FIELD: &str = "MAP_NAME";
/// Field holding a number on [`NodeKind::Number`] nodes.
pub const NUMBER_FIELD: &str = "NUM";
/// Field holding free text on [`NodeKind::Text`] nodes.
pub const TEXT_FIELD: &str = "TEXT";
/// Field holding a hex color on [`NodeKind::Color`] nodes.
pub const COLOR_FIELD: &str = "COLOUR";
/// Field holding the texture set on [`NodeKind::Material`] nodes.
pub const TEXTURE_FIELD: &str = "TEXTURE_SET";

/// Semantic parts of a character and the input that colors each of them.
pub const CHARACTER_PARTS: &[(&str, &str)] = &[
    ("SKIN", "Skin"),
    ("HAIR", "Hair"),
    ("EYES", "Eyes"),
    ("SLEEVES", "Sleeves"),
    ("SHORTS", "Shorts"),
    ("TSHIRT", "TShirt"),
];

/// Input name coloring the given character part, matched case-insensitively.
pub fn character_input_for_part(part: &str) -> Option<&'static str> {
    CHARACTER_PARTS
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(part))
        .map(|(input, _)| *input)
}

/// Part name colored by the given character input.
pub fn character_part_for_input(input: &str) -> Option<&'static str> {
    CHARACTER_PARTS
        .iter()
        .find(|(name, _)| *name == input)
        .map(|(_, part)| *part)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point wrapping top-level instructions.
    WhenStarted,
    CreateBox,
    CreateSphere,
    CreateCylinder,
    CreateCapsule,
    CreatePlane,
    AddModel,
    AddCharacter,
    SetGround,
    SetSky,
    SetMap,
    MoveTo,
    RotateTo,
    Resize,
    Number,
    Text,
    Color,
    ColorList,
    RandomColor,
    Material,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Box,
    Sphere,
    Cylinder,
    Capsule,
    Plane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Primitive(PrimitiveKind),
    Model,
    Character,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentKind {
    Ground,
    Sky,
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    MoveTo,
    RotateTo,
    Resize,
}

/// Coarse grouping used by the classifier and the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    EntryPoint,
    /// Places one entity in the scene.
    Object(ObjectKind),
    /// Models environment state; dispatched even without an entity.
    Environment(EnvironmentKind),
    /// Child instruction adjusting its enclosing object's transform.
    Transform(TransformKind),
    /// Pure value feeding another node's input.
    Value,
}

impl NodeCategory {
    /// Whether nodes of this category own attributes the scene tracks.
    pub fn is_tracked(&self) -> bool {
        !matches!(self, NodeCategory::EntryPoint | NodeCategory::Value)
    }
}

/// What a change to a named attribute means for the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeRole {
    Dimension,
    Tessellation,
    Appearance,
    Position,
    Scale,
    ModelRef,
    /// The statement list of child instructions changed.
    Children,
    /// A field or input of a move/rotate/resize instruction.
    TransformParam,
}

/// Default value a shadow placeholder carries when a node is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowDefault {
    Number(f64),
    Color(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotTemplate {
    pub input: &'static str,
    pub shadow: ShadowDefault,
}

const fn num(input: &'static str, value: f64) -> SlotTemplate {
    SlotTemplate {
        input,
        shadow: ShadowDefault::Number(value),
    }
}

const fn color(input: &'static str, hex: &'static str) -> SlotTemplate {
    SlotTemplate {
        input,
        shadow: ShadowDefault::Color(hex),
    }
}

const POSITION: [SlotTemplate; 3] = [num("X", 0.0), num("Y", 0.0), num("Z", 0.0)];

const BOX_SLOTS: &[SlotTemplate] = &[
    num("WIDTH", 1.0),
    num("HEIGHT", 1.0),
    num("DEPTH", 1.0),
    color("COLOR", "#9932cc"),
    POSITION[0],
    POSITION[1],
    POSITION[2],
];
const SPHERE_SLOTS: &[SlotTemplate] = &[
    num("DIAMETER", 1.0),
    num("SEGMENTS", 16.0),
    color("COLOR", "#1e90ff"),
    POSITION[0],
    POSITION[1],
    POSITION[2],
];
const CYLINDER_SLOTS: &[SlotTemplate] = &[
    num("HEIGHT", 2.0),
    num("DIAMETER_TOP", 1.0),
    num("DIAMETER_BOTTOM", 1.0),
    num("TESSELLATION", 24.0),
    color("COLOR", "#ff7f50"),
    POSITION[0],
    POSITION[1],
    POSITION[2],
];
const CAPSULE_SLOTS: &[SlotTemplate] = &[
    num("DIAMETER", 1.0),
    num("HEIGHT", 2.0),
    color("COLOR", "#32cd32"),
    POSITION[0],
    POSITION[1],
    POSITION[2],
];
const PLANE_SLOTS: &[SlotTemplate] = &[
    num("WIDTH", 2.0),
    num("HEIGHT", 2.0),
    color("COLOR", "#d3d3d3"),
    POSITION[0],
    POSITION[1],
    POSITION[2],
];
const MODEL_SLOTS: &[SlotTemplate] = &[num("SCALE", 1.0), POSITION[0], POSITION[1], POSITION[2]];
const CHARACTER_SLOTS: &[SlotTemplate] = &[
    num("SCALE", 1.0),
    color("SKIN", "#f0c8a0"),
    color("HAIR", "#3b2314"),
    color("EYES", "#000000"),
    color("SLEEVES", "#ffffff"),
    color("SHORTS", "#00008b"),
    color("TSHIRT", "#ff8f60"),
    POSITION[0],
    POSITION[1],
    POSITION[2],
];
const GROUND_SLOTS: &[SlotTemplate] = &[color("COLOR", "#71bc78")];
const SKY_SLOTS: &[SlotTemplate] = &[color("COLOR", "#87ceeb")];
const XYZ_SLOTS: &[SlotTemplate] = &[num("X", 0.0), num("Y", 0.0), num("Z", 0.0)];
const RESIZE_SLOTS: &[SlotTemplate] = &[num("X", 1.0), num("Y", 1.0), num("Z", 1.0)];
const MATERIAL_SLOTS: &[SlotTemplate] = &[color("BASE_COLOR", "#ffffff"), num("ALPHA", 1.0)];

impl NodeKind {
    pub fn category(&self) -> NodeCategory {
        use NodeKind::*;
        match self {
            WhenStarted => NodeCategory::EntryPoint,
            CreateBox => NodeCategory::Object(ObjectKind::Primitive(PrimitiveKind::Box)),
            CreateSphere => NodeCategory::Object(ObjectKind::Primitive(PrimitiveKind::Sphere)),
            CreateCylinder => NodeCategory::Object(ObjectKind::Primitive(PrimitiveKind::Cylinder)),
            CreateCapsule => NodeCategory::Object(ObjectKind::Primitive(PrimitiveKind::Capsule)),
            CreatePlane => NodeCategory::Object(ObjectKind::Primitive(PrimitiveKind::Plane)),
            AddModel => NodeCategory::Object(ObjectKind::Model),
            AddCharacter => NodeCategory::Object(ObjectKind::Character),
            SetGround => NodeCategory::Environment(EnvironmentKind::Ground),
            SetSky => NodeCategory::Environment(EnvironmentKind::Sky),
            SetMap => NodeCategory::Environment(EnvironmentKind::Map),
            MoveTo => NodeCategory::Transform(TransformKind::MoveTo),
            RotateTo => NodeCategory::Transform(TransformKind::RotateTo),
            Resize => NodeCategory::Transform(TransformKind::Resize),
            Number | Text | Color | ColorList | RandomColor | Material => NodeCategory::Value,
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.category().is_tracked()
    }

    /// The kind's primitive shape, if it builds one.
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self.category() {
            NodeCategory::Object(ObjectKind::Primitive(p)) => Some(p),
            _ => None,
        }
    }

    /// Names of statement inputs (ordered child instruction lists).
    pub fn statement_inputs(&self) -> &'static [&'static str] {
        match self.category() {
            NodeCategory::EntryPoint | NodeCategory::Object(_) => &[DO_INPUT],
            _ => &[],
        }
    }

    pub fn is_statement_input(&self, input: &str) -> bool {
        self.statement_inputs().contains(&input)
    }

    /// Shadow placeholders materialized into a freshly created node.
    pub fn slot_templates(&self) -> &'static [SlotTemplate] {
        use NodeKind::*;
        match self {
            CreateBox => BOX_SLOTS,
            CreateSphere => SPHERE_SLOTS,
            CreateCylinder => CYLINDER_SLOTS,
            CreateCapsule => CAPSULE_SLOTS,
            CreatePlane => PLANE_SLOTS,
            AddModel => MODEL_SLOTS,
            AddCharacter => CHARACTER_SLOTS,
            SetGround => GROUND_SLOTS,
            SetSky => SKY_SLOTS,
            MoveTo | RotateTo => XYZ_SLOTS,
            Resize => RESIZE_SLOTS,
            Material => MATERIAL_SLOTS,
            _ => &[],
        }
    }

    /// Template for a single input, if the kind declares one.
    pub fn slot_template(&self, input: &str) -> Option<&'static SlotTemplate> {
        self.slot_templates().iter().find(|t| t.input == input)
    }

    /// Scalar fields a fresh node starts with.
    pub fn default_fields(&self) -> &'static [(&'static str, &'static str)] {
        use NodeKind::*;
        match self {
            AddModel => &[(MODEL_FIELD, "tree")],
            AddCharacter => &[(MODEL_FIELD, "character")],
            SetMap => &[(MAP_FIELD, "flat")],
            Resize => &[("X_ORIGIN", "center"), ("Y_ORIGIN", "min"), ("Z_ORIGIN", "center")],
            Material => &[(TEXTURE_FIELD, "none")],
            Color => &[(COLOR_FIELD, "#ffffff")],
            Text => &[(TEXT_FIELD, "")],
            _ => &[],
        }
    }

    /// Dimension inputs of a primitive, in x/y/z order where meaningful.
    pub fn dimension_inputs(&self) -> &'static [&'static str] {
        match self.primitive() {
            Some(PrimitiveKind::Box) => &["WIDTH", "HEIGHT", "DEPTH"],
            Some(PrimitiveKind::Sphere) => &["DIAMETER"],
            Some(PrimitiveKind::Cylinder) => &["HEIGHT", "DIAMETER_TOP", "DIAMETER_BOTTOM"],
            Some(PrimitiveKind::Capsule) => &["DIAMETER", "HEIGHT"],
            Some(PrimitiveKind::Plane) => &["WIDTH", "HEIGHT"],
            None => &[],
        }
    }

    /// Input whose value is a tessellation level rather than a size.
    pub fn tessellation_input(&self) -> Option<&'static str> {
        match self.primitive() {
            Some(PrimitiveKind::Sphere) => Some("SEGMENTS"),
            Some(PrimitiveKind::Cylinder) => Some("TESSELLATION"),
            _ => None,
        }
    }

    /// Inputs that carry a color or material binding.
    pub fn appearance_inputs(&self) -> Vec<&'static str> {
        match self.category() {
            NodeCategory::Object(ObjectKind::Character) => {
                CHARACTER_PARTS.iter().map(|(input, _)| *input).collect()
            }
            NodeCategory::Object(_) => vec!["COLOR"],
            NodeCategory::Environment(EnvironmentKind::Map) => vec!["MATERIAL"],
            NodeCategory::Environment(_) => vec!["COLOR"],
            _ => Vec::new(),
        }
    }

    /// Map an attribute name to its role for this kind.
    ///
    /// Returns `None` for names the scene does not track.
    pub fn attribute_role(&self, name: &str) -> Option<AttributeRole> {
        match self.category() {
            NodeCategory::Object(object) => {
                if self.dimension_inputs().contains(&name) {
                    return Some(AttributeRole::Dimension);
                }
                if self.tessellation_input() == Some(name) {
                    return Some(AttributeRole::Tessellation);
                }
                if self.appearance_inputs().contains(&name) {
                    return Some(AttributeRole::Appearance);
                }
                match name {
                    "X" | "Y" | "Z" => Some(AttributeRole::Position),
                    DO_INPUT => Some(AttributeRole::Children),
                    "SCALE" if !matches!(object, ObjectKind::Primitive(_)) => {
                        Some(AttributeRole::Scale)
                    }
                    MODEL_FIELD if !matches!(object, ObjectKind::Primitive(_)) => {
                        Some(AttributeRole::ModelRef)
                    }
                    _ => None,
                }
            }
            NodeCategory::Environment(env) => {
                if self.appearance_inputs().contains(&name) {
                    return Some(AttributeRole::Appearance);
                }
                match (env, name) {
                    (EnvironmentKind::Map, MAP_FIELD) => Some(AttributeRole::ModelRef),
                    _ => None,
                }
            }
            NodeCategory::Transform(_) => match name {
                "X" | "Y" | "Z" | "X_ORIGIN" | "Y_ORIGIN" | "Z_ORIGIN" => {
                    Some(AttributeRole::TransformParam)
                }
                _ => None,
            },
            NodeCategory::EntryPoint | NodeCategory::Value => None,
        }
    }

    /// Stable lowercase label used in entity names and logs.
    pub fn label(&self) -> &'static str {
        use NodeKind::*;
        match self {
            WhenStarted => "when_started",
            CreateBox => "box",
            CreateSphere => "sphere",
            CreateCylinder => "cylinder",
            CreateCapsule => "capsule",
            CreatePlane => "plane",
            AddModel => "model",
            AddCharacter => "character",
            SetGround => "ground",
            SetSky => "sky",
            SetMap => "map",
            MoveTo => "move_to",
            RotateTo => "rotate_to",
            Resize => "resize",
            Number => "number",
            Text => "text",
            Color => "color",
            ColorList => "color_list",
            RandomColor => "random_color",
            Material => "material",
        }
    }
}
