//! Model declarations synthesized from schema nodes.
//!
//! A [`ModelDeclaration`] is the language-neutral shape of one generated type:
//! a struct with its folded fields, a closed or extensible enum, an untagged
//! union, or a discriminated (polymorphic) union. Declarations carry proposed
//! names only; final names are assigned by the name registry in one pass.

pub mod codec;
pub mod sample;
pub mod synth;
pub mod usage;

// Internal imports (std, crate)
use crate::ir::{EnumValueType, Lifecycle, NodeRef, SchemaId, Versioning, Visibility};
use crate::types::TargetType;

// External imports (alphabetized)
use serde_json::Value as JsonValue;

pub use codec::{Codec, LogicalValue, ModelValue, VariantValue};
pub use sample::SampleBuilder;
pub use synth::ModelSynthesizer;
pub use usage::{compute_usage, Usage};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDeclaration {
    pub schema_id: SchemaId,
    pub node: NodeRef,
    /// Proposed by the namer, replaced by the registered name
    pub name: String,
    /// Set by a `rename-model` option; may not be suffixed
    pub pinned: bool,
    pub description: Option<String>,
    pub usage: Usage,
    pub versioning: Versioning,
    pub kind: DeclarationKind,
}

impl ModelDeclaration {
    pub fn as_struct(&self) -> Option<&StructDecl> {
        match &self.kind {
            DeclarationKind::Struct(decl) => Some(decl),
            _ => None,
        }
    }

    /// Template-facing kind tag, matching the manifest's `for_each` values
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DeclarationKind::Struct(_) => "model",
            DeclarationKind::Enum(_) => "enum",
            DeclarationKind::Union(_) => "union",
            DeclarationKind::Polymorphic(_) => "polymorphic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationKind {
    Struct(StructDecl),
    Enum(EnumDecl),
    Union(UnionDecl),
    Polymorphic(PolymorphicDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    /// Wire order: inherited first, then own and spread fields; hoisted
    /// fields sit where their container property was declared
    pub fields: Vec<FieldDecl>,
    /// Hidden nested objects that flattened fields live in
    pub containers: Vec<ContainerDecl>,
    pub additional: Option<AdditionalDecl>,
    /// Lifecycle-specific projections, declared only when they differ
    pub surfaces: Vec<SurfaceDecl>,
}

impl StructDecl {
    /// Wire names occupying the top level of the object
    pub fn known_wire_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for field in &self.fields {
            let top = field.wire_path[0].as_str();
            if !names.contains(&top) {
                names.push(top);
            }
        }
        names
    }

    pub fn field(&self, wire_path: &[String]) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.wire_path == wire_path)
    }

    pub fn container(&self, wire_name: &str) -> Option<&ContainerDecl> {
        self.containers.iter().find(|c| c.wire_name == wire_name)
    }

    pub fn surface(&self, lifecycle: Lifecycle) -> Option<&SurfaceDecl> {
        self.surfaces.iter().find(|s| s.lifecycle == lifecycle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOrigin {
    Own,
    /// Folded in from a base model
    Inherited(SchemaId),
    /// Hoisted out of the container property with this wire name
    Flattened { container: String },
    /// Merged from a spread model into the same wire object
    Spread(SchemaId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub wire_name: String,
    /// Location in the wire object; longer than one segment when flattened
    pub wire_path: Vec<String>,
    /// Snake-case member name; replaced by the registered name
    pub name: String,
    pub target: TargetType,
    pub required: bool,
    pub visibility: Visibility,
    pub versioning: Versioning,
    pub origin: FieldOrigin,
    /// Constant wire value; such a field is not settable
    pub literal: Option<JsonValue>,
    pub description: Option<String>,
    pub node: NodeRef,
}

/// How a field is held by the generated type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Always present, never null
    Plain,
    /// Present but possibly null
    RequiredNullable,
    /// May be absent
    Optional,
    /// May be absent, null, or a value
    Nullable,
}

impl FieldDecl {
    pub fn path_key(&self) -> String {
        self.wire_path.join(".")
    }

    pub fn is_constant(&self) -> bool {
        self.literal.is_some()
    }

    /// Whether the field can be written by the caller at all
    pub fn is_settable(&self) -> bool {
        self.literal.is_none() && (self.visibility.create || self.visibility.update)
    }

    /// Required fields the caller must supply when constructing
    pub fn is_constructor_arg(&self) -> bool {
        self.required && self.visibility.create && self.literal.is_none()
    }

    pub fn storage(&self) -> Storage {
        match (self.is_constructor_arg(), self.target.nullable) {
            (true, false) => Storage::Plain,
            (true, true) => Storage::RequiredNullable,
            (false, false) => Storage::Optional,
            (false, true) => Storage::Nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDecl {
    pub wire_name: String,
    pub schema_id: SchemaId,
    pub name: String,
    pub required: bool,
    pub node: NodeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdditionalDecl {
    pub value: TargetType,
    pub node: NodeRef,
}

/// A lifecycle projection such as `WidgetCreate`
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDecl {
    pub lifecycle: Lifecycle,
    pub name: String,
    pub node: NodeRef,
    /// Wire path keys of the projected fields, in wire order
    pub fields: Vec<String>,
    /// Update surfaces relax every field to optional
    pub all_optional: bool,
    /// Every field can be sent as an explicit `null`
    pub merge_patch: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub value_type: EnumValueType,
    pub extensible: bool,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: JsonValue,
    pub description: Option<String>,
    pub node: NodeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDecl {
    pub variants: Vec<UnionVariant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionVariant {
    pub name: String,
    pub target: TargetType,
    pub node: NodeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolymorphicDecl {
    pub discriminator: String,
    pub base: Option<SchemaId>,
    pub variants: Vec<PolymorphicVariant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolymorphicVariant {
    /// Discriminator wire value
    pub wire_value: String,
    pub schema_id: SchemaId,
    pub name: String,
    pub versioning: Versioning,
    pub node: NodeRef,
}

/// Name of the catch-all variant of every polymorphic type
pub const UNKNOWN_VARIANT: &str = "Unknown";
/// Name of the catch-all variant of every extensible enum
pub const OTHER_VARIANT: &str = "Other";
