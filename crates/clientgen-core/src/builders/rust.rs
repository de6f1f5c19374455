//! Rust context builder for the `rust_client` templates.
//!
//! Generated files refer to the runtime as `rt` and spell every other
//! external type with its full path, so the strings computed here can be
//! dropped into any module without extra imports.

// Internal imports (std, crate)
use std::collections::HashSet;

use super::{ContextBuilder, ItemContext, RenderContext};
use crate::config::Config;
use crate::emit::ResolvedSurface;
use crate::error::{Error, Result};
use crate::ir::{
    BodyContentType, EnumValueType, HttpMethod, Lifecycle, NodeRef, ParameterLocation, WireEncoding,
};
use crate::model::{
    Codec, DeclarationKind, EnumDecl, FieldDecl, ModelDeclaration, PolymorphicDecl, SampleBuilder, Storage,
    StructDecl, SurfaceDecl, UnionDecl, OTHER_VARIANT, UNKNOWN_VARIANT,
};
use crate::naming::{to_identifier, CaseConvention, NameContext};
use crate::operation::{
    BindingSource, BodyDecl, GroupDecl, OperationDeclaration, ParameterBinding, ResponseRoute, ReturnShape,
    SignatureSlot, OPTIONS_KEY,
};
use crate::templates::TemplateOptions;
use crate::types::{NamedKind, ScalarType, Shape, TargetType};
use crate::versioning::ShimTarget;

// External imports (alphabetized)
use clientgen_runtime::StatusPattern;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Builds contexts for the built-in `rust_client` templates
#[derive(Debug, Clone, Copy, Default)]
pub struct RustContextBuilder;

/// Crate-wide context shared by every template
#[derive(Debug, Clone, Serialize)]
pub struct RustCrateContext {
    /// Library name of the generated crate
    pub crate_name: String,
    /// Package name; `crate_name` with dashes
    pub package_name: String,
    pub crate_version: String,
    /// Right-hand side of the `clientgen-runtime` dependency line
    pub runtime_dependency: String,
    pub service: RustServiceContext,
    pub has_versions: bool,
    pub versions: Vec<RustVersionContext>,
    /// `ServiceVersion` variant used when the caller pins none
    pub latest_version: Option<String>,
    /// Every model-level declaration, one file each
    pub models: Vec<RustTypeEntry>,
    /// Group and `{Op}Options` types
    pub options_types: Vec<RustTypeEntry>,
    /// Deprecated aliases of renamed models
    pub type_aliases: Vec<RustAliasContext>,
    pub methods: Vec<RustMethodContext>,
    /// Deprecated forwarders of renamed operations
    pub method_shims: Vec<RustMethodShimContext>,
    pub roundtrips: Vec<RustRoundtripContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustServiceContext {
    pub name: String,
    pub docs: Vec<String>,
    /// Default endpoint as a Rust string literal
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustVersionContext {
    pub token: String,
    /// `token` as a Rust string literal
    pub literal: String,
    pub variant: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustTypeEntry {
    pub name: String,
    pub file: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustAliasContext {
    pub old: String,
    pub name: String,
}

/// A struct model and its lifecycle surfaces
#[derive(Debug, Clone, Serialize)]
pub struct RustModelContext {
    pub name: String,
    pub file: String,
    pub docs: Vec<String>,
    /// Stored members: top-level fields, then containers
    pub fields: Vec<RustMemberContext>,
    pub accessors: Vec<RustAccessorContext>,
    /// `name: Type` parameters of `new`
    pub constructor_params: Vec<String>,
    pub constructor_inits: Vec<RustInitContext>,
    pub additional: Option<RustAdditionalContext>,
    pub deprecated_getters: Vec<RustDeprecatedGetterContext>,
    pub surfaces: Vec<RustSurfaceContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustMemberContext {
    pub name: String,
    pub ty: String,
    /// Complete `#[serde(...)]` attribute
    pub attrs: String,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustAccessorContext {
    pub name: String,
    pub docs: Vec<String>,
    pub return_type: String,
    pub body: String,
    pub setter: Option<RustSetterContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustSetterContext {
    pub name: String,
    /// Type of the `value` parameter
    pub param: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustInitContext {
    pub name: String,
    pub expr: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustAdditionalContext {
    pub value_type: String,
    /// Declared top-level wire names as Rust string literals
    pub known: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustDeprecatedGetterContext {
    pub name: String,
    pub target: String,
    pub return_type: String,
}

/// A lifecycle projection such as `WidgetCreate`
#[derive(Debug, Clone, Serialize)]
pub struct RustSurfaceContext {
    pub name: String,
    pub lifecycle: String,
    pub has_default: bool,
    pub fields: Vec<RustSurfaceFieldContext>,
    /// Statements filling `object` in the hand-written `Serialize`
    pub writes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustSurfaceFieldContext {
    pub name: String,
    pub ty: String,
    pub docs: Vec<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustEnumContext {
    pub name: String,
    pub file: String,
    pub docs: Vec<String>,
    /// Integer-valued rather than string-valued
    pub integer: bool,
    pub extensible: bool,
    pub other: String,
    pub members: Vec<RustEnumMemberContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustEnumMemberContext {
    pub name: String,
    /// Wire value as a Rust literal
    pub value: String,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustUnionContext {
    pub name: String,
    pub file: String,
    pub docs: Vec<String>,
    pub variants: Vec<RustVariantContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustVariantContext {
    pub name: String,
    pub ty: String,
    /// Discriminator value as a Rust string literal; polymorphic only
    pub wire_value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustPolymorphicContext {
    pub name: String,
    pub file: String,
    pub docs: Vec<String>,
    /// Discriminator property as a Rust string literal
    pub discriminator: String,
    pub unknown: String,
    pub variants: Vec<RustVariantContext>,
}

/// A group type or an `{Op}Options` type
#[derive(Debug, Clone, Serialize)]
pub struct RustOptionsContext {
    pub name: String,
    pub file: String,
    pub docs: Vec<String>,
    pub fields: Vec<RustSurfaceFieldContext>,
    pub has_default: bool,
    pub constructor_params: Vec<String>,
    pub constructor_inits: Vec<RustInitContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustMethodContext {
    pub name: String,
    /// Operation id as a Rust string literal
    pub operation: String,
    pub docs: Vec<String>,
    /// `name: Type` parameters after `&self`
    pub params: Vec<String>,
    /// Argument names in signature order
    pub args: Vec<String>,
    pub return_type: String,
    /// `single`, `paged` or `long_running`
    pub kind: String,
    /// `ServiceVersion` variant the operation was added in
    pub gate: Option<String>,
    /// `rt::Method` variant
    pub http_method: String,
    /// Path template as a Rust string literal
    pub path: String,
    pub bindings: Vec<RustBindingContext>,
    pub body: Option<RustBodyContext>,
    pub patterns: Vec<String>,
    pub arms: Vec<RustArmContext>,
    pub fallback: String,
    pub paging: Option<RustPagingContext>,
    pub polling: Option<RustPollingContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustBindingContext {
    /// `path_param`, `query` or `header`
    pub call: String,
    /// Wire name as a Rust string literal
    pub wire_name: String,
    /// Expression yielding the value, an `Option` when `optional`
    pub access: String,
    pub optional: bool,
    pub gate: Option<String>,
    /// Name reported by the gate, as a Rust string literal
    pub gate_name: String,
    /// Wire form of `value`
    pub expr: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustBodyContext {
    pub spread: bool,
    pub access: String,
    pub optional: bool,
    /// `RequestBuilder` method that attaches the body
    pub call: String,
    /// Arguments of `call`
    pub expr: String,
    pub members: Vec<RustBodyMemberContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustBodyMemberContext {
    /// Body property as a Rust string literal
    pub key: String,
    pub access: String,
    pub optional: bool,
    pub expr: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustArmContext {
    pub index: usize,
    pub expr: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustPagingContext {
    pub item_type: String,
    pub items_path: String,
    pub next_link_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustPollingContext {
    pub strategy: String,
    pub status_path: String,
    pub result_path: String,
    pub result_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustMethodShimContext {
    pub name: String,
    pub target: String,
    pub params: Vec<String>,
    pub args: Vec<String>,
    pub return_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RustRoundtripContext {
    pub test_name: String,
    pub type_name: String,
    pub json: String,
    /// Hashes delimiting the raw string literal
    pub hashes: String,
}

impl ContextBuilder for RustContextBuilder {
    fn build(&self, resolved: &ResolvedSurface, config: &Config, options: &TemplateOptions) -> Result<RenderContext> {
        let types = RustTypes { resolved };
        let base = types.crate_context(config, options)?;
        let mut context = RenderContext::new(to_map(&base)?);

        for decl in resolved.surface.models.values() {
            let file = types.file_of(&decl.name, &decl.node)?;
            let item = match &decl.kind {
                DeclarationKind::Struct(structure) => to_map(&types.model(decl, structure, &file)?)?,
                DeclarationKind::Enum(enumeration) => to_map(&types.enumeration(decl, enumeration, &file))?,
                DeclarationKind::Union(union) => to_map(&types.union(decl, union, &file)?)?,
                DeclarationKind::Polymorphic(poly) => to_map(&types.polymorphic(decl, poly, &file)?)?,
            };
            context.push(
                decl.kind_name(),
                ItemContext {
                    name: decl.name.clone(),
                    file,
                    context: item,
                },
            )?;
        }

        for options_type in types.options_types()? {
            context.push(
                "options",
                ItemContext {
                    name: options_type.name.clone(),
                    file: options_type.file.clone(),
                    context: to_map(&options_type)?,
                },
            )?;
        }
        Ok(context)
    }
}

fn to_map<T: Serialize>(value: &T) -> Result<Map<String, JsonValue>> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::template(format!("context must be an object, got {}", other))),
    }
}

/// `///` lines for a description
fn doc_lines(description: Option<&str>) -> Vec<String> {
    description
        .map(|text| {
            text.trim()
                .lines()
                .map(|line| match line.trim_end() {
                    "" => "///".to_string(),
                    line => format!("/// {}", line),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn literal(text: &str) -> String {
    format!("{:?}", text)
}

/// A `serde_json::json!` body reproducing `value`
fn json_expr(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => literal(s),
        JsonValue::Array(items) => format!("[{}]", items.iter().map(json_expr).collect::<Vec<_>>().join(", ")),
        JsonValue::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", literal(k), json_expr(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn path_literal(path: &[String]) -> String {
    format!("&[{}]", path.iter().map(|s| literal(s)).collect::<Vec<_>>().join(", "))
}

fn raw_string_hashes(text: &str) -> String {
    let mut hashes = "#".to_string();
    while text.contains(&format!("\"{}", hashes)) {
        hashes.push('#');
    }
    hashes
}

fn encoding_marker(encoding: WireEncoding) -> &'static str {
    match encoding {
        WireEncoding::Base64 => "Base64",
        WireEncoding::Base64Url => "Base64Url",
        WireEncoding::Rfc3339 => "Rfc3339",
        WireEncoding::Rfc7231 => "Rfc7231",
        WireEncoding::UnixTimestamp => "UnixTimestamp",
        WireEncoding::Iso8601 => "Iso8601",
        WireEncoding::Seconds => "Seconds",
        WireEncoding::Milliseconds => "Milliseconds",
        WireEncoding::NumericString => "NumericString",
    }
}

fn logical_scalar(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::String => "String",
        ScalarType::Bool => "bool",
        ScalarType::Int32 => "i32",
        ScalarType::Int64 => "i64",
        ScalarType::Float32 => "f32",
        ScalarType::Float64 => "f64",
        ScalarType::Decimal => "rust_decimal::Decimal",
        ScalarType::Bytes => "Vec<u8>",
        ScalarType::DateTime => "chrono::DateTime<chrono::Utc>",
        ScalarType::Date => "chrono::NaiveDate",
        ScalarType::Time => "chrono::NaiveTime",
        ScalarType::Duration => "chrono::Duration",
        ScalarType::Url => "url::Url",
        ScalarType::Uuid => "uuid::Uuid",
    }
}

/// Encoding that changes the stored type of `scalar`, if any
fn effective_encoding(scalar: ScalarType, encoding: Option<WireEncoding>) -> Option<WireEncoding> {
    encoding.filter(|e| scalar.allowed_encodings().contains(e))
}

/// Wire text of a scalar parameter held in `value`
fn scalar_param_expr(scalar: ScalarType, encoding: Option<WireEncoding>, value: &str) -> String {
    let function = match (scalar, encoding) {
        (ScalarType::DateTime, Some(WireEncoding::Rfc7231)) => "format_rfc7231",
        (ScalarType::DateTime, Some(WireEncoding::UnixTimestamp)) => "to_unix_timestamp",
        (ScalarType::DateTime, _) => "format_rfc3339",
        (ScalarType::Bytes, Some(WireEncoding::Base64Url)) => "encode_base64url",
        (ScalarType::Bytes, _) => "encode_base64",
        (ScalarType::Duration, Some(WireEncoding::Seconds)) => "duration_to_seconds",
        (ScalarType::Duration, Some(WireEncoding::Milliseconds)) => "duration_to_millis",
        (ScalarType::Duration, _) => "format_iso8601_duration",
        _ => return value.to_string(),
    };
    format!("rt::encoding::{}({})", function, value)
}

fn pattern_expr(pattern: &StatusPattern) -> String {
    match pattern {
        StatusPattern::Exact(code) => format!("rt::StatusPattern::Exact({})", code),
        StatusPattern::Range { low, high } => format!("rt::StatusPattern::Range {{ low: {}, high: {} }}", low, high),
        StatusPattern::Default => "rt::StatusPattern::Default".to_string(),
    }
}

fn float_literal(n: &serde_json::Number) -> String {
    let text = n.to_string();
    if text.contains('.') || text.contains('e') || text.contains('E') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// How a getter hands out its field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GetterKind {
    /// `&T`
    Ref,
    /// `Option<&T>`
    Opt,
    /// `rt::Nullable<&T>`
    Null,
}

#[derive(Debug, Clone)]
struct Setter {
    param: String,
    body: String,
}

/// Read and write paths of one field, possibly through containers
#[derive(Debug, Clone)]
struct Access {
    kind: GetterKind,
    /// Element type the getter borrows
    elem: String,
    get: String,
    set: Option<Setter>,
}

impl Access {
    fn return_type(&self) -> String {
        match self.kind {
            GetterKind::Ref => format!("&{}", self.elem),
            GetterKind::Opt => format!("Option<&{}>", self.elem),
            GetterKind::Null => format!("rt::Nullable<&{}>", self.elem),
        }
    }
}

struct RustTypes<'a> {
    resolved: &'a ResolvedSurface,
}

impl<'a> RustTypes<'a> {
    fn declaration(&self, schema_id: &str, node: &NodeRef) -> Result<&'a ModelDeclaration> {
        self.resolved.surface.models.get(schema_id).ok_or_else(|| {
            Error::template(format!("{} references '{}', which is not emitted", node, schema_id))
        })
    }

    fn file_of(&self, type_name: &str, node: &NodeRef) -> Result<String> {
        self.resolved
            .names
            .file(type_name)
            .map(str::to_string)
            .ok_or_else(|| Error::template(format!("{} has no module file", node)))
    }

    /// Spelling of a stored value; encoded scalars carry their encoding
    fn value_type(&self, target: &TargetType, node: &NodeRef) -> Result<String> {
        self.spell(target, node, true)
    }

    /// Caller-facing spelling used for parameters
    fn logical_type(&self, target: &TargetType, node: &NodeRef) -> Result<String> {
        self.spell(target, node, false)
    }

    fn spell(&self, target: &TargetType, node: &NodeRef, storage: bool) -> Result<String> {
        Ok(match &target.shape {
            Shape::Scalar(scalar) => {
                let logical = logical_scalar(*scalar);
                match effective_encoding(*scalar, target.encoding).filter(|_| storage) {
                    Some(encoding) => format!("rt::Encoded<{}, rt::encoding::{}>", logical, encoding_marker(encoding)),
                    None => logical.to_string(),
                }
            }
            Shape::List(inner) => format!("Vec<{}>", self.element(inner, node, storage)?),
            Shape::Map(inner) => format!("indexmap::IndexMap<String, {}>", self.element(inner, node, storage)?),
            Shape::Named(id, _) => self.declaration(id, node)?.name.clone(),
            Shape::Any => "serde_json::Value".to_string(),
        })
    }

    fn element(&self, inner: &TargetType, node: &NodeRef, storage: bool) -> Result<String> {
        let spelled = self.spell(inner, node, storage)?;
        Ok(if storage && inner.nullable {
            format!("Option<{}>", spelled)
        } else {
            spelled
        })
    }

    /// Value type, as `Option` when null is a legal value
    fn nullable_value_type(&self, target: &TargetType, node: &NodeRef) -> Result<String> {
        let spelled = self.value_type(target, node)?;
        Ok(if target.nullable {
            format!("Option<{}>", spelled)
        } else {
            spelled
        })
    }

    /// Declarations held inline (not behind a collection) by `decl`
    fn direct_references(decl: &'a ModelDeclaration) -> Vec<&'a str> {
        match &decl.kind {
            DeclarationKind::Struct(structure) => structure
                .fields
                .iter()
                .filter(|f| f.wire_path.len() == 1)
                .filter_map(|f| f.target.named().map(|(id, _)| id))
                .chain(structure.containers.iter().map(|c| c.schema_id.as_str()))
                .collect(),
            DeclarationKind::Union(union) => union
                .variants
                .iter()
                .filter_map(|v| v.target.named().map(|(id, _)| id))
                .collect(),
            DeclarationKind::Polymorphic(poly) => poly.variants.iter().map(|v| v.schema_id.as_str()).collect(),
            DeclarationKind::Enum(_) => Vec::new(),
        }
    }

    /// Whether `from` holds `to` inline, directly or transitively
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(decl) = self.resolved.surface.models.get(current) {
                stack.extend(Self::direct_references(decl));
            }
        }
        false
    }

    /// Stored element type of a direct field, boxed when it would make the
    /// owner infinitely sized
    fn field_elem(&self, owner: &ModelDeclaration, field: &FieldDecl) -> Result<String> {
        let spelled = self.value_type(&field.target, &field.node)?;
        let recursive = match &field.target.shape {
            Shape::Named(id, kind) if *kind != NamedKind::Enum => self.reaches(id, &owner.schema_id),
            _ => false,
        };
        Ok(if recursive { format!("Box<{}>", spelled) } else { spelled })
    }

    /// Type and initializer of a constant field
    fn constant(&self, field: &FieldDecl, value: &JsonValue) -> Result<(String, String)> {
        let untyped = || {
            (
                "serde_json::Value".to_string(),
                format!("serde_json::json!({})", json_expr(value)),
            )
        };
        let encoded = field.target.encoding.is_some();
        Ok(match (&field.target.shape, value) {
            (Shape::Scalar(ScalarType::String), JsonValue::String(s)) if !encoded => {
                ("String".to_string(), format!("{}.to_string()", literal(s)))
            }
            (Shape::Scalar(ScalarType::Bool), JsonValue::Bool(b)) => ("bool".to_string(), b.to_string()),
            (Shape::Scalar(ScalarType::Int32), JsonValue::Number(n))
                if n.as_i64().map_or(false, |v| i32::try_from(v).is_ok()) =>
            {
                ("i32".to_string(), n.to_string())
            }
            (Shape::Scalar(ScalarType::Int64), JsonValue::Number(n)) if !encoded && n.as_i64().is_some() => {
                ("i64".to_string(), n.to_string())
            }
            (Shape::Scalar(ScalarType::Float32), JsonValue::Number(n)) => ("f32".to_string(), float_literal(n)),
            (Shape::Scalar(ScalarType::Float64), JsonValue::Number(n)) => ("f64".to_string(), float_literal(n)),
            (Shape::Named(id, NamedKind::Enum), _) => {
                let decl = self.declaration(id, &field.node)?;
                let DeclarationKind::Enum(enumeration) = &decl.kind else {
                    return Ok(untyped());
                };
                if let Some(member) = enumeration.members.iter().find(|m| &m.value == value) {
                    (decl.name.clone(), format!("{}::{}", decl.name, member.name))
                } else if enumeration.extensible {
                    let payload = match value {
                        JsonValue::String(s) => format!("{}.to_string()", literal(s)),
                        other => other.to_string(),
                    };
                    (decl.name.clone(), format!("{}::{}({})", decl.name, OTHER_VARIANT, payload))
                } else {
                    return Err(Error::template(format!(
                        "{}: constant {} is not a member of {}",
                        field.node, value, decl.name
                    )));
                }
            }
            _ => untyped(),
        })
    }

    fn crate_context(&self, config: &Config, options: &TemplateOptions) -> Result<RustCrateContext> {
        let resolved = self.resolved;
        let crate_name = to_identifier(&config.project_name, CaseConvention::Snake, NameContext::Module);

        let versions: Vec<RustVersionContext> = resolved
            .names
            .versions
            .iter()
            .map(|(token, variant)| RustVersionContext {
                token: token.clone(),
                literal: literal(token),
                variant: variant.clone(),
            })
            .collect();

        let mut models = Vec::new();
        for decl in resolved.surface.models.values() {
            models.push(RustTypeEntry {
                name: decl.name.clone(),
                file: self.file_of(&decl.name, &decl.node)?,
                kind: decl.kind_name().to_string(),
            });
        }

        let options_types = self
            .options_types()?
            .into_iter()
            .map(|o| RustTypeEntry {
                name: o.name,
                file: o.file,
                kind: "options".to_string(),
            })
            .collect();

        let mut type_aliases = Vec::new();
        for shim in &resolved.surface.shims {
            if let ShimTarget::Model(schema_id) = &shim.target {
                type_aliases.push(RustAliasContext {
                    old: shim.name.clone(),
                    name: self.declaration(schema_id, &shim.node)?.name.clone(),
                });
            }
        }

        let mut methods = Vec::new();
        for op in &resolved.surface.operations.operations {
            methods.push(self.method(op)?);
        }

        let mut method_shims = Vec::new();
        for shim in &resolved.surface.shims {
            if let ShimTarget::Operation(operation_id) = &shim.target {
                let target = resolved
                    .surface
                    .operations
                    .operations
                    .iter()
                    .position(|op| &op.operation_id == operation_id)
                    .map(|i| &methods[i])
                    .ok_or_else(|| Error::template(format!("{} aliases a missing operation", shim.node)))?;
                method_shims.push(RustMethodShimContext {
                    name: shim.name.clone(),
                    target: target.name.clone(),
                    params: target.params.clone(),
                    args: target.args.clone(),
                    return_type: target.return_type.clone(),
                });
            }
        }

        let runtime_dependency = match &options.runtime_path {
            Some(path) => format!("{{ path = {:?} }}", path),
            None => format!("\"{}\"", RUNTIME_VERSION),
        };

        Ok(RustCrateContext {
            package_name: crate_name.replace('_', "-"),
            crate_name,
            crate_version: options.crate_version.clone(),
            runtime_dependency,
            service: RustServiceContext {
                name: resolved.service.name.clone(),
                docs: doc_lines(resolved.service.description.as_deref()),
                endpoint: resolved.service.endpoint.as_deref().map(literal),
            },
            has_versions: !versions.is_empty(),
            latest_version: versions.last().map(|v| v.variant.clone()),
            versions,
            models,
            options_types,
            type_aliases,
            methods,
            method_shims,
            roundtrips: self.roundtrips()?,
        })
    }

    fn model(&self, decl: &ModelDeclaration, structure: &StructDecl, file: &str) -> Result<RustModelContext> {
        let mut fields = Vec::new();
        let mut accessors = Vec::new();
        let mut constructor_params = Vec::new();
        let mut constructor_inits = Vec::new();
        let mut methods: HashSet<String> = ["new", "additional_properties", "insert_additional_property"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut claim = |name: &str, node: &NodeRef| -> Result<()> {
            if methods.insert(name.to_string()) {
                Ok(())
            } else {
                Err(Error::NamingCollision {
                    namespace: format!("methods of {}", decl.name),
                    node: node.clone(),
                    message: format!("'{}' is generated twice", name),
                })
            }
        };

        for field in &structure.fields {
            let access = self.access(decl, structure, field)?;
            let docs = doc_lines(field.description.as_deref());

            if field.wire_path.len() == 1 {
                let rename = literal(&field.wire_name);
                let (ty, attrs, init) = match &field.literal {
                    Some(value) => {
                        let (ty, expr) = self.constant(field, value)?;
                        (ty, format!("#[serde(rename = {})]", rename), expr)
                    }
                    None => match field.storage() {
                        Storage::Plain => (
                            access.elem.clone(),
                            format!("#[serde(rename = {})]", rename),
                            format!("{}.into()", field.name),
                        ),
                        Storage::RequiredNullable => (
                            format!("Option<{}>", access.elem),
                            format!("#[serde(rename = {})]", rename),
                            field.name.clone(),
                        ),
                        Storage::Optional => (
                            format!("Option<{}>", access.elem),
                            format!(
                                "#[serde(rename = {}, default, skip_serializing_if = \"Option::is_none\")]",
                                rename
                            ),
                            "None".to_string(),
                        ),
                        Storage::Nullable => (
                            format!("rt::Nullable<{}>", access.elem),
                            format!(
                                "#[serde(rename = {}, default, skip_serializing_if = \"rt::Nullable::is_absent\")]",
                                rename
                            ),
                            "rt::Nullable::Absent".to_string(),
                        ),
                    },
                };
                fields.push(RustMemberContext {
                    name: field.name.clone(),
                    ty,
                    attrs,
                    docs: docs.clone(),
                });
                constructor_inits.push(RustInitContext {
                    name: field.name.clone(),
                    expr: init,
                });
            }

            if field.is_constructor_arg() {
                let param = match field.storage() {
                    Storage::RequiredNullable => format!("Option<{}>", access.elem),
                    _ => format!("impl Into<{}>", access.elem),
                };
                constructor_params.push(format!("{}: {}", field.name, param));
            }

            claim(&field.name, &field.node)?;
            let return_type = access.return_type();
            let setter = match access.set {
                Some(setter) => {
                    let name = format!("set_{}", field.name);
                    claim(&name, &field.node)?;
                    Some(RustSetterContext {
                        name,
                        param: setter.param,
                        body: setter.body,
                    })
                }
                None => None,
            };
            accessors.push(RustAccessorContext {
                name: field.name.clone(),
                docs,
                return_type,
                body: access.get,
                setter,
            });
        }

        for container in &structure.containers {
            let inner = self.declaration(&container.schema_id, &container.node)?;
            let (ty, attrs, init) = if container.required {
                let inner_struct = inner.as_struct().ok_or_else(|| {
                    Error::template(format!("{} flattens '{}', which is not a struct", container.node, inner.name))
                })?;
                let mut args = Vec::new();
                for inner_field in inner_struct.fields.iter().filter(|f| f.is_constructor_arg()) {
                    let mut path = vec![container.wire_name.clone()];
                    path.extend(inner_field.wire_path.iter().cloned());
                    let outer = structure.field(&path).ok_or_else(|| {
                        Error::template(format!(
                            "{}: no hoisted field for '{}'",
                            container.node,
                            path.join(".")
                        ))
                    })?;
                    args.push(outer.name.clone());
                }
                (
                    inner.name.clone(),
                    format!("#[serde(rename = {})]", literal(&container.wire_name)),
                    format!("{}::new({})", inner.name, args.join(", ")),
                )
            } else {
                (
                    format!("Option<{}>", inner.name),
                    format!(
                        "#[serde(rename = {}, default, skip_serializing_if = \"Option::is_none\")]",
                        literal(&container.wire_name)
                    ),
                    "None".to_string(),
                )
            };
            fields.push(RustMemberContext {
                name: container.name.clone(),
                ty,
                attrs,
                docs: Vec::new(),
            });
            constructor_inits.push(RustInitContext {
                name: container.name.clone(),
                expr: init,
            });
        }

        let additional = match &structure.additional {
            Some(additional) => {
                constructor_inits.push(RustInitContext {
                    name: "additional_properties".to_string(),
                    expr: "indexmap::IndexMap::new()".to_string(),
                });
                Some(RustAdditionalContext {
                    value_type: self.nullable_value_type(&additional.value, &additional.node)?,
                    known: structure.known_wire_names().into_iter().map(literal).collect(),
                })
            }
            None => None,
        };

        let mut deprecated_getters = Vec::new();
        for shim in &self.resolved.surface.shims {
            if let ShimTarget::Property { schema_id, path_key } = &shim.target {
                if schema_id != &decl.schema_id {
                    continue;
                }
                let field = structure
                    .fields
                    .iter()
                    .find(|f| &f.path_key() == path_key)
                    .ok_or_else(|| Error::template(format!("{} aliases a missing property", shim.node)))?;
                claim(&shim.name, &shim.node)?;
                deprecated_getters.push(RustDeprecatedGetterContext {
                    name: shim.name.clone(),
                    target: field.name.clone(),
                    return_type: self.access(decl, structure, field)?.return_type(),
                });
            }
        }

        let mut surfaces = Vec::new();
        for surface in &structure.surfaces {
            surfaces.push(self.surface(structure, surface)?);
        }

        Ok(RustModelContext {
            name: decl.name.clone(),
            file: file.to_string(),
            docs: doc_lines(decl.description.as_deref()),
            fields,
            accessors,
            constructor_params,
            constructor_inits,
            additional,
            deprecated_getters,
            surfaces,
        })
    }

    /// Getter and setter of `field` as seen from `decl`
    fn access(&self, decl: &ModelDeclaration, structure: &StructDecl, field: &FieldDecl) -> Result<Access> {
        if field.wire_path.len() == 1 {
            return self.direct_access(decl, field);
        }

        let container = structure.container(&field.wire_path[0]).ok_or_else(|| {
            Error::template(format!("{}: no container '{}'", field.node, field.wire_path[0]))
        })?;
        let inner_decl = self.declaration(&container.schema_id, &container.node)?;
        let inner_struct = inner_decl.as_struct().ok_or_else(|| {
            Error::template(format!("{} flattens '{}', which is not a struct", container.node, inner_decl.name))
        })?;
        let inner_field = inner_struct.field(&field.wire_path[1..]).ok_or_else(|| {
            Error::template(format!("{}: '{}' has no field at {}", field.node, inner_decl.name, field.path_key()))
        })?;
        let inner = self.access(inner_decl, inner_struct, inner_field)?;
        let getter = &inner_field.name;
        let owner = &container.name;

        let (kind, get) = if container.required {
            (inner.kind, format!("self.{}.{}()", owner, getter))
        } else {
            match inner.kind {
                GetterKind::Ref => (
                    GetterKind::Opt,
                    format!("self.{}.as_ref().map(|inner| inner.{}())", owner, getter),
                ),
                GetterKind::Opt => (
                    GetterKind::Opt,
                    format!("self.{}.as_ref().and_then(|inner| inner.{}())", owner, getter),
                ),
                GetterKind::Null => (
                    GetterKind::Null,
                    format!(
                        "self.{}.as_ref().map_or(rt::Nullable::Absent, |inner| inner.{}())",
                        owner, getter
                    ),
                ),
            }
        };

        // writing through an absent container needs a default for it
        let constructible = !inner_struct.fields.iter().any(FieldDecl::is_constructor_arg);
        let set = match inner.set {
            Some(setter) if container.required => Some(Setter {
                param: setter.param,
                body: format!("self.{}.set_{}(value);", owner, getter),
            }),
            Some(setter) if constructible => Some(Setter {
                param: setter.param,
                body: format!(
                    "self.{}.get_or_insert_with({}::new).set_{}(value);",
                    owner, inner_decl.name, getter
                ),
            }),
            _ => None,
        };

        Ok(Access {
            kind,
            elem: inner.elem,
            get,
            set,
        })
    }

    fn direct_access(&self, decl: &ModelDeclaration, field: &FieldDecl) -> Result<Access> {
        let name = &field.name;
        if let Some(value) = &field.literal {
            let (ty, _) = self.constant(field, value)?;
            return Ok(Access {
                kind: GetterKind::Ref,
                elem: ty,
                get: format!("&self.{}", name),
                set: None,
            });
        }

        let elem = self.field_elem(decl, field)?;
        let (kind, get, param, body) = match field.storage() {
            Storage::Plain => (
                GetterKind::Ref,
                format!("&self.{}", name),
                format!("impl Into<{}>", elem),
                format!("self.{} = value.into();", name),
            ),
            Storage::RequiredNullable => (
                GetterKind::Opt,
                format!("self.{}.as_ref()", name),
                format!("Option<{}>", elem),
                format!("self.{} = value;", name),
            ),
            Storage::Optional => (
                GetterKind::Opt,
                format!("self.{}.as_ref()", name),
                format!("impl Into<{}>", elem),
                format!("self.{} = Some(value.into());", name),
            ),
            Storage::Nullable => (
                GetterKind::Null,
                format!("self.{}.as_ref()", name),
                format!("impl Into<rt::Nullable<{}>>", elem),
                format!("self.{} = value.into();", name),
            ),
        };
        Ok(Access {
            kind,
            elem,
            get,
            set: field.is_settable().then_some(Setter { param, body }),
        })
    }

    fn surface(&self, structure: &StructDecl, surface: &SurfaceDecl) -> Result<RustSurfaceContext> {
        let mut fields = Vec::new();
        let mut writes = Vec::new();
        let custom = "<S::Error as serde::ser::Error>::custom";

        for key in &surface.fields {
            let field = structure
                .fields
                .iter()
                .find(|f| &f.path_key() == key)
                .ok_or_else(|| Error::template(format!("{} projects a missing field '{}'", surface.node, key)))?;
            let path = path_literal(&field.wire_path);

            if let Some(value) = &field.literal {
                writes.push(format!(
                    "rt::path::insert_path(&mut object, {}, serde_json::json!({}));",
                    path,
                    json_expr(value)
                ));
                continue;
            }

            let elem = self.value_type(&field.target, &field.node)?;
            let required = !surface.all_optional && field.required;
            // merge patches clear a property by sending `null`
            let nullable = field.target.nullable || surface.merge_patch;
            let name = &field.name;
            let (ty, write) = match (required, nullable) {
                (true, false) | (true, true) => (
                    if nullable { format!("Option<{}>", elem) } else { elem },
                    format!(
                        "rt::path::insert_path(&mut object, {}, serde_json::to_value(&self.{}).map_err({})?);",
                        path, name, custom
                    ),
                ),
                (false, false) => (
                    format!("Option<{}>", elem),
                    format!(
                        "if let Some(value) = &self.{} {{ rt::path::insert_path(&mut object, {}, serde_json::to_value(value).map_err({})?); }}",
                        name, path, custom
                    ),
                ),
                (false, true) => (
                    format!("rt::Nullable<{}>", elem),
                    format!(
                        "if !self.{}.is_absent() {{ rt::path::insert_path(&mut object, {}, serde_json::to_value(&self.{}).map_err({})?); }}",
                        name, path, name, custom
                    ),
                ),
            };
            fields.push(RustSurfaceFieldContext {
                name: name.clone(),
                ty,
                docs: doc_lines(field.description.as_deref()),
                required,
            });
            writes.push(write);
        }

        Ok(RustSurfaceContext {
            name: surface.name.clone(),
            lifecycle: surface.lifecycle.as_str().to_string(),
            has_default: fields.iter().all(|f| !f.required),
            fields,
            writes,
        })
    }

    fn enumeration(&self, decl: &ModelDeclaration, enumeration: &EnumDecl, file: &str) -> RustEnumContext {
        let integer = enumeration.value_type == EnumValueType::Integer;
        RustEnumContext {
            name: decl.name.clone(),
            file: file.to_string(),
            docs: doc_lines(decl.description.as_deref()),
            integer,
            extensible: enumeration.extensible,
            other: OTHER_VARIANT.to_string(),
            members: enumeration
                .members
                .iter()
                .map(|member| RustEnumMemberContext {
                    name: member.name.clone(),
                    value: match &member.value {
                        JsonValue::String(s) => literal(s),
                        other => other.to_string(),
                    },
                    docs: doc_lines(member.description.as_deref()),
                })
                .collect(),
        }
    }

    fn union(&self, decl: &ModelDeclaration, union: &UnionDecl, file: &str) -> Result<RustUnionContext> {
        let mut variants = Vec::new();
        for variant in &union.variants {
            variants.push(RustVariantContext {
                name: variant.name.clone(),
                ty: self.nullable_value_type(&variant.target, &variant.node)?,
                wire_value: None,
            });
        }
        Ok(RustUnionContext {
            name: decl.name.clone(),
            file: file.to_string(),
            docs: doc_lines(decl.description.as_deref()),
            variants,
        })
    }

    fn polymorphic(
        &self,
        decl: &ModelDeclaration,
        poly: &PolymorphicDecl,
        file: &str,
    ) -> Result<RustPolymorphicContext> {
        let mut variants = Vec::new();
        for variant in &poly.variants {
            variants.push(RustVariantContext {
                name: variant.name.clone(),
                ty: self.declaration(&variant.schema_id, &variant.node)?.name.clone(),
                wire_value: Some(literal(&variant.wire_value)),
            });
        }
        Ok(RustPolymorphicContext {
            name: decl.name.clone(),
            file: file.to_string(),
            docs: doc_lines(decl.description.as_deref()),
            discriminator: literal(&poly.discriminator),
            unknown: UNKNOWN_VARIANT.to_string(),
            variants,
        })
    }

    /// Shared group types first, then each operation's options type
    fn options_types(&self) -> Result<Vec<RustOptionsContext>> {
        let operations = &self.resolved.surface.operations;
        let mut types = Vec::new();
        for group in operations.groups.values() {
            types.push(self.group(group)?);
        }
        for op in &operations.operations {
            let Some(options) = &op.options else {
                continue;
            };
            let mut fields = Vec::new();
            for index in &options.fields {
                let binding = &op.bindings[*index];
                fields.push(RustSurfaceFieldContext {
                    name: binding.name.clone(),
                    ty: format!("Option<{}>", self.logical_type(&binding.target, &binding.node)?),
                    docs: doc_lines(binding.description.as_deref()),
                    required: false,
                });
            }
            types.push(RustOptionsContext {
                name: options.name.clone(),
                file: self.file_of(&options.name, &options.node)?,
                docs: vec![format!("/// Optional parameters of `Client::{}`", op.name)],
                constructor_inits: fields
                    .iter()
                    .map(|f| RustInitContext {
                        name: f.name.clone(),
                        expr: "None".to_string(),
                    })
                    .collect(),
                fields,
                has_default: true,
                constructor_params: Vec::new(),
            });
        }
        Ok(types)
    }

    fn group(&self, group: &GroupDecl) -> Result<RustOptionsContext> {
        let mut fields = Vec::new();
        let mut constructor_params = Vec::new();
        let mut constructor_inits = Vec::new();
        for field in &group.fields {
            let logical = self.logical_type(&field.target, &field.node)?;
            let (ty, init) = if field.required {
                constructor_params.push(format!("{}: impl Into<{}>", field.name, logical));
                (logical, format!("{}.into()", field.name))
            } else {
                (format!("Option<{}>", logical), "None".to_string())
            };
            constructor_inits.push(RustInitContext {
                name: field.name.clone(),
                expr: init,
            });
            fields.push(RustSurfaceFieldContext {
                name: field.name.clone(),
                ty,
                docs: doc_lines(field.description.as_deref()),
                required: field.required,
            });
        }
        Ok(RustOptionsContext {
            name: group.name.clone(),
            file: self.file_of(&group.name, &group.node)?,
            docs: vec!["/// Parameters shared by several operations".to_string()],
            has_default: group.all_optional(),
            fields,
            constructor_params,
            constructor_inits,
        })
    }

    /// Expression yielding a binding's value and whether it is an `Option`
    fn binding_access(&self, op: &OperationDeclaration, binding: &ParameterBinding) -> Result<(String, bool)> {
        Ok(match &binding.source {
            BindingSource::Argument => (binding.name.clone(), !binding.required),
            BindingSource::Group(group_id) => {
                let argument = self
                    .resolved
                    .names
                    .group_argument(&op.operation_id, group_id)
                    .ok_or_else(|| Error::template(format!("{} has no argument for group '{}'", op.node, group_id)))?;
                let required = op
                    .groups
                    .iter()
                    .find(|g| &g.group_id == group_id)
                    .and_then(|g| g.field(&binding.wire_name))
                    .map_or(binding.required, |f| f.required);
                if required {
                    (format!("&{}.{}", argument, binding.name), false)
                } else {
                    (format!("{}.{}.as_ref()", argument, binding.name), true)
                }
            }
            BindingSource::Options => (format!("{}.{}.as_ref()", OPTIONS_KEY, binding.name), true),
            BindingSource::ApiVersion => {
                if self.resolved.names.versions.is_empty() {
                    return Err(Error::template(format!(
                        "{} sends an api-version, but the service declares no versions",
                        binding.node
                    )));
                }
                ("self.options.api_version.as_str()".to_string(), false)
            }
        })
    }

    /// Display-able wire text of a path, query or header value held in `value`
    fn param_expr(&self, target: &TargetType, value: &str) -> String {
        match &target.shape {
            Shape::Scalar(scalar) => scalar_param_expr(*scalar, target.encoding, value),
            Shape::List(inner) => format!(
                "{}.iter().map(|item| {}.to_string()).collect::<Vec<_>>().join(\",\")",
                value,
                self.param_expr(inner, "item")
            ),
            Shape::Named(_, NamedKind::Enum) => value.to_string(),
            Shape::Named(..) | Shape::Map(_) | Shape::Any => format!("serde_json::to_string({})?", value),
        }
    }

    /// JSON value of a body member held in `value`
    fn body_value_expr(&self, target: &TargetType, value: &str) -> String {
        match &target.shape {
            Shape::Scalar(scalar) => match effective_encoding(*scalar, target.encoding) {
                Some(encoding) => format!(
                    "<rt::encoding::{} as rt::Encoding<{}>>::encode({})",
                    encoding_marker(encoding),
                    logical_scalar(*scalar),
                    value
                ),
                None => format!("serde_json::to_value({})?", value),
            },
            _ => format!("serde_json::to_value({})?", value),
        }
    }

    /// Whether the body binding is passed as its logical scalar and encoded on send
    /// Part table of a form body: bytes become file parts, scalars and
    /// enums text parts, everything else a JSON part
    fn part_specs(&self, binding: &ParameterBinding) -> Result<String> {
        let Shape::Named(id, NamedKind::Model) = &binding.target.shape else {
            return Err(Error::template(format!("{} is a form body but not a model", binding.node)));
        };
        let structure = self
            .declaration(id, &binding.node)?
            .as_struct()
            .ok_or_else(|| Error::template(format!("{} is a form body but not a struct", binding.node)))?;
        let mut specs: Vec<(String, &'static str)> = Vec::new();
        for field in &structure.fields {
            let Some(top) = field.wire_path.first() else { continue };
            if specs.iter().any(|(name, _)| name == top) {
                continue;
            }
            let kind = if field.wire_path.len() > 1 {
                "json"
            } else {
                self.part_kind(&field.target)
            };
            specs.push((top.clone(), kind));
        }
        let specs: Vec<String> = specs
            .into_iter()
            .map(|(name, kind)| format!("rt::PartSpec::{}({})", kind, literal(&name)))
            .collect();
        Ok(format!("&[{}]", specs.join(", ")))
    }

    fn part_kind(&self, target: &TargetType) -> &'static str {
        match &target.shape {
            _ if self.is_file(target) => "file",
            Shape::List(inner) if self.is_file(inner) => "files",
            Shape::Scalar(_) | Shape::Named(_, NamedKind::Enum) => "text",
            _ => "json",
        }
    }

    /// Raw bytes, or a model carrying them in a `content` property
    fn is_file(&self, target: &TargetType) -> bool {
        let is_bytes = |t: &TargetType| matches!(t.shape, Shape::Scalar(ScalarType::Bytes));
        match &target.shape {
            Shape::Scalar(ScalarType::Bytes) => true,
            Shape::Named(id, NamedKind::Model) => self
                .resolved
                .surface
                .models
                .get(id)
                .and_then(|decl| decl.as_struct())
                .and_then(|structure| structure.fields.iter().find(|f| f.wire_path == ["content"]))
                .map_or(false, |content| is_bytes(&content.target)),
            _ => false,
        }
    }

    fn is_encoded_scalar(target: &TargetType) -> bool {
        matches!(&target.shape, Shape::Scalar(scalar) if effective_encoding(*scalar, target.encoding).is_some())
    }

    /// Spelling of a whole-body argument; create and update bodies take the
    /// matching lifecycle projection when the model declares one
    fn body_type(&self, op: &OperationDeclaration, binding: &ParameterBinding) -> Result<String> {
        if Self::is_encoded_scalar(&binding.target) {
            return self.logical_type(&binding.target, &binding.node);
        }
        if let Shape::Named(id, NamedKind::Model) = &binding.target.shape {
            let decl = self.declaration(id, &binding.node)?;
            let lifecycle = match op.method {
                _ if op.body_content_type == BodyContentType::MergePatch => Some(Lifecycle::Update),
                HttpMethod::Put | HttpMethod::Post => Some(Lifecycle::Create),
                HttpMethod::Patch => Some(Lifecycle::Update),
                _ => None,
            };
            let projection = decl
                .as_struct()
                .zip(lifecycle)
                .and_then(|(structure, lifecycle)| structure.surface(lifecycle));
            if let Some(projection) = projection {
                return Ok(projection.name.clone());
            }
            return Ok(decl.name.clone());
        }
        self.value_type(&binding.target, &binding.node)
    }

    fn argument_type(&self, op: &OperationDeclaration, binding: &ParameterBinding) -> Result<String> {
        let spelled = if binding.is_whole_body() {
            self.body_type(op, binding)?
        } else {
            self.logical_type(&binding.target, &binding.node)?
        };
        let borrowed = if spelled == "String" {
            "&str".to_string()
        } else {
            format!("&{}", spelled)
        };
        Ok(if binding.required {
            borrowed
        } else {
            format!("Option<{}>", borrowed)
        })
    }

    fn version_variant(&self, token: &str, node: &NodeRef) -> Result<String> {
        self.resolved
            .names
            .version_variant(token)
            .map(str::to_string)
            .ok_or_else(|| Error::template(format!("{}: unknown version '{}'", node, token)))
    }

    fn error_expr(&self, route: &ResponseRoute) -> Result<String> {
        let ty = match &route.target {
            Some(target) => self.nullable_value_type(target, &route.node)?,
            None => "serde_json::Value".to_string(),
        };
        Ok(format!("response.service_error::<{}>({})", ty, literal(&route.key)))
    }

    fn method(&self, op: &OperationDeclaration) -> Result<RustMethodContext> {
        let mut params = Vec::new();
        let mut args = Vec::new();
        for slot in &op.signature {
            match slot {
                SignatureSlot::Param(index) | SignatureSlot::Body(index) => {
                    let binding = &op.bindings[*index];
                    params.push(format!("{}: {}", binding.name, self.argument_type(op, binding)?));
                    args.push(binding.name.clone());
                }
                SignatureSlot::Group(group_id) => {
                    let argument = self
                        .resolved
                        .names
                        .group_argument(&op.operation_id, group_id)
                        .ok_or_else(|| Error::template(format!("{} has no argument for group '{}'", op.node, group_id)))?;
                    let group = self
                        .resolved
                        .surface
                        .operations
                        .groups
                        .get(group_id)
                        .ok_or_else(|| Error::template(format!("{} uses unknown group '{}'", op.node, group_id)))?;
                    params.push(format!("{}: &{}", argument, group.name));
                    args.push(argument.to_string());
                }
                SignatureSlot::Options => {
                    let options = op
                        .options
                        .as_ref()
                        .ok_or_else(|| Error::template(format!("{} has an options slot but no options", op.node)))?;
                    params.push(format!("{}: &{}", OPTIONS_KEY, options.name));
                    args.push(OPTIONS_KEY.to_string());
                }
            }
        }

        let gates = &self.resolved.surface.gates;
        let gate = match gates.operation(&op.operation_id) {
            Some(version) => Some(self.version_variant(&version.token, &op.node)?),
            None => None,
        };

        let mut bindings = Vec::new();
        for binding in op.bindings.iter().filter(|b| b.location != ParameterLocation::Body) {
            let (access, optional) = self.binding_access(op, binding)?;
            let call = match binding.location {
                ParameterLocation::Path => "path_param",
                ParameterLocation::Query => "query",
                _ => "header",
            };
            let gate = match gates.parameter(&op.operation_id, &binding.wire_name) {
                Some(version) => Some(self.version_variant(&version.token, &binding.node)?),
                None => None,
            };
            let expr = match binding.source {
                BindingSource::ApiVersion => "value".to_string(),
                _ => self.param_expr(&binding.target, "value"),
            };
            bindings.push(RustBindingContext {
                call: call.to_string(),
                wire_name: literal(&binding.wire_name),
                access,
                optional,
                gate,
                gate_name: literal(&format!("{}.{}", op.operation_id, binding.wire_name)),
                expr,
            });
        }

        let body = match &op.body {
            Some(BodyDecl::Whole(index)) => {
                let binding = &op.bindings[*index];
                let (access, optional) = self.binding_access(op, binding)?;
                let (call, expr) = match op.body_content_type {
                    BodyContentType::FormData => (
                        "multipart_body",
                        format!("&value, {}", self.part_specs(binding)?),
                    ),
                    BodyContentType::MergePatch => ("merge_patch_body", "&value".to_string()),
                    BodyContentType::Json if Self::is_encoded_scalar(&binding.target) => (
                        "json_body",
                        format!("&{}", self.body_value_expr(&binding.target, "value")),
                    ),
                    BodyContentType::Json => ("json_body", "&value".to_string()),
                };
                Some(RustBodyContext {
                    spread: false,
                    access,
                    optional,
                    call: call.to_string(),
                    expr,
                    members: Vec::new(),
                })
            }
            Some(BodyDecl::Spread { members }) => {
                let mut spread = Vec::new();
                for (alias, index) in members {
                    let binding = &op.bindings[*index];
                    let (access, optional) = self.binding_access(op, binding)?;
                    spread.push(RustBodyMemberContext {
                        key: literal(alias),
                        access,
                        optional,
                        expr: self.body_value_expr(&binding.target, "value"),
                    });
                }
                Some(RustBodyContext {
                    spread: true,
                    access: String::new(),
                    optional: false,
                    call: "json_body".to_string(),
                    expr: String::new(),
                    members: spread,
                })
            }
            None => None,
        };

        let patterns = op.responses.iter().map(|r| pattern_expr(&r.status)).collect();
        let mut arms = Vec::new();
        let (return_type, fallback, paging, polling) = match &op.shape {
            ReturnShape::Single(target) => {
                let (ty, success) = match target {
                    Some(target) => (self.nullable_value_type(target, &op.node)?, "response.json()"),
                    None => ("()".to_string(), "Ok(())"),
                };
                for (index, route) in op.responses.iter().enumerate() {
                    let expr = if route.status.is_success() {
                        success.to_string()
                    } else {
                        format!("Err({})", self.error_expr(route)?)
                    };
                    arms.push(RustArmContext { index, expr });
                }
                (format!("rt::Result<{}>", ty), "Err(response.unexpected())", None, None)
            }
            ReturnShape::Paged {
                item,
                items_path,
                next_link_path,
                ..
            } => {
                let item_type = self.nullable_value_type(item, &op.node)?;
                let next = match next_link_path {
                    Some(path) => format!("Some({})", literal(path)),
                    None => "None".to_string(),
                };
                for (index, route) in op.responses.iter().enumerate() {
                    let expr = if route.status.is_success() {
                        format!(
                            "rt::paging::extract_page(&response.json_value()?, {}, {})",
                            literal(items_path),
                            next
                        )
                    } else {
                        format!("Err({})", self.error_expr(route)?)
                    };
                    arms.push(RustArmContext { index, expr });
                }
                (
                    format!(
                        "rt::Result<rt::Pager<{item}, impl Fn(Option<&str>) -> rt::Result<rt::Page<{item}>> + '_>>",
                        item = item_type
                    ),
                    "Err(response.unexpected())",
                    Some(RustPagingContext {
                        item_type,
                        items_path: literal(items_path),
                        next_link_path: next,
                    }),
                    None,
                )
            }
            ReturnShape::LongRunning {
                strategy,
                status_path,
                result_path,
                result,
            } => {
                let result_type = match result {
                    Some(target) => self.nullable_value_type(target, &op.node)?,
                    None => "serde_json::Value".to_string(),
                };
                for (index, route) in op.responses.iter().enumerate() {
                    let expr = if route.status.is_success() {
                        "{}".to_string()
                    } else {
                        format!("return Err({})", self.error_expr(route)?)
                    };
                    arms.push(RustArmContext { index, expr });
                }
                (
                    format!(
                        "rt::Result<rt::Poller<{result}, impl FnMut() -> rt::Result<rt::PollResponse<{result}>> + '_>>",
                        result = result_type
                    ),
                    "return Err(response.unexpected())",
                    None,
                    Some(RustPollingContext {
                        strategy: format!("rt::PollingStrategy::{:?}", strategy.runtime()),
                        status_path: literal(status_path),
                        result_path: match result_path {
                            Some(path) => format!("Some({})", literal(path)),
                            None => "None".to_string(),
                        },
                        result_type,
                    }),
                )
            }
        };

        let mut docs = doc_lines(op.description.as_deref());
        if !docs.is_empty() {
            docs.push("///".to_string());
        }
        docs.push(format!("/// `{} {}`", op.method, op.path_template));

        Ok(RustMethodContext {
            name: op.name.clone(),
            operation: literal(&op.operation_id),
            docs,
            params,
            args,
            return_type,
            kind: op.shape.kind_name().to_string(),
            gate,
            http_method: format!("{:?}", op.method.runtime()),
            path: literal(&op.path_template),
            bindings,
            body,
            patterns,
            arms,
            fallback: fallback.to_string(),
            paging,
            polling,
        })
    }

    /// One wire-level round-trip test per struct and polymorphic model
    fn roundtrips(&self) -> Result<Vec<RustRoundtripContext>> {
        let models = &self.resolved.surface.models;
        let samples = SampleBuilder::new(models);
        let codec = Codec::new(models);
        let mut tests = Vec::new();

        let mut push = |test_name: String, type_name: &str, wire: &JsonValue| -> Result<()> {
            let json = serde_json::to_string(wire)?;
            tests.push(RustRoundtripContext {
                test_name,
                type_name: type_name.to_string(),
                hashes: raw_string_hashes(&json),
                json,
            });
            Ok(())
        };

        for decl in models.values() {
            let file = self.file_of(&decl.name, &decl.node)?;
            let sample_of = |schema_id: &str| -> Result<JsonValue> {
                let sample = samples.model(schema_id)?;
                codec.encode_model(&sample, &decl.node)
            };
            match &decl.kind {
                DeclarationKind::Struct(_) => match sample_of(&decl.schema_id) {
                    Ok(wire) => push(format!("{}_roundtrip", file), &decl.name, &wire)?,
                    Err(e) => log::warn!("No round-trip test for {}: {}", decl.name, e),
                },
                DeclarationKind::Polymorphic(poly) => {
                    if let Some(variant) = poly.variants.first() {
                        match sample_of(&variant.schema_id) {
                            Ok(wire) => push(format!("{}_roundtrip", file), &decl.name, &wire)?,
                            Err(e) => log::warn!("No round-trip test for {}: {}", decl.name, e),
                        }
                    }
                    let mut unknown = Map::new();
                    unknown.insert(
                        poly.discriminator.clone(),
                        JsonValue::String("unrecognized-kind".to_string()),
                    );
                    unknown.insert("extra".to_string(), JsonValue::from(1));
                    push(
                        format!("{}_unknown_roundtrip", file),
                        &decl.name,
                        &JsonValue::Object(unknown),
                    )?;
                }
                DeclarationKind::Enum(_) | DeclarationKind::Union(_) => {}
            }
        }
        Ok(tests)
    }
}

/// Registry version of the runtime generated crates depend on
const RUNTIME_VERSION: &str = "0.1";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::Orchestrator;
    use crate::ir::IrDocument;

    const DOC: &str = r#"
service: { name: Widgets, versions: ["2024-01-01", "2024-06-01"] }
schemas:
  string: { kind: primitive, name: string, primitive: string }
  int32: { kind: primitive, name: int32, primitive: int32 }
  when: { kind: primitive, name: when, primitive: dateTime }
  nullableInt: { kind: primitive, name: nullableInt, primitive: int32, nullable: true }
  ints: { kind: array, name: ints, items: nullableInt }
  Node:
    kind: model
    name: Node
    properties:
      - { wireName: label, schema: string, required: true }
      - { wireName: next, schema: Node }
  Widget:
    kind: model
    name: Widget
    properties:
      - { wireName: id, schema: string, required: true, visibility: read-only }
      - { wireName: name, schema: string, required: true }
      - { wireName: createdAt, schema: when }
      - { wireName: counts, schema: ints }
operations:
  - id: Widgets_Put
    httpMethod: PUT
    pathTemplate: /widgets/{id}
    requestBodySchema: Widget
    parameters:
      - { location: path, wireName: id, schema: string, required: true }
      - { location: header, wireName: if-match, schema: when }
    responses: { "200": Widget, "default": Node }
"#;

    fn build() -> crate::Result<RenderContext> {
        let doc = IrDocument::parse(DOC)?;
        let config = Config::new("widgets-client", "widgets.yaml", "out");
        let resolved = Orchestrator::new(&doc, &config).check()?;
        RustContextBuilder.build(&resolved, &config, &TemplateOptions::default())
    }

    fn item<'c>(context: &'c RenderContext, kind: &str, name: &str) -> &'c Map<String, JsonValue> {
        let items = context.items(kind).unwrap_or_default();
        &items.iter().find(|i| i.name == name).expect("item is present").context
    }

    #[test]
    fn test_crate_context() -> crate::Result<()> {
        let context = build()?;
        assert_eq!(context.base["crate_name"], "widgets_client");
        assert_eq!(context.base["package_name"], "widgets-client");
        assert_eq!(context.base["runtime_dependency"], "\"0.1\"");
        assert_eq!(context.base["latest_version"], "V20240601");
        Ok(())
    }

    #[test]
    fn test_field_storage() -> crate::Result<()> {
        let context = build()?;
        let widget = item(&context, "model", "Widget");
        let fields = widget["fields"].as_array().cloned().unwrap_or_default();
        let ty = |name: &str| {
            fields
                .iter()
                .find(|f| f["name"] == name)
                .map(|f| f["ty"].as_str().unwrap_or_default().to_string())
        };
        assert_eq!(ty("name").as_deref(), Some("String"));
        // read-only fields are never constructor arguments
        assert_eq!(ty("id").as_deref(), Some("Option<String>"));
        assert_eq!(
            ty("created_at").as_deref(),
            Some("Option<rt::Encoded<chrono::DateTime<chrono::Utc>, rt::encoding::Rfc3339>>")
        );
        assert_eq!(ty("counts").as_deref(), Some("Option<Vec<Option<i32>>>"));
        assert_eq!(widget["constructor_params"], serde_json::json!(["name: impl Into<String>"]));
        Ok(())
    }

    #[test]
    fn test_recursive_field_is_boxed() -> crate::Result<()> {
        let context = build()?;
        let node = item(&context, "model", "Node");
        let next = node["fields"]
            .as_array()
            .and_then(|fields| fields.iter().find(|f| f["name"] == "next"))
            .map(|f| f["ty"].clone());
        assert_eq!(next, Some(JsonValue::from("Option<Box<Node>>")));
        Ok(())
    }

    #[test]
    fn test_method_context() -> crate::Result<()> {
        let context = build()?;
        let methods = context.base["methods"].as_array().cloned().unwrap_or_default();
        let put = &methods[0];
        assert_eq!(put["name"], "widgets_put");
        assert_eq!(put["http_method"], "Put");
        // the create projection drops the read-only id
        let params: Vec<String> = serde_json::from_value(put["params"].clone())?;
        assert!(params.iter().any(|p| p == "id: &str"));
        assert!(params.iter().any(|p| p.starts_with("body: &WidgetCreate")));
        let header = put["bindings"]
            .as_array()
            .and_then(|b| b.iter().find(|b| b["call"] == "header"))
            .cloned()
            .unwrap_or_default();
        assert_eq!(header["expr"], "rt::encoding::format_rfc7231(value)");
        assert_eq!(header["optional"], true);
        let arms = put["arms"].as_array().cloned().unwrap_or_default();
        assert_eq!(arms[0]["expr"], "response.json()");
        assert_eq!(arms[1]["expr"], "Err(response.service_error::<Node>(\"default\"))");
        Ok(())
    }

    #[test]
    fn test_roundtrip_samples() -> crate::Result<()> {
        let context = build()?;
        let tests = context.base["roundtrips"].as_array().cloned().unwrap_or_default();
        let widget = tests
            .iter()
            .find(|t| t["type_name"] == "Widget")
            .cloned()
            .unwrap_or_default();
        assert_eq!(widget["test_name"], "widget_roundtrip");
        assert!(widget["json"].as_str().unwrap_or_default().contains("\"name\":\"sample\""));
        Ok(())
    }

    #[test]
    fn test_helpers() {
        assert_eq!(raw_string_hashes(r#"{"a":"b"}"#), "#");
        assert_eq!(raw_string_hashes(r##"{"a":"#"}"##), "##");
        assert_eq!(json_expr(&serde_json::json!({"k": [1, "x"]})), "{\"k\": [1, \"x\"]}");
        assert_eq!(
            doc_lines(Some("First\n\nSecond")),
            vec!["/// First".to_string(), "///".to_string(), "/// Second".to_string()]
        );
    }
}
