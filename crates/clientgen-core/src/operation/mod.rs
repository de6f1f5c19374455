//! Operation declarations synthesized from operation nodes.
//!
//! An [`OperationDeclaration`] keeps two orders apart: `bindings` follow the
//! wire (the order the request is assembled in), while `signature` is what
//! the caller sees. Grouped parameters collapse into shared options types,
//! optional ungrouped parameters into one `{Op}Options` type, and the
//! api-version parameter disappears from the signature entirely because the
//! client supplies it.

pub mod synth;

// Internal imports (std, crate)
use crate::error::Diagnostics;
use crate::ir::{BodyContentType, HttpMethod, LroStrategy, NodeRef, ParameterLocation, Versioning};
use crate::types::TargetType;

// External imports (alphabetized)
use clientgen_runtime::StatusPattern;
use indexmap::IndexMap;

pub use synth::OperationSynthesizer;

/// Signature key of the request body
pub const BODY_KEY: &str = "body";
/// Signature key of the `{Op}Options` slot
pub const OPTIONS_KEY: &str = "options";

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDeclaration {
    pub operation_id: String,
    pub node: NodeRef,
    /// Snake-case method name; replaced by the registered name
    pub name: String,
    pub method: HttpMethod,
    pub path_template: String,
    pub description: Option<String>,
    pub versioning: Versioning,
    /// Wire order
    pub bindings: Vec<ParameterBinding>,
    /// Public order
    pub signature: Vec<SignatureSlot>,
    /// Groups this operation uses, in first-appearance order
    pub groups: Vec<GroupDecl>,
    pub options: Option<OptionsDecl>,
    pub body: Option<BodyDecl>,
    pub body_content_type: BodyContentType,
    /// Declaration order; routing picks the most specific match
    pub responses: Vec<ResponseRoute>,
    pub shape: ReturnShape,
    /// Findings that do not stop generation
    pub warnings: Diagnostics,
}

impl OperationDeclaration {
    pub fn binding(&self, wire_name: &str) -> Option<&ParameterBinding> {
        self.bindings.iter().find(|b| b.wire_name == wire_name)
    }

    /// Bindings the caller passes positionally
    pub fn arguments(&self) -> impl Iterator<Item = &ParameterBinding> {
        self.bindings
            .iter()
            .filter(|b| matches!(b.source, BindingSource::Argument))
    }

    pub fn api_version(&self) -> Option<&ParameterBinding> {
        self.bindings
            .iter()
            .find(|b| matches!(b.source, BindingSource::ApiVersion))
    }

    /// Public signature keys, as `signatureOrder` spells them
    pub fn signature_keys(&self) -> Vec<String> {
        self.signature.iter().map(|slot| slot.key(&self.bindings)).collect()
    }

    pub fn success_routes(&self) -> impl Iterator<Item = &ResponseRoute> {
        self.responses.iter().filter(|r| r.status.is_success())
    }

    /// Drop the bindings `keep` rejects and re-point every index at the
    /// survivors; slots, groups and options left empty go away too.
    pub fn retain_bindings<F>(&mut self, mut keep: F)
    where
        F: FnMut(&ParameterBinding) -> bool,
    {
        let mut remap: Vec<Option<usize>> = Vec::with_capacity(self.bindings.len());
        let mut kept = Vec::with_capacity(self.bindings.len());
        for binding in self.bindings.drain(..) {
            if keep(&binding) {
                remap.push(Some(kept.len()));
                kept.push(binding);
            } else {
                remap.push(None);
            }
        }
        self.bindings = kept;

        for group in &mut self.groups {
            let bindings = &self.bindings;
            group.fields.retain(|field| {
                bindings.iter().any(|b| {
                    b.wire_name == field.wire_name && b.source == BindingSource::Group(group.group_id.clone())
                })
            });
        }
        self.groups.retain(|g| !g.fields.is_empty());

        if let Some(options) = &mut self.options {
            options.fields = options.fields.iter().filter_map(|i| remap[*i]).collect();
        }
        if self.options.as_ref().map_or(false, |o| o.fields.is_empty()) {
            self.options = None;
        }

        self.body = match self.body.take() {
            Some(BodyDecl::Whole(index)) => remap[index].map(BodyDecl::Whole),
            Some(BodyDecl::Spread { members }) => {
                let members: Vec<(String, usize)> = members
                    .into_iter()
                    .filter_map(|(alias, index)| remap[index].map(|i| (alias, i)))
                    .collect();
                (!members.is_empty()).then_some(BodyDecl::Spread { members })
            }
            None => None,
        };

        let groups = &self.groups;
        let has_options = self.options.is_some();
        self.signature = std::mem::take(&mut self.signature)
            .into_iter()
            .filter_map(|slot| match slot {
                SignatureSlot::Param(index) => remap[index].map(SignatureSlot::Param),
                SignatureSlot::Body(index) => remap[index].map(SignatureSlot::Body),
                SignatureSlot::Group(id) => groups.iter().any(|g| g.group_id == id).then_some(SignatureSlot::Group(id)),
                SignatureSlot::Options => has_options.then_some(SignatureSlot::Options),
            })
            .collect();
    }
}

/// Where the value of a binding comes from at the call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSource {
    /// A positional method argument
    Argument,
    /// A field of the named group options type
    Group(String),
    /// A field of the operation's `{Op}Options` type
    Options,
    /// The client's pinned service version
    ApiVersion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    pub wire_name: String,
    pub location: ParameterLocation,
    /// Snake-case argument or field name; replaced by the registered name
    pub name: String,
    pub target: TargetType,
    pub required: bool,
    pub source: BindingSource,
    /// Body property this binding spreads into
    pub alias_of: Option<String>,
    pub versioning: Versioning,
    pub description: Option<String>,
    pub node: NodeRef,
}

impl ParameterBinding {
    /// The whole request body, as opposed to a spread member
    pub fn is_whole_body(&self) -> bool {
        self.location == ParameterLocation::Body && self.alias_of.is_none()
    }

    pub fn signature_key(&self) -> &str {
        if self.is_whole_body() {
            BODY_KEY
        } else {
            &self.wire_name
        }
    }
}

/// One slot of the public signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureSlot {
    /// Index into `bindings`
    Param(usize),
    /// Group id
    Group(String),
    /// Index of the whole-body binding
    Body(usize),
    Options,
}

impl SignatureSlot {
    pub fn key(&self, bindings: &[ParameterBinding]) -> String {
        match self {
            Self::Param(index) => bindings[*index].wire_name.clone(),
            Self::Group(id) => id.clone(),
            Self::Body(_) => BODY_KEY.to_string(),
            Self::Options => OPTIONS_KEY.to_string(),
        }
    }
}

/// Options type shared by every operation using the same group id
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDecl {
    pub group_id: String,
    /// Proposed type name; replaced by the registered name
    pub name: String,
    /// First-appearance order
    pub fields: Vec<GroupField>,
    pub node: NodeRef,
}

impl GroupDecl {
    /// Whether the caller can build the group with `Default`
    pub fn all_optional(&self) -> bool {
        self.fields.iter().all(|f| !f.required)
    }

    pub fn field(&self, wire_name: &str) -> Option<&GroupField> {
        self.fields.iter().find(|f| f.wire_name == wire_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupField {
    pub wire_name: String,
    pub name: String,
    pub location: ParameterLocation,
    pub target: TargetType,
    pub required: bool,
    pub versioning: Versioning,
    pub description: Option<String>,
    pub node: NodeRef,
}

/// The `{Op}Options` type holding optional ungrouped parameters
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsDecl {
    pub name: String,
    /// Indexes into `bindings`
    pub fields: Vec<usize>,
    pub node: NodeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyDecl {
    /// One value serialized as the body; index into `bindings`
    Whole(usize),
    /// Parameters merged into one JSON object, keyed by their alias
    Spread {
        /// (body property, index into `bindings`), wire order
        members: Vec<(String, usize)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRoute {
    /// Key as declared, e.g. `4XX`
    pub key: String,
    pub status: StatusPattern,
    /// `None` for responses without content
    pub target: Option<TargetType>,
    pub node: NodeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnShape {
    /// One response value
    Single(Option<TargetType>),
    /// A lazy pager over items
    Paged {
        page: TargetType,
        item: TargetType,
        items_path: String,
        next_link_path: Option<String>,
    },
    /// A poller resolving to the final result
    LongRunning {
        strategy: LroStrategy,
        status_path: String,
        result_path: Option<String>,
        result: Option<TargetType>,
    },
}

impl ReturnShape {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Paged { .. } => "paged",
            Self::LongRunning { .. } => "long_running",
        }
    }
}

/// Every synthesized operation plus the group types they share
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSet {
    pub operations: Vec<OperationDeclaration>,
    pub groups: IndexMap<String, GroupDecl>,
}
