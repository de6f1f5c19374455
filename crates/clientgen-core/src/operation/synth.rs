//! Operation synthesizer.
//!
//! Turns an [`OperationNode`] into an [`OperationDeclaration`]: binds every
//! parameter, builds the public signature, and works out how responses are
//! routed and what the method returns.

// Internal imports (std, crate)
use std::collections::HashSet;

use super::{
    BindingSource, BodyDecl, GroupDecl, GroupField, OperationDeclaration, OperationSet, OptionsDecl,
    ParameterBinding, ResponseRoute, ReturnShape, SignatureSlot,
};
use crate::error::{Diagnostics, Error, Result};
use crate::ir::{BodyContentType, IrDocument, NodeRef, OperationNode, ParameterLocation, SchemaKind, Versioning};
use crate::naming::{to_identifier, CaseConvention, NameContext};
use crate::types::{NamedKind, TargetType, TypeMapper, UsageContext};

// External imports (alphabetized)
use clientgen_runtime::StatusPattern;
use indexmap::IndexMap;

pub struct OperationSynthesizer<'a> {
    doc: &'a IrDocument,
    mapper: TypeMapper<'a>,
}

impl<'a> OperationSynthesizer<'a> {
    pub fn new(doc: &'a IrDocument) -> Self {
        Self {
            doc,
            mapper: TypeMapper::new(doc),
        }
    }

    /// Synthesize `operations` and collect the group types they share.
    ///
    /// Every operation using a group id must agree on its members.
    pub fn synthesize_all<'o, I>(&self, operations: I) -> Result<OperationSet>
    where
        I: IntoIterator<Item = &'o OperationNode>,
    {
        let mut set = OperationSet::default();
        for op in operations {
            let decl = self.synthesize(op)?;
            for group in &decl.groups {
                match set.groups.get(&group.group_id) {
                    None => {
                        set.groups.insert(group.group_id.clone(), group.clone());
                    }
                    Some(existing) if same_members(existing, group) => {}
                    Some(existing) => {
                        return Err(Error::malformed(
                            decl.node.clone(),
                            format!(
                                "group '{}' has members [{}] here but [{}] in an earlier operation",
                                group.group_id,
                                member_list(group),
                                member_list(existing)
                            ),
                        ))
                    }
                }
            }
            set.operations.push(decl);
        }
        log::debug!(
            "Synthesized {} operations sharing {} parameter groups",
            set.operations.len(),
            set.groups.len()
        );
        Ok(set)
    }

    pub fn synthesize(&self, op: &OperationNode) -> Result<OperationDeclaration> {
        let node = NodeRef::operation(&op.id).at(op.source.as_ref());
        let name = to_identifier(op.client_name(), CaseConvention::Snake, NameContext::Method);

        let bindings = self.bindings(op, &node)?;
        let body = body_decl(&bindings, &node)?;
        check_content_type(op.request_content_type, &bindings, body.as_ref(), &node)?;
        let groups = groups(&bindings, &node)?;

        let option_fields: Vec<usize> = bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.source == BindingSource::Options)
            .map(|(index, _)| index)
            .collect();
        let options = if option_fields.is_empty() {
            None
        } else {
            Some(OptionsDecl {
                name: format!(
                    "{}Options",
                    to_identifier(op.client_name(), CaseConvention::Pascal, NameContext::Type)
                ),
                fields: option_fields,
                node: node.facet("options"),
            })
        };

        let mut signature = default_signature(&bindings, &groups, options.is_some());
        if let Some(order) = &op.signature_order {
            signature = reorder(signature, &bindings, order, &node)?;
        }

        let responses = self.responses(op, &node)?;
        let mut warnings = Diagnostics::default();
        let shape = self.shape(op, &responses, &node, &mut warnings)?;

        Ok(OperationDeclaration {
            operation_id: op.id.clone(),
            node,
            name,
            method: op.http_method,
            path_template: op.path_template.clone(),
            description: op.description.clone(),
            versioning: op.versioning.clone(),
            bindings,
            signature,
            groups,
            options,
            body,
            body_content_type: op.request_content_type,
            responses,
            shape,
            warnings,
        })
    }

    fn bindings(&self, op: &OperationNode, node: &NodeRef) -> Result<Vec<ParameterBinding>> {
        let mut bindings = Vec::with_capacity(op.parameters.len() + 1);
        for param in &op.parameters {
            let param_node = node
                .child("parameters")
                .child(&param.wire_name)
                .at(param.source.as_ref());
            let target = self.mapper.map_type(
                &param.schema,
                UsageContext::Parameter(param.location),
                &param_node,
            )?;

            let source = if param.is_api_version {
                BindingSource::ApiVersion
            } else if let Some(group) = &param.group_id {
                BindingSource::Group(group.clone())
            } else if param.required {
                BindingSource::Argument
            } else {
                BindingSource::Options
            };

            bindings.push(ParameterBinding {
                wire_name: param.wire_name.clone(),
                location: param.location,
                name: to_identifier(param.client_name(), CaseConvention::Snake, NameContext::Parameter),
                target,
                required: param.required,
                source,
                alias_of: param.alias_of.clone(),
                versioning: param.versioning.clone(),
                description: param.description.clone(),
                node: param_node,
            });
        }

        let spread = bindings.iter().any(|b| b.alias_of.is_some());
        if let (Some(schema), false) = (&op.request_body_schema, spread) {
            if bindings.iter().any(|b| b.is_whole_body()) {
                return Err(Error::malformed(
                    node.child("requestBodySchema"),
                    "declares both a request body schema and a body parameter",
                ));
            }
            let body_node = node.child("requestBodySchema");
            let target = self.mapper.map_type(
                schema,
                UsageContext::Parameter(ParameterLocation::Body),
                &body_node,
            )?;
            bindings.push(ParameterBinding {
                wire_name: super::BODY_KEY.to_string(),
                location: ParameterLocation::Body,
                name: super::BODY_KEY.to_string(),
                target,
                required: op.request_body_required,
                // an optional body stays positional as an `Option`
                source: BindingSource::Argument,
                alias_of: None,
                versioning: Versioning::default(),
                description: None,
                node: body_node,
            });
        }
        Ok(bindings)
    }

    fn responses(&self, op: &OperationNode, node: &NodeRef) -> Result<Vec<ResponseRoute>> {
        let mut routes = Vec::with_capacity(op.responses.len());
        for (key, schema) in &op.responses {
            let route_node = node.child("responses").child(key);
            let status: StatusPattern = key
                .parse()
                .map_err(|e: clientgen_runtime::RuntimeError| Error::malformed(route_node.clone(), e.to_string()))?;
            let target = schema
                .as_deref()
                .map(|id| self.mapper.map_type(id, UsageContext::Return, &route_node))
                .transpose()?;
            routes.push(ResponseRoute {
                key: key.clone(),
                status,
                target,
                node: route_node,
            });
        }
        Ok(routes)
    }

    fn shape(
        &self,
        op: &OperationNode,
        responses: &[ResponseRoute],
        node: &NodeRef,
        warnings: &mut Diagnostics,
    ) -> Result<ReturnShape> {
        // The lowest success code decides what the method returns
        let mut successes: Vec<&ResponseRoute> = responses.iter().filter(|r| r.status.is_success()).collect();
        successes.sort_by_key(|r| r.status.lowest());
        let primary = successes.first().and_then(|r| r.target.clone());
        if let Some((first, rest)) = successes.split_first() {
            for other in rest.iter().filter(|r| r.target.is_some() && r.target != primary) {
                let message = format!(
                    "success response '{}' declares a different body than '{}', which the method returns; its body is not surfaced",
                    other.key, first.key
                );
                log::warn!("{}: {}", other.node, message);
                warnings.push(other.node.clone(), message);
            }
        }

        if let Some(paging) = &op.pagination_info {
            let paging_node = node.child("paginationInfo");
            let page = primary.ok_or_else(|| {
                Error::malformed(paging_node.clone(), "paged operation has no success body")
            })?;
            let item = self.page_item(&page, &paging.items_path, &paging_node)?;
            if let Some(next) = &paging.next_link_path {
                if self.property_at_path(&page, next).is_none() {
                    log::warn!("{}: next link path '{}' is not a declared property", paging_node, next);
                }
            }
            return Ok(ReturnShape::Paged {
                page,
                item,
                items_path: paging.items_path.clone(),
                next_link_path: paging.next_link_path.clone(),
            });
        }

        if let Some(lro) = &op.long_running_info {
            let result = match &lro.final_result_schema {
                Some(id) => Some(self.mapper.map_type(
                    id,
                    UsageContext::Return,
                    &node.child("longRunningInfo").child("finalResultSchema"),
                )?),
                None => primary,
            };
            return Ok(ReturnShape::LongRunning {
                strategy: lro.polling_strategy,
                status_path: lro.status_path.clone(),
                result_path: lro.result_path.clone(),
                result,
            });
        }

        Ok(ReturnShape::Single(primary))
    }

    /// Element type of the array at `items_path` in the page model
    fn page_item(&self, page: &TargetType, items_path: &str, node: &NodeRef) -> Result<TargetType> {
        let property = self.property_at_path(page, items_path).ok_or_else(|| {
            Error::malformed(
                node.clone(),
                format!("items path '{}' does not name a property of the page model", items_path),
            )
        })?;
        let items = match &self.doc.require_schema(&property.schema, node)?.kind {
            SchemaKind::Array { items } => items.clone(),
            other => {
                return Err(Error::malformed(
                    node.clone(),
                    format!("items path '{}' is a {}, not an array", items_path, other.name()),
                ))
            }
        };
        self.mapper.map_type(&items, UsageContext::Return, node)
    }

    fn property_at_path(&self, page: &TargetType, path: &str) -> Option<&'a crate::ir::PropertyNode> {
        let (mut schema_id, _) = page.named()?;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let property = self.doc.find_property(schema_id, segment)?;
            if segments.peek().is_none() {
                return Some(property);
            }
            schema_id = property.schema.as_str();
        }
        None
    }
}

fn body_decl(bindings: &[ParameterBinding], node: &NodeRef) -> Result<Option<BodyDecl>> {
    let whole: Vec<usize> = bindings
        .iter()
        .enumerate()
        .filter(|(_, b)| b.is_whole_body())
        .map(|(index, _)| index)
        .collect();
    let mut members: Vec<(String, usize)> = Vec::new();
    for (index, binding) in bindings.iter().enumerate() {
        if let Some(alias) = &binding.alias_of {
            if members.iter().any(|(seen, _)| seen == alias) {
                return Err(Error::malformed(
                    binding.node.clone(),
                    format!("body property '{}' is spread from more than one parameter", alias),
                ));
            }
            members.push((alias.clone(), index));
        }
    }

    match (whole.as_slice(), members.is_empty()) {
        ([], true) => Ok(None),
        ([index], true) => Ok(Some(BodyDecl::Whole(*index))),
        ([], false) => Ok(Some(BodyDecl::Spread { members })),
        ([_, _, ..], _) => Err(Error::malformed(node.clone(), "more than one body parameter")),
        ([_], false) => Err(Error::malformed(
            node.clone(),
            "a body parameter cannot be combined with spread body parameters",
        )),
    }
}

/// Form and merge-patch bodies are built from one model's properties
fn check_content_type(
    content_type: BodyContentType,
    bindings: &[ParameterBinding],
    body: Option<&BodyDecl>,
    node: &NodeRef,
) -> Result<()> {
    if content_type == BodyContentType::Json {
        return Ok(());
    }
    let content_node = node.child("requestContentType");
    match body {
        Some(BodyDecl::Whole(index)) => match bindings[*index].target.named() {
            Some((_, NamedKind::Model)) => Ok(()),
            _ => Err(Error::malformed(
                content_node,
                format!("a {} body must be a model", content_type.as_str()),
            )),
        },
        Some(BodyDecl::Spread { .. }) => Err(Error::malformed(
            content_node,
            format!("a {} body cannot be spread into parameters", content_type.as_str()),
        )),
        None => Err(Error::malformed(
            content_node,
            format!("declares {} but has no request body", content_type.as_str()),
        )),
    }
}

fn groups(bindings: &[ParameterBinding], node: &NodeRef) -> Result<Vec<GroupDecl>> {
    let mut groups: IndexMap<String, GroupDecl> = IndexMap::new();
    for binding in bindings {
        let BindingSource::Group(group_id) = &binding.source else {
            continue;
        };
        if binding.is_whole_body() {
            return Err(Error::malformed(binding.node.clone(), "the request body cannot be grouped"));
        }
        let group = groups.entry(group_id.clone()).or_insert_with(|| GroupDecl {
            group_id: group_id.clone(),
            name: to_identifier(group_id, CaseConvention::Pascal, NameContext::Type),
            fields: Vec::new(),
            node: NodeRef::new(format!("groups.{}", group_id)),
        });
        if group.field(&binding.wire_name).is_some() {
            return Err(Error::malformed(
                node.child("parameters").child(&binding.wire_name),
                format!("parameter appears twice in group '{}'", group_id),
            ));
        }
        group.fields.push(GroupField {
            wire_name: binding.wire_name.clone(),
            name: binding.name.clone(),
            location: binding.location,
            target: binding.target.clone(),
            required: binding.required,
            versioning: binding.versioning.clone(),
            description: binding.description.clone(),
            node: binding.node.clone(),
        });
    }
    Ok(groups.into_values().collect())
}

fn default_signature(bindings: &[ParameterBinding], groups: &[GroupDecl], has_options: bool) -> Vec<SignatureSlot> {
    let mut signature: Vec<SignatureSlot> = bindings
        .iter()
        .enumerate()
        .filter(|(_, b)| b.source == BindingSource::Argument && !b.is_whole_body())
        .map(|(index, _)| SignatureSlot::Param(index))
        .collect();
    signature.extend(groups.iter().map(|g| SignatureSlot::Group(g.group_id.clone())));
    if let Some(index) = bindings.iter().position(|b| b.is_whole_body()) {
        signature.push(SignatureSlot::Body(index));
    }
    if has_options {
        signature.push(SignatureSlot::Options);
    }
    signature
}

/// Apply an explicit public order; it must name every slot exactly once
fn reorder(
    signature: Vec<SignatureSlot>,
    bindings: &[ParameterBinding],
    order: &[String],
    node: &NodeRef,
) -> Result<Vec<SignatureSlot>> {
    let order_node = node.child("signatureOrder");
    let keys: Vec<String> = signature.iter().map(|slot| slot.key(bindings)).collect();

    let mut seen = HashSet::new();
    for key in order {
        if !seen.insert(key.as_str()) {
            return Err(Error::malformed(order_node, format!("'{}' is listed twice", key)));
        }
    }
    let missing: Vec<&str> = keys
        .iter()
        .filter(|k| !seen.contains(k.as_str()))
        .map(String::as_str)
        .collect();
    let unknown: Vec<&str> = order
        .iter()
        .filter(|k| !keys.contains(k))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() || !unknown.is_empty() {
        return Err(Error::malformed(
            order_node,
            format!(
                "must be a permutation of [{}]; missing [{}], unknown [{}]",
                keys.join(", "),
                missing.join(", "),
                unknown.join(", ")
            ),
        ));
    }

    let mut slots: Vec<Option<SignatureSlot>> = signature.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());
    for key in order {
        if let Some(position) = keys.iter().position(|k| k == key) {
            if let Some(slot) = slots[position].take() {
                ordered.push(slot);
            }
        }
    }
    Ok(ordered)
}

fn same_members(a: &GroupDecl, b: &GroupDecl) -> bool {
    a.fields.len() == b.fields.len()
        && a.fields.iter().zip(&b.fields).all(|(x, y)| {
            x.wire_name == y.wire_name
                && x.target == y.target
                && x.required == y.required
                && x.location == y.location
                && x.versioning == y.versioning
        })
}

fn member_list(group: &GroupDecl) -> String {
    group
        .fields
        .iter()
        .map(|f| f.wire_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::LroStrategy;
    use crate::operation::{BODY_KEY, OPTIONS_KEY};
    use crate::types::{NamedKind, ScalarType};

    const DOC: &str = r#"
service: { name: Widgets, versions: ["2022-12-01", "2024-06-01"] }
schemas:
  string: { kind: primitive, name: string, primitive: string }
  int32: { kind: primitive, name: int32, primitive: int32 }
  Widget:
    kind: model
    name: Widget
    properties:
      - { wireName: name, schema: string, required: true }
  WidgetList:
    kind: array
    name: WidgetList
    items: Widget
  WidgetPage:
    kind: model
    name: WidgetPage
    properties:
      - { wireName: value, schema: WidgetList, required: true }
      - { wireName: nextLink, schema: string }
  Error:
    kind: model
    name: Error
    properties:
      - { wireName: code, schema: string }
  NotFound:
    kind: model
    name: NotFound
    properties:
      - { wireName: missing, schema: string }
operations:
  - id: Widgets_Get
    httpMethod: GET
    pathTemplate: /scopes/{scope}/widgets/{id}
    parameters:
      - { location: path, wireName: scope, schema: string, required: true, groupId: WidgetScope }
      - { location: query, wireName: api-version, schema: string, required: true, isApiVersion: true }
      - { location: path, wireName: id, schema: string, required: true, groupId: WidgetScope }
      - { location: query, wireName: expand, schema: string }
      - { location: header, wireName: x-request-id, schema: string, required: true }
    responses:
      "200": Widget
      "4XX": Error
      "404": NotFound
  - id: Widgets_Delete
    httpMethod: DELETE
    pathTemplate: /scopes/{scope}/widgets/{id}
    parameters:
      - { location: path, wireName: scope, schema: string, required: true, groupId: WidgetScope }
      - { location: path, wireName: id, schema: string, required: true, groupId: WidgetScope }
    responses:
      "204": null
  - id: Widgets_List
    httpMethod: GET
    pathTemplate: /widgets
    parameters:
      - { location: query, wireName: top, schema: int32 }
    responses:
      "200": WidgetPage
    paginationInfo: { itemsPath: value, nextLinkPath: nextLink }
  - id: Widgets_Create
    httpMethod: PUT
    pathTemplate: /widgets/{id}
    signatureOrder: [body, id]
    parameters:
      - { location: path, wireName: id, schema: string, required: true }
    requestBodySchema: Widget
    responses:
      "201": Widget
      "200": Error
    longRunningInfo: { pollingStrategy: location }
  - id: Widgets_Rename
    httpMethod: POST
    pathTemplate: /widgets/{id}:rename
    parameters:
      - { location: path, wireName: id, schema: string, required: true }
      - { location: body, wireName: newName, schema: string, required: true, aliasOf: name }
      - { location: body, wireName: reason, schema: string, aliasOf: comment }
    responses:
      "200": Widget
"#;

    fn set() -> crate::Result<OperationSet> {
        let doc = IrDocument::parse(DOC)?;
        OperationSynthesizer::new(&doc).synthesize_all(&doc.operations)
    }

    #[test]
    fn test_grouped_parameters_share_one_type() -> crate::Result<()> {
        let set = set()?;
        assert_eq!(set.groups.len(), 1);
        let group = &set.groups["WidgetScope"];
        assert_eq!(group.name, "WidgetScope");
        let fields: Vec<&str> = group.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["scope", "id"]);

        let get = &set.operations[0];
        assert_eq!(get.name, "widgets_get");
        // bindings keep wire order
        let wire: Vec<&str> = get.bindings.iter().map(|b| b.wire_name.as_str()).collect();
        assert_eq!(wire, vec!["scope", "api-version", "id", "expand", "x-request-id"]);
        assert_eq!(
            get.signature_keys(),
            vec!["x-request-id".to_string(), "WidgetScope".to_string(), OPTIONS_KEY.to_string()]
        );
        assert_eq!(get.api_version().map(|b| b.wire_name.as_str()), Some("api-version"));
        assert_eq!(get.options.as_ref().map(|o| o.name.as_str()), Some("WidgetsGetOptions"));
        Ok(())
    }

    #[test]
    fn test_group_mismatch_is_malformed() -> crate::Result<()> {
        let broken = DOC.replace(
            "- { location: path, wireName: id, schema: string, required: true, groupId: WidgetScope }\n    responses:\n      \"204\"",
            "- { location: path, wireName: id, schema: string, required: true }\n    responses:\n      \"204\"",
        );
        assert_ne!(broken, DOC);
        let doc = IrDocument::parse(&broken)?;
        let err = OperationSynthesizer::new(&doc)
            .synthesize_all(&doc.operations)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIr(_)));
        assert!(err.to_string().contains("WidgetScope"));
        Ok(())
    }

    #[test]
    fn test_response_routes_and_return_type() -> crate::Result<()> {
        let set = set()?;
        let get = &set.operations[0];
        let patterns: Vec<StatusPattern> = get.responses.iter().map(|r| r.status).collect();
        let index = clientgen_runtime::status::route(404, &patterns);
        assert_eq!(index.map(|i| get.responses[i].key.as_str()), Some("404"));
        assert_eq!(
            get.shape,
            ReturnShape::Single(Some(TargetType::reference("Widget", NamedKind::Model)))
        );

        let delete = &set.operations[1];
        assert_eq!(delete.shape, ReturnShape::Single(None));
        assert!(delete.options.is_none());
        Ok(())
    }

    #[test]
    fn test_paged_item_type() -> crate::Result<()> {
        let set = set()?;
        match &set.operations[2].shape {
            ReturnShape::Paged { page, item, items_path, next_link_path } => {
                assert_eq!(page, &TargetType::reference("WidgetPage", NamedKind::Model));
                assert_eq!(item, &TargetType::reference("Widget", NamedKind::Model));
                assert_eq!(items_path, "value");
                assert_eq!(next_link_path.as_deref(), Some("nextLink"));
            }
            other => panic!("expected a paged shape, got {:?}", other),
        }
        let top = &set.operations[2].bindings[0];
        assert_eq!(top.source, BindingSource::Options);
        assert_eq!(top.target, TargetType::scalar(ScalarType::Int32));
        Ok(())
    }

    #[test]
    fn test_long_running_uses_lowest_success_code() -> crate::Result<()> {
        let set = set()?;
        let create = &set.operations[3];
        assert_eq!(create.signature_keys(), vec![BODY_KEY.to_string(), "id".to_string()]);
        assert!(matches!(create.body, Some(BodyDecl::Whole(1))));
        match &create.shape {
            ReturnShape::LongRunning { strategy, status_path, result, .. } => {
                assert_eq!(*strategy, LroStrategy::Location);
                assert_eq!(status_path, "status");
                // 200 is lower than 201
                assert_eq!(result, &Some(TargetType::reference("Error", NamedKind::Model)));
            }
            other => panic!("expected a long-running shape, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_dropped_success_bodies_are_reported() -> crate::Result<()> {
        let set = set()?;
        let create = &set.operations[3];
        assert_eq!(create.warnings.len(), 1);
        let warning = create.warnings.iter().next().map(|d| d.to_string()).unwrap_or_default();
        assert!(warning.contains("responses.201"), "{}", warning);
        assert!(warning.contains("'200'"), "{}", warning);

        // a second success code with the same body is not worth a warning
        let get = &set.operations[0];
        assert!(get.warnings.is_empty());
        let same = DOC.replace("\"201\": Widget\n      \"200\": Error", "\"201\": Widget\n      \"200\": Widget");
        assert_ne!(same, DOC);
        let doc = IrDocument::parse(&same)?;
        let create = OperationSynthesizer::new(&doc).synthesize(&doc.operations[3])?;
        assert!(create.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn test_spread_body() -> crate::Result<()> {
        let set = set()?;
        let rename = &set.operations[4];
        match &rename.body {
            Some(BodyDecl::Spread { members }) => {
                let aliases: Vec<&str> = members.iter().map(|(alias, _)| alias.as_str()).collect();
                assert_eq!(aliases, vec!["name", "comment"]);
            }
            other => panic!("expected a spread body, got {:?}", other),
        }
        assert_eq!(
            rename.signature_keys(),
            vec!["id".to_string(), "newName".to_string(), OPTIONS_KEY.to_string()]
        );

        let duplicated = DOC.replace("aliasOf: comment", "aliasOf: name");
        let doc = IrDocument::parse(&duplicated)?;
        let err = OperationSynthesizer::new(&doc)
            .synthesize(&doc.operations[4])
            .unwrap_err();
        assert!(err.to_string().contains("more than one parameter"));
        Ok(())
    }

    #[test]
    fn test_form_and_merge_patch_bodies_need_a_model() -> crate::Result<()> {
        let set = set()?;
        assert_eq!(set.operations[3].body_content_type, BodyContentType::Json);

        let form = DOC.replace(
            "    requestBodySchema: Widget\n",
            "    requestBodySchema: Widget\n    requestContentType: multipart/form-data\n",
        );
        let doc = IrDocument::parse(&form)?;
        let create = OperationSynthesizer::new(&doc).synthesize(&doc.operations[3])?;
        assert_eq!(create.body_content_type, BodyContentType::FormData);

        let scalar = form.replace("requestBodySchema: Widget", "requestBodySchema: string");
        let doc = IrDocument::parse(&scalar)?;
        let err = OperationSynthesizer::new(&doc)
            .synthesize(&doc.operations[3])
            .unwrap_err();
        assert!(err.to_string().contains("must be a model"), "{}", err);

        let spread = DOC.replace(
            "pathTemplate: /widgets/{id}:rename\n",
            "pathTemplate: /widgets/{id}:rename\n    requestContentType: application/merge-patch+json\n",
        );
        let doc = IrDocument::parse(&spread)?;
        let err = OperationSynthesizer::new(&doc)
            .synthesize(&doc.operations[4])
            .unwrap_err();
        assert!(err.to_string().contains("cannot be spread"), "{}", err);

        let bodiless = DOC.replace(
            "pathTemplate: /widgets\n",
            "pathTemplate: /widgets\n    requestContentType: multipart/form-data\n",
        );
        let doc = IrDocument::parse(&bodiless)?;
        let err = OperationSynthesizer::new(&doc)
            .synthesize(&doc.operations[2])
            .unwrap_err();
        assert!(err.to_string().contains("no request body"), "{}", err);
        Ok(())
    }

    #[test]
    fn test_signature_order_must_be_a_permutation() -> crate::Result<()> {
        let broken = DOC.replace("signatureOrder: [body, id]", "signatureOrder: [body, body]");
        let doc = IrDocument::parse(&broken)?;
        let err = OperationSynthesizer::new(&doc)
            .synthesize(&doc.operations[3])
            .unwrap_err();
        assert!(err.to_string().contains("listed twice"));

        let broken = DOC.replace("signatureOrder: [body, id]", "signatureOrder: [body]");
        let doc = IrDocument::parse(&broken)?;
        let err = OperationSynthesizer::new(&doc)
            .synthesize(&doc.operations[3])
            .unwrap_err();
        assert!(err.to_string().contains("missing [id]"));
        Ok(())
    }
}
