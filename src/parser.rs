//! Mapping of XML Schema documents onto the [`SourceSchema`] model.
//!
//! Named model groups and attribute groups are expanded in place, so the
//! translation passes only ever see elements, groups and attributes.

use std::collections::HashMap;

use indexmap::IndexMap;
use roxmltree::{Document, Node};
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::source::{
    Annotation, AppInfoNode, AttributeDecl, AttributeUse, ComplexType, Compositor, Derivation,
    ElementDecl, Facets, Group, IdentityConstraint, IdentityKind, MaxOccurs, Occurs, Particle,
    SimpleType, SourceSchema, TypeDef, TypeRef,
};
use crate::types::{local_name, XSD_NAMESPACE};

/// Parse a single XML Schema document.
///
/// # Errors
///
/// Returns `LoadError::InvalidXml` if the text is not well-formed XML, or
/// `LoadError::NotASchema` if the root element is not `xs:schema`.
pub fn parse_schema_str(content: &str) -> Result<SourceSchema, LoadError> {
    parse_schema_documents(&[content.to_string()])
}

/// Parse a root schema document followed by the documents it includes.
///
/// Global components are merged; when a name is declared twice the first
/// declaration wins. Group and attribute-group references may cross documents.
pub fn parse_schema_documents(contents: &[String]) -> Result<SourceSchema, LoadError> {
    let mut documents = Vec::with_capacity(contents.len());
    for content in contents {
        let doc = Document::parse(content).map_err(|source| LoadError::InvalidXml { source })?;
        let root = doc.root_element();
        if !is_xs(root, "schema") {
            return Err(LoadError::NotASchema {
                root: root.tag_name().name().to_string(),
            });
        }
        documents.push(doc);
    }

    let mut mapper = Mapper::default();
    for doc in &documents {
        mapper.index(doc.root_element());
    }

    let mut schema = SourceSchema::default();
    for (idx, doc) in documents.iter().enumerate() {
        mapper.map_schema(doc.root_element(), idx == 0, &mut schema);
    }
    schema.identities = mapper.identities;
    Ok(schema)
}

/// `schemaLocation` values of `xs:include`, `xs:import` and `xs:redefine` children.
pub fn schema_locations(content: &str) -> Result<Vec<String>, LoadError> {
    let doc = Document::parse(content).map_err(|source| LoadError::InvalidXml { source })?;
    Ok(xs_children(doc.root_element())
        .filter(|n| is_xs(*n, "include") || is_xs(*n, "import") || is_xs(*n, "redefine"))
        .filter_map(|n| n.attribute("schemaLocation").map(String::from))
        .collect())
}

fn is_xs(node: Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(XSD_NAMESPACE)
        && node.tag_name().name() == name
}

fn xs_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().namespace() == Some(XSD_NAMESPACE))
}

fn xs_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    xs_children(node).find(|n| n.tag_name().name() == name)
}

/// Resolve a QName attribute value against the namespaces in scope at `node`.
fn resolve_type_name(node: Node, qname: &str) -> TypeRef {
    let (prefix, local) = match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    };
    let namespace = node.lookup_namespace_uri(prefix);
    if namespace == Some(XSD_NAMESPACE) {
        TypeRef::Builtin(local.to_string())
    } else {
        TypeRef::Named(local.to_string())
    }
}

fn parse_occurs(node: Node) -> Occurs {
    let min = node
        .attribute("minOccurs")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1);
    let max = match node.attribute("maxOccurs").map(str::trim) {
        Some("unbounded") => MaxOccurs::Unbounded,
        Some(v) => MaxOccurs::Bounded(v.parse().unwrap_or(1)),
        None => MaxOccurs::Bounded(1),
    };
    Occurs::new(min, max)
}

fn text_content(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn map_appinfo_node(node: Node) -> AppInfoNode {
    let text = node
        .children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string();
    AppInfoNode {
        name: node.tag_name().name().to_string(),
        text,
        children: node
            .children()
            .filter(|n| n.is_element())
            .map(map_appinfo_node)
            .collect(),
    }
}

fn map_annotation(node: Node) -> Option<Annotation> {
    let annotation = xs_child(node, "annotation")?;
    let mut result = Annotation::default();
    for child in xs_children(annotation) {
        match child.tag_name().name() {
            "documentation" => result.documentation.push(text_content(child)),
            "appinfo" => result.appinfo.extend(
                child
                    .children()
                    .filter(|n| n.is_element())
                    .map(map_appinfo_node),
            ),
            _ => {}
        }
    }
    Some(result)
}

fn map_identity(node: Node) -> Option<IdentityConstraint> {
    let Some(name) = node.attribute("name") else {
        warn!("identity constraint without a name skipped");
        return None;
    };
    let kind = match node.tag_name().name() {
        "key" => IdentityKind::Key,
        "unique" => IdentityKind::Unique,
        "keyref" => IdentityKind::Keyref {
            refer: node
                .attribute("refer")
                .map(|r| local_name(r).to_string())
                .unwrap_or_default(),
        },
        _ => return None,
    };
    let selector = xs_child(node, "selector")
        .and_then(|s| s.attribute("xpath"))
        .map(String::from);
    let fields = xs_children(node)
        .filter(|n| n.tag_name().name() == "field")
        .filter_map(|f| f.attribute("xpath"))
        .map(String::from)
        .collect();
    Some(IdentityConstraint {
        name: name.to_string(),
        kind,
        selector,
        fields,
    })
}

fn map_facets(restriction: Node) -> Facets {
    let mut facets = Facets::default();
    let mut patterns = Vec::new();
    for child in xs_children(restriction) {
        let value = child.attribute("value").map(String::from);
        match child.tag_name().name() {
            "enumeration" => facets.enumeration.extend(value),
            "pattern" => patterns.extend(value),
            "minInclusive" => facets.min_inclusive = value,
            "maxInclusive" => facets.max_inclusive = value,
            _ => {}
        }
    }
    // Patterns declared in the same derivation step are alternatives.
    facets.pattern = match patterns.len() {
        0 => None,
        1 => patterns.pop(),
        _ => Some(
            patterns
                .iter()
                .map(|p| format!("({p})"))
                .collect::<Vec<_>>()
                .join("|"),
        ),
    };
    facets
}

#[derive(Default)]
struct Mapper<'a, 'input> {
    groups: HashMap<String, Node<'a, 'input>>,
    attribute_groups: HashMap<String, Node<'a, 'input>>,
    global_attributes: HashMap<String, Node<'a, 'input>>,
    identities: IndexMap<String, IdentityConstraint>,
    /// Group names currently being expanded, guarding recursive definitions.
    expanding: Vec<String>,
}

impl<'a, 'input> Mapper<'a, 'input> {
    fn index(&mut self, root: Node<'a, 'input>) {
        for child in xs_children(root) {
            let Some(name) = child.attribute("name") else {
                continue;
            };
            let slot = match child.tag_name().name() {
                "group" => &mut self.groups,
                "attributeGroup" => &mut self.attribute_groups,
                "attribute" => &mut self.global_attributes,
                _ => continue,
            };
            slot.entry(name.to_string()).or_insert(child);
        }
    }

    fn map_schema(&mut self, root: Node<'a, 'input>, is_root: bool, schema: &mut SourceSchema) {
        if is_root {
            schema.target_namespace = root.attribute("targetNamespace").map(String::from);
            schema.version = root.attribute("version").map(String::from);
            for ns in root.namespaces() {
                if ns.uri() == XSD_NAMESPACE {
                    continue;
                }
                if let Some(prefix) = ns.name() {
                    schema
                        .namespaces
                        .insert(prefix.to_string(), ns.uri().to_string());
                }
            }
            schema.annotation = map_annotation(root);
        }

        for child in xs_children(root) {
            let kind = child.tag_name().name();
            if !matches!(kind, "simpleType" | "complexType" | "element" | "attribute") {
                continue;
            }
            let Some(name) = child.attribute("name") else {
                warn!(kind, "top-level declaration without a name skipped");
                continue;
            };
            match kind {
                "simpleType" => {
                    let def = TypeDef::Simple(self.map_simple_type(child));
                    schema.types.entry(name.to_string()).or_insert(def);
                }
                "complexType" => {
                    let def = TypeDef::Complex(self.map_complex_type(child));
                    schema.types.entry(name.to_string()).or_insert(def);
                }
                "element" => {
                    let decl = self.map_element(child, true);
                    schema.elements.entry(name.to_string()).or_insert(decl);
                }
                _ => {
                    let decl = self.map_attribute(child);
                    schema.attributes.entry(name.to_string()).or_insert(decl);
                }
            }
        }
    }

    fn map_simple_type(&mut self, node: Node<'a, 'input>) -> SimpleType {
        let mut simple = SimpleType {
            name: node.attribute("name").map(String::from),
            annotation: map_annotation(node),
            ..Default::default()
        };
        if let Some(restriction) = xs_child(node, "restriction") {
            simple.base = self.base_type(restriction, "base");
            simple.facets = map_facets(restriction);
        } else if let Some(list) = xs_child(node, "list") {
            simple.base = self.base_type(list, "itemType");
        }
        simple
    }

    /// Type named by `attr`, or the anonymous simple type declared inside `node`.
    fn base_type(&mut self, node: Node<'a, 'input>, attr: &str) -> Option<Box<TypeRef>> {
        if let Some(qname) = node.attribute(attr) {
            return Some(Box::new(resolve_type_name(node, qname)));
        }
        xs_child(node, "simpleType").map(|inline| {
            Box::new(TypeRef::Inline(Box::new(TypeDef::Simple(
                self.map_simple_type(inline),
            ))))
        })
    }

    fn map_complex_type(&mut self, node: Node<'a, 'input>) -> ComplexType {
        let mut complex = ComplexType {
            name: node.attribute("name").map(String::from),
            is_abstract: node.attribute("abstract") == Some("true"),
            annotation: map_annotation(node),
            ..Default::default()
        };

        for child in xs_children(node) {
            match child.tag_name().name() {
                "complexContent" | "simpleContent" => {
                    let derivation = xs_children(child).find(|n| {
                        matches!(n.tag_name().name(), "extension" | "restriction")
                    });
                    if let Some(derivation) = derivation {
                        complex.derivation = Some(if derivation.tag_name().name() == "extension" {
                            Derivation::Extension
                        } else {
                            Derivation::Restriction
                        });
                        if let Some(TypeRef::Named(base)) = derivation
                            .attribute("base")
                            .map(|b| resolve_type_name(derivation, b))
                        {
                            complex.base = Some(base);
                        }
                        self.map_type_body(derivation, &mut complex);
                    }
                }
                _ => {}
            }
        }
        self.map_type_body(node, &mut complex);
        complex
    }

    /// Content model and attributes declared directly under `node`.
    fn map_type_body(&mut self, node: Node<'a, 'input>, complex: &mut ComplexType) {
        for child in xs_children(node) {
            match child.tag_name().name() {
                "sequence" | "choice" | "all" => complex.content = Some(self.map_group(child)),
                "group" => {
                    if let Some(group) = self.expand_group_ref(child) {
                        complex.content = Some(group);
                    }
                }
                "attribute" => complex.attributes.push(self.map_attribute(child)),
                "attributeGroup" => {
                    let mut seen = Vec::new();
                    self.expand_attribute_group(child, &mut complex.attributes, &mut seen);
                }
                _ => {}
            }
        }
    }

    fn expand_attribute_group(
        &mut self,
        node: Node<'a, 'input>,
        out: &mut Vec<AttributeDecl>,
        seen: &mut Vec<String>,
    ) {
        let Some(reference) = node.attribute("ref").map(local_name) else {
            return;
        };
        if seen.iter().any(|s| s == reference) {
            return;
        }
        let Some(def) = self.attribute_groups.get(reference).copied() else {
            debug!(attribute_group = reference, "unresolved attribute group");
            return;
        };
        seen.push(reference.to_string());
        for child in xs_children(def) {
            match child.tag_name().name() {
                "attribute" => out.push(self.map_attribute(child)),
                "attributeGroup" => self.expand_attribute_group(child, out, seen),
                _ => {}
            }
        }
    }

    fn map_attribute(&mut self, node: Node<'a, 'input>) -> AttributeDecl {
        let use_ = match node.attribute("use") {
            Some("required") => AttributeUse::Required,
            Some("prohibited") => AttributeUse::Prohibited,
            _ => AttributeUse::Optional,
        };

        if let Some(reference) = node.attribute("ref").map(local_name) {
            let mut decl = match self.global_attributes.get(reference).copied() {
                Some(global) => self.map_attribute(global),
                None => AttributeDecl::default(),
            };
            decl.name = Some(reference.to_string());
            decl.use_ = use_;
            if let Some(default) = node.attribute("default") {
                decl.default = Some(default.to_string());
            }
            return decl;
        }

        let type_ref = match node.attribute("type") {
            Some(qname) => Some(resolve_type_name(node, qname)),
            None => xs_child(node, "simpleType")
                .map(|inline| TypeRef::Inline(Box::new(TypeDef::Simple(self.map_simple_type(inline))))),
        };

        AttributeDecl {
            name: node.attribute("name").map(String::from),
            type_ref,
            use_,
            default: node.attribute("default").map(String::from),
            annotation: map_annotation(node),
        }
    }

    fn map_group(&mut self, node: Node<'a, 'input>) -> Group {
        let compositor = match node.tag_name().name() {
            "choice" => Compositor::Choice,
            "all" => Compositor::All,
            _ => Compositor::Sequence,
        };
        let mut group = Group::new(compositor);
        group.occurs = parse_occurs(node);

        for child in xs_children(node) {
            match child.tag_name().name() {
                "element" => group
                    .particles
                    .push(Particle::Element(self.map_element(child, false))),
                "sequence" | "choice" | "all" => {
                    group.particles.push(Particle::Group(self.map_group(child)))
                }
                "group" => {
                    if let Some(inner) = self.expand_group_ref(child) {
                        group.particles.push(Particle::Group(inner));
                    }
                }
                "any" => group.particles.push(Particle::Any),
                _ => {}
            }
        }
        group
    }

    /// Inline the model group named by `node`'s `ref`, keeping the reference's occurrence.
    fn expand_group_ref(&mut self, node: Node<'a, 'input>) -> Option<Group> {
        let reference = local_name(node.attribute("ref")?).to_string();
        if self.expanding.contains(&reference) {
            warn!(group = %reference, "recursive group reference skipped");
            return None;
        }
        let def = self.groups.get(&reference).copied().or_else(|| {
            debug!(group = %reference, "unresolved group reference");
            None
        })?;
        let body = xs_children(def)
            .find(|n| matches!(n.tag_name().name(), "sequence" | "choice" | "all"))?;

        self.expanding.push(reference);
        let mut group = self.map_group(body);
        self.expanding.pop();

        let occurs = parse_occurs(node);
        if occurs != Occurs::ONCE {
            group.occurs = occurs;
        }
        Some(group)
    }

    fn map_element(&mut self, node: Node<'a, 'input>, top_level: bool) -> ElementDecl {
        let reference = node.attribute("ref").map(|r| local_name(r).to_string());
        let name = node
            .attribute("name")
            .map(String::from)
            .or_else(|| reference.clone());

        let type_ref = match node.attribute("type") {
            Some(qname) => Some(resolve_type_name(node, qname)),
            None => xs_children(node).find_map(|child| match child.tag_name().name() {
                "complexType" => Some(TypeRef::Inline(Box::new(TypeDef::Complex(
                    self.map_complex_type(child),
                )))),
                "simpleType" => Some(TypeRef::Inline(Box::new(TypeDef::Simple(
                    self.map_simple_type(child),
                )))),
                _ => None,
            }),
        };

        let mut identities = Vec::new();
        for child in xs_children(node) {
            if !matches!(child.tag_name().name(), "key" | "unique" | "keyref") {
                continue;
            }
            if let Some(identity) = map_identity(child) {
                self.identities
                    .entry(identity.name.clone())
                    .or_insert_with(|| identity.clone());
                identities.push(identity);
            }
        }

        ElementDecl {
            name,
            reference,
            type_ref,
            occurs: if top_level {
                Occurs::ONCE
            } else {
                parse_occurs(node)
            },
            substitution_group: node
                .attribute("substitutionGroup")
                .map(|s| local_name(s).to_string()),
            is_abstract: node.attribute("abstract") == Some("true"),
            identities,
            annotation: map_annotation(node),
        }
    }
}
