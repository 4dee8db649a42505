//! XSD to LinkML translation: the pass coordinator.
//!
//! A run seeds the schema header, populates a class per named complex type,
//! then a class per top-level element, translates identity constraints, and
//! finally relaxes choice members. Declarations that cannot be interpreted are
//! skipped and reported as diagnostics; they never abort the run.

use std::collections::HashSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::constraints::ConstraintHandler;
use crate::documentation::apply_annotation;
use crate::error::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::identity::{apply_local_identities, IdentityProcessor};
use crate::slots::{ChildSlot, SlotBuilder};
use crate::source::{AttributeUse, ComplexType, ElementDecl, SourceSchema, TypeDef, TypeRef};
use crate::target::{SchemaDefinition, TargetModel};
use crate::types::{
    is_primitive_range, local_name, ConvertOptions, DocOverrides, SchemaMetadata, DEFAULT_RANGE,
};

const LINKML_PREFIX: &str = "linkml";
const LINKML_URI: &str = "https://w3id.org/linkml/";
const LINKML_TYPES: &str = "linkml:types";
const DEFAULT_ID_BASE: &str = "https://w3id.org/xsd-linkml/";
const DEFAULT_NAME: &str = "xsd_schema";
const DEFAULT_DESCRIPTION: &str = "Generated from XML Schema";

static NAME_SANITIZER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]+").expect("valid name regex"));

/// Result of a translation run.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub schema: SchemaDefinition,
    /// Declarations skipped during the run, in the order they were met.
    pub diagnostics: Vec<Diagnostic>,
}

/// Translate a source schema into a LinkML schema.
///
/// # Example
///
/// ```
/// use xsd_linkml::{convert, load_schema_str, ConvertOptions};
///
/// let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
///   <xs:complexType name="Sample">
///     <xs:attribute name="name" type="xs:string" use="required"/>
///   </xs:complexType>
/// </xs:schema>"#;
///
/// let source = load_schema_str(xsd).unwrap();
/// let conversion = convert(&source, &ConvertOptions::default());
/// let sample = &conversion.schema.classes["Sample"];
/// assert_eq!(sample.attributes["name"].required, Some(true));
/// ```
pub fn convert(source: &SourceSchema, options: &ConvertOptions) -> Conversion {
    let inheritance = source.inheritance_map();
    let known = known_class_names(source);
    let header = schema_header(source, &options.metadata);
    let mut model = TargetModel::new(header, options.slot_mode);

    let mut builder = ClassBuilder::new(source, &options.overrides, &inheritance, &known);
    builder.process_complex_types(&mut model);
    builder.process_elements(&mut model);

    let ClassBuilder {
        constraints,
        mut diagnostics,
        ..
    } = builder;
    IdentityProcessor::new(&inheritance, &known).process_identities(
        &mut model,
        source.identities.values(),
        &mut diagnostics,
    );
    constraints.relax(&mut model);

    let schema = model.into_schema();
    info!(
        schema = %schema.name,
        classes = schema.classes.len(),
        enums = schema.enums.len(),
        "conversion complete"
    );
    if !diagnostics.is_empty() {
        warn!(skipped = diagnostics.len(), "declarations skipped");
    }
    Conversion {
        schema,
        diagnostics: diagnostics.into_vec(),
    }
}

/// Names that will become classes: named complex types and top-level elements.
fn known_class_names(source: &SourceSchema) -> HashSet<String> {
    source
        .complex_types()
        .map(|(name, _)| name.to_string())
        .chain(source.elements.keys().cloned())
        .collect()
}

/// Schema name derived from a namespace: its last path segment that starts
/// with a letter, lower-cased.
pub fn derive_schema_name(namespace: Option<&str>) -> String {
    namespace
        .and_then(|ns| {
            ns.split(['/', '#', ':'])
                .rev()
                .find(|seg| seg.starts_with(|c: char| c.is_ascii_alphabetic()))
        })
        .map(|seg| {
            NAME_SANITIZER
                .replace_all(&seg.to_ascii_lowercase(), "_")
                .trim_matches('_')
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_NAME.to_string())
}

/// Build the target schema header from the source root and caller metadata.
pub fn schema_header(source: &SourceSchema, metadata: &SchemaMetadata) -> SchemaDefinition {
    let name = metadata
        .schema_name
        .clone()
        .unwrap_or_else(|| derive_schema_name(source.target_namespace.as_deref()));
    let id = metadata
        .schema_id
        .clone()
        .or_else(|| source.target_namespace.clone())
        .unwrap_or_else(|| format!("{DEFAULT_ID_BASE}{name}"));
    let default_prefix = metadata
        .default_prefix
        .clone()
        .unwrap_or_else(|| name.clone());

    let mut prefixes = IndexMap::new();
    prefixes.insert(LINKML_PREFIX.to_string(), LINKML_URI.to_string());
    let default_uri = if id.ends_with('/') || id.ends_with('#') {
        id.clone()
    } else {
        format!("{id}/")
    };
    prefixes.insert(default_prefix.clone(), default_uri);
    for (prefix, uri) in &source.namespaces {
        if prefix == "xml" {
            continue;
        }
        prefixes.entry(prefix.clone()).or_insert_with(|| uri.clone());
    }
    for (prefix, uri) in &metadata.extra_prefixes {
        prefixes.insert(prefix.clone(), uri.clone());
    }

    SchemaDefinition {
        title: Some(metadata.schema_title.clone().unwrap_or_else(|| name.clone())),
        description: Some(
            source
                .annotation
                .as_ref()
                .and_then(|a| a.documentation_text())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        ),
        version: source.version.clone(),
        prefixes,
        default_prefix: Some(default_prefix),
        default_range: Some(DEFAULT_RANGE.to_string()),
        imports: vec![LINKML_TYPES.to_string()],
        id,
        name,
        ..Default::default()
    }
}

/// Creates and populates classes for complex types and elements.
struct ClassBuilder<'s> {
    source: &'s SourceSchema,
    inheritance: &'s IndexMap<String, String>,
    slots: SlotBuilder<'s>,
    constraints: ConstraintHandler,
    diagnostics: Diagnostics,
}

impl<'s> ClassBuilder<'s> {
    fn new(
        source: &'s SourceSchema,
        overrides: &'s DocOverrides,
        inheritance: &'s IndexMap<String, String>,
        known_classes: &'s HashSet<String>,
    ) -> Self {
        Self {
            source,
            inheritance,
            slots: SlotBuilder::new(source, overrides, inheritance, known_classes),
            constraints: ConstraintHandler::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Attach a complex type's documentation, attributes and child elements
    /// to `class_name`, and hand its content model to the constraint handler.
    fn populate_complex_type(
        &mut self,
        model: &mut TargetModel,
        class_name: &str,
        complex: &'s ComplexType,
        fallback_description: &str,
    ) {
        let class = model.ensure_class(class_name, Some(fallback_description));
        apply_annotation(class, complex.annotation.as_ref());
        if complex.is_abstract {
            class.is_abstract = Some(true);
        }

        for attr in &complex.attributes {
            let Some(attr_name) = attr.name.as_deref().map(local_name) else {
                self.diagnostics.push(
                    DiagnosticKind::MalformedDeclaration,
                    class_name,
                    "attribute without a name or resolvable ref",
                );
                continue;
            };
            if attr.use_ == AttributeUse::Prohibited {
                debug!(class = class_name, attribute = attr_name, "prohibited attribute skipped");
                continue;
            }
            let slot = self
                .slots
                .slot_from_attribute(model, class_name, attr_name, attr);
            model.add_attribute(class_name, attr_name, slot);
        }

        if let Some(content) = &complex.content {
            for child in content.iter_elements() {
                self.add_child_element(model, class_name, child);
            }
            self.constraints.record_content(model, class_name, content);
        }
    }

    fn add_child_element(
        &mut self,
        model: &mut TargetModel,
        parent_class: &str,
        child: &'s ElementDecl,
    ) {
        let Some(ChildSlot {
            name,
            range,
            slot,
            inline,
        }) = self.slots.build_child_element_slot(model, parent_class, child)
        else {
            self.diagnostics.push(
                DiagnosticKind::MalformedDeclaration,
                parent_class,
                "child element without a name or ref",
            );
            return;
        };

        if !is_primitive_range(&range) && !model.schema().enums.contains_key(&range) {
            model.ensure_class(&range, None);
        }
        if let Some(complex) = inline {
            let fallback = format!("Inline complex type for {range}");
            self.populate_complex_type(model, &range, complex, &fallback);
        }
        model.add_attribute(parent_class, &name, slot);
    }

    /// Populate every named complex type, then link derived types to their bases.
    fn process_complex_types(&mut self, model: &mut TargetModel) {
        let source = self.source;
        for (name, complex) in source.complex_types() {
            let fallback = format!("Complex type {name}");
            self.populate_complex_type(model, name, complex, &fallback);
        }

        let inheritance = self.inheritance;
        for (name, base) in inheritance {
            if name == base {
                continue;
            }
            if model.has_class(base) {
                if let Some(class) = model.class_mut(name) {
                    class.is_a = Some(base.clone());
                }
            } else if source.simple_type(base).is_none() {
                self.diagnostics.push(
                    DiagnosticKind::UnresolvableReference,
                    name,
                    format!("base type '{base}' has no class"),
                );
            }
        }
    }

    /// One class per top-level element, with inheritance from its named type,
    /// its substitution group head, or the base of its anonymous type.
    fn process_elements(&mut self, model: &mut TargetModel) {
        let source = self.source;
        for (name, element) in &source.elements {
            let description = format!("The {name} element from the XML Schema.");
            model.ensure_class(name, Some(&description));

            let mut is_a = None;
            match &element.type_ref {
                Some(TypeRef::Inline(def)) => {
                    if let TypeDef::Complex(complex) = def.as_ref() {
                        self.populate_complex_type(model, name, complex, &description);
                        if let Some(base) = complex.base.as_deref().map(local_name) {
                            if model.has_class(base) {
                                is_a = Some(base.to_string());
                            } else if source.simple_type(base).is_none() {
                                self.diagnostics.push(
                                    DiagnosticKind::UnresolvableReference,
                                    name,
                                    format!("base type '{base}' has no class"),
                                );
                            }
                        }
                    }
                }
                Some(TypeRef::Named(type_name)) => {
                    let type_name = local_name(type_name);
                    if type_name != name && model.has_class(type_name) {
                        is_a = Some(type_name.to_string());
                    }
                }
                _ => {}
            }

            if let Some(head) = element.substitution_group.as_deref().map(local_name) {
                if head != name {
                    let head_description = format!("Head of substitution group {head}");
                    model.ensure_class(head, Some(&head_description)).is_abstract = Some(true);
                    // An inline type's own base is more specific than the group head.
                    if is_a.is_none() || !matches!(element.type_ref, Some(TypeRef::Inline(_))) {
                        is_a = Some(head.to_string());
                    }
                }
            }

            let class = model.ensure_class(name, None);
            apply_annotation(class, element.annotation.as_ref());
            if element.is_abstract {
                class.is_abstract = Some(true);
            }
            if let Some(parent) = is_a.filter(|p| p != name) {
                class.is_a = Some(parent);
            }
            apply_local_identities(class, &element.identities);
        }
    }
}
