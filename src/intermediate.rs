//! Intermediate JSON tree of the source schema.
//!
//! One property per top-level element. Attributes appear as `@name`
//! properties carrying the JSON type, the declared XSD type and its built-in
//! base; child elements appear by name, recursively. The tree is used for
//! element filtering and for the structural comparison in [`crate::verify`].

use std::collections::HashSet;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::documentation::parse_documentation;
use crate::primitives::PrimitiveMapper;
use crate::source::{
    Annotation, AttributeDecl, AttributeUse, ComplexType, ElementDecl, SourceSchema, TypeDef,
    TypeRef,
};
use crate::types::local_name;

const JSON_SCHEMA_DRAFT: &str = "http://json-schema.org/draft-07/schema#";

/// JSON Schema type for a LinkML primitive range.
fn json_type(range: &str) -> &'static str {
    match range {
        "integer" => "integer",
        "float" => "number",
        "boolean" => "boolean",
        _ => "string",
    }
}

fn description(annotation: Option<&Annotation>) -> Option<String> {
    let text = annotation?.documentation_text()?;
    parse_documentation(&text).description
}

/// Named types and global elements currently being expanded.
struct ExpansionPath<'s> {
    types: Vec<&'s str>,
    elements: Vec<&'s str>,
}

struct TreeBuilder<'s> {
    source: &'s SourceSchema,
    primitives: PrimitiveMapper<'s>,
}

impl<'s> TreeBuilder<'s> {
    /// Name of the built-in type at the root of `type_ref`'s restriction chain.
    fn builtin_base(&self, type_ref: &'s TypeRef) -> Option<String> {
        let mut visited = HashSet::new();
        let mut current = type_ref;
        loop {
            match current {
                TypeRef::Builtin(name) => return Some(name.clone()),
                TypeRef::Named(name) => {
                    if !visited.insert(name.as_str()) {
                        return None;
                    }
                    current = self.source.simple_type(local_name(name))?.base.as_deref()?;
                }
                TypeRef::Inline(def) => match def.as_ref() {
                    TypeDef::Simple(st) => current = st.base.as_deref()?,
                    TypeDef::Complex(_) => return None,
                },
            }
        }
    }

    fn attribute_node(&self, attr: &'s AttributeDecl) -> Value {
        let mut node = Map::new();
        let range = attr
            .type_ref
            .as_ref()
            .map(|t| self.primitives.range_for(t))
            .unwrap_or("string");
        node.insert("type".into(), json!(json_type(range)));

        if let Some(type_ref) = &attr.type_ref {
            if let Some(declared) = type_ref.local_name() {
                node.insert("xsdType".into(), json!(declared));
            }
            if let Some(base) = self.builtin_base(type_ref) {
                node.insert("xsdBaseType".into(), json!(base));
            }
        }
        if let Some(text) = description(attr.annotation.as_ref()) {
            node.insert("description".into(), json!(text));
        }
        if let Some(type_ref) = &attr.type_ref {
            let values = self.primitives.facets_for(type_ref).enumeration;
            if !values.is_empty() {
                node.insert("enum".into(), json!(values));
            }
        }
        Value::Object(node)
    }

    /// Effective complex type of an element, following `ref` to the global element.
    fn element_type(&self, element: &'s ElementDecl) -> Option<&'s TypeRef> {
        match &element.reference {
            Some(reference) => self.source.elements.get(local_name(reference))?.type_ref.as_ref(),
            None => element.type_ref.as_ref(),
        }
    }

    fn add_attributes(
        &self,
        complex: &'s ComplexType,
        properties: &mut Map<String, Value>,
        required: &mut Vec<Value>,
    ) {
        for attr in &complex.attributes {
            let Some(name) = attr.name.as_deref().map(local_name) else {
                continue;
            };
            if attr.use_ == AttributeUse::Prohibited {
                continue;
            }
            let key = format!("@{name}");
            if properties.contains_key(&key) {
                continue;
            }
            if attr.use_ == AttributeUse::Required {
                required.push(json!(key));
            }
            properties.insert(key, self.attribute_node(attr));
        }
    }

    /// Node for `element`. `path` holds the named types and referenced
    /// elements being expanded so recursive content is cut off.
    fn element_node(&self, element: &'s ElementDecl, path: &mut ExpansionPath<'s>) -> Value {
        let mut node = Map::new();
        node.insert("type".into(), json!("object"));
        let mut properties = Map::new();
        let mut required = Vec::new();

        let type_ref = self.element_type(element);
        let named = type_ref.and_then(|t| match t {
            TypeRef::Named(name) => Some(local_name(name)),
            _ => None,
        });
        let referenced = element.reference.as_deref().map(local_name);
        let recursive = named.is_some_and(|n| path.types.contains(&n))
            || referenced.is_some_and(|r| path.elements.contains(&r));
        let complex = type_ref.and_then(|t| self.source.resolve_complex(t));

        match complex {
            Some(_) if recursive => {
                debug!(
                    type_name = named.unwrap_or_default(),
                    element = referenced.unwrap_or_default(),
                    "recursive content not expanded"
                );
            }
            Some(complex) => {
                if let Some(name) = named {
                    path.types.push(name);
                }
                if let Some(name) = referenced {
                    path.elements.push(name);
                }
                self.add_attributes(complex, &mut properties, &mut required);
                if let Some(content) = &complex.content {
                    for child in content.iter_elements() {
                        let Some(child_name) = child.name.as_deref() else {
                            continue;
                        };
                        let child_node = self.element_node(child, path);
                        properties.insert(local_name(child_name).to_string(), child_node);
                    }
                }
                if let Some(base) = complex.base.as_deref().map(local_name) {
                    node.insert("baseType".into(), json!(base));
                    if let Some(base_type) = self.source.complex_type(base) {
                        self.add_attributes(base_type, &mut properties, &mut required);
                    }
                }
                if named.is_some() {
                    path.types.pop();
                }
                if referenced.is_some() {
                    path.elements.pop();
                }
            }
            None => {
                if let Some(t) = type_ref {
                    let values = self.primitives.facets_for(t).enumeration;
                    if !values.is_empty() {
                        node.insert("enum".into(), json!(values));
                    }
                }
            }
        }

        node.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            node.insert("required".into(), Value::Array(required));
        }
        if let Some(text) = description(element.annotation.as_ref()) {
            node.insert("description".into(), json!(text));
        }
        Value::Object(node)
    }
}

/// Build the intermediate tree for every top-level element of `source`.
pub fn to_json_tree(source: &SourceSchema) -> Value {
    let builder = TreeBuilder {
        source,
        primitives: PrimitiveMapper::new(source),
    };
    let mut properties = Map::new();
    for (name, element) in &source.elements {
        let mut path = ExpansionPath {
            types: Vec::new(),
            elements: vec![name.as_str()],
        };
        properties.insert(name.clone(), builder.element_node(element, &mut path));
    }
    json!({
        "$schema": JSON_SCHEMA_DRAFT,
        "type": "object",
        "properties": properties,
        "definitions": {},
    })
}

/// Keep only the named top-level elements, in the order given.
/// Unknown names are ignored.
pub fn filter_elements(tree: &mut Value, names: &[String]) {
    let Some(properties) = tree.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };
    let mut kept = Map::new();
    for name in names {
        if let Some(node) = properties.remove(name.as_str()) {
            kept.insert(name.clone(), node);
        }
    }
    *properties = kept;
}

/// Names of the top-level elements in a tree.
pub fn element_names(tree: &Value) -> Vec<String> {
    tree.get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_schema_str;

    const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Color">
    <xs:restriction base="xs:string">
      <xs:enumeration value="red"/>
      <xs:enumeration value="blue"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="Base">
    <xs:attribute name="ID" type="xs:string" use="required"/>
  </xs:complexType>
  <xs:complexType name="Node">
    <xs:complexContent>
      <xs:extension base="Base">
        <xs:sequence>
          <xs:element name="Child" type="Node" minOccurs="0"/>
        </xs:sequence>
        <xs:attribute name="color" type="Color"/>
        <xs:attribute name="size" type="xs:int"/>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="Tree">
    <xs:annotation><xs:documentation>tier = 1
The tree.</xs:documentation></xs:annotation>
    <xs:complexType>
      <xs:sequence><xs:element ref="Root"/></xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:element name="Root" type="Node"/>
</xs:schema>"#;

    #[test]
    fn builds_element_tree() {
        let source = parse_schema_str(XSD).unwrap();
        let tree = to_json_tree(&source);

        assert_eq!(tree["$schema"], JSON_SCHEMA_DRAFT);
        assert_eq!(element_names(&tree), ["Tree", "Root"]);

        let root = &tree["properties"]["Root"];
        assert_eq!(root["baseType"], "Base");
        assert_eq!(root["properties"]["@size"]["type"], "integer");
        assert_eq!(root["properties"]["@color"]["xsdType"], "Color");
        assert_eq!(root["properties"]["@color"]["xsdBaseType"], "string");
        assert_eq!(root["properties"]["@color"]["enum"], json!(["red", "blue"]));
        assert_eq!(root["properties"]["@ID"]["type"], "string");
        assert_eq!(root["required"], json!(["@ID"]));

        let tree_node = &tree["properties"]["Tree"];
        assert_eq!(tree_node["description"], "The tree.");
        assert!(tree_node["properties"]["Root"]["properties"]
            .get("Child")
            .is_some());
    }

    #[test]
    fn recursion_is_cut_off() {
        let source = parse_schema_str(XSD).unwrap();
        let tree = to_json_tree(&source);

        let child = &tree["properties"]["Root"]["properties"]["Child"];
        assert_eq!(child["properties"], json!({}));
    }

    #[test]
    fn self_referencing_anonymous_element_is_cut_off() {
        let source = parse_schema_str(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Folder">
    <xs:complexType>
      <xs:sequence>
        <xs:element ref="Folder" minOccurs="0" maxOccurs="unbounded"/>
        <xs:element ref="File" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="name" type="xs:string"/>
    </xs:complexType>
  </xs:element>
  <xs:element name="File">
    <xs:complexType>
      <xs:attribute name="size" type="xs:long"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        )
        .unwrap();
        let tree = to_json_tree(&source);

        let folder = &tree["properties"]["Folder"];
        assert_eq!(folder["properties"]["@name"]["type"], "string");
        assert_eq!(folder["properties"]["Folder"]["properties"], json!({}));
        assert_eq!(
            folder["properties"]["File"]["properties"]["@size"]["type"],
            "integer"
        );
    }

    #[test]
    fn filters_top_level_elements() {
        let source = parse_schema_str(XSD).unwrap();
        let mut tree = to_json_tree(&source);
        filter_elements(&mut tree, &["Root".to_string(), "Missing".to_string()]);
        assert_eq!(element_names(&tree), ["Root"]);
    }
}
