//! Slot construction from attribute and child-element declarations.

use std::collections::HashSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::documentation::apply_annotation;
use crate::primitives::PrimitiveMapper;
use crate::resolver::ReferenceResolver;
use crate::source::{
    AttributeDecl, AttributeUse, ComplexType, ElementDecl, SourceSchema, TypeDef, TypeRef,
};
use crate::target::{NumericBound, SlotDefinition, TargetModel};
use crate::types::{local_name, DocOverrides, DEFAULT_RANGE, IDENTIFIER_SUFFIX};

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid name regex"));

/// Deterministic enumeration name for an attribute's value set.
pub fn enum_name(owner_class: &str, attr_name: &str) -> String {
    NON_WORD
        .replace_all(&format!("Enum_{owner_class}_{attr_name}"), "_")
        .into_owned()
}

/// A child-element slot ready to be attached to its parent class.
#[derive(Debug)]
pub struct ChildSlot<'s> {
    pub name: String,
    pub range: String,
    pub slot: SlotDefinition,
    /// Anonymous complex content the caller must populate under `range`.
    pub inline: Option<&'s ComplexType>,
}

/// Builds slot definitions from source declarations.
pub struct SlotBuilder<'s> {
    source: &'s SourceSchema,
    primitives: PrimitiveMapper<'s>,
    overrides: &'s DocOverrides,
    inheritance: &'s IndexMap<String, String>,
    known_classes: &'s HashSet<String>,
}

impl<'s> SlotBuilder<'s> {
    pub fn new(
        source: &'s SourceSchema,
        overrides: &'s DocOverrides,
        inheritance: &'s IndexMap<String, String>,
        known_classes: &'s HashSet<String>,
    ) -> Self {
        Self {
            source,
            primitives: PrimitiveMapper::new(source),
            overrides,
            inheritance,
            known_classes,
        }
    }

    /// Resolver over the model as it currently stands.
    pub fn resolver<'m>(&'m self, model: &'m TargetModel) -> ReferenceResolver<'m> {
        ReferenceResolver::new(model.schema(), self.inheritance, self.known_classes)
    }

    /// Range, enumeration and facets for a simple-valued declaration.
    ///
    /// Enumerated value sets become an enum named after the owner and slot.
    fn simple_slot(
        &self,
        model: &mut TargetModel,
        owner_class: &str,
        slot_name: &str,
        type_ref: Option<&'s TypeRef>,
    ) -> SlotDefinition {
        let Some(type_ref) = type_ref else {
            return SlotDefinition::with_range(DEFAULT_RANGE);
        };
        let mut slot = SlotDefinition::with_range(self.primitives.range_for(type_ref));
        let facets = self.primitives.facets_for(type_ref);

        if !facets.enumeration.is_empty() {
            let name = enum_name(owner_class, slot_name);
            model.ensure_enum(&name, &facets.enumeration);
            slot.range = Some(name);
        }
        slot.pattern = facets.pattern;
        slot.minimum_value = facets.min_inclusive.as_deref().and_then(NumericBound::parse);
        slot.maximum_value = facets.max_inclusive.as_deref().and_then(NumericBound::parse);
        slot
    }

    /// Build the slot for attribute `attr_name` of `owner_class`.
    pub fn slot_from_attribute(
        &self,
        model: &mut TargetModel,
        owner_class: &str,
        attr_name: &str,
        attr: &'s AttributeDecl,
    ) -> SlotDefinition {
        let declared = attr.type_ref.as_ref().and_then(TypeRef::local_name);
        let is_id = attr_name.eq_ignore_ascii_case("id");

        let reference = if is_id {
            let resolver = self.resolver(model);
            if resolver.class_is_ref_like(owner_class) {
                resolver.reference_target_for_class(owner_class, declared)
            } else {
                None
            }
        } else {
            None
        };

        let mut slot = self.simple_slot(model, owner_class, attr_name, attr.type_ref.as_ref());
        if let Some(target) = reference {
            debug!(class = owner_class, target = %target, "reference id attribute");
            slot.range = Some(target);
        }
        if attr.use_ == AttributeUse::Required {
            slot.required = Some(true);
        }
        if is_id || declared.is_some_and(|t| t.ends_with(IDENTIFIER_SUFFIX)) {
            slot.identifier = Some(true);
        }

        apply_annotation(&mut slot, attr.annotation.as_ref());
        if let Some(text) = self.overrides.get(owner_class, attr_name) {
            slot.description = Some(text.to_string());
        }
        slot
    }

    /// Build the slot for a child element of `parent_class`.
    ///
    /// Returns `None` when the child has neither a name nor a reference.
    pub fn build_child_element_slot(
        &self,
        model: &mut TargetModel,
        parent_class: &str,
        child: &'s ElementDecl,
    ) -> Option<ChildSlot<'s>> {
        let name = child.name.clone()?;
        let mut inline = None;

        let mut slot = if let Some(reference) = &child.reference {
            SlotDefinition::with_range(local_name(reference))
        } else {
            match &child.type_ref {
                Some(TypeRef::Named(type_name)) if self.is_class_type(type_name) => {
                    SlotDefinition::with_range(local_name(type_name))
                }
                Some(TypeRef::Inline(def)) if def.is_complex() => {
                    if let TypeDef::Complex(ct) = def.as_ref() {
                        inline = Some(ct);
                    }
                    SlotDefinition::with_range(name.as_str())
                }
                other => self.simple_slot(model, parent_class, &name, other.as_ref()),
            }
        };

        if child.occurs.is_required() {
            slot.required = Some(true);
        }
        if child.occurs.is_repeating() {
            slot.multivalued = Some(true);
        }

        let documented = apply_annotation(&mut slot, child.annotation.as_ref());
        if let Some(text) = self.overrides.get(parent_class, &name) {
            slot.description = Some(text.to_string());
        } else if !documented {
            slot.description = Some(format!("Child element {name} of {parent_class}"));
        }

        let range = slot.range.clone().unwrap_or_else(|| DEFAULT_RANGE.to_string());
        Some(ChildSlot {
            name,
            range,
            slot,
            inline,
        })
    }

    /// A named type that becomes a class rather than a primitive range.
    fn is_class_type(&self, type_name: &str) -> bool {
        let name = local_name(type_name);
        self.source.complex_type(name).is_some()
            || (self.source.simple_type(name).is_none() && self.known_classes.contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_schema_str;
    use crate::target::SchemaDefinition;
    use crate::types::SlotMode;

    const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="ImageID">
    <xs:restriction base="xs:string"><xs:pattern value="Image:\S+"/></xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="Percent">
    <xs:restriction base="xs:float">
      <xs:minInclusive value="0"/><xs:maxInclusive value="100"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="Image">
    <xs:sequence>
      <xs:element name="Pixels" type="Pixels"/>
      <xs:element name="Note" type="xs:string" minOccurs="0" maxOccurs="unbounded">
        <xs:annotation><xs:documentation>A note.</xs:documentation></xs:annotation>
      </xs:element>
      <xs:element name="Extra" minOccurs="0">
        <xs:complexType><xs:attribute name="Key" type="xs:string"/></xs:complexType>
      </xs:element>
      <xs:element ref="Annotation"/>
    </xs:sequence>
    <xs:attribute name="ID" type="ImageID" use="required"/>
    <xs:attribute name="Opacity" type="Percent"/>
    <xs:attribute name="Mode">
      <xs:simpleType>
        <xs:restriction base="xs:string">
          <xs:enumeration value="Wide Field"/>
          <xs:enumeration value="Confocal"/>
        </xs:restriction>
      </xs:simpleType>
    </xs:attribute>
  </xs:complexType>
  <xs:complexType name="Pixels"/>
  <xs:complexType name="ImageRef">
    <xs:attribute name="ID" type="ImageID" use="required"/>
  </xs:complexType>
  <xs:element name="Annotation" type="xs:string"/>
</xs:schema>"#;

    struct Fixture {
        source: SourceSchema,
        overrides: DocOverrides,
        inheritance: IndexMap<String, String>,
        known: HashSet<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let source = parse_schema_str(SCHEMA).unwrap();
            let known = source
                .complex_types()
                .map(|(n, _)| n.to_string())
                .chain(source.elements.keys().cloned())
                .collect();
            let mut overrides = DocOverrides::new();
            overrides.insert("Image", "Opacity", "Overridden.");
            Self {
                inheritance: source.inheritance_map(),
                source,
                overrides,
                known,
            }
        }

        fn builder(&self) -> SlotBuilder<'_> {
            SlotBuilder::new(&self.source, &self.overrides, &self.inheritance, &self.known)
        }

        fn attribute(&self, class: &str, name: &str) -> &AttributeDecl {
            self.source
                .complex_type(class)
                .unwrap()
                .attributes
                .iter()
                .find(|a| a.name.as_deref() == Some(name))
                .unwrap()
        }
    }

    fn model() -> TargetModel {
        TargetModel::new(SchemaDefinition::default(), SlotMode::Inline)
    }

    #[test]
    fn identifier_attribute() {
        let fx = Fixture::new();
        let mut model = model();
        let slot = fx.builder().slot_from_attribute(
            &mut model,
            "Image",
            "ID",
            fx.attribute("Image", "ID"),
        );
        assert_eq!(slot.range.as_deref(), Some("string"));
        assert_eq!(slot.required, Some(true));
        assert_eq!(slot.identifier, Some(true));
        assert_eq!(slot.pattern.as_deref(), Some(r"Image:\S+"));
    }

    #[test]
    fn reference_class_id_points_at_target() {
        let fx = Fixture::new();
        let mut model = model();
        let slot = fx.builder().slot_from_attribute(
            &mut model,
            "ImageRef",
            "ID",
            fx.attribute("ImageRef", "ID"),
        );
        assert_eq!(slot.range.as_deref(), Some("Image"));
    }

    #[test]
    fn bounds_and_override() {
        let fx = Fixture::new();
        let mut model = model();
        let slot = fx.builder().slot_from_attribute(
            &mut model,
            "Image",
            "Opacity",
            fx.attribute("Image", "Opacity"),
        );
        assert_eq!(slot.range.as_deref(), Some("float"));
        assert_eq!(slot.minimum_value, Some(NumericBound::Integer(0)));
        assert_eq!(slot.maximum_value, Some(NumericBound::Integer(100)));
        assert_eq!(slot.description.as_deref(), Some("Overridden."));
        assert_eq!(slot.required, None);
    }

    #[test]
    fn enumerations_become_enums() {
        let fx = Fixture::new();
        let mut model = model();
        let slot = fx.builder().slot_from_attribute(
            &mut model,
            "Image",
            "Mode",
            fx.attribute("Image", "Mode"),
        );
        assert_eq!(slot.range.as_deref(), Some("Enum_Image_Mode"));
        let values: Vec<_> = model.schema().enums["Enum_Image_Mode"]
            .permissible_values
            .keys()
            .cloned()
            .collect();
        assert_eq!(values, ["Wide Field", "Confocal"]);
    }

    #[test]
    fn enum_names_are_sanitized() {
        assert_eq!(enum_name("Image", "x-mode"), "Enum_Image_x_mode");
    }

    #[test]
    fn child_element_slots() {
        let fx = Fixture::new();
        let builder = fx.builder();
        let mut model = model();
        let content = fx.source.complex_type("Image").unwrap().content.as_ref().unwrap();
        let children: Vec<_> = content
            .iter_elements()
            .into_iter()
            .map(|child| {
                builder
                    .build_child_element_slot(&mut model, "Image", child)
                    .unwrap()
            })
            .collect();

        let pixels = &children[0];
        assert_eq!(pixels.range, "Pixels");
        assert_eq!(pixels.slot.required, Some(true));
        assert_eq!(
            pixels.slot.description.as_deref(),
            Some("Child element Pixels of Image")
        );

        let note = &children[1];
        assert_eq!(note.range, "string");
        assert_eq!(note.slot.multivalued, Some(true));
        assert_eq!(note.slot.required, None);
        assert_eq!(note.slot.description.as_deref(), Some("A note."));

        let extra = &children[2];
        assert_eq!(extra.range, "Extra");
        assert!(extra.inline.is_some());

        let annotation = &children[3];
        assert_eq!(annotation.name, "Annotation");
        assert_eq!(annotation.range, "Annotation");
    }

    #[test]
    fn unnamed_child_is_skipped() {
        let fx = Fixture::new();
        let mut model = model();
        let child = ElementDecl::default();
        assert!(fx
            .builder()
            .build_child_element_slot(&mut model, "Image", &child)
            .is_none());
    }
}
