//! Target LinkML model and the mutable context the translation passes share.
//!
//! Field names follow the LinkML metamodel so the model serializes directly to
//! a LinkML YAML schema. Empty collections and unset options are omitted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::SlotMode;

/// Root of a LinkML schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub prefixes: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_range: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub subsets: IndexMap<String, SubsetDefinition>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub enums: IndexMap<String, EnumDefinition>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub slots: IndexMap<String, SlotDefinition>,
    #[serde(default)]
    pub classes: IndexMap<String, ClassDefinition>,
}

impl SchemaDefinition {
    /// Slots a class owns, in declaration order: referenced global slots first,
    /// then inline attributes.
    pub fn class_slot_names<'a>(&'a self, class: &'a ClassDefinition) -> Vec<&'a str> {
        let mut names: Vec<&str> = class.slots.iter().map(String::as_str).collect();
        for name in class.attributes.keys() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    /// Definition of `slot_name` as seen from `class`: inline attribute first, then global slot.
    pub fn class_slot<'a>(
        &'a self,
        class: &'a ClassDefinition,
        slot_name: &str,
    ) -> Option<&'a SlotDefinition> {
        class
            .attributes
            .get(slot_name)
            .or_else(|| self.slots.get(slot_name))
    }

    /// Slots a class owns plus those inherited through its `is_a` chain.
    ///
    /// The walk stops at the first repeated class, so an inheritance cycle
    /// cannot loop.
    pub fn induced_slot_names(&self, class_name: &str) -> Vec<&str> {
        let mut names = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut current = Some(class_name);
        while let Some(name) = current {
            if !visited.insert(name) {
                break;
            }
            let Some(class) = self.classes.get(name) else {
                break;
            };
            for slot in self.class_slot_names(class) {
                if !names.contains(&slot) {
                    names.push(slot);
                }
            }
            current = class.is_a.as_deref();
        }
        names
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsetDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub permissible_values: IndexMap<String, PermissibleValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissibleValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Tagged annotation value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub tag: String,
    pub value: String,
}

impl Annotation {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// Numeric slot bound, kept integral when the source value is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericBound {
    Integer(i64),
    Float(f64),
}

impl NumericBound {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        value
            .parse::<i64>()
            .map(NumericBound::Integer)
            .ok()
            .or_else(|| value.parse::<f64>().ok().map(NumericBound::Float))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multivalued: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_value: Option<NumericBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_value: Option<NumericBound>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, Annotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_subset: Vec<String>,
}

impl SlotDefinition {
    pub fn with_range(range: impl Into<String>) -> Self {
        Self {
            range: Some(range.into()),
            ..Default::default()
        }
    }

    pub fn is_required(&self) -> bool {
        self.required == Some(true)
    }

    pub fn is_multivalued(&self) -> bool {
        self.multivalued == Some(true)
    }

    /// Fill fields that are still unset from `other`. Fields already set are kept.
    pub fn merge_missing(&mut self, other: SlotDefinition) {
        fn fill<T>(field: &mut Option<T>, value: Option<T>) {
            if field.is_none() {
                *field = value;
            }
        }
        fill(&mut self.description, other.description);
        fill(&mut self.range, other.range);
        fill(&mut self.required, other.required);
        fill(&mut self.multivalued, other.multivalued);
        fill(&mut self.identifier, other.identifier);
        fill(&mut self.pattern, other.pattern);
        fill(&mut self.minimum_value, other.minimum_value);
        fill(&mut self.maximum_value, other.maximum_value);
        for (key, annotation) in other.annotations {
            self.annotations.entry(key).or_insert(annotation);
        }
        for subset in other.in_subset {
            if !self.in_subset.contains(&subset) {
                self.in_subset.push(subset);
            }
        }
    }
}

/// Condition on one slot inside a class expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Anonymous class expression used by `exactly_one_of` and `all_of`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassExpression {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub slot_conditions: IndexMap<String, SlotCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exactly_one_of: Vec<ClassExpression>,
}

impl ClassExpression {
    /// Expression satisfied when `slot_name` is present.
    pub fn slot_required(slot_name: impl Into<String>) -> Self {
        let mut slot_conditions = IndexMap::new();
        slot_conditions.insert(
            slot_name.into(),
            SlotCondition {
                required: Some(true),
            },
        );
        Self {
            slot_conditions,
            exactly_one_of: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueKey {
    pub unique_key_name: String,
    pub unique_key_slots: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_a: Option<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub is_abstract: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, SlotDefinition>,
    /// Class-specific refinements of shared global slots.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub slot_usage: IndexMap<String, SlotDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exactly_one_of: Vec<ClassExpression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<ClassExpression>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub unique_keys: IndexMap<String, UniqueKey>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, Annotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_subset: Vec<String>,
}

impl ClassDefinition {
    /// Record that exactly one of `slot_names` must be present.
    ///
    /// The first group fills `exactly_one_of`; further groups are added to
    /// `all_of` so independent groups don't merge into one.
    pub fn add_exactly_one_of(&mut self, slot_names: &[String]) {
        if slot_names.is_empty() {
            return;
        }
        let exprs: Vec<ClassExpression> = slot_names
            .iter()
            .map(ClassExpression::slot_required)
            .collect();

        if self.exactly_one_of.is_empty() {
            self.exactly_one_of = exprs;
            return;
        }
        if self.exactly_one_of == exprs {
            return;
        }
        let group = ClassExpression {
            slot_conditions: IndexMap::new(),
            exactly_one_of: exprs,
        };
        if !self.all_of.contains(&group) {
            self.all_of.push(group);
        }
    }
}

/// Something documentation and vendor metadata can be merged into.
pub trait Annotatable {
    fn set_description(&mut self, description: String);
    fn annotations_mut(&mut self) -> &mut IndexMap<String, Annotation>;
    fn in_subset_mut(&mut self) -> &mut Vec<String>;
}

impl Annotatable for ClassDefinition {
    fn set_description(&mut self, description: String) {
        self.description = Some(description);
    }

    fn annotations_mut(&mut self) -> &mut IndexMap<String, Annotation> {
        &mut self.annotations
    }

    fn in_subset_mut(&mut self) -> &mut Vec<String> {
        &mut self.in_subset
    }
}

impl Annotatable for SlotDefinition {
    fn set_description(&mut self, description: String) {
        self.description = Some(description);
    }

    fn annotations_mut(&mut self) -> &mut IndexMap<String, Annotation> {
        &mut self.annotations
    }

    fn in_subset_mut(&mut self) -> &mut Vec<String> {
        &mut self.in_subset
    }
}

/// The target schema under construction, owned by one translation run.
#[derive(Debug, Clone)]
pub struct TargetModel {
    schema: SchemaDefinition,
    slot_mode: SlotMode,
}

impl TargetModel {
    pub fn new(schema: SchemaDefinition, slot_mode: SlotMode) -> Self {
        Self { schema, slot_mode }
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    pub fn slot_mode(&self) -> SlotMode {
        self.slot_mode
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.schema.classes.contains_key(name)
    }

    pub fn class(&self, name: &str) -> Option<&ClassDefinition> {
        self.schema.classes.get(name)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut ClassDefinition> {
        self.schema.classes.get_mut(name)
    }

    /// Return the class called `name`, creating an empty one if needed.
    ///
    /// `default_description` only fills a missing description; it never
    /// replaces one set earlier.
    pub fn ensure_class(
        &mut self,
        name: &str,
        default_description: Option<&str>,
    ) -> &mut ClassDefinition {
        let class = self.schema.classes.entry(name.to_string()).or_default();
        if class.description.is_none() {
            class.description = default_description.map(String::from);
        }
        class
    }

    /// Merge `slot` into `class_name`'s slot named `slot_name`.
    ///
    /// Creates the class and the slot when absent. For an existing slot only
    /// unset fields are filled in.
    pub fn add_attribute(&mut self, class_name: &str, slot_name: &str, slot: SlotDefinition) {
        let slot_mode = self.slot_mode;
        let class = self.ensure_class(class_name, None);
        match slot_mode {
            SlotMode::Inline => match class.attributes.get_mut(slot_name) {
                Some(existing) => existing.merge_missing(slot),
                None => {
                    class.attributes.insert(slot_name.to_string(), slot);
                }
            },
            SlotMode::Global => {
                if !class.slots.iter().any(|s| s == slot_name) {
                    class.slots.push(slot_name.to_string());
                }
                match self.schema.slots.get_mut(slot_name) {
                    Some(existing) => existing.merge_missing(slot),
                    None => {
                        self.schema.slots.insert(slot_name.to_string(), slot);
                    }
                }
            }
        }
    }

    /// The slot `slot_name` as owned by `class_name`.
    pub fn slot(&self, class_name: &str, slot_name: &str) -> Option<&SlotDefinition> {
        let class = self.schema.classes.get(class_name)?;
        match self.slot_mode {
            SlotMode::Inline => class.attributes.get(slot_name),
            SlotMode::Global => {
                if class.slots.iter().any(|s| s == slot_name) {
                    self.schema.slots.get(slot_name)
                } else {
                    None
                }
            }
        }
    }

    /// Where `class_name` can refine its own view of `slot_name`.
    ///
    /// Inline slots are edited in place. A global slot is shared by every
    /// class that lists it, so the refinement goes to the class's
    /// `slot_usage` entry and the shared definition is left untouched.
    pub fn slot_override_mut(
        &mut self,
        class_name: &str,
        slot_name: &str,
    ) -> Option<&mut SlotDefinition> {
        let class = self.schema.classes.get_mut(class_name)?;
        match self.slot_mode {
            SlotMode::Inline => class.attributes.get_mut(slot_name),
            SlotMode::Global => {
                if !class.slots.iter().any(|s| s == slot_name) {
                    return None;
                }
                Some(class.slot_usage.entry(slot_name.to_string()).or_default())
            }
        }
    }

    /// Declare a composite unique key named `key_name` on `class_name`.
    pub fn add_unique_key(&mut self, class_name: &str, key_name: &str, slot_names: Vec<String>) {
        let class = self.ensure_class(class_name, None);
        class.unique_keys.insert(
            key_name.to_string(),
            UniqueKey {
                unique_key_name: key_name.to_string(),
                unique_key_slots: slot_names,
            },
        );
    }

    /// Create enumeration `name` with `values` unless it already exists.
    pub fn ensure_enum(&mut self, name: &str, values: &[String]) {
        self.schema
            .enums
            .entry(name.to_string())
            .or_insert_with(|| EnumDefinition {
                description: None,
                permissible_values: values
                    .iter()
                    .map(|v| (v.clone(), PermissibleValue::default()))
                    .collect(),
            });
    }

    /// Finish the run: declare every referenced subset and hand over the schema.
    pub fn into_schema(mut self) -> SchemaDefinition {
        let mut referenced: Vec<String> = Vec::new();
        let class_subsets = self.schema.classes.values().flat_map(|c| {
            c.in_subset
                .iter()
                .chain(c.attributes.values().flat_map(|s| s.in_subset.iter()))
        });
        for subset in class_subsets.chain(self.schema.slots.values().flat_map(|s| s.in_subset.iter()))
        {
            if !referenced.contains(subset) {
                referenced.push(subset.clone());
            }
        }
        for subset in referenced {
            self.schema.subsets.entry(subset).or_default();
        }
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(mode: SlotMode) -> TargetModel {
        TargetModel::new(SchemaDefinition::default(), mode)
    }

    #[test]
    fn ensure_class_is_idempotent() {
        let mut model = model(SlotMode::Inline);
        model
            .ensure_class("Image", Some("First"))
            .annotations
            .insert("k".into(), Annotation::new("k", "v"));
        let again = model.ensure_class("Image", Some("Second"));

        assert_eq!(again.description.as_deref(), Some("First"));
        assert_eq!(again.annotations.len(), 1);
        assert_eq!(model.schema().classes.len(), 1);
    }

    #[test]
    fn ensure_class_fills_missing_description() {
        let mut model = model(SlotMode::Inline);
        model.ensure_class("Image", None);
        let class = model.ensure_class("Image", Some("An image"));
        assert_eq!(class.description.as_deref(), Some("An image"));
    }

    #[test]
    fn add_attribute_first_writer_wins() {
        let mut model = model(SlotMode::Inline);
        model.add_attribute("Image", "ID", SlotDefinition::with_range("string"));

        let mut second = SlotDefinition::with_range("Image");
        second.required = Some(true);
        second
            .annotations
            .insert("references_Image".into(), Annotation::new("references", "Image"));
        model.add_attribute("Image", "ID", second);

        let slot = model.slot("Image", "ID").unwrap();
        assert_eq!(slot.range.as_deref(), Some("string"));
        assert_eq!(slot.required, Some(true));
        assert_eq!(slot.annotations.len(), 1);
    }

    #[test]
    fn global_mode_shares_slots_by_name() {
        let mut model = model(SlotMode::Global);
        model.add_attribute("A", "name", SlotDefinition::with_range("string"));
        model.add_attribute("B", "name", SlotDefinition::with_range("integer"));

        assert_eq!(model.schema().slots.len(), 1);
        assert_eq!(model.class("A").unwrap().slots, ["name"]);
        assert_eq!(model.class("B").unwrap().slots, ["name"]);
        assert_eq!(
            model.slot("B", "name").unwrap().range.as_deref(),
            Some("string")
        );
        assert!(model.slot("C", "name").is_none());
    }

    #[test]
    fn exactly_one_of_groups_stay_separate() {
        let mut class = ClassDefinition::default();
        class.add_exactly_one_of(&["a".into(), "b".into()]);
        class.add_exactly_one_of(&["a".into(), "b".into()]);
        class.add_exactly_one_of(&["c".into(), "d".into()]);

        assert_eq!(class.exactly_one_of.len(), 2);
        assert_eq!(class.all_of.len(), 1);
        assert_eq!(class.all_of[0].exactly_one_of.len(), 2);
    }

    #[test]
    fn numeric_bounds_keep_integers() {
        assert_eq!(NumericBound::parse("0"), Some(NumericBound::Integer(0)));
        assert_eq!(NumericBound::parse(" 1.5 "), Some(NumericBound::Float(1.5)));
        assert_eq!(NumericBound::parse("abc"), None);
    }

    #[test]
    fn induced_slots_follow_is_a_and_stop_on_cycles() {
        let mut model = model(SlotMode::Inline);
        model.add_attribute("Base", "id", SlotDefinition::default());
        model.add_attribute("Derived", "name", SlotDefinition::default());
        model.class_mut("Derived").unwrap().is_a = Some("Base".into());
        model.class_mut("Base").unwrap().is_a = Some("Derived".into());

        let schema = model.into_schema();
        assert_eq!(schema.induced_slot_names("Derived"), ["name", "id"]);
    }

    #[test]
    fn into_schema_declares_subsets() {
        let mut model = model(SlotMode::Inline);
        model.ensure_class("A", None).in_subset.push("Tier1".into());
        let mut slot = SlotDefinition::default();
        slot.in_subset.push("Tier2".into());
        model.add_attribute("A", "x", slot);

        let schema = model.into_schema();
        let subsets: Vec<_> = schema.subsets.keys().map(String::as_str).collect();
        assert_eq!(subsets, ["Tier1", "Tier2"]);
    }
}
