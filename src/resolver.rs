//! Type-hierarchy queries over the target model under construction.
//!
//! Parent edges come from the target classes' `is_a` first and fall back to
//! the source derivation map, so queries work before `is_a` edges are set.
//! Every walk carries a visited set and stops on the first repeat.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::target::SchemaDefinition;
use crate::types::{IDENTIFIER_SUFFIX, REFERENCE_BASE, REFERENCE_SUFFIX};

/// Answers reference and ancestry questions for one translation run.
pub struct ReferenceResolver<'m> {
    schema: &'m SchemaDefinition,
    inheritance: &'m IndexMap<String, String>,
    known_classes: &'m HashSet<String>,
}

impl<'m> ReferenceResolver<'m> {
    pub fn new(
        schema: &'m SchemaDefinition,
        inheritance: &'m IndexMap<String, String>,
        known_classes: &'m HashSet<String>,
    ) -> Self {
        Self {
            schema,
            inheritance,
            known_classes,
        }
    }

    fn parent(&self, class_name: &str) -> Option<&'m str> {
        self.schema
            .classes
            .get(class_name)
            .and_then(|c| c.is_a.as_deref())
            .or_else(|| self.inheritance.get(class_name).map(String::as_str))
    }

    fn is_known(&self, class_name: &str) -> bool {
        !class_name.is_empty()
            && (self.known_classes.contains(class_name)
                || self.schema.classes.contains_key(class_name))
    }

    /// `class_name` followed by its ancestors, nearest first.
    pub fn ancestors(&self, class_name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(class_name.to_string());
        while let Some(name) = current {
            if !visited.insert(name.clone()) {
                break;
            }
            current = self.parent(&name).map(String::from);
            chain.push(name);
        }
        chain
    }

    /// Whether the class or one of its ancestors follows the reference naming
    /// convention (`...Ref` or the `Reference` base).
    ///
    /// This is a naming heuristic; callers should not depend on how it decides.
    pub fn class_is_ref_like(&self, class_name: &str) -> bool {
        self.ancestors(class_name)
            .iter()
            .any(|name| name.ends_with(REFERENCE_SUFFIX) || name == REFERENCE_BASE)
    }

    fn strip_reference(&self, name: &str) -> Option<String> {
        let target = name.strip_suffix(REFERENCE_SUFFIX)?;
        self.is_known(target).then(|| target.to_string())
    }

    /// Class that a reference-like class points to.
    ///
    /// Tries the owner's own `Ref` suffix, then `Ref`-suffixed ancestors, then
    /// an `ID` suffix on the declared attribute type.
    pub fn reference_target_for_class(
        &self,
        owner_class: &str,
        declared_type: Option<&str>,
    ) -> Option<String> {
        if let Some(target) = self.strip_reference(owner_class) {
            return Some(target);
        }

        let chain = self.ancestors(owner_class);
        for name in &chain {
            if let Some(target) = self.parent(name).and_then(|p| self.strip_reference(p)) {
                return Some(target);
            }
        }

        let declared = declared_type?;
        let target = declared.strip_suffix(IDENTIFIER_SUFFIX)?;
        self.is_known(target).then(|| target.to_string())
    }

    /// Range for a keyref whose referred key selects `candidates`.
    ///
    /// One candidate is used directly. Several resolve to their nearest common
    /// ancestor, searched in the first candidate's chain order.
    pub fn select_keyref_range(&self, candidates: &[String]) -> Option<String> {
        match candidates {
            [] => None,
            [only] => Some(only.clone()),
            [first, rest @ ..] => {
                let others: Vec<HashSet<String>> = rest
                    .iter()
                    .map(|c| self.ancestors(c).into_iter().collect())
                    .collect();
                self.ancestors(first)
                    .into_iter()
                    .find(|name| others.iter().all(|chain| chain.contains(name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::ClassDefinition;

    fn schema(classes: &[(&str, Option<&str>)]) -> SchemaDefinition {
        let mut schema = SchemaDefinition::default();
        for (name, parent) in classes {
            schema.classes.insert(
                name.to_string(),
                ClassDefinition {
                    is_a: parent.map(String::from),
                    ..Default::default()
                },
            );
        }
        schema
    }

    #[test]
    fn keyref_range_uses_common_ancestor() {
        let schema = schema(&[
            ("Base", None),
            ("DerivedA", Some("Base")),
            ("DerivedB", Some("Base")),
        ]);
        let inheritance = IndexMap::new();
        let known = HashSet::new();
        let resolver = ReferenceResolver::new(&schema, &inheritance, &known);

        let pair = vec!["DerivedA".to_string(), "DerivedB".to_string()];
        assert_eq!(resolver.select_keyref_range(&pair).as_deref(), Some("Base"));
        assert_eq!(
            resolver
                .select_keyref_range(&["DerivedA".to_string()])
                .as_deref(),
            Some("DerivedA")
        );
        assert_eq!(resolver.select_keyref_range(&[]), None);
    }

    #[test]
    fn keyref_range_without_common_ancestor() {
        let schema = schema(&[("A", None), ("B", None)]);
        let inheritance = IndexMap::new();
        let known = HashSet::new();
        let resolver = ReferenceResolver::new(&schema, &inheritance, &known);

        assert_eq!(
            resolver.select_keyref_range(&["A".to_string(), "B".to_string()]),
            None
        );
    }

    #[test]
    fn keyref_range_prefers_candidate_itself() {
        let schema = schema(&[("Base", None), ("Derived", Some("Base"))]);
        let inheritance = IndexMap::new();
        let known = HashSet::new();
        let resolver = ReferenceResolver::new(&schema, &inheritance, &known);

        let candidates = vec!["Base".to_string(), "Derived".to_string()];
        assert_eq!(
            resolver.select_keyref_range(&candidates).as_deref(),
            Some("Base")
        );
    }

    #[test]
    fn reference_suffix_inference() {
        let with_image = schema(&[("Image", None), ("ImageRef", None)]);
        let without_image = schema(&[("ImageRef", None)]);
        let inheritance = IndexMap::new();
        let known = HashSet::new();

        let resolver = ReferenceResolver::new(&with_image, &inheritance, &known);
        assert_eq!(
            resolver
                .reference_target_for_class("ImageRef", None)
                .as_deref(),
            Some("Image")
        );

        let resolver = ReferenceResolver::new(&without_image, &inheritance, &known);
        assert_eq!(resolver.reference_target_for_class("ImageRef", None), None);
    }

    #[test]
    fn reference_target_through_ancestor_and_type() {
        let schema = schema(&[("Image", None), ("Pixels", None), ("ImageRef", None)]);
        let mut inheritance = IndexMap::new();
        inheritance.insert("PrimaryImage".to_string(), "ImageRef".to_string());
        let known = HashSet::new();
        let resolver = ReferenceResolver::new(&schema, &inheritance, &known);

        assert_eq!(
            resolver
                .reference_target_for_class("PrimaryImage", None)
                .as_deref(),
            Some("Image")
        );
        assert_eq!(
            resolver
                .reference_target_for_class("Link", Some("PixelsID"))
                .as_deref(),
            Some("Pixels")
        );
        assert_eq!(resolver.reference_target_for_class("Link", Some("FooID")), None);
    }

    #[test]
    fn ref_like_walks_are_bounded() {
        let schema = schema(&[("A", Some("B")), ("B", Some("A")), ("C", Some("Reference"))]);
        let inheritance = IndexMap::new();
        let known = HashSet::new();
        let resolver = ReferenceResolver::new(&schema, &inheritance, &known);

        assert!(!resolver.class_is_ref_like("A"));
        assert!(resolver.class_is_ref_like("C"));
        assert!(resolver.class_is_ref_like("DatasetRef"));
        assert_eq!(resolver.ancestors("A"), ["A", "B"]);
    }

    #[test]
    fn known_classes_count_before_creation() {
        let schema = SchemaDefinition::default();
        let inheritance = IndexMap::new();
        let known: HashSet<String> = ["Image".to_string()].into_iter().collect();
        let resolver = ReferenceResolver::new(&schema, &inheritance, &known);

        assert_eq!(
            resolver
                .reference_target_for_class("ImageRef", None)
                .as_deref(),
            Some("Image")
        );
    }
}
