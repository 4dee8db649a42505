//! Key, unique and keyref constraints.
//!
//! Keys and uniques become `unique_keys` on the class their selector names.
//! Keyrefs become slots typed by the class the referred key selects. Keys are
//! always processed before keyrefs so declaration order does not matter.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::json;
use tracing::debug;

use crate::error::{DiagnosticKind, Diagnostics};
use crate::resolver::ReferenceResolver;
use crate::source::{IdentityConstraint, IdentityKind};
use crate::target::{Annotation, ClassDefinition, SlotDefinition, TargetModel};
use crate::types::local_name;

/// Strip a predicate (`Image[@ID]`) and namespace prefix from a path step.
fn step_name(step: &str) -> &str {
    let step = step.split('[').next().unwrap_or(step).trim();
    local_name(step)
}

/// Class names selected by a selector path; `|` unions yield several.
pub fn selector_classes(selector: &str) -> Vec<String> {
    let mut classes = Vec::new();
    for alternative in selector.split('|') {
        let path = alternative.trim().replace("//", "/");
        let Some(last) = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != ".")
            .last()
        else {
            continue;
        };
        let name = step_name(last);
        if name.is_empty() || name == "*" || name.starts_with('@') {
            continue;
        }
        if !classes.iter().any(|c| c == name) {
            classes.push(name.to_string());
        }
    }
    classes
}

/// Slot name a field path refers to: the last step with any `@` removed.
pub fn field_slot(field: &str) -> Option<String> {
    let last = field.rsplit('/').next()?.trim();
    let name = step_name(last.trim_start_matches('@'));
    (!name.is_empty() && name != "." && name != "*").then(|| name.to_string())
}

fn field_slots(constraint: &IdentityConstraint) -> Vec<String> {
    constraint
        .fields
        .iter()
        .filter_map(|f| field_slot(f))
        .collect()
}

/// Translates identity constraints, remembering which classes each key selects.
pub struct IdentityProcessor<'a> {
    inheritance: &'a IndexMap<String, String>,
    known_classes: &'a HashSet<String>,
    key_targets: IndexMap<String, Vec<String>>,
}

impl<'a> IdentityProcessor<'a> {
    pub fn new(
        inheritance: &'a IndexMap<String, String>,
        known_classes: &'a HashSet<String>,
    ) -> Self {
        Self {
            inheritance,
            known_classes,
            key_targets: IndexMap::new(),
        }
    }

    /// Translate every constraint: keys and uniques first, then keyrefs.
    pub fn process_identities<'c>(
        &mut self,
        model: &mut TargetModel,
        constraints: impl IntoIterator<Item = &'c IdentityConstraint>,
        diagnostics: &mut Diagnostics,
    ) {
        let (keyrefs, keys): (Vec<_>, Vec<_>) = constraints
            .into_iter()
            .partition(|c| matches!(c.kind, IdentityKind::Keyref { .. }));

        for constraint in keys {
            self.process_key(model, constraint, diagnostics);
        }
        for constraint in keyrefs {
            self.process_keyref(model, constraint, diagnostics);
        }
    }

    fn process_key(
        &mut self,
        model: &mut TargetModel,
        constraint: &IdentityConstraint,
        diagnostics: &mut Diagnostics,
    ) {
        let classes = constraint
            .selector
            .as_deref()
            .map(selector_classes)
            .unwrap_or_default();
        let slots = field_slots(constraint);
        if classes.is_empty() || slots.is_empty() {
            diagnostics.push(
                DiagnosticKind::MalformedIdentity,
                &constraint.name,
                format!("{} has no usable selector or field paths", constraint.kind.as_str()),
            );
            return;
        }

        let key_name = local_name(&constraint.name);
        for class_name in &classes {
            model.add_unique_key(class_name, key_name, slots.clone());
            debug!(key = key_name, class = %class_name, "unique key");
        }
        self.key_targets
            .entry(key_name.to_string())
            .or_default()
            .extend(classes);
    }

    fn process_keyref(
        &mut self,
        model: &mut TargetModel,
        constraint: &IdentityConstraint,
        diagnostics: &mut Diagnostics,
    ) {
        let IdentityKind::Keyref { refer } = &constraint.kind else {
            return;
        };
        let sources = constraint
            .selector
            .as_deref()
            .map(selector_classes)
            .unwrap_or_default();
        let slots = field_slots(constraint);
        if sources.is_empty() || slots.is_empty() {
            diagnostics.push(
                DiagnosticKind::MalformedIdentity,
                &constraint.name,
                "keyref has no usable selector or field paths",
            );
            return;
        }

        let candidates = self
            .key_targets
            .get(local_name(refer))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let resolver = ReferenceResolver::new(model.schema(), self.inheritance, self.known_classes);
        let Some(target) = resolver.select_keyref_range(candidates) else {
            diagnostics.push(
                DiagnosticKind::UnresolvableReference,
                &constraint.name,
                format!("no target class for referred key '{refer}'"),
            );
            return;
        };

        for class_name in &sources {
            for slot_name in &slots {
                let mut slot = SlotDefinition::with_range(target.as_str());
                slot.annotations.insert(
                    format!("references_{target}"),
                    Annotation::new("references", target.as_str()),
                );
                model.add_attribute(class_name, slot_name, slot);
            }
        }
        debug!(keyref = %constraint.name, target = %target, "keyref resolved");
    }
}

/// Keep element-local identity constraints as class annotations.
pub fn apply_local_identities(class: &mut ClassDefinition, constraints: &[IdentityConstraint]) {
    for constraint in constraints {
        let value = json!({
            "type": constraint.kind.as_str(),
            "selector": constraint.selector,
            "fields": constraint.fields,
        });
        class.annotations.insert(
            format!("local_identity_{}", local_name(&constraint.name)),
            Annotation::new("local_identity", value.to_string()),
        );
    }
}
