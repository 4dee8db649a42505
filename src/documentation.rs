//! Merging of `xs:documentation` text and `xs:appinfo` blocks into classes and slots.
//!
//! Documentation is read line by line. A line of the form `key = value`, where
//! `key` looks like an identifier, is metadata; everything else is narrative.
//! The `description` key feeds the narrative, `tier` maps to subsets, and any
//! other key becomes an annotation.

use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::source::{AppInfoNode, Annotation};
use crate::target::{Annotatable, Annotation as TargetAnnotation};
use crate::types::{APPINFO_WRAPPER, TIER_KEY, TIER_SUBSETS};

static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\- ]*$").expect("valid key regex"));

static TIER_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\s]+").expect("valid separator regex"));

/// Documentation text split into narrative and metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocumentation {
    pub description: Option<String>,
    pub metadata: Vec<(String, String)>,
}

/// Split documentation text into narrative lines and `key = value` metadata.
pub fn parse_documentation(text: &str) -> ParsedDocumentation {
    let mut narrative = Vec::new();
    let mut metadata = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let entry = line.split_once('=').and_then(|(key, value)| {
            let key = key.trim();
            KEY_PATTERN
                .is_match(key)
                .then(|| (key.to_string(), value.trim().to_string()))
        });
        match entry {
            Some((key, value)) if key.eq_ignore_ascii_case("description") => {
                if !value.is_empty() {
                    narrative.push(value);
                }
            }
            Some(pair) => metadata.push(pair),
            None => narrative.push(line.to_string()),
        }
    }

    ParsedDocumentation {
        description: (!narrative.is_empty()).then(|| narrative.join("\n")),
        metadata,
    }
}

/// Map tier tokens (`1, 2`) to subset names. Unknown tokens are ignored.
pub fn tier_subsets(value: &str) -> Vec<&'static str> {
    TIER_SEPARATOR
        .split(value)
        .filter(|t| !t.is_empty())
        .filter_map(|token| {
            let subset = TIER_SUBSETS
                .iter()
                .find(|(tier, _)| *tier == token)
                .map(|(_, subset)| *subset);
            if subset.is_none() {
                debug!(token, "unknown tier ignored");
            }
            subset
        })
        .collect()
}

/// Tag/value occurrences seen while applying one annotation block.
///
/// A repeat inside the block is kept as a further annotation; applying the
/// same block to the same target again adds nothing.
#[derive(Default)]
struct BlockOccurrences(HashMap<(String, String), usize>);

impl BlockOccurrences {
    /// Count this occurrence and report whether `annotations` lacks it.
    fn is_new(
        &mut self,
        annotations: &IndexMap<String, TargetAnnotation>,
        tag: &str,
        value: &str,
    ) -> bool {
        let seen = self
            .0
            .entry((tag.to_string(), value.to_string()))
            .or_insert(0);
        *seen += 1;
        let present = annotations
            .values()
            .filter(|a| a.tag == tag && a.value == value)
            .count();
        present < *seen
    }
}

/// Add an annotation under the first free name derived from `key`.
fn add_annotation<T: Annotatable>(target: &mut T, key: &str, value: &str) {
    let annotations = target.annotations_mut();
    let base = key.replace(' ', "_");
    let mut name = base.clone();
    let mut index = 1;
    while annotations.contains_key(&name) {
        name = format!("{base}_{index}");
        index += 1;
    }
    annotations.insert(name, TargetAnnotation::new(key, value));
}

fn add_subset<T: Annotatable>(target: &mut T, subset: &str) {
    let subsets = target.in_subset_mut();
    if !subsets.iter().any(|s| s == subset) {
        subsets.push(subset.to_string());
    }
}

/// Merge documentation text into `target`. Returns true if a description was set.
pub fn apply_documentation<T: Annotatable>(target: &mut T, text: &str) -> bool {
    let parsed = parse_documentation(text);
    let mut occurrences = BlockOccurrences::default();

    for (key, value) in &parsed.metadata {
        if key.eq_ignore_ascii_case(TIER_KEY) {
            for subset in tier_subsets(value) {
                add_subset(target, subset);
            }
        } else if occurrences.is_new(target.annotations_mut(), key, value) {
            add_annotation(target, key, value);
        }
    }

    match parsed.description {
        Some(description) => {
            target.set_description(description);
            true
        }
        None => false,
    }
}

/// Merge vendor extension nodes into `target`'s annotations.
///
/// Children of the reserved wrapper element are unwrapped into one annotation
/// each; any other node is recorded under its own name.
pub fn apply_appinfo<T: Annotatable>(target: &mut T, nodes: &[AppInfoNode]) {
    let mut occurrences = BlockOccurrences::default();
    for node in nodes {
        if node.name.eq_ignore_ascii_case(APPINFO_WRAPPER) {
            for child in &node.children {
                record_appinfo_node(target, child, &mut occurrences);
            }
        } else {
            record_appinfo_node(target, node, &mut occurrences);
        }
    }
}

fn record_appinfo_node<T: Annotatable>(
    target: &mut T,
    node: &AppInfoNode,
    occurrences: &mut BlockOccurrences,
) {
    let value = if node.text.is_empty() {
        "true"
    } else {
        node.text.as_str()
    };
    let annotations = target.annotations_mut();
    if !occurrences.is_new(annotations, &node.name, value) {
        return;
    }
    let key = if annotations.contains_key(&node.name) {
        format!("{}_{}", node.name, annotations.len())
    } else {
        node.name.clone()
    };
    annotations.insert(key, TargetAnnotation::new(node.name.as_str(), value));
}

/// Merge a whole source annotation. Returns true if a description was set.
pub fn apply_annotation<T: Annotatable>(target: &mut T, annotation: Option<&Annotation>) -> bool {
    let Some(annotation) = annotation else {
        return false;
    };
    apply_appinfo(target, &annotation.appinfo);
    match annotation.documentation_text() {
        Some(text) => apply_documentation(target, &text),
        None => false,
    }
}
