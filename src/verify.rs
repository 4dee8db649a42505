//! Structural comparison of a generated schema against the source tree.
//!
//! Each top-level element of the intermediate tree should have a class whose
//! induced slots (own plus inherited through `is_a`) cover the element's
//! attributes and child elements.

use std::collections::BTreeSet;
use std::fmt::Write;

use serde::Serialize;
use serde_json::Value;

use crate::target::SchemaDefinition;

/// Names listed per report line before eliding the rest.
const REPORT_LIST_LIMIT: usize = 40;

/// Differences found for one class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassMismatch {
    pub class: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_attributes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_children: Vec<String>,
    /// Slots on the class with no counterpart in the source element.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_slots: Vec<String>,
}

impl ClassMismatch {
    /// True if the class lacks something the source declares.
    pub fn is_missing_anything(&self) -> bool {
        !self.missing_attributes.is_empty() || !self.missing_children.is_empty()
    }
}

/// Result of comparing a source tree with a generated schema.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub source_classes: usize,
    pub target_classes: usize,
    pub missing_classes: Vec<String>,
    pub extra_classes: Vec<String>,
    pub mismatches: Vec<ClassMismatch>,
}

impl VerifyReport {
    /// Returns true if every source element has a class covering its structure.
    pub fn is_ok(&self) -> bool {
        self.missing_classes.is_empty()
            && !self.mismatches.iter().any(|m| m.is_missing_anything())
    }
}

/// Compare the intermediate tree against `schema`.
pub fn compare(tree: &Value, schema: &SchemaDefinition) -> VerifyReport {
    let empty = serde_json::Map::new();
    let elements = tree
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let expected: BTreeSet<&str> = elements.keys().map(String::as_str).collect();
    let actual: BTreeSet<&str> = schema.classes.keys().map(String::as_str).collect();

    let mut report = VerifyReport {
        source_classes: expected.len(),
        target_classes: actual.len(),
        missing_classes: expected.difference(&actual).map(|s| s.to_string()).collect(),
        extra_classes: actual.difference(&expected).map(|s| s.to_string()).collect(),
        mismatches: Vec::new(),
    };

    for name in expected.intersection(&actual) {
        let properties = elements[*name]
            .get("properties")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let induced: BTreeSet<&str> = schema.induced_slot_names(name).into_iter().collect();

        let mut mismatch = ClassMismatch {
            class: name.to_string(),
            ..Default::default()
        };
        let mut expected_slots = BTreeSet::new();
        for key in properties.keys() {
            match key.strip_prefix('@') {
                Some(attr) => {
                    expected_slots.insert(attr);
                    if !induced.contains(attr) {
                        mismatch.missing_attributes.push(attr.to_string());
                    }
                }
                None => {
                    expected_slots.insert(key.as_str());
                    if !induced.contains(key.as_str()) {
                        mismatch.missing_children.push(key.clone());
                    }
                }
            }
        }
        mismatch.extra_slots = induced
            .difference(&expected_slots)
            .map(|s| s.to_string())
            .collect();

        if mismatch.is_missing_anything() || !mismatch.extra_slots.is_empty() {
            report.mismatches.push(mismatch);
        }
    }
    report
}

fn push_list(out: &mut String, label: &str, names: &[String]) {
    let _ = write!(out, "{label}: {}", names.len());
    if !names.is_empty() {
        let shown: Vec<&str> = names
            .iter()
            .take(REPORT_LIST_LIMIT)
            .map(String::as_str)
            .collect();
        let _ = write!(out, "\n  {}", shown.join(", "));
        if names.len() > REPORT_LIST_LIMIT {
            out.push_str(" ...");
        }
    }
    out.push('\n');
}

/// Render a report as plain text.
pub fn render_report(report: &VerifyReport) -> String {
    let mut out = String::new();
    out.push_str("== Classes ==\n");
    let _ = writeln!(
        out,
        "Source elements: {} | Target classes: {}",
        report.source_classes, report.target_classes
    );
    push_list(&mut out, "Missing in target", &report.missing_classes);
    push_list(&mut out, "Extra in target", &report.extra_classes);

    out.push_str("\n== Per-class checks ==\n");
    for mismatch in &report.mismatches {
        let _ = writeln!(out, "-- {}", mismatch.class);
        for (label, names) in [
            ("attributes missing", &mismatch.missing_attributes),
            ("children missing", &mismatch.missing_children),
            ("slots extra", &mismatch.extra_slots),
        ] {
            if !names.is_empty() {
                let _ = writeln!(out, "   {label}: {}", names.join(", "));
            }
        }
    }
    let failing = report
        .mismatches
        .iter()
        .filter(|m| m.is_missing_anything())
        .count();
    let _ = writeln!(out, "\nClasses missing structure: {failing}");
    out
}
