//! Core types and naming conventions shared by the translation passes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Namespace of XML Schema built-in types.
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// LinkML built-in types used as slot ranges.
pub const PRIMITIVE_RANGES: &[&str] = &[
    "string", "integer", "float", "boolean", "date", "time", "datetime", "uri",
];

/// Range used when nothing more specific is known.
pub const DEFAULT_RANGE: &str = "string";

/// Class-name suffix marking a reference-like class (`ImageRef`).
pub const REFERENCE_SUFFIX: &str = "Ref";

/// Reserved base class name marking reference-like classes.
pub const REFERENCE_BASE: &str = "Reference";

/// Type-name suffix marking identifier types (`ImageID`).
pub const IDENTIFIER_SUFFIX: &str = "ID";

/// Wrapper element inside `xs:appinfo` whose children are unwrapped into annotations.
pub const APPINFO_WRAPPER: &str = "xsdfu";

/// Documentation metadata key holding tier memberships.
pub const TIER_KEY: &str = "tier";

/// Tier token to subset name.
pub const TIER_SUBSETS: &[(&str, &str)] = &[("1", "Tier1"), ("2", "Tier2"), ("3", "Tier3")];

/// Returns true if `range` names a LinkML primitive.
pub fn is_primitive_range(range: &str) -> bool {
    PRIMITIVE_RANGES.contains(&range)
}

/// Strip a namespace from a name: `{uri}local`, `prefix:local` or `local`.
pub fn local_name(name: &str) -> &str {
    if let Some(idx) = name.rfind('}') {
        return &name[idx + 1..];
    }
    match name.rfind(':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Where translated slot definitions are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotMode {
    /// Each class owns its slots under `attributes`.
    #[default]
    Inline,
    /// Slots live once in the schema-level `slots` map and classes list them by name.
    Global,
}

/// Schema-level identity fields that seed the target schema header.
///
/// Unset fields are derived from the source `targetNamespace`.
#[derive(Debug, Clone, Default)]
pub struct SchemaMetadata {
    pub schema_id: Option<String>,
    pub schema_name: Option<String>,
    pub schema_title: Option<String>,
    pub default_prefix: Option<String>,
    pub extra_prefixes: IndexMap<String, String>,
}

impl SchemaMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.schema_id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.schema_title = Some(title.into());
        self
    }

    pub fn default_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_prefix = Some(prefix.into());
        self
    }

    /// Add a prefix mapping; later calls for the same prefix replace earlier ones.
    pub fn prefix(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.extra_prefixes.insert(prefix.into(), uri.into());
        self
    }
}

/// Replacement descriptions keyed by class name, then attribute name.
///
/// Read from YAML of the form:
/// ```yaml
/// Image:
///   ID: The image identifier.
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocOverrides(pub IndexMap<String, IndexMap<String, String>>);

impl DocOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse overrides from YAML. An empty document yields no overrides.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let parsed: Option<Self> = serde_yaml::from_str(content)?;
        Ok(parsed.unwrap_or_default())
    }

    pub fn insert(
        &mut self,
        class_name: impl Into<String>,
        attr_name: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.0
            .entry(class_name.into())
            .or_default()
            .insert(attr_name.into(), description.into());
    }

    pub fn get(&self, class_name: &str, attr_name: &str) -> Option<&str> {
        self.0
            .get(class_name)
            .and_then(|attrs| attrs.get(attr_name))
            .map(String::as_str)
    }
}

/// Options for a translation run.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub metadata: SchemaMetadata,
    pub overrides: DocOverrides,
    pub slot_mode: SlotMode,
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(mut self, metadata: SchemaMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn overrides(mut self, overrides: DocOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn slot_mode(mut self, slot_mode: SlotMode) -> Self {
        self.slot_mode = slot_mode;
        self
    }
}
