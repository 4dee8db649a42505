//! Rendering and persisting translated schemas.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::error::OutputError;
use crate::target::{ClassDefinition, SchemaDefinition, SlotDefinition};

fn write_file(path: &Path, content: &str) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| OutputError::WriteError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, content).map_err(|e| OutputError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Render a schema as YAML, keeping field and map insertion order.
pub fn to_yaml(schema: &SchemaDefinition) -> Result<String, OutputError> {
    serde_yaml::to_string(schema).map_err(|e| OutputError::Serialize { source: e })
}

/// Path the schema is written to: `.yaml` is appended unless the path
/// already ends in `.yaml` or `.yml`.
pub fn yaml_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".yaml");
            PathBuf::from(name)
        }
    }
}

/// Write `schema` as a single YAML file, creating parent directories.
/// Returns the path actually written.
pub fn write_schema(schema: &SchemaDefinition, path: &Path) -> Result<PathBuf, OutputError> {
    let path = yaml_path(path);
    write_file(&path, &to_yaml(schema)?)?;
    info!(path = %path.display(), classes = schema.classes.len(), "wrote schema");
    Ok(path)
}

/// Write a JSON document pretty-printed, creating parent directories.
pub fn write_json(value: &Value, path: &Path) -> Result<(), OutputError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| OutputError::Json { source: e })?;
    write_file(path, &text)
}

/// Ranges of every slot a class uses, in slot order.
fn slot_ranges<'a>(schema: &'a SchemaDefinition, class: &'a ClassDefinition) -> Vec<&'a str> {
    let global = class.slots.iter().filter_map(|n| schema.slots.get(n));
    class
        .attributes
        .values()
        .chain(global)
        .filter_map(|s: &SlotDefinition| s.range.as_deref())
        .collect()
}

/// The standalone schema for one class: the header, the class, its global
/// slots, and the classes and enums its slot ranges name directly.
pub fn class_partition(schema: &SchemaDefinition, class_name: &str) -> Option<SchemaDefinition> {
    let class = schema.classes.get(class_name)?;
    let mut part = SchemaDefinition {
        classes: Default::default(),
        slots: Default::default(),
        enums: Default::default(),
        ..schema.clone()
    };
    part.classes.insert(class_name.to_string(), class.clone());

    for slot_name in &class.slots {
        if let Some(slot) = schema.slots.get(slot_name) {
            part.slots.insert(slot_name.clone(), slot.clone());
        }
    }
    for range in slot_ranges(schema, class) {
        if let Some(referenced) = schema.classes.get(range) {
            if !part.classes.contains_key(range) {
                part.classes.insert(range.to_string(), referenced.clone());
            }
        } else if let Some(enum_def) = schema.enums.get(range) {
            part.enums.insert(range.to_string(), enum_def.clone());
        }
    }
    Some(part)
}

/// Write one `<Class>.yaml` per class into `dir`. Returns the written paths
/// in class order.
pub fn partition_schema(schema: &SchemaDefinition, dir: &Path) -> Result<Vec<PathBuf>, OutputError> {
    std::fs::create_dir_all(dir).map_err(|e| OutputError::WriteError {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut written = Vec::with_capacity(schema.classes.len());
    for class_name in schema.classes.keys() {
        let Some(part) = class_partition(schema, class_name) else {
            continue;
        };
        let path = dir.join(format!("{class_name}.yaml"));
        write_file(&path, &to_yaml(&part)?)?;
        written.push(path);
    }
    info!(dir = %dir.display(), files = written.len(), "partitioned schema");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{EnumDefinition, SlotDefinition};
    use tempfile::TempDir;

    fn schema() -> SchemaDefinition {
        let mut schema = SchemaDefinition {
            id: "https://example.org/shop".into(),
            name: "shop".into(),
            default_range: Some("string".into()),
            ..Default::default()
        };
        schema
            .prefixes
            .insert("linkml".into(), "https://w3id.org/linkml/".into());

        let mut order = ClassDefinition::default();
        order
            .attributes
            .insert("item".into(), SlotDefinition::with_range("Item"));
        order
            .attributes
            .insert("status".into(), SlotDefinition::with_range("Enum_Order_status"));
        order.slots.push("note".into());
        schema.classes.insert("Order".into(), order);
        schema.classes.insert("Item".into(), ClassDefinition::default());
        schema.classes.insert("Unrelated".into(), ClassDefinition::default());
        schema
            .slots
            .insert("note".into(), SlotDefinition::with_range("string"));
        schema
            .enums
            .insert("Enum_Order_status".into(), EnumDefinition::default());
        schema
    }

    #[test]
    fn yaml_path_adds_extension() {
        assert_eq!(yaml_path(Path::new("out/schema")), Path::new("out/schema.yaml"));
        assert_eq!(yaml_path(Path::new("out/schema.yml")), Path::new("out/schema.yml"));
        assert_eq!(yaml_path(Path::new("schema.json")), Path::new("schema.json.yaml"));
    }

    #[test]
    fn renders_yaml_in_insertion_order() {
        let yaml = to_yaml(&schema()).unwrap();
        let order = yaml.find("Order:").unwrap();
        let item = yaml.find("Item:").unwrap();
        assert!(order < item);
        assert!(yaml.contains("range: Item"));
        assert!(yaml.starts_with("id: https://example.org/shop"));
    }

    #[test]
    fn writes_schema_creating_directories() {
        let dir = TempDir::new().unwrap();
        let path = write_schema(&schema(), &dir.path().join("nested/shop")).unwrap();

        assert_eq!(path, dir.path().join("nested/shop.yaml"));
        let text = std::fs::read_to_string(&path).unwrap();
        let back: SchemaDefinition = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.classes.len(), 3);
    }

    #[test]
    fn partition_keeps_referenced_classes() {
        let part = class_partition(&schema(), "Order").unwrap();

        assert_eq!(part.id, "https://example.org/shop");
        let classes: Vec<_> = part.classes.keys().map(String::as_str).collect();
        assert_eq!(classes, ["Order", "Item"]);
        assert!(part.slots.contains_key("note"));
        assert!(part.enums.contains_key("Enum_Order_status"));
        assert!(class_partition(&schema(), "Missing").is_none());
    }

    #[test]
    fn partition_writes_one_file_per_class() {
        let dir = TempDir::new().unwrap();
        let written = partition_schema(&schema(), dir.path()).unwrap();

        assert_eq!(written.len(), 3);
        assert!(dir.path().join("Order.yaml").exists());
        let text = std::fs::read_to_string(dir.path().join("Item.yaml")).unwrap();
        let item: SchemaDefinition = serde_yaml::from_str(&text).unwrap();
        assert_eq!(item.classes.len(), 1);
        assert!(item.slots.is_empty());
    }

    #[test]
    fn writes_pretty_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tree/out.json");
        write_json(&serde_json::json!({"type": "object"}), &path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\"type\": \"object\""));
    }
}
