//! CLI integration tests for the xsd-linkml binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("xsd-linkml"))
}

// Helper to create a temp schema file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const SAMPLE_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="http://example.org/schemas/Lab">
  <xs:complexType name="Sample">
    <xs:sequence>
      <xs:element name="tag" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
      <xs:choice>
        <xs:element name="weight" type="xs:float"/>
        <xs:element name="volume" type="xs:float"/>
      </xs:choice>
    </xs:sequence>
    <xs:attribute name="name" type="xs:string" use="required"/>
  </xs:complexType>
  <xs:element name="Rack">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Sample" type="Sample" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:element name="Vial" type="Sample"/>
</xs:schema>"#;

const DANGLING_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Root">
    <xs:complexType>
      <xs:attribute name="Target" type="xs:string"/>
    </xs:complexType>
    <xs:keyref name="Dangling" refer="NoSuchKey">
      <xs:selector xpath=".//Root"/>
      <xs:field xpath="@Target"/>
    </xs:keyref>
  </xs:element>
</xs:schema>"#;

mod convert_command {
    use super::*;

    #[test]
    fn prints_yaml_to_stdout() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);

        cmd()
            .args(["convert", xsd.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("id: http://example.org/schemas/Lab"))
            .stdout(predicate::str::contains("\nname: lab\n"))
            .stdout(predicate::str::contains("exactly_one_of:"))
            .stdout(predicate::str::contains("Vial:"));
    }

    #[test]
    fn writes_output_file_with_extension() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);
        let output = dir.path().join("out/lab");

        cmd()
            .args([
                "convert",
                xsd.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let content = fs::read_to_string(dir.path().join("out/lab.yaml")).unwrap();
        assert!(content.contains("Sample:"));
    }

    #[test]
    fn metadata_flags() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);

        cmd()
            .args([
                "convert",
                xsd.to_str().unwrap(),
                "--name",
                "labschema",
                "--title",
                "Lab Schema",
                "--extra-prefix",
                "qudt=http://qudt.org/schema/qudt/",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("\nname: labschema\n"))
            .stdout(predicate::str::contains("title: Lab Schema"))
            .stdout(predicate::str::contains("qudt: http://qudt.org/schema/qudt/"));
    }

    #[test]
    fn invalid_extra_prefix_rejected() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);

        cmd()
            .args(["convert", xsd.to_str().unwrap(), "--extra-prefix", "qudt"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("prefix=URI"));
    }

    #[test]
    fn global_slots_flag() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);

        cmd()
            .args(["convert", xsd.to_str().unwrap(), "--global-slots"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\nslots:\n"))
            .stdout(predicate::str::contains("attributes:").not());
    }

    #[test]
    fn doc_overrides_applied() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);
        let overrides = write_temp_file(&dir, "docs.yaml", "Sample:\n  name: Label on the vial.\n");

        cmd()
            .args([
                "convert",
                xsd.to_str().unwrap(),
                "--doc-overrides",
                overrides.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("description: Label on the vial."));
    }

    #[test]
    fn invalid_doc_overrides_fail() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);
        let overrides = write_temp_file(&dir, "docs.yaml", "- not\n- a map\n");

        cmd()
            .args([
                "convert",
                xsd.to_str().unwrap(),
                "--doc-overrides",
                overrides.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("documentation overrides"));
    }

    #[test]
    fn partition_writes_class_files() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);
        let out = dir.path().join("classes");

        cmd()
            .args([
                "convert",
                xsd.to_str().unwrap(),
                "--partition",
                "--output",
                out.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("Wrote 3 files"));

        assert!(out.join("Sample.yaml").exists());
        assert!(out.join("Rack.yaml").exists());
        let rack = fs::read_to_string(out.join("Rack.yaml")).unwrap();
        assert!(rack.contains("Sample:"));
    }

    #[test]
    fn partition_requires_output() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);

        cmd()
            .args(["convert", xsd.to_str().unwrap(), "--partition"])
            .assert()
            .failure();
    }

    #[test]
    fn json_out_respects_elements() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);
        let json = dir.path().join("tree.json");

        cmd()
            .args([
                "convert",
                xsd.to_str().unwrap(),
                "--elements",
                "Vial",
                "--json-out",
                json.to_str().unwrap(),
            ])
            .assert()
            .success()
            // The schema keeps every class
            .stdout(predicate::str::contains("Rack:"));

        let tree: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        let elements = tree["properties"].as_object().unwrap();
        assert_eq!(elements.len(), 1);
        assert!(elements.contains_key("Vial"));
    }
}

mod diagnostics {
    use super::*;

    #[test]
    fn count_reported_by_default() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "root.xsd", DANGLING_XSD);

        cmd()
            .args(["convert", xsd.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("Root:"))
            .stderr(predicate::str::contains("1 declaration(s) skipped"))
            .stderr(predicate::str::contains("W001").not());
    }

    #[test]
    fn verbose_lists_each() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "root.xsd", DANGLING_XSD);

        cmd()
            .args(["convert", xsd.to_str().unwrap(), "--verbose"])
            .assert()
            .success()
            .stderr(predicate::str::contains("warning[W001] Dangling:"));
    }
}

mod json_command {
    use super::*;

    #[test]
    fn prints_tree() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);

        cmd()
            .args(["json", xsd.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                r#""$schema": "http://json-schema.org/draft-07/schema#""#,
            ))
            .stdout(predicate::str::contains(r#""@name""#));
    }

    #[test]
    fn filters_elements() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);
        let out = dir.path().join("tree.json");

        cmd()
            .args([
                "json",
                xsd.to_str().unwrap(),
                "--elements",
                "Rack",
                "--output",
                out.to_str().unwrap(),
            ])
            .assert()
            .success();

        let tree: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert!(tree["properties"].get("Rack").is_some());
        assert!(tree["properties"].get("Vial").is_none());
    }
}

mod verify_command {
    use super::*;

    #[test]
    fn generated_schema_passes() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);
        let yaml = dir.path().join("lab.yaml");

        cmd()
            .args([
                "convert",
                xsd.to_str().unwrap(),
                "--output",
                yaml.to_str().unwrap(),
            ])
            .assert()
            .success();

        cmd()
            .args(["verify", xsd.to_str().unwrap(), yaml.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("== Classes =="))
            .stdout(predicate::str::contains("Classes missing structure: 0"));
    }

    #[test]
    fn incomplete_schema_fails() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);
        let yaml = write_temp_file(
            &dir,
            "partial.yaml",
            "id: https://example.org/partial\nname: partial\nclasses:\n  Vial: {}\n",
        );

        cmd()
            .args(["verify", xsd.to_str().unwrap(), yaml.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Missing in target: 1"))
            .stdout(predicate::str::contains("-- Vial"));
    }

    #[test]
    fn json_report() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);
        let yaml = write_temp_file(
            &dir,
            "partial.yaml",
            "id: https://example.org/partial\nname: partial\nclasses: {}\n",
        );

        cmd()
            .args(["verify", xsd.to_str().unwrap(), yaml.to_str().unwrap(), "--json"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""ok":false"#));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn missing_file_exit_code_3() {
        cmd()
            .args(["convert", "/nonexistent/schema.xsd"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn invalid_xml_exit_code_2() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "broken.xsd", "<xs:schema");

        cmd()
            .args(["convert", xsd.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid XML"));
    }

    #[test]
    fn not_a_schema_exit_code_2() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "doc.xml", "<catalog/>");

        cmd()
            .args(["json", xsd.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("not an XML Schema document"));
    }

    #[test]
    fn missing_linkml_file_exit_code_3() {
        let dir = TempDir::new().unwrap();
        let xsd = write_temp_file(&dir, "lab.xsd", SAMPLE_XSD);

        cmd()
            .args(["verify", xsd.to_str().unwrap(), "/nonexistent/schema.yaml"])
            .assert()
            .code(3);
    }
}
