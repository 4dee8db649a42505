//! Schema loading from various sources.
//!
//! Handles loading XML Schemas from files, strings, and HTTP URLs, following
//! local `schemaLocation` includes and imports.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::LoadError;
use crate::parser::{parse_schema_documents, parse_schema_str, schema_locations};
use crate::source::SourceSchema;
use crate::types::DocOverrides;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (30 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn read_file(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Load an XML Schema from a file path.
///
/// Local `xs:include`, `xs:import` and `xs:redefine` targets are loaded
/// relative to the including file. A missing or unreadable included file is
/// logged and skipped; only the root file is required.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist, or a parse
/// error if the root document isn't a well-formed XML Schema.
pub fn load_schema(path: &Path) -> Result<SourceSchema, LoadError> {
    let root = read_file(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));

    let mut visited: HashSet<PathBuf> = HashSet::new();
    visited.insert(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()));

    let mut documents = vec![root];
    let mut pending: VecDeque<(String, PathBuf)> = schema_locations(&documents[0])?
        .into_iter()
        .map(|loc| (loc, base_dir.to_path_buf()))
        .collect();

    while let Some((location, dir)) = pending.pop_front() {
        if is_url(&location) {
            debug!(%location, "remote schemaLocation not followed");
            continue;
        }
        let include_path = dir.join(&location);
        let canonical = include_path
            .canonicalize()
            .unwrap_or_else(|_| include_path.clone());
        if !visited.insert(canonical) {
            continue;
        }

        let content = match read_file(&include_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(%location, error = %e, "included schema skipped");
                continue;
            }
        };
        let nested = match schema_locations(&content) {
            Ok(nested) => nested,
            Err(e) => {
                warn!(%location, error = %e, "included schema skipped");
                continue;
            }
        };
        let include_dir = include_path.parent().unwrap_or(dir.as_path()).to_path_buf();
        pending.extend(nested.into_iter().map(|loc| (loc, include_dir.clone())));
        documents.push(content);
    }

    debug!(path = %path.display(), documents = documents.len(), "schema loaded");
    parse_schema_documents(&documents)
}

/// Load an XML Schema from a string. Includes are not followed.
///
/// # Errors
///
/// Returns `LoadError::InvalidXml` or `LoadError::NotASchema` if the string
/// isn't an XML Schema document.
pub fn load_schema_str(content: &str) -> Result<SourceSchema, LoadError> {
    parse_schema_str(content)
}

/// Load an XML Schema from an HTTP/HTTPS URL. Includes are not followed.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails, or a parse error
/// if the response isn't an XML Schema document.
#[cfg(feature = "remote")]
pub fn load_schema_url(url: &str) -> Result<SourceSchema, LoadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let content = response.text().map_err(|source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    })?;

    parse_schema_str(&content)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load an XML Schema from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
/// URL loading requires the `remote` feature.
pub fn load_schema_auto(source: &str) -> Result<SourceSchema, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_schema_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: PathBuf::from(source),
            })
        }
    } else {
        load_schema(Path::new(source))
    }
}

/// Load documentation overrides from a YAML file.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist, or
/// `LoadError::InvalidOverrides` if it isn't a `{class: {attribute: text}}` mapping.
pub fn load_doc_overrides(path: &Path) -> Result<DocOverrides, LoadError> {
    let content = read_file(path)?;
    DocOverrides::from_yaml_str(&content).map_err(|e| LoadError::InvalidOverrides {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const MINIMAL: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="Sample"/>
</xs:schema>"#;

    #[test]
    fn load_schema_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", MINIMAL).unwrap();

        let schema = load_schema(file.path()).unwrap();
        assert!(schema.complex_type("Sample").is_some());
    }

    #[test]
    fn load_schema_file_not_found() {
        let result = load_schema(Path::new("/nonexistent/path.xsd"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_schema_invalid_xml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<invalid>xml<unclosed>").unwrap();

        let result = load_schema(file.path());
        assert!(matches!(result, Err(LoadError::InvalidXml { .. })));
    }

    #[test]
    fn load_schema_follows_includes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("common")).unwrap();
        fs::write(
            dir.path().join("main.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:include schemaLocation="common/types.xsd"/>
  <xs:include schemaLocation="missing.xsd"/>
  <xs:element name="Root" type="Shared"/>
</xs:schema>"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("common/types.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:include schemaLocation="../main.xsd"/>
  <xs:include schemaLocation="leaf.xsd"/>
  <xs:complexType name="Shared"/>
</xs:schema>"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("common/leaf.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="Leaf"/>
</xs:schema>"#,
        )
        .unwrap();

        let schema = load_schema(&dir.path().join("main.xsd")).unwrap();
        assert!(schema.elements.contains_key("Root"));
        assert!(schema.complex_type("Shared").is_some());
        assert!(schema.complex_type("Leaf").is_some());
    }

    #[test]
    fn load_schema_str_valid() {
        let schema = load_schema_str(MINIMAL).unwrap();
        assert_eq!(schema.types.len(), 1);
    }

    #[test]
    fn is_url_detection() {
        assert!(is_url("https://example.com/schema.xsd"));
        assert!(is_url("http://example.com/schema.xsd"));
        assert!(!is_url("/path/to/schema.xsd"));
        assert!(!is_url("schema.xsd"));
    }

    #[test]
    fn load_schema_auto_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", MINIMAL).unwrap();

        let schema = load_schema_auto(file.path().to_str().unwrap()).unwrap();
        assert!(schema.complex_type("Sample").is_some());
    }

    #[test]
    fn load_doc_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Sample:\n  name: Display name").unwrap();

        let overrides = load_doc_overrides(file.path()).unwrap();
        assert_eq!(overrides.get("Sample", "name"), Some("Display name"));
    }

    #[test]
    fn load_doc_overrides_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "- not\n- a mapping").unwrap();

        let result = load_doc_overrides(file.path());
        assert!(matches!(result, Err(LoadError::InvalidOverrides { .. })));
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn load_schema_url_valid() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/schema.xsd")
                .with_status(200)
                .with_body(MINIMAL)
                .create();

            let schema = load_schema_url(&format!("{}/schema.xsd", server.url())).unwrap();
            assert!(schema.complex_type("Sample").is_some());
            mock.assert();
        }

        #[test]
        fn load_schema_url_404() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/missing.xsd").with_status(404).create();

            let result = load_schema_url(&format!("{}/missing.xsd", server.url()));
            assert!(matches!(result, Err(LoadError::NetworkError { .. })));
        }
    }
}
