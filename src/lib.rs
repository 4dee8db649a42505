//! XSD to LinkML
//!
//! Translates XML Schema definitions into LinkML schemas.
//!
//! Named complex types and top-level elements become classes, attributes and
//! child elements become slots, derivation becomes `is_a`, and identity
//! constraints become unique keys and reference-typed slots. Exclusive
//! choices are encoded as `exactly_one_of` constraints.
//!
//! # Example
//!
//! ```
//! use xsd_linkml::{convert, load_schema_str, ConvertOptions, SchemaMetadata};
//!
//! let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
//!     targetNamespace="http://example.org/schemas/Lab">
//!   <xs:element name="Sample">
//!     <xs:complexType>
//!       <xs:sequence>
//!         <xs:element name="tag" type="xs:string" maxOccurs="unbounded"/>
//!       </xs:sequence>
//!       <xs:attribute name="name" type="xs:string" use="required"/>
//!     </xs:complexType>
//!   </xs:element>
//! </xs:schema>"#;
//!
//! let source = load_schema_str(xsd).unwrap();
//! let options = ConvertOptions::new().metadata(SchemaMetadata::new().title("Lab samples"));
//! let conversion = convert(&source, &options);
//!
//! assert_eq!(conversion.schema.name, "lab");
//! let sample = &conversion.schema.classes["Sample"];
//! assert_eq!(sample.attributes["name"].required, Some(true));
//! assert_eq!(sample.attributes["tag"].multivalued, Some(true));
//! ```
//!
//! # Diagnostics
//!
//! Declarations that cannot be translated (a keyref to an unknown key, an
//! identity constraint without fields, an unnamed attribute) are skipped and
//! reported on [`Conversion::diagnostics`]. Only failing to load the source
//! itself is an error.

mod constraints;
mod convert;
mod documentation;
mod error;
mod identity;
mod intermediate;
mod loader;
mod output;
mod parser;
mod primitives;
mod resolver;
mod slots;
pub mod source;
pub mod target;
mod types;
mod verify;

pub use convert::{convert, derive_schema_name, schema_header, Conversion};
pub use documentation::{parse_documentation, tier_subsets, ParsedDocumentation};
pub use error::{Diagnostic, DiagnosticKind, LoadError, OutputError};
pub use identity::{field_slot, selector_classes};
pub use intermediate::{element_names, filter_elements, to_json_tree};
pub use loader::{is_url, load_doc_overrides, load_schema, load_schema_auto, load_schema_str};
pub use output::{class_partition, partition_schema, to_yaml, write_json, write_schema, yaml_path};
pub use primitives::builtin_range;
pub use resolver::ReferenceResolver;
pub use source::SourceSchema;
pub use target::{
    Annotation, ClassDefinition, ClassExpression, EnumDefinition, SchemaDefinition,
    SlotDefinition, UniqueKey,
};
pub use types::{ConvertOptions, DocOverrides, SchemaMetadata, SlotMode};
pub use verify::{compare, render_report, ClassMismatch, VerifyReport};

#[cfg(feature = "remote")]
pub use loader::load_schema_url;
