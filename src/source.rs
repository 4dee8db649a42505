//! Source schema model: the parsed XML Schema the translation passes read.
//!
//! Every node kind is its own variant or struct and optional XSD properties are
//! `Option`s, so callers never probe for fields that a kind cannot carry.
//! Names are stored as local names; namespaces are resolved by the parser.

use indexmap::IndexMap;

use crate::types::local_name;

/// A parsed XML Schema, including everything pulled in through includes.
#[derive(Debug, Clone, Default)]
pub struct SourceSchema {
    pub target_namespace: Option<String>,
    pub version: Option<String>,
    /// Namespace declarations of the root `xs:schema` element (prefix -> URI).
    pub namespaces: IndexMap<String, String>,
    pub annotation: Option<Annotation>,
    /// Named global types by local name.
    pub types: IndexMap<String, TypeDef>,
    /// Top-level element declarations by local name.
    pub elements: IndexMap<String, ElementDecl>,
    /// Global attribute declarations by local name.
    pub attributes: IndexMap<String, AttributeDecl>,
    /// Every named identity constraint in the schema, wherever it is declared.
    pub identities: IndexMap<String, IdentityConstraint>,
}

impl SourceSchema {
    pub fn complex_type(&self, name: &str) -> Option<&ComplexType> {
        match self.types.get(name) {
            Some(TypeDef::Complex(ct)) => Some(ct),
            _ => None,
        }
    }

    pub fn simple_type(&self, name: &str) -> Option<&SimpleType> {
        match self.types.get(name) {
            Some(TypeDef::Simple(st)) => Some(st),
            _ => None,
        }
    }

    /// Named complex types paired with their local names, in declaration order.
    pub fn complex_types(&self) -> impl Iterator<Item = (&str, &ComplexType)> {
        self.types.iter().filter_map(|(name, def)| match def {
            TypeDef::Complex(ct) => Some((name.as_str(), ct)),
            TypeDef::Simple(_) => None,
        })
    }

    /// Complex type name -> derivation base name, for every named complex type with a base.
    pub fn inheritance_map(&self) -> IndexMap<String, String> {
        self.complex_types()
            .filter_map(|(name, ct)| {
                ct.base
                    .as_ref()
                    .map(|base| (name.to_string(), local_name(base).to_string()))
            })
            .collect()
    }

    /// Resolve a type reference to a complex type, if it denotes one.
    pub fn resolve_complex<'a>(&'a self, type_ref: &'a TypeRef) -> Option<&'a ComplexType> {
        match type_ref {
            TypeRef::Named(name) => self.complex_type(name),
            TypeRef::Inline(def) => match def.as_ref() {
                TypeDef::Complex(ct) => Some(ct),
                TypeDef::Simple(_) => None,
            },
            TypeRef::Builtin(_) => None,
        }
    }
}

/// A global or anonymous type definition.
#[derive(Debug, Clone)]
pub enum TypeDef {
    Simple(SimpleType),
    Complex(ComplexType),
}

impl TypeDef {
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeDef::Simple(st) => st.name.as_deref(),
            TypeDef::Complex(ct) => ct.name.as_deref(),
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, TypeDef::Complex(_))
    }
}

/// Reference from a declaration to its type.
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// A type in the XML Schema namespace (`xs:string`), by local name.
    Builtin(String),
    /// A user-defined global type, by local name.
    Named(String),
    /// An anonymous type declared in place.
    Inline(Box<TypeDef>),
}

impl TypeRef {
    /// Local name of the referenced type; `None` for anonymous types.
    pub fn local_name(&self) -> Option<&str> {
        match self {
            TypeRef::Builtin(name) | TypeRef::Named(name) => Some(name),
            TypeRef::Inline(def) => def.name(),
        }
    }
}

/// Simple type: a restriction, list or union over other simple types.
#[derive(Debug, Clone, Default)]
pub struct SimpleType {
    pub name: Option<String>,
    /// Restriction base (or list item type); `None` for unions.
    pub base: Option<Box<TypeRef>>,
    pub facets: Facets,
    pub annotation: Option<Annotation>,
}

/// Constraining facets this translator understands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facets {
    pub enumeration: Vec<String>,
    pub pattern: Option<String>,
    pub min_inclusive: Option<String>,
    pub max_inclusive: Option<String>,
}

/// Complex type definition.
#[derive(Debug, Clone, Default)]
pub struct ComplexType {
    pub name: Option<String>,
    pub is_abstract: bool,
    /// Base of a `complexContent` or `simpleContent` derivation.
    pub base: Option<String>,
    pub derivation: Option<Derivation>,
    /// Attributes declared by this type; attribute groups are already expanded.
    pub attributes: Vec<AttributeDecl>,
    /// Particle model; group references are already expanded.
    pub content: Option<Group>,
    pub annotation: Option<Annotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    Extension,
    Restriction,
}

/// Attribute use within a complex type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeUse {
    #[default]
    Optional,
    Required,
    Prohibited,
}

#[derive(Debug, Clone, Default)]
pub struct AttributeDecl {
    /// `None` when the declaration has neither `name` nor a resolvable `ref`.
    pub name: Option<String>,
    pub type_ref: Option<TypeRef>,
    pub use_: AttributeUse,
    pub default: Option<String>,
    pub annotation: Option<Annotation>,
}

/// Upper occurrence bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

/// `minOccurs`/`maxOccurs` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    pub min: u32,
    pub max: MaxOccurs,
}

impl Default for Occurs {
    fn default() -> Self {
        Self::ONCE
    }
}

impl Occurs {
    pub const ONCE: Occurs = Occurs {
        min: 1,
        max: MaxOccurs::Bounded(1),
    };

    pub fn new(min: u32, max: MaxOccurs) -> Self {
        Self { min, max }
    }

    pub fn is_required(&self) -> bool {
        self.min >= 1
    }

    /// True when the particle may occur more than once.
    pub fn is_repeating(&self) -> bool {
        match self.max {
            MaxOccurs::Unbounded => true,
            MaxOccurs::Bounded(n) => n > 1,
        }
    }
}

/// Element declaration, global or local.
#[derive(Debug, Clone, Default)]
pub struct ElementDecl {
    /// Declared name; for `ref` particles this is the referenced element's name.
    pub name: Option<String>,
    /// Referenced top-level element, for `<xs:element ref="..."/>` particles.
    pub reference: Option<String>,
    pub type_ref: Option<TypeRef>,
    pub occurs: Occurs,
    pub substitution_group: Option<String>,
    pub is_abstract: bool,
    pub identities: Vec<IdentityConstraint>,
    pub annotation: Option<Annotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositor {
    Sequence,
    Choice,
    All,
}

/// Model group with its own occurrence range.
#[derive(Debug, Clone)]
pub struct Group {
    pub compositor: Compositor,
    pub occurs: Occurs,
    pub particles: Vec<Particle>,
}

impl Group {
    pub fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            occurs: Occurs::ONCE,
            particles: Vec::new(),
        }
    }

    pub fn is_choice(&self) -> bool {
        self.compositor == Compositor::Choice
    }

    /// All element particles, descending through nested groups in document order.
    pub fn iter_elements(&self) -> Vec<&ElementDecl> {
        let mut out = Vec::new();
        collect_elements(self, &mut out);
        out
    }
}

fn collect_elements<'a>(group: &'a Group, out: &mut Vec<&'a ElementDecl>) {
    for particle in &group.particles {
        match particle {
            Particle::Element(el) => out.push(el),
            Particle::Group(inner) => collect_elements(inner, out),
            Particle::Any => {}
        }
    }
}

#[derive(Debug, Clone)]
pub enum Particle {
    Element(ElementDecl),
    Group(Group),
    /// `xs:any` wildcard; contributes no slot.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKind {
    Key,
    Unique,
    Keyref { refer: String },
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Key => "key",
            IdentityKind::Unique => "unique",
            IdentityKind::Keyref { .. } => "keyref",
        }
    }
}

/// `xs:key`, `xs:unique` or `xs:keyref`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityConstraint {
    pub name: String,
    pub kind: IdentityKind,
    pub selector: Option<String>,
    pub fields: Vec<String>,
}

/// `xs:annotation` content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    /// Text of each `xs:documentation` child, in order.
    pub documentation: Vec<String>,
    /// Element children of each `xs:appinfo` block, flattened in order.
    pub appinfo: Vec<AppInfoNode>,
}

impl Annotation {
    /// Non-empty documentation blocks joined by newlines.
    pub fn documentation_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .documentation
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// An element found under `xs:appinfo`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppInfoNode {
    pub name: String,
    pub text: String,
    pub children: Vec<AppInfoNode>,
}
