//! XML Schema built-in and derived simple types to LinkML primitive ranges.

use std::collections::HashSet;

use crate::source::{Facets, SimpleType, SourceSchema, TypeDef, TypeRef};
use crate::types::{local_name, DEFAULT_RANGE};

/// Map an XSD built-in type local name to a LinkML primitive.
pub fn builtin_range(name: &str) -> Option<&'static str> {
    let range = match name {
        "string" | "normalizedString" | "token" | "language" | "Name" | "NCName" | "NMTOKEN"
        | "NMTOKENS" | "QName" | "ID" | "IDREF" | "IDREFS" | "ENTITY" | "ENTITIES" => "string",
        "anyURI" => "uri",
        "float" | "double" | "decimal" => "float",
        "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
        | "positiveInteger" | "nonPositiveInteger" | "negativeInteger" | "unsignedLong"
        | "unsignedInt" | "unsignedShort" | "unsignedByte" => "integer",
        "boolean" => "boolean",
        "date" => "date",
        "dateTime" => "datetime",
        "time" => "time",
        _ => return None,
    };
    Some(range)
}

/// Resolves simple-type references to primitive ranges and effective facets.
pub struct PrimitiveMapper<'s> {
    schema: &'s SourceSchema,
}

impl<'s> PrimitiveMapper<'s> {
    pub fn new(schema: &'s SourceSchema) -> Self {
        Self { schema }
    }

    /// Primitive range of `type_ref`, following restriction bases until a
    /// built-in is reached. Anything unresolvable maps to `string`.
    pub fn range_for(&self, type_ref: &TypeRef) -> &'static str {
        let mut visited = HashSet::new();
        self.walk(type_ref, &mut visited).unwrap_or(DEFAULT_RANGE)
    }

    fn walk<'a>(
        &'a self,
        type_ref: &'a TypeRef,
        visited: &mut HashSet<&'a str>,
    ) -> Option<&'static str> {
        match type_ref {
            TypeRef::Builtin(name) => builtin_range(local_name(name)).or(Some(DEFAULT_RANGE)),
            TypeRef::Named(name) => {
                let name = local_name(name);
                if !visited.insert(name) {
                    return None;
                }
                match self.schema.simple_type(name) {
                    Some(st) => st.base.as_deref().and_then(|base| self.walk(base, visited)),
                    None => builtin_range(name),
                }
            }
            TypeRef::Inline(def) => match def.as_ref() {
                TypeDef::Simple(st) => st.base.as_deref().and_then(|base| self.walk(base, visited)),
                TypeDef::Complex(_) => None,
            },
        }
    }

    /// The simple type `type_ref` denotes, if any.
    pub fn simple_type(&self, type_ref: &'s TypeRef) -> Option<&'s SimpleType> {
        match type_ref {
            TypeRef::Named(name) => self.schema.simple_type(local_name(name)),
            TypeRef::Inline(def) => match def.as_ref() {
                TypeDef::Simple(st) => Some(st),
                TypeDef::Complex(_) => None,
            },
            TypeRef::Builtin(_) => None,
        }
    }

    /// Facets in effect for `type_ref`: each facet comes from the nearest type
    /// in the restriction chain that declares it.
    pub fn facets_for(&self, type_ref: &'s TypeRef) -> Facets {
        let mut facets = Facets::default();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = self.simple_type(type_ref);

        while let Some(st) = current {
            if let Some(name) = st.name.as_deref() {
                if !visited.insert(name) {
                    break;
                }
            }
            if facets.enumeration.is_empty() {
                facets.enumeration = st.facets.enumeration.clone();
            }
            if facets.pattern.is_none() {
                facets.pattern = st.facets.pattern.clone();
            }
            if facets.min_inclusive.is_none() {
                facets.min_inclusive = st.facets.min_inclusive.clone();
            }
            if facets.max_inclusive.is_none() {
                facets.max_inclusive = st.facets.max_inclusive.clone();
            }
            current = st.base.as_deref().and_then(|base| self.simple_type(base));
        }
        facets
    }
}
