//! The published GraphQL schema: a structural SDL document kept together with
//! the source text it was parsed from.

pub mod ast;
pub mod parser;
mod splice;

pub use ast::{Definition, Document, FieldDefinition, TypeDefinition, TypeKind, TypeRef};
pub use parser::{parse_type_defs, parse_type_defs_str, ParsedTypeDefs};

use crate::error::Result;
use indexmap::IndexMap;
use std::path::Path;

/// Base schema shipped with the crate.
pub const CONTENT_ITEM_TYPE_DEFS: &str = include_str!("content_item.graphql");

/// Fields owned by the base schema. Front-matter never redefines them.
pub const PROTECTED_FIELDS: &[&str] = &["id", "groupId", "html"];

/// Types that receive inferred fields unless configured otherwise.
pub const DEFAULT_SPLICE_TARGETS: &[&str] = &["ContentItem", "ContentItemFields"];

/// A schema in both its structural and textual form.
///
/// The two views are only ever produced together: by parsing text, or by
/// [`TypeDefs::splice`], which checks the spliced text against the
/// structurally extended document.
#[derive(Debug, Clone)]
pub struct TypeDefs {
    document: Document,
    source: String,
    body_ends: IndexMap<String, usize>,
}

impl TypeDefs {
    /// Parse SDL text.
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let parsed = parse_type_defs_str(&source)?;
        Ok(TypeDefs {
            document: parsed.document,
            source,
            body_ends: parsed.body_ends,
        })
    }

    /// Read and parse an SDL file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(source)
    }

    /// The bundled `ContentItem` schema.
    pub fn content_item() -> Result<Self> {
        Self::parse(CONTENT_ITEM_TYPE_DEFS)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.document.type_definition(name)
    }
}

impl PartialEq for TypeDefs {
    /// Schemas are equal when their structure is, whatever the formatting.
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_schema_parses() {
        let defs = TypeDefs::content_item().unwrap();
        for target in DEFAULT_SPLICE_TARGETS {
            let def = defs.type_definition(target).unwrap();
            assert!(def.kind.has_fields());
        }
        let item = defs.type_definition("ContentItem").unwrap();
        for field in PROTECTED_FIELDS {
            assert!(item.field(field).is_some(), "ContentItem.{field}");
        }
        let query = defs.type_definition("Query").unwrap();
        let names: Vec<&str> = query.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "contentItemById",
                "contentItemsByIds",
                "contentItemsByGroupId",
                "contentItems",
                "contentItemsByQuery"
            ]
        );
    }

    #[test]
    fn test_equality_ignores_formatting() {
        let a = TypeDefs::parse("type A { x: Int }").unwrap();
        let b = TypeDefs::parse("type A {\n  x: Int\n}\n").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.source(), b.source());
    }
}
