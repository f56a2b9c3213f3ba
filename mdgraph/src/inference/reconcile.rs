use super::{DocumentFieldSet, FieldType, InferredField};
use crate::error::{MdGraphError, Result};
use crate::schema::FieldDefinition;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A registry entry: the first declaration of a field and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredField {
    pub field: InferredField,
    /// The document that first declared the field.
    pub source: String,
}

/// Schema-wide fields accumulated across documents, in the order they were
/// first declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaFieldRegistry {
    fields: IndexMap<String, RegisteredField>,
}

impl SchemaFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredField> {
        self.fields.get(name)
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).map(|entry| entry.field.field_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegisteredField)> {
        self.fields.iter()
    }

    /// Schema fragments of every registered field, in registration order.
    pub fn field_definitions(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.values().map(|entry| &entry.field.definition)
    }

    /// Merge one document's fields.
    ///
    /// Every field is checked before anything is inserted, so a conflicting
    /// document leaves the registry unchanged. Fields already registered keep
    /// their first declaration.
    pub fn merge(&mut self, document: &DocumentFieldSet) -> Result<()> {
        for (name, field) in &document.fields {
            if let Some(existing) = self.fields.get(name) {
                if existing.field.field_type != field.field_type {
                    return Err(MdGraphError::SchemaConflict {
                        field: name.clone(),
                        previous_file: existing.source.clone(),
                        previous_type: existing.field.field_type.to_string(),
                        current_file: document.source.clone(),
                        current_type: field.field_type.to_string(),
                    });
                }
            }
        }

        for (name, field) in &document.fields {
            if !self.fields.contains_key(name) {
                self.fields.insert(
                    name.clone(),
                    RegisteredField {
                        field: field.clone(),
                        source: document.source.clone(),
                    },
                );
            }
        }
        Ok(())
    }
}

/// Fold documents, in order, into one registry. Stops at the first conflict.
pub fn reconcile<'a, I>(documents: I) -> Result<SchemaFieldRegistry>
where
    I: IntoIterator<Item = &'a DocumentFieldSet>,
{
    documents
        .into_iter()
        .try_fold(SchemaFieldRegistry::new(), |mut registry, document| {
            registry.merge(document)?;
            Ok(registry)
        })
}

impl Serialize for SchemaFieldRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct Entry<'a> {
            #[serde(rename = "type")]
            field_type: FieldType,
            source: &'a str,
        }

        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, entry) in &self.fields {
            map.serialize_entry(
                name,
                &Entry {
                    field_type: entry.field.field_type,
                    source: &entry.source,
                },
            )?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ScalarType;
    use pretty_assertions::assert_eq;

    fn doc(source: &str, fields: &[(&str, FieldType)]) -> DocumentFieldSet {
        DocumentFieldSet {
            source: source.to_string(),
            fields: fields
                .iter()
                .map(|(name, ty)| (name.to_string(), InferredField::new(*name, *ty)))
                .collect(),
        }
    }

    const STRING: FieldType = FieldType {
        scalar: ScalarType::String,
        is_list: false,
    };
    const INT: FieldType = FieldType {
        scalar: ScalarType::Int,
        is_list: false,
    };
    const STRINGS: FieldType = FieldType {
        scalar: ScalarType::String,
        is_list: true,
    };

    #[test]
    fn test_identical_documents_register_once() {
        let docs = vec![
            doc("/a.md", &[("title", STRING), ("order", INT)]),
            doc("/b.md", &[("title", STRING), ("order", INT)]),
            doc("/c.md", &[("order", INT)]),
        ];
        let registry = reconcile(&docs).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("title").unwrap().source, "/a.md");
        let names: Vec<&String> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["title", "order"]);
    }

    #[test]
    fn test_new_fields_are_added_in_order() {
        let docs = vec![
            doc("/a.md", &[("title", STRING)]),
            doc("/b.md", &[("tags", STRINGS), ("title", STRING)]),
        ];
        let registry = reconcile(&docs).unwrap();
        let names: Vec<&str> = registry
            .field_definitions()
            .map(|def| def.name.as_str())
            .collect();
        assert_eq!(names, vec!["title", "tags"]);
        assert_eq!(registry.get("tags").unwrap().source, "/b.md");
    }

    #[test]
    fn test_conflict_names_both_documents() {
        let docs = vec![
            doc("/a.md", &[("order", INT)]),
            doc("/b.md", &[("title", STRING)]),
            doc("/c.md", &[("order", STRING)]),
        ];
        match reconcile(&docs).unwrap_err() {
            MdGraphError::SchemaConflict {
                field,
                previous_file,
                previous_type,
                current_file,
                current_type,
            } => {
                assert_eq!(field, "order");
                assert_eq!(previous_file, "/a.md");
                assert_eq!(previous_type, "Int");
                assert_eq!(current_file, "/c.md");
                assert_eq!(current_type, "String");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_list_and_scalar_conflict() {
        let docs = vec![
            doc("/a.md", &[("tags", STRINGS)]),
            doc("/b.md", &[("tags", STRING)]),
        ];
        let err = reconcile(&docs).unwrap_err();
        assert!(err.to_string().contains("[String] in /a.md"), "{err}");
    }

    #[test]
    fn test_failed_merge_leaves_registry_unchanged() {
        let mut registry = SchemaFieldRegistry::new();
        registry.merge(&doc("/a.md", &[("order", INT)])).unwrap();
        let before = registry.clone();
        assert!(registry
            .merge(&doc("/b.md", &[("fresh", STRING), ("order", STRING)]))
            .is_err());
        assert_eq!(registry, before);
    }

    #[test]
    fn test_serialize_registry() {
        let registry = reconcile(&[doc("/a.md", &[("tags", STRINGS)])]).unwrap();
        let json = serde_json::to_value(&registry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "tags": { "type": "[String]", "source": "/a.md" } })
        );
    }
}
