//! Field type inference over a front-matter event stream.
//!
//! Each document's events are folded through [`step`] into a [`WalkState`];
//! the final state's fields form the document's [`DocumentFieldSet`].

pub mod reconcile;

pub use reconcile::{reconcile, RegisteredField, SchemaFieldRegistry};

use crate::error::{MdGraphError, Result};
use crate::frontmatter::events::{
    TAG_BOOL, TAG_FLOAT, TAG_INT, TAG_NULL, TAG_SEQ, TAG_STR, TAG_UNRESOLVED,
};
use crate::frontmatter::{Collection, ParseEvent};
use crate::schema::{FieldDefinition, TypeRef};
use crate::store::is_field_name;
use indexmap::IndexMap;
use log::debug;
use serde::{Serialize, Serializer};
use std::fmt;

// ── Types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Boolean,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Int => "Int",
            ScalarType::Float => "Float",
            ScalarType::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar type, or a list of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub scalar: ScalarType,
    pub is_list: bool,
}

impl FieldType {
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType {
            scalar,
            is_list: false,
        }
    }

    pub fn list(scalar: ScalarType) -> Self {
        FieldType {
            scalar,
            is_list: true,
        }
    }

    pub fn type_ref(&self) -> TypeRef {
        let named = TypeRef::named(self.scalar.as_str());
        if self.is_list {
            TypeRef::list_of(named)
        } else {
            named
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_list {
            write!(f, "[{}]", self.scalar)
        } else {
            write!(f, "{}", self.scalar)
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A front-matter field with its inferred type and schema fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredField {
    pub name: String,
    pub field_type: FieldType,
    pub definition: FieldDefinition,
}

impl InferredField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        let definition = FieldDefinition::new(name.clone(), field_type.type_ref());
        InferredField {
            name,
            field_type,
            definition,
        }
    }
}

/// Fields inferred from one document, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFieldSet {
    /// Document path relative to the content root.
    pub source: String,
    pub fields: IndexMap<String, InferredField>,
}

impl DocumentFieldSet {
    pub fn get(&self, name: &str) -> Option<&InferredField> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ── Tag mapping ─────────────────────────────────────────────────

/// Map a scalar's tag to a schema scalar type.
///
/// `.inf` and `.nan` are tagged float but have no JSON value, so they are
/// rejected along with the other unsupported tags.
pub fn scalar_type_for_tag(
    file: &str,
    field: &str,
    tag: Option<&str>,
    value: &str,
) -> Result<ScalarType> {
    match tag {
        None | Some(TAG_UNRESOLVED) | Some(TAG_STR) => Ok(ScalarType::String),
        Some(TAG_INT) => Ok(ScalarType::Int),
        Some(TAG_BOOL) => Ok(ScalarType::Boolean),
        Some(TAG_FLOAT) if is_finite_float(value) => Ok(ScalarType::Float),
        Some(TAG_FLOAT) => Err(unsupported(file, field, TAG_FLOAT, "non-finite float")),
        Some(other) => Err(unsupported(file, field, other, "scalar")),
    }
}

fn is_finite_float(value: &str) -> bool {
    value.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

fn check_field_name(file: &str, key: &str) -> Result<()> {
    if is_field_name(key) {
        Ok(())
    } else {
        Err(MdGraphError::FrontMatter {
            file: file.to_string(),
            reason: format!(
                "field name '{key}' is not a valid GraphQL name \
                 (letters, digits and '_', not starting with a digit)"
            ),
        })
    }
}

fn unsupported(file: &str, field: &str, tag: &str, kind: &str) -> MdGraphError {
    MdGraphError::UnsupportedType {
        file: file.to_string(),
        field: field.to_string(),
        tag: tag.to_string(),
        kind: kind.to_string(),
    }
}

// ── Walker ──────────────────────────────────────────────────────

/// Walker state between two events.
#[derive(Debug, Clone, Default)]
pub struct WalkState {
    /// Open collections, outermost (the front-matter mapping) first.
    stack: Vec<Collection>,
    /// Key whose value has not been seen yet.
    current_key: Option<String>,
    /// Element types of the open top-level list, with the value that produced each.
    list_types: Vec<(ScalarType, String)>,
    fields: IndexMap<String, InferredField>,
}

impl WalkState {
    pub fn fields(&self) -> &IndexMap<String, InferredField> {
        &self.fields
    }

    pub fn into_fields(self) -> IndexMap<String, InferredField> {
        self.fields
    }

    fn key_or(&self, fallback: &str) -> String {
        self.current_key
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }

    fn record(mut self, field_type: FieldType) -> Self {
        if let Some(key) = self.current_key.take() {
            self.fields
                .insert(key.clone(), InferredField::new(key, field_type));
        }
        self
    }
}

/// Advance the walk by one event.
pub fn step(file: &str, mut state: WalkState, event: &ParseEvent) -> Result<WalkState> {
    match event {
        ParseEvent::Start { kind, tag, .. } => {
            let depth = state.stack.len();
            if depth == 0 {
                if *kind != Collection::Mapping {
                    return Err(not_a_mapping(file));
                }
                state.stack.push(*kind);
                return Ok(state);
            }

            let field = state.key_or("<key>");
            let tag = tag.as_deref().unwrap_or(kind.default_tag());
            if depth > 1 || *kind == Collection::Mapping || state.current_key.is_none() {
                return Err(unsupported(file, &field, tag, kind.as_str()));
            }
            if tag != TAG_SEQ {
                return Err(unsupported(file, &field, tag, kind.as_str()));
            }
            state.stack.push(*kind);
            state.list_types.clear();
            Ok(state)
        }

        ParseEvent::End { kind, .. } => {
            state.stack.pop();
            if state.stack.len() != 1 || *kind != Collection::Sequence {
                return Ok(state);
            }
            let list_types = std::mem::take(&mut state.list_types);
            let Some(first) = list_types.first().map(|(t, _)| *t) else {
                debug!(
                    "{file}: list '{}' is empty, no type inferred",
                    state.key_or("")
                );
                state.current_key = None;
                return Ok(state);
            };
            if let Some((_, value)) = list_types.iter().find(|(t, _)| *t != first) {
                return Err(MdGraphError::MixedList {
                    file: file.to_string(),
                    field: state.key_or(""),
                    value: value.clone(),
                    types: list_types.iter().map(|(t, _)| t.to_string()).collect(),
                });
            }
            Ok(state.record(FieldType::list(first)))
        }

        ParseEvent::Scalar { value, tag, mark } => match state.stack.len() {
            0 => {
                // A document holding only a null scalar is an empty block.
                if tag.as_deref() == Some(TAG_NULL) {
                    Ok(state)
                } else {
                    Err(not_a_mapping(file))
                }
            }
            1 => {
                // An empty value carries the mark of the next line.
                let empty_value = value.is_empty() && tag.as_deref() == Some(TAG_NULL);
                let is_key = match state.current_key {
                    None => true,
                    Some(_) => mark.at_line_start() && !empty_value,
                };
                if is_key {
                    check_field_name(file, value)?;
                    state.current_key = Some(value.clone());
                    return Ok(state);
                }
                let field = state.key_or("");
                let scalar = scalar_type_for_tag(file, &field, tag.as_deref(), value)?;
                Ok(state.record(FieldType::scalar(scalar)))
            }
            _ => {
                let field = state.key_or("");
                let scalar = scalar_type_for_tag(file, &field, tag.as_deref(), value)?;
                state.list_types.push((scalar, value.clone()));
                Ok(state)
            }
        },

        ParseEvent::Alias { .. } => Err(unsupported(file, &state.key_or("<key>"), "*", "alias")),
    }
}

fn not_a_mapping(file: &str) -> MdGraphError {
    MdGraphError::FrontMatter {
        file: file.to_string(),
        reason: "front-matter must be a mapping of field names to values".into(),
    }
}

/// Infer the fields declared by one document's front-matter.
pub fn infer_document_fields(file: &str, events: &[ParseEvent]) -> Result<DocumentFieldSet> {
    let state = events
        .iter()
        .try_fold(WalkState::default(), |state, event| step(file, state, event))?;
    let fields = state.into_fields();
    debug!(
        "{file}: inferred {}",
        fields
            .values()
            .map(|f| format!("{}: {}", f.name, f.field_type))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(DocumentFieldSet {
        source: file.to_string(),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::events::parse_events;
    use pretty_assertions::assert_eq;

    fn infer(yaml: &str) -> Result<DocumentFieldSet> {
        let events = parse_events(yaml).unwrap();
        infer_document_fields("doc.md", &events)
    }

    fn types(yaml: &str) -> Vec<(String, String)> {
        infer(yaml)
            .unwrap()
            .fields
            .values()
            .map(|f| (f.name.clone(), f.field_type.to_string()))
            .collect()
    }

    #[test]
    fn test_scalar_types() {
        let yaml = "id: home\ntitle: Hello world\norder: 3\ntemperature: 30.5\ndraft: false\nquoted: '12'\n";
        assert_eq!(
            types(yaml),
            vec![
                ("id".to_string(), "String".to_string()),
                ("title".to_string(), "String".to_string()),
                ("order".to_string(), "Int".to_string()),
                ("temperature".to_string(), "Float".to_string()),
                ("draft".to_string(), "Boolean".to_string()),
                ("quoted".to_string(), "String".to_string()),
            ]
        );
    }

    #[test]
    fn test_flow_list_of_strings() {
        let fields = infer("tags: [foo, bar]\n").unwrap();
        let tags = fields.get("tags").unwrap();
        assert_eq!(tags.field_type, FieldType::list(ScalarType::String));
        assert_eq!(tags.definition.ty.to_string(), "[String]");
    }

    #[test]
    fn test_block_list_of_ints() {
        assert_eq!(
            types("sizes:\n  - 1\n  - 2\ntitle: x\n"),
            vec![
                ("sizes".to_string(), "[Int]".to_string()),
                ("title".to_string(), "String".to_string()),
            ]
        );
    }

    #[test]
    fn test_mixed_list_is_rejected() {
        let err = infer("tags: [foo, 1]\n").unwrap_err();
        match err {
            MdGraphError::MixedList {
                field,
                value,
                types,
                file,
            } => {
                assert_eq!(file, "doc.md");
                assert_eq!(field, "tags");
                assert_eq!(value, "1");
                assert_eq!(types, vec!["String", "Int"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_list_infers_nothing() {
        assert_eq!(
            types("tags: []\ntitle: x\n"),
            vec![("title".to_string(), "String".to_string())]
        );
    }

    #[test]
    fn test_multiline_value_is_not_a_key() {
        assert_eq!(
            types("summary: >\n  folded\n  text\nnext: 1\n"),
            vec![
                ("summary".to_string(), "String".to_string()),
                ("next".to_string(), "Int".to_string()),
            ]
        );
        assert_eq!(
            types("summary:\n  plain on next line\n"),
            vec![("summary".to_string(), "String".to_string())]
        );
    }

    #[test]
    fn test_unsupported_tags() {
        for yaml in ["date: 2020-01-31\n", "nothing: ~\n", "custom: !thing x\n"] {
            let err = infer(yaml).unwrap_err();
            assert!(
                matches!(err, MdGraphError::UnsupportedType { ref kind, .. } if kind == "scalar"),
                "{yaml}: {err:?}"
            );
        }
    }

    #[test]
    fn test_unsupported_error_names_field_and_tag() {
        let err = infer("title: x\npublished: 2020-01-31\n").unwrap_err();
        match err {
            MdGraphError::UnsupportedType { file, field, tag, .. } => {
                assert_eq!(file, "doc.md");
                assert_eq!(field, "published");
                assert_eq!(tag, "tag:yaml.org,2002:timestamp");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_value_is_not_a_key() {
        for yaml in ["a:\nb: 1\n", "b: 1\na:\n", "b: 1\na:"] {
            match infer(yaml).unwrap_err() {
                MdGraphError::UnsupportedType { field, tag, .. } => {
                    assert_eq!(field, "a", "{yaml}");
                    assert_eq!(tag, TAG_NULL, "{yaml}");
                }
                other => panic!("{yaml}: unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_field_name() {
        let err = infer("title: x\nmy-field: y\n").unwrap_err();
        match err {
            MdGraphError::FrontMatter { file, reason } => {
                assert_eq!(file, "doc.md");
                assert!(reason.contains("'my-field'"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(infer("2nd: x\n").is_err());
        assert_eq!(
            types("_private: 1\nsnake_case9: x\n"),
            vec![
                ("_private".to_string(), "Int".to_string()),
                ("snake_case9".to_string(), "String".to_string()),
            ]
        );
    }

    #[test]
    fn test_non_finite_floats_are_unsupported() {
        for yaml in ["v: .inf\n", "v: -.Inf\n", "v: .nan\n", "v: 1e400\n", "v: [1.5, .inf]\n"] {
            let err = infer(yaml).unwrap_err();
            assert!(
                matches!(err, MdGraphError::UnsupportedType { ref kind, ref field, .. } if kind == "non-finite float" && field == "v"),
                "{yaml}: {err:?}"
            );
        }
        assert_eq!(
            types("v: .5\nw: -1.25e3\n"),
            vec![
                ("v".to_string(), "Float".to_string()),
                ("w".to_string(), "Float".to_string()),
            ]
        );
    }

    #[test]
    fn test_nested_values_are_unsupported() {
        let err = infer("meta:\n  a: 1\n").unwrap_err();
        assert!(matches!(err, MdGraphError::UnsupportedType { ref kind, .. } if kind == "mapping"));

        let err = infer("grid: [[1, 2], [3]]\n").unwrap_err();
        assert!(matches!(err, MdGraphError::UnsupportedType { ref kind, .. } if kind == "sequence"));

        let err = infer("a: &x 1\nb: *x\n").unwrap_err();
        assert!(matches!(err, MdGraphError::UnsupportedType { ref kind, .. } if kind == "alias"));
    }

    #[test]
    fn test_step_is_a_pure_transition() {
        let events = parse_events("order: 1\n").unwrap();
        let mut state = WalkState::default();
        for event in &events {
            let before = state.clone();
            state = step("doc.md", state, event).unwrap();
            // replaying from the same input yields the same output
            let again = step("doc.md", before, event).unwrap();
            assert_eq!(again.fields(), state.fields());
        }
        assert_eq!(
            state.fields().get("order").unwrap().field_type,
            FieldType::scalar(ScalarType::Int)
        );
    }

    #[test]
    fn test_empty_front_matter() {
        assert!(infer("").unwrap().is_empty());
    }
}
