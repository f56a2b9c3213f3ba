use thiserror::Error;

#[derive(Error, Debug)]
pub enum MdGraphError {
    #[error(
        "Field '{field}' has differing types across .md files: {previous_type} in {previous_file}, \
         {current_type} in {current_file}. Fields must use the same type in every file"
    )]
    SchemaConflict {
        field: String,
        previous_file: String,
        previous_type: String,
        current_file: String,
        current_type: String,
    },

    #[error("Unsupported type in {file}: field '{field}' has tag {tag} ({kind})")]
    UnsupportedType {
        file: String,
        field: String,
        tag: String,
        kind: String,
    },

    #[error(
        "List field '{field}' in {file} contains more than one scalar type \
         (offending value {value:?}, detected types {types:?})"
    )]
    MixedList {
        file: String,
        field: String,
        value: String,
        types: Vec<String>,
    },

    #[error("Required field '{field}' is missing from {file}")]
    MissingField { file: String, field: String },

    #[error("Duplicate id '{id}' in {file} (already declared in {previous_file})")]
    DuplicateId {
        id: String,
        file: String,
        previous_file: String,
    },

    #[error("Front-matter error in {file}: {reason}")]
    FrontMatter { file: String, reason: String },

    #[error("Invalid query input '{param}': {reason}")]
    InvalidQuery { param: String, reason: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl MdGraphError {
    /// Shorthand for an invalid query argument.
    pub fn invalid_query(param: &str, reason: impl Into<String>) -> Self {
        MdGraphError::InvalidQuery {
            param: param.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts a load, as opposed to failing a single query.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            MdGraphError::SchemaConflict { .. }
                | MdGraphError::UnsupportedType { .. }
                | MdGraphError::MixedList { .. }
                | MdGraphError::MissingField { .. }
                | MdGraphError::DuplicateId { .. }
                | MdGraphError::FrontMatter { .. }
                | MdGraphError::Schema(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MdGraphError>;
