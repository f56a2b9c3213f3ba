//! Front-matter splitting and decoding.
//!
//! A document may start with a `---` delimited YAML block. The block is
//! decoded twice: once into data with `serde_yaml`, and once into the event
//! stream type inference walks.

pub mod events;

use crate::error::{MdGraphError, Result};
use regex::Regex;
use std::sync::OnceLock;

pub use events::{Collection, Mark, ParseEvent};

/// A document split into its decoded front-matter and its markdown body.
#[derive(Debug, Clone)]
pub struct FrontMatter {
    /// Front-matter fields, in declaration order.
    pub data: serde_json::Map<String, serde_json::Value>,
    /// The markdown body following the front-matter block.
    pub content: String,
    /// Parse events of the front-matter block.
    pub events: Vec<ParseEvent>,
}

static FRONT_MATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn front_matter_regex() -> &'static Regex {
    FRONT_MATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)(.*)\z").unwrap()
    })
}

/// Split raw file contents into the YAML block and the body.
/// Returns `None` for the YAML block when the document has no front-matter.
pub fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    match front_matter_regex().captures(raw) {
        Some(captures) => {
            let yaml = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            let body = captures.get(2).map(|m| m.as_str()).unwrap_or("");
            (Some(yaml), body)
        }
        None => (None, raw),
    }
}

/// Parse a document's front-matter. `file` names the document in errors.
pub fn parse_front_matter(file: &str, raw: &str) -> Result<FrontMatter> {
    let (yaml, body) = split_front_matter(raw);
    let yaml = match yaml {
        Some(yaml) => yaml,
        None => {
            return Ok(FrontMatter {
                data: serde_json::Map::new(),
                content: body.to_string(),
                events: Vec::new(),
            })
        }
    };

    let events = events::parse_events(yaml).map_err(|reason| MdGraphError::FrontMatter {
        file: file.to_string(),
        reason,
    })?;

    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| MdGraphError::FrontMatter {
            file: file.to_string(),
            reason: e.to_string(),
        })?;

    let data = match value {
        serde_yaml::Value::Null => serde_json::Map::new(),
        serde_yaml::Value::Mapping(_) => match serde_json::to_value(&value) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(other) => {
                return Err(MdGraphError::FrontMatter {
                    file: file.to_string(),
                    reason: format!("front-matter decoded to {other}, expected a mapping"),
                })
            }
            Err(e) => {
                return Err(MdGraphError::FrontMatter {
                    file: file.to_string(),
                    reason: e.to_string(),
                })
            }
        },
        _ => {
            return Err(MdGraphError::FrontMatter {
                file: file.to_string(),
                reason: "front-matter must be a mapping of field names to values".into(),
            })
        }
    };

    Ok(FrontMatter {
        data,
        content: body.to_string(),
        events,
    })
}
