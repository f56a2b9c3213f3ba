//! YAML parse events for a front-matter block.
//!
//! Events come from `yaml-rust2`'s event parser and are converted into
//! [`ParseEvent`]s carrying a resolved tag and the position of the node, which
//! is everything type inference needs.

use regex::Regex;
use std::sync::OnceLock;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

pub const TAG_PREFIX: &str = "tag:yaml.org,2002:";
pub const TAG_STR: &str = "tag:yaml.org,2002:str";
pub const TAG_NULL: &str = "tag:yaml.org,2002:null";
pub const TAG_BOOL: &str = "tag:yaml.org,2002:bool";
pub const TAG_INT: &str = "tag:yaml.org,2002:int";
pub const TAG_FLOAT: &str = "tag:yaml.org,2002:float";
pub const TAG_TIMESTAMP: &str = "tag:yaml.org,2002:timestamp";
pub const TAG_SEQ: &str = "tag:yaml.org,2002:seq";
pub const TAG_MAP: &str = "tag:yaml.org,2002:map";
/// Tag of a plain scalar that matched no implicit type.
pub const TAG_UNRESOLVED: &str = "?";

/// Composite node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Sequence,
    Mapping,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Sequence => "sequence",
            Collection::Mapping => "mapping",
        }
    }

    pub fn default_tag(&self) -> &'static str {
        match self {
            Collection::Sequence => TAG_SEQ,
            Collection::Mapping => TAG_MAP,
        }
    }
}

/// Where a node starts in the front-matter text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mark {
    pub position: usize,
    pub line: usize,
    pub line_start: usize,
}

impl Mark {
    /// A node starting at the beginning of its line.
    pub fn at_line_start(&self) -> bool {
        self.position == self.line_start
    }
}

impl From<Marker> for Mark {
    fn from(marker: Marker) -> Self {
        Mark {
            position: marker.index(),
            line: marker.line(),
            line_start: marker.index().saturating_sub(marker.col()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    Start {
        kind: Collection,
        tag: Option<String>,
        mark: Mark,
    },
    End {
        kind: Collection,
        mark: Mark,
    },
    Scalar {
        value: String,
        tag: Option<String>,
        mark: Mark,
    },
    Alias {
        mark: Mark,
    },
}

impl ParseEvent {
    pub fn mark(&self) -> Mark {
        match self {
            ParseEvent::Start { mark, .. }
            | ParseEvent::End { mark, .. }
            | ParseEvent::Scalar { mark, .. }
            | ParseEvent::Alias { mark } => *mark,
        }
    }
}

#[derive(Default)]
struct EventCollector {
    events: Vec<ParseEvent>,
}

impl MarkedEventReceiver for EventCollector {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        let mark = Mark::from(marker);
        let event = match ev {
            Event::Scalar(value, style, _anchor, tag) => {
                let tag = match tag {
                    Some(tag) => Some(expand_tag(&tag.handle, &tag.suffix)),
                    None if matches!(style, TScalarStyle::Plain) => {
                        Some(resolve_plain_scalar(&value).to_string())
                    }
                    None => None,
                };
                ParseEvent::Scalar { value, tag, mark }
            }
            Event::SequenceStart(_anchor, tag) => ParseEvent::Start {
                kind: Collection::Sequence,
                tag: tag.map(|t| expand_tag(&t.handle, &t.suffix)),
                mark,
            },
            Event::MappingStart(_anchor, tag) => ParseEvent::Start {
                kind: Collection::Mapping,
                tag: tag.map(|t| expand_tag(&t.handle, &t.suffix)),
                mark,
            },
            Event::SequenceEnd => ParseEvent::End {
                kind: Collection::Sequence,
                mark,
            },
            Event::MappingEnd => ParseEvent::End {
                kind: Collection::Mapping,
                mark,
            },
            Event::Alias(_) => ParseEvent::Alias { mark },
            _ => return,
        };
        self.events.push(event);
    }
}

/// Run the YAML event parser over a front-matter block.
pub fn parse_events(yaml: &str) -> std::result::Result<Vec<ParseEvent>, String> {
    let mut collector = EventCollector::default();
    let mut parser = Parser::new_from_str(yaml);
    parser
        .load(&mut collector, false)
        .map_err(|e| e.to_string())?;
    Ok(collector.events)
}

fn expand_tag(handle: &str, suffix: &str) -> String {
    if handle == "!!" {
        format!("{TAG_PREFIX}{suffix}")
    } else {
        format!("{handle}{suffix}")
    }
}

struct ImplicitTypes {
    null: Regex,
    boolean: Regex,
    int: Regex,
    float: Regex,
    timestamp: Regex,
}

static IMPLICIT_TYPES: OnceLock<ImplicitTypes> = OnceLock::new();

fn implicit_types() -> &'static ImplicitTypes {
    IMPLICIT_TYPES.get_or_init(|| ImplicitTypes {
        null: Regex::new(r"^(?:~|null|Null|NULL)?$").unwrap(),
        boolean: Regex::new(r"^(?:true|True|TRUE|false|False|FALSE)$").unwrap(),
        int: Regex::new(r"^(?:[-+]?[0-9]+|0o[0-7]+|0x[0-9a-fA-F]+|0b[01]+)$").unwrap(),
        float: Regex::new(
            r"^(?:[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
        )
        .unwrap(),
        timestamp: Regex::new(
            r"^(?:[0-9]{4}-[0-9]{2}-[0-9]{2}|[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}(?:[Tt]|[ \t]+)[0-9]{1,2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]*)?(?:[ \t]*(?:Z|[-+][0-9]{1,2}(?::[0-9]{2})?))?)$",
        )
        .unwrap(),
    })
}

/// Resolve the tag of an untagged plain scalar (YAML 1.2 core schema plus timestamps).
pub fn resolve_plain_scalar(value: &str) -> &'static str {
    let types = implicit_types();
    if types.null.is_match(value) {
        TAG_NULL
    } else if types.boolean.is_match(value) {
        TAG_BOOL
    } else if types.int.is_match(value) {
        TAG_INT
    } else if types.float.is_match(value) {
        TAG_FLOAT
    } else if types.timestamp.is_match(value) {
        TAG_TIMESTAMP
    } else {
        TAG_UNRESOLVED
    }
}
