//! Markdown documents and the content items built from them.

use crate::error::{MdGraphError, Result};
use crate::frontmatter::parse_front_matter;
use crate::inference::{infer_document_fields, DocumentFieldSet};
use log::warn;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Front-matter keys that would shadow fields the loader sets itself.
pub const RESERVED_KEYS: &[&str] = &["html", "markdown", "assetDir", "images"];

/// A stored markdown document.
///
/// Serializes as `{ id, groupId, html, ...front-matter, markdown, assetDir, images }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub group_id: String,
    pub html: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
    pub markdown: String,
    /// Folder of the document relative to the content root.
    pub asset_dir: String,
    /// Images in the document's folder, relative to the content root.
    pub images: Vec<String>,
}

impl ContentItem {
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A content item with the fields inferred from its front-matter.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub item: ContentItem,
    pub fields: DocumentFieldSet,
}

/// Default `groupId`: the first folder of the asset dir.
pub fn default_group_id(asset_dir: &str) -> String {
    asset_dir.split('/').next().unwrap_or("").to_string()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse one markdown file into a content item.
///
/// `source` names the file in errors. The item's `images` are left empty.
pub fn parse_document(
    source: &str,
    asset_dir: &str,
    raw: &str,
    renderer: &MarkdownRenderer,
) -> Result<ParsedDocument> {
    let front_matter = parse_front_matter(source, raw)?;
    let mut fields = infer_document_fields(source, &front_matter.events)?;
    let mut data = front_matter.data;

    for key in RESERVED_KEYS {
        if data.shift_remove(*key).is_some() {
            warn!("{source}: front-matter key '{key}' is reserved and was ignored");
            fields.fields.shift_remove(*key);
        }
    }

    let id = match data.shift_remove("id") {
        None | Some(Value::Null) => {
            return Err(MdGraphError::MissingField {
                file: source.to_string(),
                field: "id".into(),
            })
        }
        Some(value) => scalar_to_string(&value).ok_or_else(|| MdGraphError::FrontMatter {
            file: source.to_string(),
            reason: format!("id must be a string or a number, got {value}"),
        })?,
    };
    if id.is_empty() {
        return Err(MdGraphError::MissingField {
            file: source.to_string(),
            field: "id".into(),
        });
    }

    let group_id = match data.shift_remove("groupId") {
        None | Some(Value::Null) => default_group_id(asset_dir),
        Some(value) => scalar_to_string(&value).ok_or_else(|| MdGraphError::FrontMatter {
            file: source.to_string(),
            reason: format!("groupId must be a string or a number, got {value}"),
        })?,
    };

    let html = renderer.render(&front_matter.content);

    Ok(ParsedDocument {
        item: ContentItem {
            id,
            group_id,
            html,
            data,
            markdown: front_matter.content,
            asset_dir: asset_dir.to_string(),
            images: Vec::new(),
        },
        fields,
    })
}

// ── Rendering ───────────────────────────────────────────────────

/// Markdown to HTML with tables, footnotes, strikethrough, task lists and
/// smart punctuation. Headings without an explicit `{#id}` get a slug id.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    options: Options,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        Self { options }
    }

    pub fn render(&self, markdown: &str) -> String {
        let events: Vec<Event> = Parser::new_ext(markdown, self.options).collect();
        let events = attach_heading_ids(events);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Slugs of every heading's text, in document order, made unique.
fn heading_slugs(events: &[Event]) -> Vec<String> {
    let mut slugs = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut current: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { .. }) => current = Some(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = current.as_mut() {
                    title.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(title) = current.take() {
                    let base = slug::slugify(&title);
                    let count = seen.entry(base.clone()).or_insert(0);
                    let slug = if *count == 0 {
                        base
                    } else {
                        format!("{base}-{count}")
                    };
                    *count += 1;
                    slugs.push(slug);
                }
            }
            _ => {}
        }
    }
    slugs
}

fn attach_heading_ids(events: Vec<Event>) -> Vec<Event> {
    let mut slugs = heading_slugs(&events).into_iter();
    events
        .into_iter()
        .map(|event| match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let slug = slugs.next();
                let id = id.or_else(|| slug.map(|s| CowStr::Boxed(s.into_boxed_str())));
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                })
            }
            other => other,
        })
        .collect()
}
