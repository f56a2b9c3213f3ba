use crate::assets::{Base64Images, ImageResolver, KeepImages, PrefixImages};
use crate::error::{MdGraphError, Result};
use crate::schema::{TypeDefs, DEFAULT_SPLICE_TARGETS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Name of the optional config file at the content root.
pub const CONFIG_FILE: &str = "mdgraph.yaml";

/// How image references in rendered HTML are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStrategy {
    /// Inline the image as a `data:` URI.
    #[default]
    Base64,
    /// Path relative to the content root.
    Keep,
    /// `image_url_prefix` joined with the path relative to the content root.
    Prefix,
}

/// Loader settings, read from `mdgraph.yaml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub markdown_extensions: Vec<String>,
    pub image_formats: Vec<String>,
    pub images: ImageStrategy,
    pub image_url_prefix: Option<String>,
    /// Schema types that receive inferred fields.
    pub splice_targets: Vec<String>,
    /// Base schema file, relative to the content root. Defaults to the
    /// bundled `ContentItem` schema.
    pub type_defs: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            markdown_extensions: vec!["md".into(), "markdown".into()],
            image_formats: ["png", "jpg", "jpeg", "gif", "svg", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            images: ImageStrategy::default(),
            image_url_prefix: None,
            splice_targets: DEFAULT_SPLICE_TARGETS.iter().map(|s| s.to_string()).collect(),
            type_defs: None,
        }
    }
}

impl FromStr for Config {
    type Err = MdGraphError;

    fn from_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

impl Config {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// The content root's `mdgraph.yaml`, or the defaults when there is none.
    pub fn discover(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            log::debug!("Using config {}", path.display());
            Self::load(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// The resolver for the configured image strategy.
    pub fn image_resolver(&self) -> Result<Arc<dyn ImageResolver>> {
        Ok(match self.images {
            ImageStrategy::Base64 => Arc::new(Base64Images),
            ImageStrategy::Keep => Arc::new(KeepImages),
            ImageStrategy::Prefix => {
                let prefix = self.image_url_prefix.clone().ok_or_else(|| {
                    MdGraphError::Other(
                        "images: prefix requires image_url_prefix to be set".into(),
                    )
                })?;
                Arc::new(PrefixImages { prefix })
            }
        })
    }

    /// The base schema for a content root.
    pub fn base_type_defs(&self, root: &Path) -> Result<TypeDefs> {
        match &self.type_defs {
            Some(path) => TypeDefs::load(&root.join(path)),
            None => TypeDefs::content_item(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.markdown_extensions, vec!["md", "markdown"]);
        assert_eq!(config.splice_targets, vec!["ContentItem", "ContentItemFields"]);
        assert_eq!(config.images, ImageStrategy::Base64);
    }

    #[test]
    fn test_partial_config() {
        let config: Config = "images: prefix\nimage_url_prefix: https://cdn.example.com\nmarkdown_extensions: [mdx]\n"
            .parse()
            .unwrap();
        assert_eq!(config.images, ImageStrategy::Prefix);
        assert_eq!(config.markdown_extensions, vec!["mdx"]);
        assert_eq!(config.image_formats.len(), 6);
        assert!(config.image_resolver().is_ok());
    }

    #[test]
    fn test_prefix_requires_url() {
        let config: Config = "images: prefix\n".parse().unwrap();
        assert!(config.image_resolver().is_err());
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!("images: upload\n".parse::<Config>().is_err());
    }

    #[test]
    fn test_discover() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(Config::discover(tmp.path()).unwrap(), Config::default());

        std::fs::write(tmp.path().join(CONFIG_FILE), "images: keep\n").unwrap();
        assert_eq!(Config::discover(tmp.path()).unwrap().images, ImageStrategy::Keep);
    }

    #[test]
    fn test_custom_type_defs() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("schema.graphql"), "type ContentItem { id: ID! }\n").unwrap();
        let config: Config = "type_defs: schema.graphql\n".parse().unwrap();
        let defs = config.base_type_defs(tmp.path()).unwrap();
        assert!(defs.type_definition("ContentItem").is_some());
        assert!(defs.type_definition("Query").is_none());
    }
}
