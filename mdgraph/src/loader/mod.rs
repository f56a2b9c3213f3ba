//! Loading a content root: documents are read and parsed concurrently, then
//! folded in file order into the field registry, the store and the schema.

use crate::assets::{
    self, build_image_map, folder_images, image_files, markdown_files, relative_path,
    rewrite_image_srcs, ImageMap, ImageResolver,
};
use crate::config::Config;
use crate::document::{parse_document, MarkdownRenderer, ParsedDocument};
use crate::error::{MdGraphError, Result};
use crate::inference::SchemaFieldRegistry;
use crate::resolvers::Resolvers;
use crate::schema::TypeDefs;
use crate::store::ContentStore;
use log::{debug, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Rewrites a file's raw text before it is parsed. Receives the content root
/// and the raw text.
pub type ReplaceContents = Arc<dyn Fn(&Path, &str) -> String + Send + Sync>;

/// What to load and how.
#[derive(Clone)]
pub struct LoadOptions {
    pub content_root: PathBuf,
    pub config: Config,
    /// Overrides the image strategy from `config`.
    pub image_resolver: Option<Arc<dyn ImageResolver>>,
    pub replace_contents: Option<ReplaceContents>,
}

impl LoadOptions {
    /// Default settings for `content_root`.
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        LoadOptions {
            content_root: content_root.into(),
            config: Config::default(),
            image_resolver: None,
            replace_contents: None,
        }
    }

    /// Settings from the content root's `mdgraph.yaml`, if any.
    pub fn discover(content_root: impl Into<PathBuf>) -> Result<Self> {
        let content_root = content_root.into();
        let config = Config::discover(&content_root)?;
        Ok(LoadOptions {
            config,
            ..LoadOptions::new(content_root)
        })
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_image_resolver(mut self, resolver: impl ImageResolver + 'static) -> Self {
        self.image_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_replace_contents<F>(mut self, replace: F) -> Self
    where
        F: Fn(&Path, &str) -> String + Send + Sync + 'static,
    {
        self.replace_contents = Some(Arc::new(replace));
        self
    }
}

/// The result of a load: the spliced schema and the resolvers serving it.
#[derive(Clone)]
pub struct PublishedSchema {
    pub type_defs: TypeDefs,
    pub resolvers: Resolvers,
    pub file_count: usize,
    pub registry: SchemaFieldRegistry,
}

/// Per-document work shared by every load task.
struct DocumentContext {
    root: PathBuf,
    image_formats: Vec<String>,
    image_map: ImageMap,
    renderer: MarkdownRenderer,
    replace_contents: Option<ReplaceContents>,
}

async fn load_document(context: Arc<DocumentContext>, path: PathBuf) -> Result<ParsedDocument> {
    let root = &context.root;
    let raw = tokio::fs::read_to_string(&path).await?;
    let raw = match &context.replace_contents {
        Some(replace) => replace(root, &raw),
        None => raw,
    };

    let source = relative_path(root, &path);
    let asset_dir = assets::asset_dir(root, &path);
    let mut document = parse_document(&source, &asset_dir, &raw, &context.renderer)?;

    let images = match path.parent() {
        Some(dir) => folder_images(dir, &context.image_formats)?,
        None => Vec::new(),
    };
    document.item.html = rewrite_image_srcs(&document.item.html, &images, &context.image_map);
    document.item.images = images.iter().map(|image| relative_path(root, image)).collect();
    Ok(document)
}

/// Await every task in order. On the first failure the remaining tasks are
/// aborted and the error returned.
async fn join_in_order<T>(handles: Vec<JoinHandle<Result<T>>>) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(handles.len());
    let mut handles = handles.into_iter();
    while let Some(handle) = handles.next() {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(MdGraphError::Other(format!("Load task failed: {e}"))),
        };
        match outcome {
            Ok(value) => results.push(value),
            Err(e) => {
                for rest in handles {
                    rest.abort();
                }
                return Err(e);
            }
        }
    }
    Ok(results)
}

/// Load every markdown file under the content root into `store` and publish
/// the schema inferred from their front-matter.
///
/// Any document error aborts the load before anything is inserted.
pub async fn load_markdown(options: LoadOptions, store: Arc<ContentStore>) -> Result<PublishedSchema> {
    let root = options.content_root.clone();
    if !root.is_dir() {
        return Err(MdGraphError::Other(format!(
            "Content root does not exist: {}",
            root.display()
        )));
    }
    let config = &options.config;

    let resolver = match &options.image_resolver {
        Some(resolver) => Arc::clone(resolver),
        None => config.image_resolver()?,
    };
    let images = image_files(&root, &config.image_formats)?;
    debug!("Resolving {} image(s)", images.len());
    let image_map = build_image_map(&root, images, resolver).await?;

    let files = markdown_files(&root, &config.markdown_extensions)?;
    let context = Arc::new(DocumentContext {
        root: root.clone(),
        image_formats: config.image_formats.clone(),
        image_map,
        renderer: MarkdownRenderer::new(),
        replace_contents: options.replace_contents.clone(),
    });
    let handles: Vec<_> = files
        .iter()
        .map(|path| tokio::spawn(load_document(Arc::clone(&context), path.clone())))
        .collect();
    let documents = join_in_order(handles).await?;

    let mut registry = SchemaFieldRegistry::new();
    let mut seen_ids: HashMap<&str, &str> = HashMap::new();
    for document in &documents {
        registry.merge(&document.fields)?;
        let source = document.fields.source.as_str();
        if let Some(previous) = seen_ids.insert(document.item.id.as_str(), source) {
            return Err(MdGraphError::DuplicateId {
                id: document.item.id.clone(),
                file: source.to_string(),
                previous_file: previous.to_string(),
            });
        }
    }

    let type_defs = config
        .base_type_defs(&root)?
        .splice(registry.field_definitions(), &config.splice_targets)?;

    let items = documents
        .iter()
        .map(|document| document.item.to_value())
        .collect::<Result<Vec<_>>>()?;
    store.insert(&items)?;

    info!(
        "Loaded {} markdown file(s) from {}, {} front-matter field(s)",
        documents.len(),
        root.display(),
        registry.len()
    );

    Ok(PublishedSchema {
        type_defs,
        resolvers: Resolvers::new(store),
        file_count: documents.len(),
        registry,
    })
}
