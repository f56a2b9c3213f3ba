//! Content root discovery and image handling.

use crate::error::{MdGraphError, Result};
use base64::Engine as _;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Image path to the `src` that replaces it in rendered HTML.
pub type ImageMap = HashMap<PathBuf, String>;

// ── Discovery ───────────────────────────────────────────────────

fn glob_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = glob::glob(pattern)
        .map_err(|e| MdGraphError::Other(format!("Glob error: {e}")))?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();
    Ok(files)
}

fn glob_extensions(dir: &Path, recursive: bool, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&dir.display().to_string());
    let mut files = Vec::new();
    for ext in extensions {
        let pattern = if recursive {
            format!("{base}/**/*.{ext}")
        } else {
            format!("{base}/*.{ext}")
        };
        files.extend(glob_files(&pattern)?);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Markdown files under `root`, sorted by path.
pub fn markdown_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    glob_extensions(root, true, extensions)
}

/// Images anywhere under `root`, sorted by path.
pub fn image_files(root: &Path, formats: &[String]) -> Result<Vec<PathBuf>> {
    glob_extensions(root, true, formats)
}

/// Images directly inside `dir`.
pub fn folder_images(dir: &Path, formats: &[String]) -> Result<Vec<PathBuf>> {
    glob_extensions(dir, false, formats)
}

/// `path` relative to `root`, `/`-separated.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Folder of `file` relative to `root`; empty for files at the root.
pub fn asset_dir(root: &Path, file: &Path) -> String {
    match file.parent() {
        Some(parent) => relative_path(root, parent),
        None => String::new(),
    }
}

// ── Image resolvers ─────────────────────────────────────────────

/// Produces the `src` an image is served under.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, root: &Path, image: &Path) -> Result<String>;
}

impl<F> ImageResolver for F
where
    F: Fn(&Path, &Path) -> Result<String> + Send + Sync,
{
    fn resolve(&self, root: &Path, image: &Path) -> Result<String> {
        self(root, image)
    }
}

/// Embeds images as `data:` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Images;

impl ImageResolver for Base64Images {
    fn resolve(&self, _root: &Path, image: &Path) -> Result<String> {
        let bytes = std::fs::read(image)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(format!("data:{};base64,{encoded}", image_mime(image)))
    }
}

/// Serves images under their path relative to the content root.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepImages;

impl ImageResolver for KeepImages {
    fn resolve(&self, root: &Path, image: &Path) -> Result<String> {
        Ok(relative_path(root, image))
    }
}

/// Serves images under a URL prefix, e.g. a CDN.
#[derive(Debug, Clone, Default)]
pub struct PrefixImages {
    pub prefix: String,
}

impl ImageResolver for PrefixImages {
    fn resolve(&self, root: &Path, image: &Path) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.prefix.trim_end_matches('/'),
            relative_path(root, image)
        ))
    }
}

pub fn image_mime(image: &Path) -> String {
    let ext = image
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "svg" => "image/svg+xml".to_string(),
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "" => "application/octet-stream".to_string(),
        other => format!("image/{other}"),
    }
}

/// Resolve every image on the blocking pool, concurrently.
pub async fn build_image_map(
    root: &Path,
    images: Vec<PathBuf>,
    resolver: Arc<dyn ImageResolver>,
) -> Result<ImageMap> {
    let handles: Vec<_> = images
        .into_iter()
        .map(|image| {
            let root = root.to_path_buf();
            let resolver = Arc::clone(&resolver);
            tokio::task::spawn_blocking(move || {
                let src = resolver.resolve(&root, &image)?;
                Ok::<_, MdGraphError>((image, src))
            })
        })
        .collect();

    let mut map = ImageMap::with_capacity(handles.len());
    for handle in handles {
        let (image, src) = handle
            .await
            .map_err(|e| MdGraphError::Other(format!("Image task failed: {e}")))??;
        map.insert(image, src);
    }
    Ok(map)
}

// ── Rewriting ───────────────────────────────────────────────────

static IMG_SRC_REGEX: OnceLock<Regex> = OnceLock::new();

fn img_src_regex() -> &'static Regex {
    IMG_SRC_REGEX.get_or_init(|| Regex::new(r#"(<img\b[^>]*?\bsrc=")([^"]*)(")"#).unwrap())
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Point `<img src>` attributes naming one of `images` (by file name) at the
/// mapped value. Other images are left alone.
pub fn rewrite_image_srcs(html: &str, images: &[PathBuf], map: &ImageMap) -> String {
    let by_name: HashMap<String, &String> = images
        .iter()
        .filter_map(|image| {
            let name = image.file_name()?.to_string_lossy().to_string();
            map.get(image).map(|src| (name, src))
        })
        .collect();
    if by_name.is_empty() {
        return html.to_string();
    }

    img_src_regex()
        .replace_all(html, |caps: &Captures| {
            let src = &caps[2];
            let name = src
                .split(['?', '#'])
                .next()
                .unwrap_or(src)
                .rsplit('/')
                .next()
                .unwrap_or(src);
            match by_name.get(name) {
                Some(mapped) => format!("{}{}{}", &caps[1], escape_attribute(mapped), &caps[3]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
