//! Tera templates: an embedded default set, overridable per site
//!
//! The defaults are plain semantic markup. Any `*.html` file in the site's
//! layouts directory replaces the embedded template of the same name or adds
//! a new one (selectable through a page's `layout` front matter).

use anyhow::{Context as _, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tera::{Context, Tera};
use walkdir::WalkDir;

use crate::helpers::{format_date, html_escape, strip_html, truncate_chars};

/// Embedded default templates
const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("default/base.html")),
    ("index.html", include_str!("default/index.html")),
    ("post.html", include_str!("default/post.html")),
    ("page.html", include_str!("default/page.html")),
    ("archive.html", include_str!("default/archive.html")),
    ("tags.html", include_str!("default/tags.html")),
    ("tag.html", include_str!("default/tag.html")),
    ("photos.html", include_str!("default/photos.html")),
    (
        "partials/post_summary.html",
        include_str!("default/partials/post_summary.html"),
    ),
    (
        "partials/pager.html",
        include_str!("default/partials/pager.html"),
    ),
];

/// Template renderer
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Load the embedded templates, then any overrides from `layouts_dir`
    pub fn new(layouts_dir: Option<&Path>) -> Result<Self> {
        let mut sources: BTreeMap<String, String> = DEFAULT_TEMPLATES
            .iter()
            .map(|(name, body)| (name.to_string(), body.to_string()))
            .collect();

        if let Some(dir) = layouts_dir.filter(|d| d.is_dir()) {
            for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some("html")
                {
                    continue;
                }
                let name = path
                    .strip_prefix(dir)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .replace('\\', "/");
                let body = fs::read_to_string(path)
                    .with_context(|| format!("failed to read template {:?}", path))?;
                tracing::debug!("Using layout override {}", name);
                sources.insert(name, body);
            }
        }

        let mut tera = Tera::default();

        // Content fields are already HTML; text fields are escaped in the templates
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(sources.iter().map(|(n, b)| (n.as_str(), b.as_str())))
            .context("failed to compile templates")?;

        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);
        tera.register_filter("date_format", date_format_filter);
        tera.register_filter("escape_attr", escape_attr_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        self.tera
            .render(template_name, context)
            .with_context(|| format!("failed to render template {}", template_name))
    }

    /// Check if a template exists
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(strip_html(&s)))
}

/// Tera filter: escape for an attribute value, leaving `/` intact so URLs stay readable
fn escape_attr_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("escape_attr", "value", String, value);
    Ok(tera::Value::String(html_escape(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "…".to_string(),
    };

    Ok(tera::Value::String(truncate_chars(&s, length, &omission)))
}

/// Tera filter: format an RFC 3339 date with a Moment-style format
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => "YYYY-MM-DD".to_string(),
    };

    let date = chrono::DateTime::parse_from_rfc3339(&s)
        .map_err(|e| tera::Error::msg(format!("date_format: `{}` is not a date: {}", s, e)))?;
    Ok(tera::Value::String(format_date(&date, &format)))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub base_url: String,
    /// Link to the home page, including the base_url path prefix
    pub root: String,
    pub date_format: String,
    pub menu: Vec<MenuItem>,
    pub tags: Vec<TagData>,
    pub extra: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub title: String,
    pub date: String,
    pub updated: Option<String>,
    pub url: String,
    pub permalink: String,
    pub summary: String,
    pub content: String,
    pub truncated: bool,
    pub tags: Vec<TagData>,
    pub word_count: usize,
    pub reading_time: usize,
    pub draft: bool,
    pub extra: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub title: String,
    pub date: String,
    pub updated: Option<String>,
    pub url: String,
    pub permalink: String,
    pub content: String,
    pub extra: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagData {
    pub name: String,
    pub url: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationData {
    pub current: usize,
    pub total: usize,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveYearData {
    pub year: i32,
    pub posts: Vec<PostData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhotoData {
    pub url: String,
    pub caption: String,
    pub date: String,
    pub link: Option<String>,
}
