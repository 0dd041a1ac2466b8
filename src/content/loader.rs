//! Content loader - loads posts, pages and photos from the site directory

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use glob::Pattern;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::frontmatter::parse_date_string;
use super::{FrontMatter, MarkdownRenderer, Page, Permalink, Photo, Post};
use crate::error::ContentError;
use crate::helpers::{
    full_url_for, html_escape, plain_text, reading_time, truncate_words, url_for, word_count,
};
use crate::Site;

/// Name of the photo index data file inside the data directory
pub const PHOTOS_FILE: &str = "photos.yml";

/// A content file that could not be turned into a page
#[derive(Debug)]
pub struct LoadFailure {
    pub source: PathBuf,
    pub error: anyhow::Error,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.source.display(), self.error)
    }
}

/// Items loaded from a directory, plus the files that failed
#[derive(Debug)]
pub struct LoadResult<T> {
    pub items: Vec<T>,
    pub failures: Vec<LoadFailure>,
}

impl<T> Default for LoadResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Loads content from the content directory
pub struct ContentLoader<'a> {
    site: &'a Site,
    renderer: MarkdownRenderer,
    permalink: Permalink,
    tz: Tz,
    ignore: Vec<Pattern>,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader
    pub fn new(site: &'a Site) -> Result<Self> {
        let renderer = MarkdownRenderer::with_options(&site.config.highlight);
        let permalink = Permalink::parse(&site.config.permalink)?;
        let tz = site.config.tz()?;
        let ignore = site
            .config
            .ignore_files
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!("Ignoring invalid ignore_files pattern `{}`: {}", p, e);
                    None
                }
            })
            .collect();

        Ok(Self {
            site,
            renderer,
            permalink,
            tz,
            ignore,
        })
    }

    /// Load every post under the posts directory, drafts included
    pub fn load_posts(&self) -> LoadResult<Post> {
        let mut result = LoadResult::default();
        if !self.site.posts_dir.exists() {
            tracing::debug!("No posts directory at {:?}", self.site.posts_dir);
            return result;
        }

        for path in self.markdown_files(&self.site.posts_dir, None) {
            match self.load_post(&path) {
                Ok(post) => result.items.push(post),
                Err(error) => {
                    tracing::error!("Failed to load post {:?}: {:#}", path, error);
                    result.failures.push(LoadFailure {
                        source: path,
                        error,
                    });
                }
            }
        }

        tracing::debug!(
            "Loaded {} posts ({} failed)",
            result.items.len(),
            result.failures.len()
        );
        result
    }

    /// Load a single post from a file
    pub fn load_post(&self, path: &Path) -> Result<Post> {
        let content = fs::read_to_string(path).map_err(|e| ContentError::io(path, e))?;
        let (fm, body) = FrontMatter::parse(&content)?;

        let date = match fm.parse_date(&self.tz)? {
            Some(date) => date,
            None => {
                tracing::debug!("{:?} has no date, using its modification time", path);
                self.file_mtime(path)?
            }
        };
        let updated = fm.parse_updated(&self.tz)?;

        let stem = file_stem(path);
        let title = fm.title.clone().unwrap_or_else(|| stem.clone());
        let slug = match fm.slug.as_deref() {
            Some(s) if !s.trim().is_empty() => slug::slugify(s),
            _ => slug::slugify(&stem),
        };

        if slug.is_empty() {
            bail!("slug is empty after slugifying; set a `slug` made of letters or digits");
        }

        let path_on_site = self.permalink.expand(&date, &slug, &title);

        let (marked_summary, full_md) = MarkdownRenderer::split_summary(body);
        let content_html = self
            .renderer
            .render(&full_md)
            .with_context(|| format!("failed to render {:?}", path))?;
        let text = plain_text(&content_html);
        let words = word_count(&text);

        let (summary, truncated) = match (marked_summary, fm.summary.as_deref()) {
            // A marker at the very end leaves nothing more to read
            (Some(md), _) => (self.renderer.render(&md)?, full_md.trim() != md),
            (None, Some(md)) => (self.renderer.render(md)?, true),
            (None, None) => {
                let (cut, was_cut) = truncate_words(&text, self.site.config.summary_length);
                if cut.is_empty() {
                    (String::new(), false)
                } else if was_cut {
                    (format!("<p>{}…</p>", html_escape(&cut)), true)
                } else {
                    (format!("<p>{}</p>", html_escape(&cut)), false)
                }
            }
        };

        let mut post = Post::new(title, date, self.relative_source(path));
        post.updated = updated;
        post.draft = fm.is_draft();
        post.slug = slug;
        post.tags = fm
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        post.full_source = path.to_path_buf();
        post.url = url_for(&self.site.config, &path_on_site);
        post.permalink = full_url_for(&self.site.config, &path_on_site);
        post.path = path_on_site;
        post.content = content_html;
        post.summary = summary;
        post.truncated = truncated;
        post.word_count = words;
        post.reading_time = reading_time(words);
        post.layout = fm.layout.unwrap_or_else(|| "post".to_string());
        post.extra = fm.extra;

        Ok(post)
    }

    /// Load all standalone pages (markdown outside the posts directory)
    pub fn load_pages(&self) -> LoadResult<Page> {
        let mut result = LoadResult::default();
        if !self.site.content_dir.exists() {
            return result;
        }

        for path in self.markdown_files(&self.site.content_dir, Some(self.site.posts_dir.as_path())) {
            match self.load_page(&path) {
                Ok(page) => result.items.push(page),
                Err(error) => {
                    tracing::error!("Failed to load page {:?}: {:#}", path, error);
                    result.failures.push(LoadFailure {
                        source: path,
                        error,
                    });
                }
            }
        }

        result
    }

    /// Load a single page from a file
    pub fn load_page(&self, path: &Path) -> Result<Page> {
        let content = fs::read_to_string(path).map_err(|e| ContentError::io(path, e))?;
        let (fm, body) = FrontMatter::parse(&content)?;

        let date = match fm.parse_date(&self.tz)? {
            Some(date) => date,
            None => self.file_mtime(path)?,
        };
        let updated = fm.parse_updated(&self.tz)?;
        let title = fm.title.clone().unwrap_or_else(|| file_stem(path));

        let relative = path.strip_prefix(&self.site.content_dir).unwrap_or(path);
        let path_on_site = super::permalink::page_path(relative);

        // `<!--more-->` means nothing on a page; drop the marker
        let (_, full_md) = MarkdownRenderer::split_summary(body);
        let content_html = self
            .renderer
            .render(&full_md)
            .with_context(|| format!("failed to render {:?}", path))?;

        let mut page = Page::new(title, date, self.relative_source(path));
        page.updated = updated;
        page.draft = fm.is_draft();
        page.full_source = path.to_path_buf();
        page.url = url_for(&self.site.config, &path_on_site);
        page.permalink = full_url_for(&self.site.config, &path_on_site);
        page.path = path_on_site;
        page.content = content_html;
        page.layout = fm.layout.unwrap_or_else(|| "page".to_string());
        page.extra = fm.extra;

        Ok(page)
    }

    /// Load the photo index, newest first. A missing file is an empty index.
    pub fn load_photos(&self) -> Result<Vec<Photo>> {
        let path = self.site.data_dir.join(PHOTOS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&path).with_context(|| format!("failed to read {:?}", path))?;
        let mut photos: Vec<Photo> = serde_yaml::from_str::<Option<Vec<Photo>>>(&content)
            .with_context(|| format!("failed to parse {:?}", path))?
            .unwrap_or_default();

        for photo in &mut photos {
            let parsed = parse_date_string(&photo.date, &self.tz).ok_or_else(|| {
                ContentError::InvalidDate {
                    value: photo.date.clone(),
                }
            })?;
            photo.parsed_date = Some(parsed);
            if !photo.url.contains("://") {
                photo.url = url_for(&self.site.config, &photo.url);
            }
        }

        photos.sort_by(|a, b| b.parsed_date.cmp(&a.parsed_date));
        Ok(photos)
    }

    /// Markdown files under `root`, sorted, minus hidden, underscored and ignored entries
    fn markdown_files(&self, root: &Path, exclude: Option<&Path>) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_hidden(e) && Some(e.path()) != exclude)
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_markdown_file(e.path()))
            .map(|e| e.into_path())
            .filter(|p| !self.is_ignored(p))
            .collect();
        files.sort();
        files
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.site.content_dir).unwrap_or(path);
        let ignored = self.ignore.iter().any(|p| p.matches_path(relative));
        if ignored {
            tracing::debug!("Skipping ignored file {:?}", relative);
        }
        ignored
    }

    fn relative_source(&self, path: &Path) -> String {
        path.strip_prefix(&self.site.content_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn file_mtime(&self, path: &Path) -> Result<DateTime<FixedOffset>> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| ContentError::io(path, e))?;
        Ok(DateTime::<Utc>::from(modified)
            .with_timezone(&self.tz)
            .fixed_offset())
    }
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

/// Dotfiles, and `_`-prefixed directories (but not `_index.md`)
fn is_hidden(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && name.starts_with('_'))
}

/// File stem, or the parent directory name for `index.md` bundles
fn file_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");
    if stem == "index" {
        if let Some(parent) = path.parent().and_then(|p| p.file_name()).and_then(|s| s.to_str()) {
            return parent.to_string();
        }
    }
    stem.to_string()
}
