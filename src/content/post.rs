//! Post, Page and Photo models

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A blog post
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// Post title
    pub title: String,

    /// Publication date
    pub date: DateTime<FixedOffset>,

    /// Last updated date
    pub updated: Option<DateTime<FixedOffset>>,

    /// Excluded from published listings
    pub draft: bool,

    /// URL-friendly name
    pub slug: String,

    /// Post tags
    pub tags: Vec<String>,

    /// Source file path (relative to the content directory)
    pub source: String,

    /// Full source file path
    #[serde(skip)]
    pub full_source: PathBuf,

    /// Site-relative path, `/2021/03/slug/`
    pub path: String,

    /// Link target including the base_url path prefix
    pub url: String,

    /// Absolute URL
    pub permalink: String,

    /// Rendered HTML content
    pub content: String,

    /// Rendered HTML summary
    pub summary: String,

    /// The summary is shorter than the full content
    pub truncated: bool,

    pub word_count: usize,

    /// Minutes
    pub reading_time: usize,

    /// Layout template to use
    pub layout: String,

    /// Custom front-matter fields
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Post {
    /// Create a new post with minimal required fields
    pub fn new(title: String, date: DateTime<FixedOffset>, source: String) -> Self {
        let slug = slug::slugify(&title);
        Self {
            title,
            date,
            updated: None,
            draft: false,
            slug,
            tags: Vec::new(),
            full_source: PathBuf::from(&source),
            source,
            path: String::new(),
            url: String::new(),
            permalink: String::new(),
            content: String::new(),
            summary: String::new(),
            truncated: false,
            word_count: 0,
            reading_time: 0,
            layout: "post".to_string(),
            extra: HashMap::new(),
        }
    }

    /// Date used for "last modified" in feeds and the sitemap
    pub fn lastmod(&self) -> DateTime<FixedOffset> {
        self.updated.unwrap_or(self.date).max(self.date)
    }
}

/// A standalone page
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// Page title
    pub title: String,

    /// Creation date
    pub date: DateTime<FixedOffset>,

    /// Last updated date
    pub updated: Option<DateTime<FixedOffset>>,

    /// Excluded from the build unless drafts are enabled
    pub draft: bool,

    /// Source file path (relative to the content directory)
    pub source: String,

    /// Full source file path
    #[serde(skip)]
    pub full_source: PathBuf,

    /// Site-relative path, `/about/`
    pub path: String,

    /// Link target including the base_url path prefix
    pub url: String,

    /// Absolute URL
    pub permalink: String,

    /// Rendered HTML content
    pub content: String,

    /// Layout template to use
    pub layout: String,

    /// Custom front-matter fields
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Page {
    /// Create a new page with minimal required fields
    pub fn new(title: String, date: DateTime<FixedOffset>, source: String) -> Self {
        Self {
            title,
            date,
            updated: None,
            draft: false,
            full_source: PathBuf::from(&source),
            source,
            path: String::new(),
            url: String::new(),
            permalink: String::new(),
            content: String::new(),
            layout: "page".to_string(),
            extra: HashMap::new(),
        }
    }
}

/// One entry of the photo index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    /// Image location, absolute or site-relative
    pub url: String,

    pub caption: String,

    /// Kept as written; validated and normalized by the loader
    pub date: String,

    /// Optional page the photo links to (album, original post)
    #[serde(default)]
    pub link: Option<String>,

    #[serde(skip_deserializing)]
    pub parsed_date: Option<DateTime<FixedOffset>>,
}

/// A tag with the published posts carrying it
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub name: String,
    pub slug: String,
    /// Site-relative path, `/tags/rust/`
    pub path: String,
    pub url: String,
    pub permalink: String,
    /// Indices into the site index, in index order
    #[serde(skip)]
    pub posts: Vec<usize>,
}

impl Tag {
    pub fn new(name: &str, tag_dir: &str) -> Self {
        let slug = slug::slugify(name);
        let path = format!("/{}/{}/", tag_dir.trim_matches('/'), slug);
        Self {
            name: name.to_string(),
            slug,
            path,
            url: String::new(),
            permalink: String::new(),
            posts: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.posts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_post_defaults() {
        let date = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap();
        let post = Post::new("Hello, World".to_string(), date, "posts/a.md".to_string());
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.layout, "post");
        assert_eq!(post.lastmod(), date);
    }

    #[test]
    fn test_tag_path() {
        let tag = Tag::new("GraphQL Shield", "tags");
        assert_eq!(tag.slug, "graphql-shield");
        assert_eq!(tag.path, "/tags/graphql-shield/");
        assert_eq!(tag.count(), 0);
    }
}
