//! Site configuration (config.yml)

use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::content::Permalink;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub base_url: String,
    pub permalink: String,

    // Directory
    pub content_dir: String,
    pub posts_dir: String,
    pub data_dir: String,
    pub static_dir: String,
    pub layouts_dir: String,
    pub public_dir: String,
    pub tag_dir: String,
    pub archive_dir: String,
    pub photos_path: String,
    #[serde(default)]
    pub ignore_files: Vec<String>,

    // Writing
    pub build_drafts: bool,
    pub build_future: bool,
    pub summary_length: usize,
    pub date_format: String,
    #[serde(default)]
    pub highlight: HighlightConfig,

    // Listing
    pub per_page: usize,
    pub feed_limit: usize,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            description: String::new(),
            author: String::new(),
            language: "en".to_string(),
            timezone: String::new(),

            base_url: "http://localhost:1313/".to_string(),
            permalink: "/:year/:month/:slug/".to_string(),

            content_dir: "content".to_string(),
            posts_dir: "posts".to_string(),
            data_dir: "data".to_string(),
            static_dir: "static".to_string(),
            layouts_dir: "layouts".to_string(),
            public_dir: "public".to_string(),
            tag_dir: "tags".to_string(),
            archive_dir: "archives".to_string(),
            photos_path: "photos".to_string(),
            ignore_files: Vec::new(),

            build_drafts: false,
            build_future: false,
            summary_length: 70,
            date_format: "MMMM D, YYYY".to_string(),
            highlight: HighlightConfig::default(),

            per_page: 10,
            feed_limit: 20,

            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
        let config: SiteConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Check settings that would otherwise only fail halfway through a build
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            bail!(
                "base_url must be an absolute http(s) URL, got `{}`",
                self.base_url
            );
        }
        Permalink::parse(&self.permalink)?;
        self.tz()?;
        Ok(())
    }

    /// Time zone used for front-matter dates that carry no offset
    pub fn tz(&self) -> Result<Tz> {
        let name = self.timezone.trim();
        if name.is_empty() {
            return Ok(Tz::UTC);
        }
        name.parse::<Tz>()
            .map_err(|e| anyhow!("invalid timezone `{}`: {}", name, e))
    }

    /// Base URL without the trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enable: bool,
    pub theme: String,
    pub line_numbers: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enable: true,
            theme: "InspiredGitHub".to_string(),
            line_numbers: false,
        }
    }
}
