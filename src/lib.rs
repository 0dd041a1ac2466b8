//! quill: a small static site generator for a Markdown personal blog
//!
//! Posts and pages are Markdown files with front matter. They are loaded,
//! indexed newest first with drafts left out, rendered through Tera
//! templates and written out as a tree of static files.

pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod index;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Name of the site configuration file in the site root
pub const CONFIG_FILE: &str = "config.yml";

/// A site on disk: its configuration and resolved directories
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Markdown content (pages, and posts below `posts_dir`)
    pub content_dir: PathBuf,
    pub posts_dir: PathBuf,
    /// Data files such as the photo index
    pub data_dir: PathBuf,
    /// Copied into the output as-is
    pub static_dir: PathBuf,
    /// Template overrides
    pub layouts_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
}

impl Site {
    /// Open the site rooted at `base_dir`, reading `config.yml` when present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let config_path = base_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            tracing::warn!("No {} in {:?}, using defaults", CONFIG_FILE, base_dir);
            config::SiteConfig::default()
        };
        config.validate()?;

        Ok(Self::with_config(base_dir, config))
    }

    /// Resolve the directories of `config` against `base_dir`
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let content_dir = base_dir.join(&config.content_dir);
        let posts_dir = content_dir.join(&config.posts_dir);

        Self {
            data_dir: base_dir.join(&config.data_dir),
            static_dir: base_dir.join(&config.static_dir),
            layouts_dir: base_dir.join(&config.layouts_dir),
            public_dir: base_dir.join(&config.public_dir),
            content_dir,
            posts_dir,
            base_dir,
            config,
        }
    }

    /// Build the site once
    pub fn build(&self) -> Result<generator::BuildReport> {
        commands::build::run(self)
    }

    /// Remove the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_site_dirs() {
        let site = Site::with_config("/srv/blog", config::SiteConfig::default());
        assert_eq!(site.content_dir, PathBuf::from("/srv/blog/content"));
        assert_eq!(site.posts_dir, PathBuf::from("/srv/blog/content/posts"));
        assert_eq!(site.public_dir, PathBuf::from("/srv/blog/public"));
    }

    #[test]
    fn test_site_new_reads_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "title: Notes\npublic_dir: out\n",
        )
        .unwrap();
        let site = Site::new(dir.path()).unwrap();
        assert_eq!(site.config.title, "Notes");
        assert_eq!(site.public_dir, dir.path().join("out"));
    }

    #[test]
    fn test_site_new_rejects_bad_config() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "permalink: /:year/\n").unwrap();
        assert!(Site::new(dir.path()).is_err());
    }
}
