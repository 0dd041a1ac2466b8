//! Create a new post or page

use anyhow::{bail, Result};
use std::fs;
use std::path::PathBuf;

use crate::Site;

/// Where `new` writes and what it puts in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Under the posts directory, starting as a draft
    Post,
    /// Anywhere else under the content directory
    Page,
}

/// Create a new post or page; returns the file written.
///
/// `path` is relative to the posts directory (posts) or the content
/// directory (pages), without the `.md` extension. It defaults to the
/// slugified title.
pub fn create(site: &Site, title: &str, kind: Kind, path: Option<&str>) -> Result<PathBuf> {
    let slug = slug::slugify(title);
    let name = match path {
        Some(p) => p.trim_matches('/').trim_end_matches(".md").to_string(),
        None if !slug.is_empty() => slug,
        None => bail!("cannot derive a file name from title `{}`, pass --path", title),
    };
    if name.split('/').any(|part| part == "..") {
        bail!("path `{}` leaves the content directory", name);
    }

    let dir = match kind {
        Kind::Post => &site.posts_dir,
        Kind::Page => &site.content_dir,
    };
    let file_path = dir.join(format!("{}.md", name));

    if file_path.exists() {
        bail!("File already exists: {:?}", file_path);
    }
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tz = site.config.tz()?;
    let now = chrono::Utc::now().with_timezone(&tz);
    let title_yaml = serde_yaml::to_string(title)?;
    let mut content = format!(
        "---\ntitle: {}\ndate: {}\n",
        title_yaml.trim_end(),
        now.format("%Y-%m-%d %H:%M:%S")
    );
    if kind == Kind::Post {
        content.push_str("tags: []\ndraft: true\n");
    }
    content.push_str("---\n\n");

    fs::write(&file_path, content)?;
    tracing::info!("Created: {:?}", file_path);

    Ok(file_path)
}
