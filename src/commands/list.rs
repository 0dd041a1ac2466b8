//! List site content

use anyhow::{bail, Result};
use chrono::Utc;

use crate::content::ContentLoader;
use crate::index::SiteIndex;
use crate::Site;

/// List site content by type
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    let loader = ContentLoader::new(site)?;

    match content_type {
        "post" | "posts" => {
            let posts = loader.load_posts();
            let index = SiteIndex::build(posts.items, &site.config, Utc::now());
            println!("Posts ({}):", index.len());
            for post in index.posts() {
                println!(
                    "  {} - {} [{}]",
                    post.date.format("%Y-%m-%d"),
                    post.title,
                    post.source
                );
            }
            report_failures(&posts.failures);
        }
        "draft" | "drafts" => {
            let posts = loader.load_posts();
            let mut drafts: Vec<_> = posts.items.iter().filter(|p| p.draft).collect();
            drafts.sort_by(|a, b| b.date.cmp(&a.date));
            println!("Drafts ({}):", drafts.len());
            for post in drafts {
                println!(
                    "  {} - {} [{}]",
                    post.date.format("%Y-%m-%d"),
                    post.title,
                    post.source
                );
            }
            report_failures(&posts.failures);
        }
        "page" | "pages" => {
            let pages = loader.load_pages();
            println!("Pages ({}):", pages.items.len());
            for page in &pages.items {
                let draft = if page.draft { " (draft)" } else { "" };
                println!("  {} -> {}{} [{}]", page.title, page.path, draft, page.source);
            }
            report_failures(&pages.failures);
        }
        "tag" | "tags" => {
            let posts = loader.load_posts();
            let index = SiteIndex::build(posts.items, &site.config, Utc::now());
            let mut tags: Vec<_> = index.tags().iter().collect();
            tags.sort_by(|a, b| b.count().cmp(&a.count()).then_with(|| a.name.cmp(&b.name)));
            println!("Tags ({}):", tags.len());
            for tag in tags {
                println!("  {} ({})", tag.name, tag.count());
            }
        }
        "photo" | "photos" => {
            let photos = loader.load_photos()?;
            println!("Photos ({}):", photos.len());
            for photo in photos {
                let date = photo
                    .parsed_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or(photo.date);
                println!("  {} - {} [{}]", date, photo.caption, photo.url);
            }
        }
        _ => {
            bail!(
                "Unknown type: {}. Available: posts, drafts, pages, tags, photos",
                content_type
            );
        }
    }

    Ok(())
}

fn report_failures(failures: &[crate::content::LoadFailure]) {
    if !failures.is_empty() {
        println!("Failed ({}):", failures.len());
        for failure in failures {
            println!("  {}", failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use tempfile::TempDir;

    #[test]
    fn test_list_rejects_unknown_type() {
        let dir = TempDir::new().unwrap();
        let site = Site::with_config(dir.path(), SiteConfig::default());
        assert!(run(&site, "posts").is_ok());
        assert!(run(&site, "categories").is_err());
    }
}
