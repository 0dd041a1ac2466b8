//! Generator module - renders the site index into the public directory

use anyhow::{anyhow, Context as _, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tera::Context;
use walkdir::WalkDir;

use crate::content::{LoadFailure, Page, Photo, Post};
use crate::helpers::{
    escape_xml, full_url_for, plain_text, site_root, strip_invalid_xml_chars, url_for,
};
use crate::index::{SiteIndex, GENERATED_FILES};
use crate::templates::{
    ArchiveYearData, MenuItem, NavPost, PageData, PaginationData, PhotoData, PostData, SiteData,
    TagData, TemplateRenderer,
};
use crate::Site;

/// What a generation run produced
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Files written to the public directory (static files included)
    pub written: usize,
    /// Pages that were skipped
    pub failures: Vec<LoadFailure>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Static site generator using Tera templates
pub struct Generator {
    site: Site,
    renderer: TemplateRenderer,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site) -> Result<Self> {
        let renderer = TemplateRenderer::new(Some(&site.layouts_dir))?;

        Ok(Self {
            site: site.clone(),
            renderer,
        })
    }

    /// Generate the entire site
    pub fn generate(&self, index: &SiteIndex, pages: &[Page], photos: &[Photo]) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        fs::create_dir_all(&self.site.public_dir)
            .with_context(|| format!("failed to create {:?}", self.site.public_dir))?;

        report.written += self.copy_static()?;

        let site_data = self.build_site_data(index, pages, photos);
        let tag_lookup: HashMap<String, TagData> = site_data
            .tags
            .iter()
            .map(|t| (slug::slugify(&t.name), t.clone()))
            .collect();

        self.generate_index_pages(index, &site_data, &tag_lookup, &mut report)?;
        self.generate_post_pages(index, &site_data, &tag_lookup, &mut report);
        self.generate_page_pages(index, pages, &site_data, !photos.is_empty(), &mut report);
        self.generate_archive_page(index, &site_data, &tag_lookup, &mut report)?;
        self.generate_tag_pages(index, &site_data, &tag_lookup, &mut report)?;
        if !photos.is_empty() {
            self.generate_photos_page(photos, &site_data, &mut report)?;
        }

        self.generate_atom_feed(index, &mut report)?;
        self.generate_sitemap(index, pages, !photos.is_empty(), &mut report)?;
        self.generate_search_index(index, &mut report)?;

        tracing::info!(
            "Wrote {} files to {:?}",
            report.written,
            self.site.public_dir
        );
        Ok(report)
    }

    /// Build site data for templates
    fn build_site_data(&self, index: &SiteIndex, pages: &[Page], photos: &[Photo]) -> SiteData {
        let config = &self.site.config;

        let mut menu = vec![
            MenuItem {
                name: "Home".to_string(),
                url: url_for(config, "/"),
            },
            MenuItem {
                name: "Archives".to_string(),
                url: url_for(config, &dir_path(&config.archive_dir)),
            },
            MenuItem {
                name: "Tags".to_string(),
                url: url_for(config, &dir_path(&config.tag_dir)),
            },
        ];
        if !photos.is_empty() {
            menu.push(MenuItem {
                name: "Photos".to_string(),
                url: url_for(config, &dir_path(&config.photos_path)),
            });
        }

        let mut menu_pages: Vec<&Page> = pages
            .iter()
            .filter(|p| self.is_published_page(p))
            .filter(|p| {
                p.extra
                    .get("menu")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false)
            })
            .collect();
        menu_pages.sort_by(|a, b| a.title.cmp(&b.title));
        menu.extend(menu_pages.into_iter().map(|p| MenuItem {
            name: p.title.clone(),
            url: p.url.clone(),
        }));

        let tags = index
            .tags()
            .iter()
            .map(|t| TagData {
                name: t.name.clone(),
                url: t.url.clone(),
                count: t.count(),
            })
            .collect();

        SiteData {
            title: config.title.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            language: config.language.clone(),
            base_url: config.base_url.clone(),
            root: url_for(config, "/"),
            date_format: config.date_format.clone(),
            menu,
            tags,
            extra: config.extra.clone(),
        }
    }

    fn post_data(&self, post: &Post, tag_lookup: &HashMap<String, TagData>, full: bool) -> PostData {
        PostData {
            title: post.title.clone(),
            date: post.date.to_rfc3339(),
            updated: post.updated.map(|d| d.to_rfc3339()),
            url: post.url.clone(),
            permalink: post.permalink.clone(),
            summary: post.summary.clone(),
            content: if full { post.content.clone() } else { String::new() },
            truncated: post.truncated,
            tags: post
                .tags
                .iter()
                .filter_map(|t| tag_lookup.get(&slug::slugify(t)).cloned())
                .collect(),
            word_count: post.word_count,
            reading_time: post.reading_time,
            draft: post.draft,
            extra: post.extra.clone(),
        }
    }

    /// Create a base context with common variables
    fn create_base_context(&self, site_data: &SiteData, current_path: &str) -> Context {
        let mut context = Context::new();
        context.insert("site", site_data);
        context.insert("current_url", &url_for(&self.site.config, current_path));
        context
    }

    /// Generate index pages with pagination
    fn generate_index_pages(
        &self,
        index: &SiteIndex,
        site_data: &SiteData,
        tag_lookup: &HashMap<String, TagData>,
        report: &mut BuildReport,
    ) -> Result<()> {
        let config = &self.site.config;

        for pager in index.paginate(config.per_page) {
            let page_posts: Vec<PostData> = pager
                .posts
                .iter()
                .map(|&i| self.post_data(&index.posts()[i], tag_lookup, false))
                .collect();

            let pagination = PaginationData {
                current: pager.number,
                total: pager.total,
                prev_url: pager.prev.as_deref().map(|p| url_for(config, p)),
                next_url: pager.next.as_deref().map(|p| url_for(config, p)),
            };

            let mut context = self.create_base_context(site_data, &pager.path);
            context.insert("posts", &page_posts);
            context.insert("pagination", &pagination);

            let html = self.renderer.render("index.html", &context)?;
            self.write_page(&pager.path, &html)?;
            report.written += 1;
        }

        Ok(())
    }

    /// Generate individual post pages
    fn generate_post_pages(
        &self,
        index: &SiteIndex,
        site_data: &SiteData,
        tag_lookup: &HashMap<String, TagData>,
        report: &mut BuildReport,
    ) {
        for (i, post) in index.posts().iter().enumerate() {
            let nav = |p: &Post| NavPost {
                title: p.title.clone(),
                url: p.url.clone(),
            };

            let mut context = self.create_base_context(site_data, &post.path);
            context.insert("post", &self.post_data(post, tag_lookup, true));
            if let Some(prev) = index.prev(i) {
                context.insert("prev_post", &nav(prev));
            }
            if let Some(next) = index.next(i) {
                context.insert("next_post", &nav(next));
            }

            let template = self.layout_template(&post.layout, "post.html");
            let result = self
                .renderer
                .render(&template, &context)
                .and_then(|html| self.write_page(&post.path, &html));

            match result {
                Ok(()) => {
                    report.written += 1;
                    tracing::debug!("Generated post: {}", post.path);
                }
                Err(error) => {
                    tracing::error!("Failed to generate {}: {:#}", post.source, error);
                    report.failures.push(LoadFailure {
                        source: post.full_source.clone(),
                        error,
                    });
                }
            }
        }
    }

    fn is_published_page(&self, page: &Page) -> bool {
        !page.draft || self.site.config.build_drafts
    }

    /// Paths owned by generated listings; standalone pages may not take them
    fn reserved_paths(&self, index: &SiteIndex, with_photos: bool) -> HashMap<String, String> {
        let config = &self.site.config;
        let mut reserved: HashMap<String, String> = HashMap::new();

        for pager in index.paginate(config.per_page) {
            reserved.insert(pager.path, "the post listing".to_string());
        }
        for file in GENERATED_FILES {
            reserved.insert(dir_path(file), "a generated file".to_string());
        }
        reserved.insert(dir_path(&config.archive_dir), "the archive".to_string());
        reserved.insert(dir_path(&config.tag_dir), "the tag index".to_string());
        for tag in index.tags() {
            reserved.insert(tag.path.clone(), format!("tag {}", tag.name));
        }
        if with_photos {
            reserved.insert(dir_path(&config.photos_path), "the photo index".to_string());
        }
        for post in index.posts() {
            reserved.insert(post.path.clone(), post.source.clone());
        }
        reserved
    }

    /// Generate standalone pages
    fn generate_page_pages(
        &self,
        index: &SiteIndex,
        pages: &[Page],
        site_data: &SiteData,
        with_photos: bool,
        report: &mut BuildReport,
    ) {
        let mut reserved = self.reserved_paths(index, with_photos);

        for page in pages {
            if !self.is_published_page(page) {
                tracing::debug!("Skipping draft page {}", page.source);
                continue;
            }

            if let Some(owner) = reserved.get(&page.path) {
                let error = anyhow!("path {} is already used by {}", page.path, owner);
                tracing::error!("Failed to generate {}: {}", page.source, error);
                report.failures.push(LoadFailure {
                    source: page.full_source.clone(),
                    error,
                });
                continue;
            }
            reserved.insert(page.path.clone(), page.source.clone());

            let page_data = PageData {
                title: page.title.clone(),
                date: page.date.to_rfc3339(),
                updated: page.updated.map(|d| d.to_rfc3339()),
                url: page.url.clone(),
                permalink: page.permalink.clone(),
                content: page.content.clone(),
                extra: page.extra.clone(),
            };

            let mut context = self.create_base_context(site_data, &page.path);
            context.insert("page", &page_data);

            let template = self.layout_template(&page.layout, "page.html");
            let result = self
                .renderer
                .render(&template, &context)
                .and_then(|html| self.write_page(&page.path, &html));

            match result {
                Ok(()) => {
                    report.written += 1;
                    tracing::debug!("Generated page: {}", page.path);
                }
                Err(error) => {
                    tracing::error!("Failed to generate {}: {:#}", page.source, error);
                    report.failures.push(LoadFailure {
                        source: page.full_source.clone(),
                        error,
                    });
                }
            }
        }
    }

    /// `<layout>.html` when such a template exists, else `fallback`
    fn layout_template(&self, layout: &str, fallback: &str) -> String {
        let candidate = format!("{}.html", layout);
        if self.renderer.has_template(&candidate) {
            candidate
        } else {
            tracing::warn!("No template for layout `{}`, using {}", layout, fallback);
            fallback.to_string()
        }
    }

    /// Generate archive page
    fn generate_archive_page(
        &self,
        index: &SiteIndex,
        site_data: &SiteData,
        tag_lookup: &HashMap<String, TagData>,
        report: &mut BuildReport,
    ) -> Result<()> {
        let archive_years: Vec<ArchiveYearData> = index
            .archive()
            .into_iter()
            .map(|year| ArchiveYearData {
                year: year.year,
                posts: year
                    .posts
                    .iter()
                    .map(|&i| self.post_data(&index.posts()[i], tag_lookup, false))
                    .collect(),
            })
            .collect();

        let path = dir_path(&self.site.config.archive_dir);
        let mut context = self.create_base_context(site_data, &path);
        context.insert("archive_years", &archive_years);

        let html = self.renderer.render("archive.html", &context)?;
        self.write_page(&path, &html)?;
        report.written += 1;
        tracing::debug!("Generated archive page");

        Ok(())
    }

    /// Generate the tag index and one page per tag
    fn generate_tag_pages(
        &self,
        index: &SiteIndex,
        site_data: &SiteData,
        tag_lookup: &HashMap<String, TagData>,
        report: &mut BuildReport,
    ) -> Result<()> {
        let tags_path = dir_path(&self.site.config.tag_dir);
        let context = self.create_base_context(site_data, &tags_path);
        let html = self.renderer.render("tags.html", &context)?;
        self.write_page(&tags_path, &html)?;
        report.written += 1;

        for tag in index.tags() {
            let tag_posts: Vec<PostData> = tag
                .posts
                .iter()
                .map(|&i| self.post_data(&index.posts()[i], tag_lookup, false))
                .collect();

            let mut context = self.create_base_context(site_data, &tag.path);
            context.insert(
                "tag",
                &TagData {
                    name: tag.name.clone(),
                    url: tag.url.clone(),
                    count: tag.count(),
                },
            );
            context.insert("posts", &tag_posts);

            let html = self.renderer.render("tag.html", &context)?;
            self.write_page(&tag.path, &html)?;
            report.written += 1;
        }

        tracing::debug!("Generated {} tag pages", index.tags().len());
        Ok(())
    }

    /// Generate the photo index page
    fn generate_photos_page(
        &self,
        photos: &[Photo],
        site_data: &SiteData,
        report: &mut BuildReport,
    ) -> Result<()> {
        let photo_data: Vec<PhotoData> = photos
            .iter()
            .map(|p| PhotoData {
                url: p.url.clone(),
                caption: p.caption.clone(),
                date: p
                    .parsed_date
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|| p.date.clone()),
                link: p.link.clone(),
            })
            .collect();

        let path = dir_path(&self.site.config.photos_path);
        let mut context = self.create_base_context(site_data, &path);
        context.insert("photos", &photo_data);

        let html = self.renderer.render("photos.html", &context)?;
        self.write_page(&path, &html)?;
        report.written += 1;
        tracing::debug!("Generated photo index with {} photos", photos.len());
        Ok(())
    }

    /// Generate Atom feed
    fn generate_atom_feed(&self, index: &SiteIndex, report: &mut BuildReport) -> Result<()> {
        let config = &self.site.config;
        let home = full_url_for(config, "/");
        let limit = if config.feed_limit == 0 {
            usize::MAX
        } else {
            config.feed_limit
        };
        let updated = index
            .posts()
            .iter()
            .map(|p| p.lastmod())
            .max()
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

        let mut feed = String::new();
        feed.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        feed.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
        feed.push_str(&format!("  <title>{}</title>\n", escape_xml(&config.title)));
        if !config.description.is_empty() {
            feed.push_str(&format!(
                "  <subtitle>{}</subtitle>\n",
                escape_xml(&config.description)
            ));
        }
        feed.push_str(&format!(
            "  <link href=\"{}\" rel=\"self\"/>\n",
            full_url_for(config, "atom.xml")
        ));
        feed.push_str(&format!("  <link href=\"{}\"/>\n", home));
        feed.push_str(&format!("  <updated>{}</updated>\n", updated));
        feed.push_str(&format!("  <id>{}</id>\n", home));
        if !config.author.is_empty() {
            feed.push_str(&format!(
                "  <author><name>{}</name></author>\n",
                escape_xml(&config.author)
            ));
        }

        let origin = self.origin();
        for post in index.posts().iter().take(limit) {
            feed.push_str("  <entry>\n");
            feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&post.title)));
            feed.push_str(&format!("    <link href=\"{}\"/>\n", post.permalink));
            feed.push_str(&format!("    <id>{}</id>\n", post.permalink));
            feed.push_str(&format!(
                "    <published>{}</published>\n",
                post.date.to_rfc3339()
            ));
            feed.push_str(&format!(
                "    <updated>{}</updated>\n",
                post.lastmod().to_rfc3339()
            ));
            for tag in &post.tags {
                feed.push_str(&format!("    <category term=\"{}\"/>\n", escape_xml(tag)));
            }
            let content = if post.summary.is_empty() {
                &post.content
            } else {
                &post.summary
            };
            let content = strip_invalid_xml_chars(&convert_relative_urls_to_absolute(
                content, &origin,
            ));
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                content.replace("]]>", "]]]]><![CDATA[>")
            ));
            feed.push_str("  </entry>\n");
        }

        feed.push_str("</feed>\n");

        self.write_file("atom.xml", &feed)?;
        report.written += 1;
        tracing::debug!("Generated atom.xml");

        Ok(())
    }

    /// Generate sitemap.xml
    fn generate_sitemap(
        &self,
        index: &SiteIndex,
        pages: &[Page],
        with_photos: bool,
        report: &mut BuildReport,
    ) -> Result<()> {
        let config = &self.site.config;
        let mut entries: Vec<(String, Option<String>)> = Vec::new();

        entries.push((
            full_url_for(config, "/"),
            index.posts().first().map(|p| p.lastmod().to_rfc3339()),
        ));
        for post in index.posts() {
            entries.push((post.permalink.clone(), Some(post.lastmod().to_rfc3339())));
        }
        for page in pages.iter().filter(|p| self.is_published_page(p)) {
            let lastmod = page.updated.unwrap_or(page.date);
            entries.push((page.permalink.clone(), Some(lastmod.to_rfc3339())));
        }
        entries.push((full_url_for(config, &dir_path(&config.archive_dir)), None));
        entries.push((full_url_for(config, &dir_path(&config.tag_dir)), None));
        for tag in index.tags() {
            entries.push((tag.permalink.clone(), None));
        }
        if with_photos {
            entries.push((full_url_for(config, &dir_path(&config.photos_path)), None));
        }

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
        for (loc, lastmod) in entries {
            xml.push_str("  <url>\n");
            xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&loc)));
            if let Some(lastmod) = lastmod {
                xml.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
            }
            xml.push_str("  </url>\n");
        }
        xml.push_str("</urlset>\n");

        self.write_file("sitemap.xml", &xml)?;
        report.written += 1;
        Ok(())
    }

    /// Generate search index (JSON)
    fn generate_search_index(&self, index: &SiteIndex, report: &mut BuildReport) -> Result<()> {
        let search_data: Vec<serde_json::Value> = index
            .posts()
            .iter()
            .map(|p| {
                serde_json::json!({
                    "title": p.title,
                    "url": p.url,
                    "date": p.date.format("%Y-%m-%d").to_string(),
                    "tags": p.tags,
                    "content": plain_text(&p.content),
                })
            })
            .collect();

        let json = serde_json::to_string_pretty(&search_data)?;
        self.write_file("search.json", &json)?;
        report.written += 1;
        tracing::debug!("Generated search.json");

        Ok(())
    }

    /// Copy the static directory into the public directory
    fn copy_static(&self) -> Result<usize> {
        let static_dir = &self.site.static_dir;
        if !static_dir.exists() {
            return Ok(0);
        }

        let mut copied = 0;
        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = path.strip_prefix(static_dir)?;
            let dest = self.site.public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)
                .with_context(|| format!("failed to copy {:?} to {:?}", path, dest))?;
            copied += 1;
        }

        tracing::debug!("Copied {} static files", copied);
        Ok(copied)
    }

    /// Write `<site path>/index.html`
    fn write_page(&self, site_path: &str, html: &str) -> Result<()> {
        let output_path = self.output_dir(site_path).join("index.html");
        write_output(&output_path, html)
    }

    /// Write a file at a path relative to the public directory
    fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        write_output(&self.site.public_dir.join(relative), content)
    }

    fn output_dir(&self, site_path: &str) -> PathBuf {
        // Strip leading slash from path to avoid creating absolute paths
        let clean_path = site_path.trim_matches('/');
        if clean_path.is_empty() {
            self.site.public_dir.clone()
        } else {
            self.site.public_dir.join(clean_path)
        }
    }

    /// Scheme and host of base_url, used to absolutize root-relative links
    fn origin(&self) -> String {
        let config = &self.site.config;
        let root = site_root(config);
        let base = config.base();
        base.strip_suffix(root.trim_end_matches('/'))
            .unwrap_or(base)
            .to_string()
    }
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create dir {:?}", parent))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {:?}", path))?;
    tracing::trace!("Wrote {:?}", path);
    Ok(())
}

/// `archives` -> `/archives/`
fn dir_path(dir: &str) -> String {
    crate::content::permalink::normalize_path(dir)
}

/// Convert root-relative URLs in HTML content to absolute URLs
fn convert_relative_urls_to_absolute(content: &str, origin: &str) -> String {
    content
        .replace("href=\"/", &format!("href=\"{}/", origin))
        .replace("src=\"/", &format!("src=\"{}/", origin))
        .replace("href='/", &format!("href='{}/", origin))
        .replace("src='/", &format!("src='{}/", origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_relative_urls() {
        let html = r#"<a href="/about/">a</a><img src="/img/x.png"><a href="https://x.org/">x</a>"#;
        let converted = convert_relative_urls_to_absolute(html, "https://example.org");
        assert!(converted.contains(r#"href="https://example.org/about/""#));
        assert!(converted.contains(r#"src="https://example.org/img/x.png""#));
        assert!(converted.contains(r#"href="https://x.org/""#));
    }

    #[test]
    fn test_dir_path() {
        assert_eq!(dir_path("archives"), "/archives/");
        assert_eq!(dir_path("/tags/"), "/tags/");
    }

    #[test]
    fn test_origin_strips_base_path() {
        let site = Site::with_config(
            "/tmp/site",
            crate::config::SiteConfig {
                base_url: "https://example.org/blog/".to_string(),
                ..Default::default()
            },
        );
        let generator = Generator::new(&site).unwrap();
        assert_eq!(generator.origin(), "https://example.org");
    }
}
