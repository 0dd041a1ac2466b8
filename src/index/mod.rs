//! Published post index
//!
//! Takes every loaded post and decides what the site actually publishes:
//! drafts and future-dated posts are dropped, the rest are ordered newest
//! first, and tag, archive and pagination views are derived from that order.

use anyhow::anyhow;
use chrono::{DateTime, Datelike, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::config::SiteConfig;
use crate::content::permalink::normalize_path;
use crate::content::{LoadFailure, Post, Tag};
use crate::helpers::{full_url_for, url_for};

/// Files written at the root of the public directory
pub const GENERATED_FILES: &[&str] = &["atom.xml", "sitemap.xml", "search.json"];

/// Posts of one calendar year, in index order
#[derive(Debug, Clone)]
pub struct ArchiveYear {
    pub year: i32,
    pub posts: Vec<usize>,
}

/// One page of the paginated post listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    /// 1-based
    pub number: usize,
    pub total: usize,
    /// Site-relative path: `/` for the first pager, `/page/N/` after
    pub path: String,
    pub prev: Option<String>,
    pub next: Option<String>,
    /// Indices into the index
    pub posts: Vec<usize>,
}

/// Site-relative path of listing page `number`
pub fn pager_path(number: usize) -> String {
    if number <= 1 {
        "/".to_string()
    } else {
        format!("/page/{}/", number)
    }
}

/// The published posts, newest first
#[derive(Debug, Default)]
pub struct SiteIndex {
    posts: Vec<Post>,
    tags: Vec<Tag>,
    failures: Vec<LoadFailure>,
}

impl SiteIndex {
    /// Filter and order `posts` for publication at time `now`
    pub fn build(posts: Vec<Post>, config: &SiteConfig, now: DateTime<Utc>) -> Self {
        let mut published: Vec<Post> = posts
            .into_iter()
            .filter(|post| {
                if post.draft && !config.build_drafts {
                    tracing::debug!("Skipping draft {}", post.source);
                    return false;
                }
                if post.date > now && !config.build_future {
                    tracing::debug!("Skipping future post {} ({})", post.source, post.date);
                    return false;
                }
                true
            })
            .collect();

        published.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.source.cmp(&b.source))
        });

        let mut failures = Vec::new();
        published.retain(|post| match reserved_owner(&post.path, config) {
            Some(owner) => {
                tracing::error!(
                    "Permalink {} of {} is reserved for {}",
                    post.path,
                    post.source,
                    owner
                );
                failures.push(LoadFailure {
                    source: post.full_source.clone(),
                    error: anyhow!("permalink {} is reserved for {}", post.path, owner),
                });
                false
            }
            None => true,
        });

        // First post in index order keeps a contested path
        let mut owners: HashMap<String, String> = HashMap::new();
        published.retain(|post| match owners.get(&post.path) {
            Some(owner) => {
                tracing::error!(
                    "Permalink {} of {} is already used by {}",
                    post.path,
                    post.source,
                    owner
                );
                failures.push(LoadFailure {
                    source: post.full_source.clone(),
                    error: anyhow!("permalink {} is already used by {}", post.path, owner),
                });
                false
            }
            None => {
                owners.insert(post.path.clone(), post.source.clone());
                true
            }
        });

        let tags = collect_tags(&published, config);

        tracing::debug!(
            "Indexed {} published posts and {} tags",
            published.len(),
            tags.len()
        );

        Self {
            posts: published,
            tags,
            failures,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Posts dropped because their permalink collided with another post
    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<LoadFailure> {
        std::mem::take(&mut self.failures)
    }

    /// The next newer post
    pub fn prev(&self, i: usize) -> Option<&Post> {
        i.checked_sub(1).and_then(|j| self.posts.get(j))
    }

    /// The next older post
    pub fn next(&self, i: usize) -> Option<&Post> {
        if i < self.posts.len() {
            self.posts.get(i + 1)
        } else {
            None
        }
    }

    /// Tags sorted by name
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Years, newest first
    pub fn archive(&self) -> Vec<ArchiveYear> {
        let mut years: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (i, post) in self.posts.iter().enumerate() {
            years.entry(post.date.year()).or_default().push(i);
        }
        years
            .into_iter()
            .rev()
            .map(|(year, posts)| ArchiveYear { year, posts })
            .collect()
    }

    /// Split the index into listing pages; `per_page == 0` means a single page.
    ///
    /// Always returns at least one pager so the home page exists.
    pub fn paginate(&self, per_page: usize) -> Vec<Pager> {
        let indices: Vec<usize> = (0..self.posts.len()).collect();
        let chunks: Vec<Vec<usize>> = if per_page == 0 || indices.is_empty() {
            vec![indices]
        } else {
            indices.chunks(per_page).map(|c| c.to_vec()).collect()
        };
        let total = chunks.len();

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, posts)| {
                let number = i + 1;
                Pager {
                    number,
                    total,
                    path: pager_path(number),
                    prev: (number > 1).then(|| pager_path(number - 1)),
                    next: (number < total).then(|| pager_path(number + 1)),
                    posts,
                }
            })
            .collect()
    }
}

/// What a generated listing or file owns `path`, if anything
fn reserved_owner(path: &str, config: &SiteConfig) -> Option<&'static str> {
    if path == "/" {
        return Some("the home page");
    }
    if let Some(rest) = path.strip_prefix("/page/") {
        let number = rest.trim_end_matches('/');
        if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
            return Some("the post listing");
        }
    }

    let tag_root = normalize_path(&config.tag_dir);
    if path == normalize_path(&config.archive_dir) {
        Some("the archive")
    } else if tag_root != "/" && path.starts_with(&tag_root) {
        Some("the tag pages")
    } else if path == normalize_path(&config.photos_path) {
        Some("the photo index")
    } else if GENERATED_FILES
        .iter()
        .any(|f| path.trim_matches('/') == *f)
    {
        Some("a generated file")
    } else {
        None
    }
}

/// Group posts by tag slug, so `Rust` and `rust` share a page
fn collect_tags(posts: &[Post], config: &SiteConfig) -> Vec<Tag> {
    let mut by_slug: BTreeMap<String, Tag> = BTreeMap::new();

    for (i, post) in posts.iter().enumerate() {
        for name in &post.tags {
            let slug = slug::slugify(name);
            if slug.is_empty() {
                continue;
            }
            let tag = by_slug.entry(slug).or_insert_with(|| {
                let mut tag = Tag::new(name, &config.tag_dir);
                tag.url = url_for(config, &tag.path);
                tag.permalink = full_url_for(config, &tag.path);
                tag
            });
            if tag.posts.last() != Some(&i) {
                tag.posts.push(i);
            }
        }
    }

    let mut tags: Vec<Tag> = by_slug.into_values().collect();
    tags.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn post(title: &str, day: u32, draft: bool, tags: &[&str]) -> Post {
        let date = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2021, 3, day, 12, 0, 0)
            .unwrap();
        let mut post = Post::new(title.to_string(), date, format!("posts/{}.md", title));
        post.draft = draft;
        post.path = format!("/2021/03/{}/", slug::slugify(title));
        post.tags = tags.iter().map(|t| t.to_string()).collect();
        post
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 20, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_drafts_excluded_and_sorted_descending() {
        let posts = vec![
            post("router", 2, false, &[]),
            post("shield", 9, true, &[]),
            post("oban", 5, false, &[]),
            post("liveview", 7, false, &[]),
        ];
        let index = SiteIndex::build(posts, &SiteConfig::default(), now());

        let titles: Vec<_> = index.posts().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["liveview", "oban", "router"]);
        assert!(index.posts().iter().all(|p| !p.draft));
        assert!(index
            .posts()
            .windows(2)
            .all(|w| w[0].date >= w[1].date));
    }

    #[test]
    fn test_build_drafts_includes_drafts() {
        let config = SiteConfig {
            build_drafts: true,
            ..Default::default()
        };
        let index = SiteIndex::build(vec![post("wip", 3, true, &[])], &config, now());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_future_posts() {
        let posts = vec![post("later", 28, false, &[]), post("earlier", 1, false, &[])];
        let index = SiteIndex::build(posts.clone(), &SiteConfig::default(), now());
        assert_eq!(index.len(), 1);
        assert_eq!(index.posts()[0].title, "earlier");

        let config = SiteConfig {
            build_future: true,
            ..Default::default()
        };
        let index = SiteIndex::build(posts, &config, now());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_same_date_ordered_by_title() {
        let posts = vec![post("b", 4, false, &[]), post("a", 4, false, &[])];
        let index = SiteIndex::build(posts, &SiteConfig::default(), now());
        assert_eq!(index.posts()[0].title, "a");
    }

    #[test]
    fn test_permalink_collision() {
        let mut older = post("same", 1, false, &[]);
        older.source = "posts/older.md".to_string();
        let newer = post("same", 2, false, &[]);
        let index = SiteIndex::build(vec![older, newer], &SiteConfig::default(), now());
        assert_eq!(index.len(), 1);
        assert_eq!(index.posts()[0].source, "posts/same.md");
        assert_eq!(index.failures().len(), 1);
    }

    #[test]
    fn test_reserved_paths_rejected() {
        let mut archive = post("archives", 1, false, &[]);
        archive.path = "/archives/".to_string();
        let mut home = post("home", 2, false, &[]);
        home.path = "/".to_string();
        let mut tagged = post("tags", 3, false, &[]);
        tagged.path = "/tags/rust/".to_string();
        let mut pager = post("pager", 4, false, &[]);
        pager.path = "/page/2/".to_string();
        let mut feed = post("feed", 5, false, &[]);
        feed.path = "/atom.xml/".to_string();
        let mut photos = post("photos", 6, false, &[]);
        photos.path = "/photos/".to_string();
        let mut fine = post("page-one", 7, false, &[]);
        fine.path = "/page/one/".to_string();

        let index = SiteIndex::build(
            vec![archive, home, tagged, pager, feed, photos, fine],
            &SiteConfig::default(),
            now(),
        );
        let titles: Vec<_> = index.posts().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["page-one"]);
        assert_eq!(index.failures().len(), 6);
        assert!(index.failures()[0].error.to_string().contains("reserved"));
    }

    #[test]
    fn test_prev_next() {
        let posts = vec![post("a", 1, false, &[]), post("b", 2, false, &[])];
        let index = SiteIndex::build(posts, &SiteConfig::default(), now());
        assert!(index.prev(0).is_none());
        assert_eq!(index.next(0).unwrap().title, "a");
        assert_eq!(index.prev(1).unwrap().title, "b");
        assert!(index.next(1).is_none());
    }

    #[test]
    fn test_tags_grouped() {
        let posts = vec![
            post("a", 1, false, &["Rust", "web"]),
            post("b", 2, false, &["rust"]),
            post("c", 3, true, &["draft-only"]),
        ];
        let index = SiteIndex::build(posts, &SiteConfig::default(), now());
        let tags = index.tags();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].slug, "rust");
        assert_eq!(tags[0].posts, vec![0, 1]);
        assert_eq!(tags[0].url, "/tags/rust/");
        assert_eq!(tags[1].name, "web");
    }

    #[test]
    fn test_archive_years() {
        let mut old = post("old", 1, false, &[]);
        old.date = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2019, 6, 1, 0, 0, 0)
            .unwrap();
        old.path = "/2019/06/old/".to_string();
        let index = SiteIndex::build(
            vec![old, post("new", 1, false, &[])],
            &SiteConfig::default(),
            now(),
        );
        let years: Vec<_> = index.archive().iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2021, 2019]);
    }

    #[test]
    fn test_paginate() {
        let posts: Vec<Post> = (1..=5)
            .map(|d| post(&format!("p{}", d), d, false, &[]))
            .collect();
        let index = SiteIndex::build(posts, &SiteConfig::default(), now());

        let pagers = index.paginate(2);
        assert_eq!(pagers.len(), 3);
        assert_eq!(pagers[0].path, "/");
        assert_eq!(pagers[0].prev, None);
        assert_eq!(pagers[0].next.as_deref(), Some("/page/2/"));
        assert_eq!(pagers[1].prev.as_deref(), Some("/"));
        assert_eq!(pagers[2].path, "/page/3/");
        assert_eq!(pagers[2].posts, vec![4]);

        assert_eq!(index.paginate(0).len(), 1);
    }

    #[test]
    fn test_paginate_empty_index() {
        let index = SiteIndex::build(Vec::new(), &SiteConfig::default(), now());
        let pagers = index.paginate(10);
        assert_eq!(pagers.len(), 1);
        assert!(pagers[0].posts.is_empty());
    }
}
