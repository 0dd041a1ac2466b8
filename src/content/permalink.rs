//! Permalink patterns

use anyhow::{bail, Result};
use chrono::{DateTime, FixedOffset};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r":([a-z_]+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Slug,
    Title,
}

/// A compiled permalink pattern such as `/:year/:month/:slug/`
#[derive(Debug, Clone)]
pub struct Permalink {
    parts: Vec<Part>,
}

impl Permalink {
    /// Compile a pattern, rejecting unknown `:tokens`
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut last = 0;

        for caps in TOKEN.captures_iter(pattern) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                parts.push(Part::Literal(pattern[last..whole.start()].to_string()));
            }
            parts.push(match name.as_str() {
                "year" => Part::Year,
                "month" => Part::Month,
                "day" => Part::Day,
                "hour" => Part::Hour,
                "minute" => Part::Minute,
                "second" => Part::Second,
                "slug" => Part::Slug,
                "title" => Part::Title,
                other => bail!("unknown permalink token `:{}` in `{}`", other, pattern),
            });
            last = whole.end();
        }
        if last < pattern.len() {
            parts.push(Part::Literal(pattern[last..].to_string()));
        }

        if !parts.iter().any(|p| matches!(p, Part::Slug | Part::Title)) {
            bail!(
                "permalink `{}` needs :slug or :title to keep posts apart",
                pattern
            );
        }

        Ok(Self { parts })
    }

    /// Expand the pattern for one post.
    ///
    /// The result starts and ends with `/` and has no empty segments.
    pub fn expand(&self, date: &DateTime<FixedOffset>, slug: &str, title: &str) -> String {
        let mut raw = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => raw.push_str(s),
                Part::Year => raw.push_str(&date.format("%Y").to_string()),
                Part::Month => raw.push_str(&date.format("%m").to_string()),
                Part::Day => raw.push_str(&date.format("%d").to_string()),
                Part::Hour => raw.push_str(&date.format("%H").to_string()),
                Part::Minute => raw.push_str(&date.format("%M").to_string()),
                Part::Second => raw.push_str(&date.format("%S").to_string()),
                Part::Slug => raw.push_str(slug),
                Part::Title => raw.push_str(&slug::slugify(title)),
            }
        }
        normalize_path(&raw)
    }
}

/// Collapse a path to `/seg/seg/` form
pub fn normalize_path(raw: &str) -> String {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

/// URL path of a standalone page from its path relative to the content directory
///
/// `about.md` -> `/about/`, `projects/index.md` -> `/projects/`, `index.md` -> `/`
pub fn page_path(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    let mut segments: Vec<String> = without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if segments.last().map(|s| s == "index" || s == "_index") == Some(true) {
        segments.pop();
    }
    normalize_path(&segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2021, 3, 4, 9, 5, 7)
            .unwrap()
    }

    #[test]
    fn test_expand_default_pattern() {
        let p = Permalink::parse("/:year/:month/:slug/").unwrap();
        assert_eq!(
            p.expand(&date(), "deploy-hugo", "ignored"),
            "/2021/03/deploy-hugo/"
        );
    }

    #[test]
    fn test_expand_normalizes_slashes() {
        let p = Permalink::parse(":year//:day-:title").unwrap();
        assert_eq!(
            p.expand(&date(), "x", "Hello, World!"),
            "/2021/04-hello-world/"
        );
    }

    #[test]
    fn test_expand_time_tokens() {
        let p = Permalink::parse("/posts/:hour:minute:second/:slug").unwrap();
        assert_eq!(p.expand(&date(), "a", "A"), "/posts/090507/a/");
    }

    #[test]
    fn test_unknown_token() {
        let err = Permalink::parse("/:year/:category/:slug/").unwrap_err();
        assert!(err.to_string().contains(":category"));
    }

    #[test]
    fn test_pattern_without_slug_rejected() {
        assert!(Permalink::parse("/:year/:month/").is_err());
    }

    #[test]
    fn test_page_path() {
        assert_eq!(page_path(Path::new("about.md")), "/about/");
        assert_eq!(page_path(Path::new("projects/index.md")), "/projects/");
        assert_eq!(page_path(Path::new("notes/rust.markdown")), "/notes/rust/");
        assert_eq!(page_path(Path::new("index.md")), "/");
    }
}
