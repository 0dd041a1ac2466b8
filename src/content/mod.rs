//! Content module - handles posts, pages, photos and content processing

mod frontmatter;
pub mod loader;
mod markdown;
pub mod permalink;
mod post;

pub use frontmatter::{parse_date_string, FrontMatter};
pub use loader::{ContentLoader, LoadFailure, LoadResult};
pub use markdown::MarkdownRenderer;
pub use permalink::Permalink;
pub use post::{Page, Photo, Post, Tag};
