use std::fs;
use std::path::Path;

use quill::commands::build::{self, BuildOptions};
use quill::Site;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative))
        .unwrap_or_else(|e| panic!("failed to read {}: {}", relative, e))
}

/// A small blog: three published posts, one draft, one broken post,
/// two pages and a photo index
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write(
        root,
        "config.yml",
        "title: Field Notes\nauthor: Sam\nbase_url: https://notes.example.org/\nper_page: 2\n",
    );

    write(
        root,
        "content/posts/router.md",
        "---\ntitle: Building a Router\ndate: 2021-01-10\ntags: [rust, web]\n---\n\nRouting tables.\n",
    );
    write(
        root,
        "content/posts/oban.md",
        "---\ntitle: Job Queues\ndate: 2021-02-14 09:30:00\ntags: rust\n---\n\nThe short part.\n\n<!--more-->\n\nThe long part nobody sees on the home page.\n",
    );
    write(
        root,
        "content/posts/liveview.toml.md",
        "+++\ntitle = \"Live Views\"\ndate = 2021-03-01T08:00:00Z\n+++\n\nServer rendered.\n",
    );
    write(
        root,
        "content/posts/unfinished.md",
        "---\ntitle: Secret Draft\ndate: 2021-03-05\ndraft: true\ntags: [secret]\n---\n\nNot yet.\n",
    );
    write(
        root,
        "content/posts/broken.md",
        "---\ntitle: [unclosed\ndate: 2021-03-02\n---\n\nBody.\n",
    );

    write(
        root,
        "content/about.md",
        "---\ntitle: About\nmenu: true\n---\n\nHi, I am **Sam**.\n",
    );
    write(
        root,
        "content/archives.md",
        "---\ntitle: Impostor\n---\n\nThis page wants the archive path.\n",
    );

    write(
        root,
        "data/photos.yml",
        "- url: /images/old.jpg\n  caption: Old harbour\n  date: 2019-06-01\n- url: https://cdn.example.org/new.jpg\n  caption: New bridge\n  date: 2022-08-20\n  link: /about/\n",
    );
    write(root, "static/css/site.css", "body { margin: 0 }\n");

    dir
}

fn build_fixture(dir: &TempDir, options: BuildOptions) -> (Site, quill::generator::BuildReport) {
    let site = build::open_site(dir.path(), options).unwrap();
    let report = site.build().unwrap();
    (site, report)
}

#[test]
fn test_build_writes_site_tree() {
    let dir = fixture();
    let (site, report) = build_fixture(&dir, BuildOptions::default());
    let public = site.public_dir.as_path();

    for path in [
        "index.html",
        "page/2/index.html",
        "2021/01/router/index.html",
        "2021/02/oban/index.html",
        "2021/03/liveview-toml/index.html",
        "about/index.html",
        "archives/index.html",
        "tags/index.html",
        "tags/rust/index.html",
        "tags/web/index.html",
        "photos/index.html",
        "atom.xml",
        "sitemap.xml",
        "search.json",
        "css/site.css",
    ] {
        assert!(public.join(path).exists(), "missing {}", path);
    }
    assert!(report.written >= 15);
}

#[test]
fn test_malformed_front_matter_fails_only_that_page() {
    let dir = fixture();
    let (site, report) = build_fixture(&dir, BuildOptions::default());

    let sources: Vec<_> = report
        .failures
        .iter()
        .map(|f| f.source.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    // The broken post, and the page that collides with the archive
    assert_eq!(sources.len(), 2, "{:?}", sources);
    assert!(sources.contains(&"broken.md".to_string()));
    assert!(sources.contains(&"archives.md".to_string()));

    assert!(!site.public_dir.join("2021/03/broken").exists());
    let archive = read(&site.public_dir, "archives/index.html");
    assert!(archive.contains("Archives"));
    assert!(!archive.contains("Impostor"));
}

#[test]
fn test_drafts_never_published() {
    let dir = fixture();
    let (site, _) = build_fixture(&dir, BuildOptions::default());
    let public = site.public_dir.as_path();

    assert!(!public.join("2021/03/unfinished").exists());
    assert!(!public.join("tags/secret").exists());
    for file in [
        "index.html",
        "archives/index.html",
        "tags/index.html",
        "atom.xml",
        "sitemap.xml",
        "search.json",
    ] {
        let content = read(public, file);
        assert!(!content.contains("Secret Draft"), "draft leaked into {}", file);
        assert!(!content.contains("unfinished"), "draft leaked into {}", file);
    }
}

#[test]
fn test_drafts_flag_includes_drafts() {
    let dir = fixture();
    let (site, _) = build_fixture(
        &dir,
        BuildOptions {
            drafts: true,
            future: false,
        },
    );
    assert!(site.public_dir.join("2021/03/unfinished/index.html").exists());
    assert!(site.public_dir.join("tags/secret/index.html").exists());
}

#[test]
fn test_home_page_lists_newest_first() {
    let dir = fixture();
    let (site, _) = build_fixture(&dir, BuildOptions::default());

    let home = read(&site.public_dir, "index.html");
    let live = home.find("Live Views").expect("newest post on page 1");
    let queues = home.find("Job Queues").expect("second post on page 1");
    assert!(live < queues);
    assert!(!home.contains("Building a Router"));
    assert!(home.contains("href=\"/page/2/\""));

    let second = read(&site.public_dir, "page/2/index.html");
    assert!(second.contains("Building a Router"));
    assert!(second.contains("rel=\"prev\" href=\"/\""));
}

#[test]
fn test_more_marker_splits_summary() {
    let dir = fixture();
    let (site, _) = build_fixture(&dir, BuildOptions::default());

    let home = read(&site.public_dir, "index.html");
    assert!(home.contains("The short part."));
    assert!(!home.contains("The long part"));
    assert!(home.contains("Read more"));

    let post = read(&site.public_dir, "2021/02/oban/index.html");
    assert!(post.contains("The short part."));
    assert!(post.contains("The long part nobody sees on the home page."));
    assert!(!post.contains("<!--more-->"));
}

#[test]
fn test_post_navigation_and_tags() {
    let dir = fixture();
    let (site, _) = build_fixture(&dir, BuildOptions::default());

    let post = read(&site.public_dir, "2021/02/oban/index.html");
    assert!(post.contains("rel=\"prev\" href=\"/2021/03/liveview-toml/\""));
    assert!(post.contains("rel=\"next\" href=\"/2021/01/router/\""));
    assert!(post.contains("href=\"/tags/rust/\""));
    assert!(post.contains("February 14, 2021"));

    let rust = read(&site.public_dir, "tags/rust/index.html");
    assert!(rust.find("Job Queues").unwrap() < rust.find("Building a Router").unwrap());
}

#[test]
fn test_feed_and_sitemap() {
    let dir = fixture();
    let (site, _) = build_fixture(&dir, BuildOptions::default());

    let feed = read(&site.public_dir, "atom.xml");
    assert!(feed.contains("<title>Field Notes</title>"));
    assert!(feed.contains("<id>https://notes.example.org/2021/02/oban/</id>"));
    assert_eq!(feed.matches("<entry>").count(), 3);
    assert!(feed.find("Live Views").unwrap() < feed.find("Building a Router").unwrap());

    let sitemap = read(&site.public_dir, "sitemap.xml");
    assert!(sitemap.contains("<loc>https://notes.example.org/about/</loc>"));
    assert!(sitemap.contains("<loc>https://notes.example.org/photos/</loc>"));

    let search: serde_json::Value = serde_json::from_str(&read(&site.public_dir, "search.json")).unwrap();
    assert_eq!(search.as_array().unwrap().len(), 3);
    assert_eq!(search[0]["title"], "Live Views");
}

#[test]
fn test_photo_index_newest_first() {
    let dir = fixture();
    let (site, _) = build_fixture(&dir, BuildOptions::default());

    let photos = read(&site.public_dir, "photos/index.html");
    let new = photos.find("New bridge").unwrap();
    let old = photos.find("Old harbour").unwrap();
    assert!(new < old);
    assert!(photos.contains("src=\"https://cdn.example.org/new.jpg\""));
    assert!(photos.contains("src=\"/images/old.jpg\""));
    assert!(photos.contains("<a href=\"/about/\">"));

    let home = read(&site.public_dir, "index.html");
    assert!(home.contains("href=\"/photos/\""));
    assert!(home.contains("href=\"/about/\""));
}

#[test]
fn test_layout_override() {
    let dir = fixture();
    write(
        dir.path(),
        "layouts/page.html",
        "<p>custom {{ page.title }}</p>{{ page.content }}",
    );
    let (site, _) = build_fixture(&dir, BuildOptions::default());

    let about = read(&site.public_dir, "about/index.html");
    assert!(about.starts_with("<p>custom About</p>"));
    assert!(about.contains("<strong>Sam</strong>"));
}

#[test]
fn test_clean_after_build() {
    let dir = fixture();
    let (site, _) = build_fixture(&dir, BuildOptions::default());
    assert!(site.public_dir.exists());
    site.clean().unwrap();
    assert!(!site.public_dir.exists());
}

#[test]
fn test_post_cannot_take_a_generated_path() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "config.yml",
        "title: Flat\nbase_url: https://flat.example.org/\npermalink: /:slug/\n",
    );
    write(
        root,
        "content/posts/archive-notes.md",
        "---\ntitle: Archive Notes\ndate: 2021-01-10\nslug: archives\n---\n\nHow I archive things.\n",
    );
    write(
        root,
        "content/posts/nameless.md",
        "---\ntitle: Nameless\ndate: 2021-01-11\nslug: \"???\"\n---\n\nNo usable slug.\n",
    );
    write(
        root,
        "content/posts/normal.md",
        "---\ntitle: Normal\ndate: 2021-01-12\n---\n\nStays.\n",
    );

    let (site, report) = build_fixture(&dir, BuildOptions::default());
    assert!(!report.is_clean());

    let sources: Vec<_> = report
        .failures
        .iter()
        .map(|f| f.source.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(sources.len(), 2, "{:?}", sources);
    assert!(sources.contains(&"archive-notes.md".to_string()));
    assert!(sources.contains(&"nameless.md".to_string()));

    let archive = read(&site.public_dir, "archives/index.html");
    assert!(archive.contains("<h1>Archives</h1>"));
    assert!(!archive.contains("How I archive things."));

    let home = read(&site.public_dir, "index.html");
    assert!(home.contains("Normal"));
    assert!(!home.contains("No usable slug."));
    assert!(site.public_dir.join("normal/index.html").exists());
}
