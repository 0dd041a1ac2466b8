//! Initialize a new site

use anyhow::{bail, Result};
use std::fs;
use std::path::Path;

use crate::CONFIG_FILE;

const DEFAULT_CONFIG: &str = r#"# Site
title: My Blog
description: ''
author: ''
language: en
timezone: ''

# URL
base_url: http://localhost:1313/
permalink: /:year/:month/:slug/

# Directories
content_dir: content
posts_dir: posts
data_dir: data
static_dir: static
layouts_dir: layouts
public_dir: public
tag_dir: tags
archive_dir: archives
photos_path: photos

# Writing
ignore_files: []
build_drafts: false
build_future: false
summary_length: 70
date_format: MMMM D, YYYY
highlight:
  enable: true
  theme: InspiredGitHub
  line_numbers: false

# Listings
per_page: 10
feed_limit: 20
"#;

const ABOUT_PAGE: &str = r#"---
title: About
menu: true
---

Write something about yourself here.
"#;

const PHOTOS_DATA: &str = r#"# One entry per photo; the page lists them newest first
# - url: /images/harbour.jpg
#   caption: The harbour at dawn
#   date: 2024-05-01
#   link: /2024/05/harbour-walk/
[]
"#;

/// Scaffold a site in `target_dir`
pub fn init_site(target_dir: &Path) -> Result<()> {
    if target_dir.join(CONFIG_FILE).exists() {
        bail!("{:?} already contains a {}", target_dir, CONFIG_FILE);
    }

    fs::create_dir_all(target_dir.join("content/posts"))?;
    fs::create_dir_all(target_dir.join("data"))?;
    fs::create_dir_all(target_dir.join("static"))?;
    fs::create_dir_all(target_dir.join("layouts"))?;

    fs::write(target_dir.join(CONFIG_FILE), DEFAULT_CONFIG)?;
    fs::write(target_dir.join("content/about.md"), ABOUT_PAGE)?;
    fs::write(target_dir.join("data/photos.yml"), PHOTOS_DATA)?;

    let now = chrono::Utc::now();
    let sample_post = format!(
        r#"---
title: Hello World
date: {}
tags: [meta]
---

This is the first post. Everything above the marker below is the summary
shown on the home page.

<!--more-->

## Writing

```bash
$ quill new "My New Post"
```

New posts start as drafts. Remove `draft: true` to publish.

## Previewing

```bash
$ quill serve --drafts
```
"#,
        now.format("%Y-%m-%d %H:%M:%S")
    );
    fs::write(target_dir.join("content/posts/hello-world.md"), sample_post)?;

    tracing::debug!("Scaffolded site in {:?}", target_dir);
    Ok(())
}
