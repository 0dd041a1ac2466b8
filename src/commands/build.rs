//! Build the site: load, index, render, write

use anyhow::Result;
use chrono::Utc;
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebouncedEvent};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::content::{loader::PHOTOS_FILE, ContentLoader, LoadFailure};
use crate::generator::{BuildReport, Generator};
use crate::index::SiteIndex;
use crate::{Site, CONFIG_FILE};

/// Command-line overrides applied on top of `config.yml`
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub drafts: bool,
    pub future: bool,
}

impl BuildOptions {
    pub fn apply(&self, site: &mut Site) {
        if self.drafts {
            site.config.build_drafts = true;
        }
        if self.future {
            site.config.build_future = true;
        }
    }
}

/// Open the site at `base_dir` with the overrides applied
pub fn open_site(base_dir: &Path, options: BuildOptions) -> Result<Site> {
    let mut site = Site::new(base_dir)?;
    options.apply(&mut site);
    Ok(site)
}

/// Build the site once.
///
/// Files that fail to load or render are collected in the report; the rest
/// of the site is still written.
pub fn run(site: &Site) -> Result<BuildReport> {
    let start = Instant::now();

    let loader = ContentLoader::new(site)?;
    let posts = loader.load_posts();
    let pages = loader.load_pages();
    let mut failures: Vec<LoadFailure> = posts.failures;
    failures.extend(pages.failures);

    let photos = match loader.load_photos() {
        Ok(photos) => photos,
        Err(error) => {
            tracing::error!("Failed to load the photo index: {:#}", error);
            failures.push(LoadFailure {
                source: site.data_dir.join(PHOTOS_FILE),
                error,
            });
            Vec::new()
        }
    };

    tracing::info!(
        "Loaded {} posts, {} pages and {} photos",
        posts.items.len(),
        pages.items.len(),
        photos.len()
    );

    let mut index = SiteIndex::build(posts.items, &site.config, Utc::now());
    failures.extend(index.take_failures());

    let generator = Generator::new(site)?;
    let mut report = generator.generate(&index, &pages.items, &photos)?;

    failures.append(&mut report.failures);
    report.failures = failures;

    tracing::info!(
        "Published {} posts in {:.2}s",
        index.len(),
        start.elapsed().as_secs_f64()
    );
    if !report.is_clean() {
        tracing::warn!("{} file(s) were skipped", report.failures.len());
    }

    Ok(report)
}

/// Directories and files whose changes trigger a rebuild
pub fn watch_targets(site: &Site) -> Vec<(PathBuf, RecursiveMode)> {
    let mut targets: Vec<(PathBuf, RecursiveMode)> = [
        &site.content_dir,
        &site.data_dir,
        &site.static_dir,
        &site.layouts_dir,
    ]
    .into_iter()
    .filter(|dir| dir.exists())
    .map(|dir| (dir.clone(), RecursiveMode::Recursive))
    .collect();

    let config_path = site.base_dir.join(CONFIG_FILE);
    if config_path.exists() {
        targets.push((config_path, RecursiveMode::NonRecursive));
    }
    targets
}

/// Editor swap files and VCS noise
pub fn is_relevant(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let path_str = path.to_string_lossy();

    !path_str.contains("/.git/")
        && !name.starts_with(".#")
        && name != ".DS_Store"
        && !name.ends_with('~')
        && !name.ends_with(".swp")
}

/// Changed paths worth rebuilding for
pub fn relevant_changes(events: &[DebouncedEvent]) -> Vec<&Path> {
    events
        .iter()
        .map(|e| e.path.as_path())
        .filter(|p| is_relevant(p))
        .collect()
}

/// Rebuild whenever the site sources change. Blocks until the watcher dies.
///
/// `config.yml` is re-read before every rebuild.
pub fn watch(base_dir: &Path, options: BuildOptions) -> Result<()> {
    let site = open_site(base_dir, options)?;
    let (tx, rx) = channel();

    let mut debouncer = new_debouncer(Duration::from_millis(300), tx)?;
    for (path, mode) in watch_targets(&site) {
        debouncer.watcher().watch(&path, mode)?;
        tracing::debug!("Watching: {:?}", path);
    }

    tracing::info!("Watching for changes. Press Ctrl+C to stop.");

    for result in rx {
        match result {
            Ok(events) => {
                let changed = relevant_changes(&events);
                if changed.is_empty() {
                    continue;
                }
                for path in &changed {
                    tracing::info!("Changed: {}", path.display());
                }
                rebuild(base_dir, options);
            }
            Err(e) => tracing::error!("Watch error: {:?}", e),
        }
    }

    Ok(())
}

/// One watch-triggered build; errors are logged, never fatal
pub fn rebuild(base_dir: &Path, options: BuildOptions) -> bool {
    let result = open_site(base_dir, options).and_then(|site| run(&site));
    match result {
        Ok(report) => {
            for failure in &report.failures {
                tracing::error!("{}", failure);
            }
            report.is_clean()
        }
        Err(e) => {
            tracing::error!("Build failed: {:#}", e);
            false
        }
    }
}
