//! URL helper functions

use crate::config::SiteConfig;

/// Path component of `base_url`, always starting and ending with `/`
///
/// # Examples
/// ```ignore
/// site_root(&config) // base_url "https://example.com/blog" -> "/blog/"
/// ```
pub fn site_root(config: &SiteConfig) -> String {
    let without_scheme = config
        .base_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&config.base_url);

    match without_scheme.find('/') {
        Some(pos) => {
            let path = without_scheme[pos..].trim_matches('/');
            if path.is_empty() {
                "/".to_string()
            } else {
                format!("/{}/", path)
            }
        }
        None => "/".to_string(),
    }
}

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/css/style.css") // -> "/blog/css/style.css"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let root = site_root(config);
    let root = root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
///
/// # Examples
/// ```ignore
/// full_url_for(&config, "/about/") // -> "https://example.com/blog/about/"
/// ```
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    format!("{}/{}", config.base(), path.trim_start_matches('/'))
}
