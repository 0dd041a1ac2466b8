//! Clean the public directory

use anyhow::{bail, Result};
use std::fs;

use crate::Site;

/// Remove the generated site
pub fn run(site: &Site) -> Result<()> {
    if site.public_dir == site.base_dir {
        bail!("public_dir points at the site root, refusing to delete it");
    }

    if site.public_dir.exists() {
        fs::remove_dir_all(&site.public_dir)?;
        tracing::info!("Deleted: {:?}", site.public_dir);
    } else {
        tracing::debug!("Nothing to clean at {:?}", site.public_dir);
    }

    Ok(())
}
