use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use gallery_core::{ImportedAsset, PhotoSource};
use shared::domain::Photo;

/// Catalog export: a JSON array of photos.
pub struct JsonFilePhotoSource {
    path: PathBuf,
}

impl JsonFilePhotoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PhotoSource for JsonFilePhotoSource {
    async fn select_photos(&self) -> Result<Vec<Photo>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read photo list '{}'", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid photo list '{}'", self.path.display()))
    }
}

/// Picked files become assets referenced by their canonical path.
pub fn assets_from_files(files: &[PathBuf]) -> Result<Vec<ImportedAsset>> {
    files.iter().map(|file| asset_from_file(file)).collect()
}

fn asset_from_file(file: &Path) -> Result<ImportedAsset> {
    let image_ref = fs::canonicalize(file)
        .with_context(|| format!("cannot import '{}'", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("'{}' has no file name", file.display()))?;
    Ok(ImportedAsset {
        file_name,
        image_ref: image_ref.to_string_lossy().into_owned(),
    })
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
