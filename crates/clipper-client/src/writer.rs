use std::path::{Component, Path, PathBuf};

use clipper_core::error::AppError;
use clipper_core::models::RenderedDocument;
use clipper_core::traits::DocumentWriter;

/// Writes rendered documents into a Markdown vault on the local filesystem.
///
/// Documents land at `<root>/<folder>/<stem>.md`; an existing file with the
/// same name is overwritten.
#[derive(Debug, Clone)]
pub struct FsVaultWriter {
    root: PathBuf,
}

impl FsVaultWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentWriter for FsVaultWriter {
    async fn persist(&self, document: &RenderedDocument) -> Result<String, AppError> {
        let relative = document.relative_path();
        let relative_path = Path::new(&relative);
        if !is_contained(relative_path) {
            return Err(AppError::StorageError(format!(
                "Refusing to write outside the vault: {relative}"
            )));
        }

        let target = self.root.join(relative_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::StorageError(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&target, &document.markdown)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to write {}: {e}", target.display())))?;

        tracing::info!(path = %target.display(), bytes = document.markdown.len(), "Document written");
        Ok(relative)
    }
}

/// Only plain relative segments: no root, prefix, or `..`.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
