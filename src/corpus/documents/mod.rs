
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use crate::Result;

/// A raw document read whole from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub content: String,
}

/// Read every `.txt` file directly inside `dir`, sorted by file name
///
/// Sorting makes row ids reproducible across rebuilds regardless of the
/// order the filesystem lists entries in.
#[inline]
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read document directory: {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to list document directory: {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && is_text_file(&path) {
            paths.push(path);
        } else {
            debug!("Skipping non-document entry {}", path.display());
        }
    }
    paths.sort();

    let documents = paths
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read document: {}", path.display()))?;
            Ok(Document { path, content })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}
