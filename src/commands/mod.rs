// Command implementations for the AutoTrans CLI

pub mod check;
pub mod clean;
pub mod generate;
pub mod list;

use std::path::{Path, PathBuf};

use crate::repository::TranslatorRepository;
use crate::runner::TranslatorRunner;

/// Explicit files, or every source image when none is given
pub(crate) fn selected_images(
    repository: &TranslatorRepository,
    runner: &TranslatorRunner<'_>,
    files: &[PathBuf],
) -> Vec<PathBuf> {
    if files.is_empty() {
        return runner.get_source_images().into_iter().collect();
    }
    let base = repository
        .config()
        .document_directory
        .clone()
        .unwrap_or_default();
    files.iter().map(|file| resolve(&base, file)).collect()
}

fn resolve(base: &Path, file: &Path) -> PathBuf {
    if file.is_relative() && !file.exists() && !base.as_os_str().is_empty() {
        base.join(file)
    } else {
        file.to_path_buf()
    }
}
