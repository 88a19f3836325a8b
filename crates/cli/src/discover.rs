//! Test file discovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Extensions recognized as test definition files.
const TEST_EXTENSIONS: [&str; 4] = ["sql", "yaml", "yml", "txt"];

/// Collect test files under a directory, sorted by path so runs are
/// deterministic regardless of filesystem order.
pub fn discover_tests(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(directory) {
        let entry = entry
            .with_context(|| format!("Failed to scan test directory: {}", directory.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if TEST_EXTENSIONS.contains(&extension.as_str()) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}
