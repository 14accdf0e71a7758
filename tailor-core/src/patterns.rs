//! File patterns used when collecting corpus documents.

/// Default patterns to exclude from ingestion.
pub fn default_exclude_patterns() -> Vec<String> {
    [
        // Version control
        ".git", ".svn", ".hg",
        // Package managers / virtualenvs
        "node_modules", "__pycache__", ".venv", "venv",
        // IDEs
        ".vscode", ".idea",
        // OS
        ".DS_Store", "Thumbs.db",
        // Temp/cache
        ".cache", "tmp",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// Check whether a path, relative to the collection root, should be skipped.
///
/// A path is excluded if one of its components equals an exclude pattern;
/// `tmp` skips `tmp/notes.txt` but not `attempts.txt`. Components above the
/// collection root are not inspected, so a corpus that itself lives under
/// e.g. `tmp/` is still collected.
pub fn should_exclude(relative: &std::path::Path, exclude_patterns: &[String]) -> bool {
    relative.components().any(|component| {
        let name = component.as_os_str();
        exclude_patterns.iter().any(|pattern| name == pattern.as_str())
    })
}
