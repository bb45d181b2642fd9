use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Read a file as text, replacing invalid UTF-8 sequences
pub fn read_file_lossy<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;

    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Expand `~` and `$VAR` in a user-supplied path
pub fn expand_path(raw: &Path) -> Result<PathBuf> {
    let text = raw.to_string_lossy();
    let expanded =
        shellexpand::full(&text).with_context(|| format!("Failed to expand path {}", raw.display()))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Write `content` to `path`, creating parent directories as needed.
/// Returns the expanded path that was written.
pub fn write_output(path: &Path, content: &str) -> Result<PathBuf> {
    let path = expand_path(path)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    std::fs::write(&path, content).with_context(|| format!("Failed to write to {}", path.display()))?;
    Ok(path)
}
