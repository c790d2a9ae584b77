use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Read a file argument, treating `-` as stdin.
pub fn read_input(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(arg).with_context(|| format!("Failed to read input file: {}", arg))
}

/// Write `bytes` to `path`, creating parent directories as needed.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}
