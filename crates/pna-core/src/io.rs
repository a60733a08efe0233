use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Readers never see a half-written macro or config file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        atomic_write(&path, b"{}").unwrap();
        atomic_write(&path, b"{\"1\": {}}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"1\": {}}");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("macros/line-a/pick.json");
        atomic_write(&path, b"[]").unwrap();
        assert!(path.exists());
        // Only the target remains; the tempfile was renamed into place.
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn atomic_write_onto_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taken");
        std::fs::create_dir_all(path.join("child")).unwrap();
        assert!(atomic_write(&path, b"x").is_err());
    }
}
