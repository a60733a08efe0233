use std::path::{Path, PathBuf};

/// Resolve the cell's project root.
///
/// Priority:
/// 1. `--root` flag / `PNA_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.pna/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_pna_dir(&cwd).unwrap_or(cwd)
}

fn find_pna_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(pna_core::paths::PNA_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_pna_dir_from_nested_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".pna")).unwrap();
        let nested = dir.path().join("cells/line-a");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_pna_dir(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn no_pna_dir_found() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_pna_dir(dir.path()), None);
    }
}
