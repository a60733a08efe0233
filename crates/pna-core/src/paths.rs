use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PNA_DIR: &str = ".pna";
pub const CONFIG_FILE: &str = ".pna/config.yaml";
pub const JOBS_DB: &str = ".pna/jobs.redb";
pub const MACROS_DIR: &str = ".pna/macros";

pub const MACRO_EXT: &str = "json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn pna_dir(root: &Path) -> PathBuf {
    root.join(PNA_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a configured path against the project root unless it is absolute.
pub fn under_root(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

/// Path for a named macro inside `macros_dir`. A bare name gets the `.json`
/// extension; anything that already looks like a path is used as given.
pub fn macro_path(root: &Path, macros_dir: &Path, name: &str) -> PathBuf {
    let as_path = Path::new(name);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        return under_root(root, as_path);
    }
    let file = if as_path.extension().is_some() {
        name.to_string()
    } else {
        format!("{name}.{MACRO_EXT}")
    };
    under_root(root, macros_dir).join(file)
}
