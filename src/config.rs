use std::path::{Path, PathBuf};

pub const STORE_ENV: &str = "LINKPEEK_STORE";
pub const DEFAULT_STORE_DIR: &str = ".linkpeek";

/// `--store`, else `LINKPEEK_STORE`, else `.linkpeek` in the working
/// directory.
pub fn store_dir(flag: Option<&Path>) -> PathBuf {
    resolve_store_dir(flag, std::env::var(STORE_ENV).ok().as_deref())
}

pub fn resolve_store_dir(flag: Option<&Path>, env: Option<&str>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    match env.map(str::trim) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_STORE_DIR),
    }
}
