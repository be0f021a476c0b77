use std::path::{Path, PathBuf};

/// Profile directory for local state (~/.mediagate).
pub fn data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".mediagate")
}

/// Path of the persisted session record. One record per profile,
/// fixed file name.
pub fn session_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wallet_session.json")
}
