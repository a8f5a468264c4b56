use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

pub const DATABASE_FILE_NAME: &str = "storage.sqlite";

/// Selects where per-solution databases live.
#[derive(Clone, Debug, Default)]
pub struct StorageLocation {
    /// Override the global storage root (the solution fingerprint is still appended).
    pub root_override: Option<PathBuf>,
}

impl StorageLocation {
    pub fn from_env() -> Self {
        Self {
            root_override: std::env::var_os("ARBOR_CACHE_DIR").map(PathBuf::from),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_override: Some(root.into()),
        }
    }

    pub fn root(&self) -> Result<PathBuf> {
        match &self.root_override {
            Some(root) => Ok(root.clone()),
            None => default_storage_root(),
        }
    }

    /// `<root>/<solution fingerprint>/storage.sqlite`
    pub fn database_path(&self, solution_path: &Path) -> Result<PathBuf> {
        Ok(self
            .root()?
            .join(solution_fingerprint(solution_path))
            .join(DATABASE_FILE_NAME))
    }
}

/// SHA-256 of the solution path, hex encoded.
///
/// The path is canonicalized when it exists so different spellings of the same
/// solution share one database.
pub fn solution_fingerprint(solution_path: &Path) -> String {
    let path = std::fs::canonicalize(solution_path).unwrap_or_else(|_| solution_path.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())
}

fn default_storage_root() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or(StorageError::MissingHomeDir)?;

    Ok(home.join(".arbor").join("cache"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_path_is_scoped_by_solution() {
        let tmp = tempfile::tempdir().unwrap();
        let location = StorageLocation::with_root(tmp.path());

        let a = location.database_path(Path::new("/work/a.sln")).unwrap();
        let b = location.database_path(Path::new("/work/b.sln")).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with(tmp.path()));
        assert_eq!(a.file_name().unwrap(), DATABASE_FILE_NAME);
        assert_eq!(
            a.parent().unwrap().file_name().unwrap().to_str().unwrap(),
            solution_fingerprint(Path::new("/work/a.sln"))
        );
    }
}
