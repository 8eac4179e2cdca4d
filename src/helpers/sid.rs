use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::InstallError;

/// The `.sid` file recording which service name this installation uses.
#[derive(Debug, Clone)]
pub struct SidStore {
    path: PathBuf,
}

impl SidStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the record with `name`, creating parent folders as needed.
    pub fn save(&self, name: &str) -> Result<(), InstallError> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.path, name)
        };
        write().map_err(|source| InstallError::SidFile {
            path: self.path.clone(),
            source,
        })
    }

    pub fn load(&self) -> Result<Option<String>, std::io::Error> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let name = contents.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn remove(&self) -> Result<(), std::io::Error> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_overwrites_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let store = SidStore::new(dir.path().join("pm2-windows-service").join(".sid"));

        store.save("first").unwrap();
        store.save("second").unwrap();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), "second");
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn absent_or_blank_file_means_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = SidStore::new(dir.path().join(".sid"));
        assert_eq!(store.load().unwrap(), None);

        fs::write(store.path(), "  \n").unwrap();
        assert_eq!(store.load().unwrap(), None);

        store.remove().unwrap();
        store.remove().unwrap();
        assert!(!store.path().exists());
    }
}
