//! Staged service artifacts under the daemon directory.
//!
//! Every file belonging to a service is named `<id>.<something>`, so a
//! previous installation can be reclaimed by deleting that namespace.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::InstallError;

pub fn host_exe_path(daemon_dir: &Path, id: &str) -> PathBuf {
    daemon_dir.join(format!("{}.exe", id))
}

pub fn definition_path(daemon_dir: &Path, id: &str) -> PathBuf {
    daemon_dir.join(format!("{}.json", id))
}

/// Delete every `<id>.*` entry in `daemon_dir`.
///
/// Entries that vanish underneath us count as removed. Anything else, usually
/// a locked `<id>.exe` of a still running service, becomes
/// [`InstallError::ArtifactsInUse`].
pub fn remove_previous_daemon(daemon_dir: &Path, id: &str) -> Result<Vec<PathBuf>, InstallError> {
    // an empty id would own every dotfile
    if id.is_empty() {
        return Ok(Vec::new());
    }

    let entries = match fs::read_dir(daemon_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(InstallError::ArtifactsInUse(e)),
    };

    let prefix = format!("{}.", id);
    let mut removed = Vec::new();

    for entry in entries {
        let entry = entry.map_err(InstallError::ArtifactsInUse)?;
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if !matches {
            continue;
        }

        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };

        match result {
            Ok(()) => {
                log::debug!("removed previous daemon artifact {}", path.display());
                removed.push(path);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                log::error!("could not remove {}: {}", path.display(), e);
                return Err(InstallError::ArtifactsInUse(e));
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_id_owns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".keep"), b"").unwrap();

        let removed = remove_previous_daemon(dir.path(), "").unwrap();
        assert!(removed.is_empty());
        assert!(dir.path().join(".keep").exists());
    }

    #[test]
    fn unreadable_daemon_dir_is_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("daemon");
        fs::write(&not_a_dir, b"file").unwrap();

        let result = remove_previous_daemon(&not_a_dir, "pm2");
        assert!(matches!(result, Err(InstallError::ArtifactsInUse(_))));
    }

    #[test]
    fn missing_daemon_dir_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let removed = remove_previous_daemon(&dir.path().join("daemon"), "pm2").unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn removes_only_the_service_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = dir.path();
        fs::write(daemon.join("pm2.exe"), b"exe").unwrap();
        fs::write(daemon.join("pm2.json"), b"{}").unwrap();
        fs::create_dir(daemon.join("pm2.logs")).unwrap();
        fs::write(daemon.join("pm2.logs").join("old.log"), b"x").unwrap();
        fs::write(daemon.join("pm2prod.exe"), b"other").unwrap();
        fs::write(daemon.join("other.exe"), b"other").unwrap();

        let mut removed = remove_previous_daemon(daemon, "pm2").unwrap();
        removed.sort();

        assert_eq!(removed.len(), 3);
        assert!(!daemon.join("pm2.exe").exists());
        assert!(!daemon.join("pm2.logs").exists());
        assert!(daemon.join("pm2prod.exe").exists());
        assert!(daemon.join("other.exe").exists());
    }

    #[test]
    fn artifact_paths_follow_the_id() {
        let daemon = Path::new("daemon");
        assert_eq!(host_exe_path(daemon, "pm2"), daemon.join("pm2.exe"));
        assert_eq!(definition_path(daemon, "pm2"), daemon.join("pm2.json"));
    }
}
