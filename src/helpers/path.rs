use std::{env, path::{Path, PathBuf}};

/// Folder name under the per-user application data directory.
pub const APP_DIR_NAME: &str = "pm2-windows-service";
pub const SERVICE_HOST_EXE: &str = if cfg!(windows) {
    "pm2-service-host.exe"
} else {
    "pm2-service-host"
};

pub fn get_current_exe_dir() -> Result<PathBuf, std::io::Error> {
    let current_exe_path = env::current_exe()?;
    let current_exe_dir = current_exe_path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Failed to get parent directory of the executable",
        )
    })?;
    Ok(current_exe_dir.to_path_buf())
}

/// Where staged service artifacts (`<id>.exe`, `<id>.json`) live.
pub fn get_daemon_dir() -> Result<PathBuf, std::io::Error> {
    Ok(get_current_exe_dir()?.join("daemon"))
}

/// The service host shipped next to the installer.
pub fn get_service_host_path() -> Result<PathBuf, std::io::Error> {
    Ok(get_current_exe_dir()?.join(SERVICE_HOST_EXE))
}

pub fn get_sid_file_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| sid_file_in(&dir))
}

pub fn sid_file_in(data_dir: &Path) -> PathBuf {
    data_dir.join(APP_DIR_NAME).join(".sid")
}

pub fn default_log_dir(pm2_home: &Path) -> PathBuf {
    pm2_home.join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sid_file_lives_under_app_dir() {
        let path = sid_file_in(Path::new("/data"));
        assert_eq!(path, PathBuf::from("/data/pm2-windows-service/.sid"));
    }

    #[test]
    fn logs_default_under_pm2_home() {
        assert_eq!(
            default_log_dir(Path::new("/pm2")),
            PathBuf::from("/pm2/logs")
        );
    }
}
