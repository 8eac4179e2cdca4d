use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::InstallError;

pub const PM2_HOME: &str = "PM2_HOME";
pub const PM2_SERVICE_PM2_DIR: &str = "PM2_SERVICE_PM2_DIR";

/// Snapshot of the environment variables the installer cares about.
pub type EnvMap = BTreeMap<String, String>;

/// The validated PM2 locations every later stage works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pm2Env {
    pub pm2_home: PathBuf,
    pub pm2_dir: PathBuf,
}

impl Pm2Env {
    /// Bindings forwarded into the service's process environment, in order.
    pub fn bindings(&self) -> Vec<(String, String)> {
        vec![
            (PM2_HOME.to_string(), self.pm2_home.to_string_lossy().into_owned()),
            (
                PM2_SERVICE_PM2_DIR.to_string(),
                self.pm2_dir.to_string_lossy().into_owned(),
            ),
        ]
    }
}

/// Read the relevant variables from the process environment once.
pub fn capture_env() -> EnvMap {
    [PM2_HOME, PM2_SERVICE_PM2_DIR]
        .into_iter()
        .filter_map(|name| std::env::var(name).ok().map(|value| (name.to_string(), value)))
        .collect()
}

pub fn check_platform(platform: &str) -> Result<(), InstallError> {
    if platform.starts_with("win") {
        Ok(())
    } else {
        Err(InstallError::WrongPlatform)
    }
}

/// Validate platform and environment, stopping at the first violation.
pub fn check(platform: &str, env: &EnvMap) -> Result<Pm2Env, InstallError> {
    check_platform(platform)?;
    let pm2_home = require_existing(env, PM2_HOME)?;
    let pm2_dir = require_existing(env, PM2_SERVICE_PM2_DIR)?;
    Ok(Pm2Env { pm2_home, pm2_dir })
}

fn require_existing(env: &EnvMap, name: &str) -> Result<PathBuf, InstallError> {
    let value = env
        .get(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| InstallError::MissingEnvVar(name.to_string()))?;

    let path = Path::new(value);
    if !path.exists() {
        return Err(InstallError::MissingPath {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}
