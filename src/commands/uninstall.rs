use std::path::Path;

use crate::error::InstallError;
use crate::helpers::config::{DEFAULT_SERVICE_NAME, service_id};
use crate::helpers::daemon::remove_previous_daemon;
use crate::helpers::sid::SidStore;

/// Explicit name first, then the recorded identity, then the default.
pub fn resolve_service_name(explicit: Option<&str>, sid: &SidStore) -> String {
    if let Some(name) = explicit.map(str::trim).filter(|name| !name.is_empty()) {
        return name.to_string();
    }
    match sid.load() {
        Ok(Some(name)) => name,
        Ok(None) => DEFAULT_SERVICE_NAME.to_string(),
        Err(e) => {
            log::warn!("could not read {}: {}", sid.path().display(), e);
            DEFAULT_SERVICE_NAME.to_string()
        }
    }
}

/// Remove what the installer left on disk for `name`.
pub fn remove_artifacts(daemon_dir: &Path, name: &str, sid: &SidStore) -> Result<(), InstallError> {
    remove_previous_daemon(daemon_dir, &service_id(name))?;
    if sid.load()?.as_deref() == Some(name) {
        sid.remove()?;
    }
    Ok(())
}

#[cfg(windows)]
pub fn execute(name: Option<String>) -> Result<(), InstallError> {
    use colored::Colorize;

    use crate::helpers::path;
    use crate::helpers::preconditions::check_platform;

    check_platform(std::env::consts::OS)?;
    crate::utils::elevate::admin_warning();

    let sid_file = path::get_sid_file_path().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not locate the application data directory",
        )
    })?;
    let sid = SidStore::new(sid_file);
    let name = resolve_service_name(name.as_deref(), &sid);

    println!("{}", format!("Removing service `{}`...", name).yellow());
    scm::stop_and_delete(&name)?;
    remove_artifacts(&path::get_daemon_dir()?, &name, &sid)?;

    println!("{}", format!("✅ Service `{}` uninstalled.", name).green());
    Ok(())
}

#[cfg(not(windows))]
pub fn execute(_name: Option<String>) -> Result<(), InstallError> {
    Err(InstallError::WrongPlatform)
}

#[cfg(windows)]
mod scm {
    use std::time::Duration;

    use windows::Win32::Foundation::ERROR_SERVICE_DOES_NOT_EXIST;
    use windows_service::{
        service::{ServiceAccess, ServiceState},
        service_manager::{ServiceManager, ServiceManagerAccess},
    };

    use crate::error::InstallError;

    pub fn stop_and_delete(name: &str) -> Result<(), InstallError> {
        let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)?;
        let service = match manager.open_service(
            name,
            ServiceAccess::STOP | ServiceAccess::DELETE | ServiceAccess::QUERY_STATUS,
        ) {
            Ok(service) => service,
            Err(windows_service::Error::Winapi(e))
                if e.raw_os_error() == Some(ERROR_SERVICE_DOES_NOT_EXIST.0 as i32) =>
            {
                log::warn!("service {} is not registered", name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if service.query_status()?.current_state != ServiceState::Stopped {
            if let Err(e) = service.stop() {
                // Service might already be stopping, that's ok
                log::warn!("error stopping service {}: {}", name, e);
            }
            for _ in 0..60 {
                if service.query_status()?.current_state == ServiceState::Stopped {
                    break;
                }
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        service.delete()?;
        log::info!("service {} deleted", name);
        Ok(())
    }
}
