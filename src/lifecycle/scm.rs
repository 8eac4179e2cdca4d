//! Service Control Manager backed facility.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use windows::Win32::Foundation::ERROR_SERVICE_EXISTS;
use windows_service::{
    service::{
        ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType, ServiceState,
        ServiceType,
    },
    service_manager::{ServiceManager, ServiceManagerAccess},
};

use super::{EventKind, InstallationEvent, ServiceFacility};
use crate::helpers::config::{ServiceDefinition, write_definition};
use crate::helpers::daemon::{definition_path, host_exe_path};

const START_POLL_INTERVAL: Duration = Duration::from_millis(500);
const START_POLL_ATTEMPTS: u32 = 120;

/// Stages the service host under the daemon directory and registers it.
pub struct WindowsFacility {
    daemon_dir: PathBuf,
    tx: Option<UnboundedSender<InstallationEvent>>,
}

impl WindowsFacility {
    pub fn new(daemon_dir: impl Into<PathBuf>) -> Self {
        Self {
            daemon_dir: daemon_dir.into(),
            tx: None,
        }
    }

    fn emit(&self, event: InstallationEvent) {
        match &self.tx {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => log::warn!("dropping {} event, nobody is listening", event.kind),
        }
    }

    /// Copy the host executable and its definition into `<id>.exe` / `<id>.json`.
    fn stage(&self, definition: &ServiceDefinition) -> Result<PathBuf, InstallationEvent> {
        let id = definition.id();
        let exe = host_exe_path(&self.daemon_dir, &id);
        let json = definition_path(&self.daemon_dir, &id);

        let staged = fs::create_dir_all(&self.daemon_dir)
            .and_then(|_| fs::copy(&definition.script, &exe))
            .and_then(|_| write_definition(&json, definition));
        if let Err(e) = staged {
            log::error!("failed to stage {}: {}", exe.display(), e);
        }

        for artifact in [&exe, &json] {
            if !artifact.exists() {
                return Err(InstallationEvent::invalid_installation(format!(
                    "missing {}",
                    artifact.display()
                )));
            }
        }
        Ok(exe)
    }

    fn register(&self, definition: &ServiceDefinition) -> InstallationEvent {
        let exe = match self.stage(definition) {
            Ok(exe) => exe,
            Err(event) => return event,
        };

        let manager = match ServiceManager::local_computer(
            None::<&str>,
            ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
        ) {
            Ok(manager) => manager,
            Err(e) => return InstallationEvent::error(e.to_string()),
        };

        let service_info = ServiceInfo {
            name: OsString::from(&definition.name),
            display_name: OsString::from(&definition.name),
            service_type: ServiceType::OWN_PROCESS,
            start_type: ServiceStartType::AutoStart,
            error_control: ServiceErrorControl::Normal,
            executable_path: exe,
            launch_arguments: vec![],
            dependencies: vec![],
            account_name: None, // LocalSystem
            account_password: None,
        };

        match manager.create_service(&service_info, ServiceAccess::CHANGE_CONFIG) {
            Ok(service) => {
                if let Some(description) = &definition.description {
                    if let Err(e) = service.set_description(description) {
                        log::warn!("could not set service description: {}", e);
                    }
                }
                log::info!("Service {} installed", definition.name);
                InstallationEvent::new(EventKind::Install)
            }
            Err(windows_service::Error::Winapi(e))
                if e.raw_os_error() == Some(ERROR_SERVICE_EXISTS.0 as i32) =>
            {
                log::info!("Service {} is already installed", definition.name);
                InstallationEvent::new(EventKind::AlreadyInstalled)
            }
            Err(e) => InstallationEvent::error(e.to_string()),
        }
    }
}

impl ServiceFacility for WindowsFacility {
    fn subscribe(&mut self) -> UnboundedReceiver<InstallationEvent> {
        let (tx, rx) = unbounded_channel();
        self.tx = Some(tx);
        rx
    }

    fn install(&mut self, definition: &ServiceDefinition) {
        let event = self.register(definition);
        self.emit(event);
    }

    fn start(&mut self, definition: &ServiceDefinition) {
        let Some(tx) = self.tx.clone() else {
            log::warn!("start requested before anyone subscribed");
            return;
        };
        let name = definition.name.clone();
        tokio::task::spawn_blocking(move || {
            let event = start_and_wait(&name).unwrap_or_else(|e| InstallationEvent::error(e.to_string()));
            let _ = tx.send(event);
        });
    }
}

fn start_and_wait(name: &str) -> windows_service::Result<InstallationEvent> {
    let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)?;
    let service = manager.open_service(name, ServiceAccess::START | ServiceAccess::QUERY_STATUS)?;

    if service.query_status()?.current_state != ServiceState::Running {
        service.start::<OsString>(&[])?;
    }

    for _ in 0..START_POLL_ATTEMPTS {
        match service.query_status()?.current_state {
            ServiceState::Running => return Ok(InstallationEvent::new(EventKind::Start)),
            ServiceState::Stopped => {
                return Ok(InstallationEvent::error(format!(
                    "service {} stopped while starting",
                    name
                )));
            }
            _ => std::thread::sleep(START_POLL_INTERVAL),
        }
    }

    Ok(InstallationEvent::error(format!(
        "service {} did not reach the running state",
        name
    )))
}
