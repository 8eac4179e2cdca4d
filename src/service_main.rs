//! The executable the PM2 Windows service runs.
//!
//! The installer stages this binary as `daemon/<id>.exe` next to
//! `daemon/<id>.json`, the service definition it reads at startup.

#[cfg(windows)]
mod host {
    use std::ffi::OsString;
    use std::path::Path;
    use std::sync::OnceLock;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use log::LevelFilter;
    use pm2_service::helpers::config::{LogMode, ServiceDefinition, read_definition};
    use pm2_service::helpers::logging::DailyLog;
    use pm2_service::helpers::pm2::Pm2Cli;
    use pm2_service::helpers::preconditions::PM2_SERVICE_PM2_DIR;
    use windows_service::{
        define_windows_service,
        service::{
            ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
            ServiceType,
        },
        service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle},
        service_dispatcher,
    };

    static DEFINITION: OnceLock<ServiceDefinition> = OnceLock::new();

    define_windows_service!(ffi_service_main, pm2_service_main);

    pub fn main() -> Result<()> {
        let definition_path = std::env::current_exe()?.with_extension("json");
        let definition = read_definition(&definition_path)
            .with_context(|| format!("reading {}", definition_path.display()))?;

        let LogMode::RollByTime { pattern } = &definition.logging;
        DailyLog::new(&definition.log_path, definition.id(), pattern)
            .context("opening service log")?
            .install(LevelFilter::Info)
            .context("installing logger")?;

        let name = definition.name.clone();
        let _ = DEFINITION.set(definition);
        service_dispatcher::start(name, ffi_service_main)?;
        Ok(())
    }

    fn pm2_service_main(_arguments: Vec<OsString>) {
        if let Err(e) = run_service() {
            log::error!("Service failed: {:#}", e);
        }
    }

    fn run_service() -> Result<()> {
        let definition = DEFINITION.get().context("service definition not loaded")?;
        let (stop_tx, stop_rx) = channel();

        let status_handle = service_control_handler::register(
            &definition.name,
            move |control_event| match control_event {
                ServiceControl::Stop | ServiceControl::Shutdown => {
                    let _ = stop_tx.send(());
                    ServiceControlHandlerResult::NoError
                }
                ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
                _ => ServiceControlHandlerResult::NotImplemented,
            },
        )?;

        let pid = std::process::id();
        log::info!("Service {} started with PID: {}", definition.name, pid);
        set_state(
            &status_handle,
            ServiceState::Running,
            ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN,
        )?;

        let pm2 = definition
            .env_value(PM2_SERVICE_PM2_DIR)
            .map(|dir| Pm2Cli::from_pm2_dir(Path::new(dir)))
            .unwrap_or(Pm2Cli::OnPath);

        match pm2.run_with_env(["resurrect"], &definition.env) {
            Ok(_) => log::info!("PM2 process list resurrected"),
            Err(e) => log::error!("pm2 resurrect failed: {}", e),
        }

        // Keep service alive until stop is requested
        let _ = stop_rx.recv();
        log::info!("Received stop event.");
        set_state(&status_handle, ServiceState::StopPending, ServiceControlAccept::empty())?;

        if definition.stop_parent_first {
            if let Err(e) = pm2.run_with_env(["kill"], &definition.env) {
                log::warn!("pm2 kill failed: {}", e);
            }
        }

        set_state(&status_handle, ServiceState::Stopped, ServiceControlAccept::empty())?;
        log::info!("Service stopped.");
        Ok(())
    }

    fn set_state(
        handle: &ServiceStatusHandle,
        state: ServiceState,
        controls: ServiceControlAccept,
    ) -> windows_service::Result<()> {
        handle.set_service_status(ServiceStatus {
            service_type: ServiceType::OWN_PROCESS,
            current_state: state,
            controls_accepted: controls,
            exit_code: ServiceExitCode::Win32(0),
            checkpoint: 0,
            wait_hint: if state == ServiceState::StopPending {
                Duration::from_secs(30)
            } else {
                Duration::ZERO
            },
            process_id: Some(std::process::id()),
        })
    }
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    host::main()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("pm2-service-host only runs as a Windows service");
    std::process::exit(1);
}
