use std::path::PathBuf;
use std::time::Duration;

use crate::commands::setup::EnvironmentSetup;
use crate::error::InstallError;
use crate::helpers::config::{ServiceConfig, ServiceDefinition, service_id};
use crate::helpers::daemon::remove_previous_daemon;
use crate::helpers::path;
use crate::helpers::pm2::DaemonControl;
use crate::helpers::preconditions::{self, EnvMap};
use crate::helpers::sid::SidStore;
use crate::lifecycle::{self, ServiceFacility};
use crate::utils::elevate;

pub const DEFAULT_WAIT: Duration = Duration::from_secs(120);

/// What the operator typed.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub log_path: Option<PathBuf>,
    pub no_setup: bool,
    /// `None` waits for the service facility indefinitely.
    pub wait: Option<Duration>,
}

/// Host facts gathered once at the boundary; no stage reads them again.
#[derive(Debug, Clone)]
pub struct InstallContext {
    pub platform: String,
    pub env: EnvMap,
    pub daemon_dir: PathBuf,
    pub script_path: PathBuf,
    pub sid: SidStore,
}

impl InstallContext {
    pub fn from_host() -> Result<Self, InstallError> {
        let sid_file = path::get_sid_file_path().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not locate the application data directory",
            )
        })?;
        Ok(Self {
            platform: std::env::consts::OS.to_string(),
            env: preconditions::capture_env(),
            daemon_dir: path::get_daemon_dir()?,
            script_path: path::get_service_host_path()?,
            sid: SidStore::new(sid_file),
        })
    }
}

/// A blank name counts as not supplied; one with no usable characters is refused.
fn supplied_name(name: Option<&str>) -> Result<Option<String>, InstallError> {
    match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) if service_id(name).is_empty() => {
            Err(InstallError::InvalidServiceName(name.to_string()))
        }
        other => Ok(other.map(str::to_string)),
    }
}

/// Install and start the PM2 service.
///
/// Stages run strictly in order: preconditions, optional setup, reclaiming
/// the previous instance, then registration. The first fatal error aborts.
pub async fn run<S, D, F>(
    ctx: &InstallContext,
    options: &InstallOptions,
    setup: &S,
    daemon: &D,
    facility: &mut F,
) -> Result<ServiceDefinition, InstallError>
where
    S: EnvironmentSetup + ?Sized,
    D: DaemonControl + ?Sized,
    F: ServiceFacility + ?Sized,
{
    preconditions::check_platform(&ctx.platform)?;
    elevate::admin_warning();
    let pm2_env = preconditions::check(&ctx.platform, &ctx.env)?;

    let name = supplied_name(options.name.as_deref())?;

    if !options.no_setup && setup.wanted()? {
        setup.perform(&pm2_env)?;
    }

    let config = ServiceConfig {
        name,
        description: options.description.clone(),
        script_path: ctx.script_path.clone(),
        log_path: options
            .log_path
            .clone()
            .unwrap_or_else(|| path::default_log_dir(&pm2_env.pm2_home)),
        environment: pm2_env.bindings(),
    };
    let definition = ServiceDefinition::from_config(&config);

    remove_previous_daemon(&ctx.daemon_dir, &definition.id())?;

    // the default name is deliberately never recorded
    if let Some(name) = &config.name {
        println!("Service name: {} stored in: {}.", name, ctx.sid.path().display());
        ctx.sid.save(name)?;
    }

    if let Err(e) = daemon.kill() {
        log::warn!("PM2 daemon was not stopped (probably not running): {}", e);
    }

    let outcome = lifecycle::drive(facility, &definition, options.wait).await?;
    outcome.into_result()?;
    Ok(definition)
}

/// Entry point for the `install` command.
#[cfg(windows)]
pub async fn execute(options: InstallOptions) -> Result<(), InstallError> {
    use colored::Colorize;

    use crate::commands::setup::RegistrySetup;
    use crate::helpers::pm2::Pm2Cli;
    use crate::lifecycle::scm::WindowsFacility;

    let ctx = InstallContext::from_host()?;
    let mut facility = WindowsFacility::new(ctx.daemon_dir.clone());
    let definition = run(&ctx, &options, &RegistrySetup, &Pm2Cli::OnPath, &mut facility).await?;
    println!(
        "{}",
        format!("✅ Service `{}` installed and started.", definition.name).green()
    );
    Ok(())
}

#[cfg(not(windows))]
pub async fn execute(_options: InstallOptions) -> Result<(), InstallError> {
    Err(InstallError::WrongPlatform)
}
