use std::fs;

use colored::Colorize;

use crate::error::InstallError;
use crate::helpers::path::default_log_dir;
use crate::helpers::preconditions::Pm2Env;

/// Optional environment preparation run before the service is registered.
pub trait EnvironmentSetup {
    /// Whether the operator wants the setup to run.
    fn wanted(&self) -> Result<bool, InstallError>;
    fn perform(&self, env: &Pm2Env) -> Result<(), InstallError>;
}

/// Persists the PM2 variables machine-wide so the service account sees them.
pub struct RegistrySetup;

impl EnvironmentSetup for RegistrySetup {
    fn wanted(&self) -> Result<bool, InstallError> {
        inquire::Confirm::new("Perform environment setup (recommended)?")
            .with_default(true)
            .prompt()
            .map_err(|e| InstallError::Setup(e.to_string()))
    }

    fn perform(&self, env: &Pm2Env) -> Result<(), InstallError> {
        println!("{}", "Setting up PM2 environment...".yellow());

        let log_dir = default_log_dir(&env.pm2_home);
        fs::create_dir_all(&log_dir)
            .map_err(|e| InstallError::Setup(format!("could not create {}: {}", log_dir.display(), e)))?;

        for (name, value) in env.bindings() {
            set_machine_variable(&name, &value)?;
            log::info!("{} set machine-wide to {}", name, value);
        }
        notify_environment_change();

        println!("{}", "✅ Environment setup complete".green());
        Ok(())
    }
}

#[cfg(windows)]
fn set_machine_variable(name: &str, value: &str) -> Result<(), InstallError> {
    use winreg::RegKey;
    use winreg::enums::*;

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let env = hklm
        .open_subkey_with_flags(
            r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment",
            KEY_READ | KEY_WRITE,
        )
        .map_err(|e| InstallError::Setup(format!("cannot open system environment: {}", e)))?;

    let current: String = env.get_value(name).unwrap_or_default();
    if current != value {
        env.set_value(name, &value.to_string())
            .map_err(|e| InstallError::Setup(format!("cannot set {}: {}", name, e)))?;
    }
    Ok(())
}

#[cfg(not(windows))]
fn set_machine_variable(name: &str, _value: &str) -> Result<(), InstallError> {
    Err(InstallError::Setup(format!(
        "cannot persist {} outside Windows",
        name
    )))
}

#[cfg(windows)]
fn notify_environment_change() {
    use windows::Win32::Foundation::{LPARAM, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        HWND_BROADCAST, SMTO_ABORTIFHUNG, SendMessageTimeoutW, WM_SETTINGCHANGE,
    };
    use windows::core::w;

    unsafe {
        SendMessageTimeoutW(
            HWND_BROADCAST,
            WM_SETTINGCHANGE,
            WPARAM(0),
            LPARAM(w!("Environment").as_ptr() as isize),
            SMTO_ABORTIFHUNG,
            5000,
            None,
        );
    }
}

#[cfg(not(windows))]
fn notify_environment_change() {}
