use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::helpers::config::EnvBinding;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Control over the running PM2 daemon.
pub trait DaemonControl {
    /// Ask the daemon to shut down along with every process it manages.
    fn kill(&self) -> io::Result<()>;
}

/// How to reach the pm2 command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pm2Cli {
    /// Whatever `pm2` resolves to through `PATH`.
    OnPath,
    /// `node <module>/bin/pm2`, for hosts that must not depend on `PATH`.
    Module(PathBuf),
}

impl Pm2Cli {
    /// `PM2_SERVICE_PM2_DIR` may name the pm2 module folder or its `index.js`.
    pub fn from_pm2_dir(pm2_dir: &Path) -> Self {
        let module = if pm2_dir.is_file() {
            pm2_dir.parent().unwrap_or(pm2_dir)
        } else {
            pm2_dir
        };
        Pm2Cli::Module(module.to_path_buf())
    }

    pub fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let mut command = match self {
            Pm2Cli::OnPath if cfg!(windows) => {
                // pm2 is installed as pm2.cmd, which needs the shell
                let mut command = Command::new("cmd");
                command.arg("/C").arg("pm2");
                command
            }
            Pm2Cli::OnPath => Command::new("pm2"),
            Pm2Cli::Module(module) => {
                let mut command = Command::new("node");
                command.arg(module.join("bin").join("pm2"));
                command
            }
        };
        command.args(args);
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);
        command
    }

    pub fn run<I, S>(&self, args: I) -> io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.run_with_env(args, &[])
    }

    /// Run with extra environment bindings, failing on a non-zero exit.
    pub fn run_with_env<I, S>(&self, args: I, env: &[EnvBinding]) -> io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut command = self.command(args);
        command.envs(env.iter().map(|binding| (&binding.name, &binding.value)));
        let output = command.output()?;
        if output.status.success() {
            Ok(output)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(io::Error::other(format!(
                "pm2 exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

impl DaemonControl for Pm2Cli {
    fn kill(&self) -> io::Result<()> {
        self.run(["kill"]).map(|_| ())
    }
}

/// Best guess at the globally installed pm2 module, used for hints only.
pub fn guess_global_dir() -> Option<PathBuf> {
    let pm2 = which::which("pm2").ok()?;
    let real = fs::canonicalize(pm2).ok()?;
    Some(
        real.parent()?
            .join("node_modules")
            .join("pm2")
            .join("index.js"),
    )
}
