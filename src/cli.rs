use std::path::PathBuf;

use argh::FromArgs;

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum Commands {
    Install(Install),
    Uninstall(Uninstall),
    Version(Version),
}

/// Install PM2 as a Windows service
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "install")]
pub struct Install {
    /// service name (defaults to PM2)
    #[argh(option, short = 'n')]
    pub name: Option<String>,

    /// service description
    #[argh(option, short = 'd')]
    pub description: Option<String>,

    /// folder for the service logs (defaults to %PM2_HOME%\logs)
    #[argh(option, short = 'l')]
    pub logpath: Option<PathBuf>,

    /// skip the environment setup prompt
    #[argh(switch)]
    pub no_setup: bool,

    /// seconds to wait for the service to start, 0 waits forever
    #[argh(option, short = 't', default = "120")]
    pub timeout: u64,
}

/// Stop and remove the PM2 service
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "uninstall")]
pub struct Uninstall {
    /// service name (defaults to the recorded one, then PM2)
    #[argh(option, short = 'n')]
    pub name: Option<String>,
}

/// Show version information
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "version")]
pub struct Version {}

#[derive(FromArgs, Debug)]
/// Run PM2 as a Windows service
pub struct Cli {
    #[argh(subcommand)]
    pub command: Commands,
}
