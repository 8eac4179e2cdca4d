use std::time::Duration;

use anyhow::Context;
use pm2_service::InstallError;
use pm2_service::commands::{install, uninstall};
use pm2_service::helpers::preconditions::PM2_SERVICE_PM2_DIR;
use pm2_service::helpers::{logging, pm2};

mod cli;

#[tokio::main]
async fn main() {
    logging::init_cli_logger();
    let cli: cli::Cli = argh::from_env();

    if let Err(e) = real_main(cli).await {
        log::error!("{e:#}");
        if let Some(InstallError::MissingEnvVar(name)) = e.downcast_ref::<InstallError>() {
            if name == PM2_SERVICE_PM2_DIR {
                if let Some(guess) = pm2::guess_global_dir() {
                    log::info!("pm2 appears to be installed at {}", guess.display());
                }
            }
        }
        std::process::exit(1);
    }
}

async fn real_main(cli: cli::Cli) -> anyhow::Result<()> {
    match cli.command {
        cli::Commands::Install(args) => {
            let options = install::InstallOptions {
                name: args.name,
                description: args.description,
                log_path: args.logpath,
                no_setup: args.no_setup,
                wait: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
            };
            install::execute(options)
                .await
                .context("installation failed")?;
        }
        cli::Commands::Uninstall(args) => {
            uninstall::execute(args.name).context("uninstall failed")?;
        }
        cli::Commands::Version(_) => {
            println!(
                "pm2-service {} ({} built {})",
                env!("CARGO_PKG_VERSION"),
                env!("GIT_HASH"),
                env!("BUILD_DATE")
            );
        }
    }
    Ok(())
}
