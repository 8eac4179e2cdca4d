use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Everything that can abort an install or uninstall run.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("pm2-windows-service has to be run on Windows...")]
    WrongPlatform,

    #[error("{0} environment variable is not set. This is required for installation.")]
    MissingEnvVar(String),

    #[error("{}", missing_path_message(.name, .path))]
    MissingPath { name: String, path: PathBuf },

    #[error("service name `{0}` has no letters, digits or underscores")]
    InvalidServiceName(String),

    #[error("environment setup failed: {0}")]
    Setup(String),

    #[error("Previous daemon still in use, please stop or uninstall existing service before reinstalling.")]
    ArtifactsInUse(#[source] std::io::Error),

    #[error("failed to write service identity to {path}")]
    SidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("service registration reported an error: {0}")]
    Registration(String),

    #[error("service registration reported an invalid installation: {0}")]
    InvalidInstallation(String),

    #[error("no terminal lifecycle event within {0:?}")]
    Timeout(Duration),

    #[error("service facility stopped emitting events before the service started")]
    EventStreamClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(windows)]
    #[error(transparent)]
    Service(#[from] windows_service::Error),
}

fn missing_path_message(name: &str, path: &std::path::Path) -> String {
    match name {
        "PM2_HOME" => format!(
            "The folder specified by PM2_HOME ({}) does not exist. \nPlease make sure this folder exists before installation.",
            path.display()
        ),
        "PM2_SERVICE_PM2_DIR" => format!(
            "The file specified by PM2_SERVICE_PM2_DIR ({}) does not exist. \nPlease make sure pm2 is properly installed before installation.",
            path.display()
        ),
        other => format!("The path specified by {} ({}) does not exist.", other, path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_names_the_variable() {
        let err = InstallError::MissingPath {
            name: "PM2_HOME".into(),
            path: PathBuf::from("C:\\nowhere"),
        };
        let message = err.to_string();
        assert!(message.starts_with("The folder specified by PM2_HOME (C:\\nowhere)"));

        let err = InstallError::MissingPath {
            name: "PM2_SERVICE_PM2_DIR".into(),
            path: PathBuf::from("C:\\pm2"),
        };
        assert!(err.to_string().contains("pm2 is properly installed"));
    }

    #[test]
    fn missing_var_message() {
        let err = InstallError::MissingEnvVar("PM2_HOME".into());
        assert_eq!(
            err.to_string(),
            "PM2_HOME environment variable is not set. This is required for installation."
        );
    }
}
