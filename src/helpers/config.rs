use std::{fs, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

/// Registered name when none is supplied on the command line.
pub const DEFAULT_SERVICE_NAME: &str = "PM2";
pub const DAILY_LOG_PATTERN: &str = "yyyyMMdd";

/// What the operator asked for, captured once per run.
///
/// `name` stays `None` when it was not supplied: the default is only applied
/// when the [`ServiceDefinition`] is built, so that an unnamed install never
/// touches the identity state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub script_path: PathBuf,
    pub log_path: PathBuf,
    pub environment: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBinding {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum LogMode {
    RollByTime { pattern: String },
}

/// The registration request handed to the service facility, and the
/// configuration file the service host reads back at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub script: PathBuf,
    pub stop_parent_first: bool,
    pub logging: LogMode,
    pub log_path: PathBuf,
    #[serde(default)]
    pub env: Vec<EnvBinding>,
}

impl ServiceDefinition {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            name: config
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            description: config.description.clone(),
            script: config.script_path.clone(),
            stop_parent_first: true,
            logging: LogMode::RollByTime {
                pattern: DAILY_LOG_PATTERN.to_string(),
            },
            log_path: config.log_path.clone(),
            env: config
                .environment
                .iter()
                .map(|(name, value)| EnvBinding {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    /// Artifact namespace for this service.
    pub fn id(&self) -> String {
        service_id(&self.name)
    }

    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|binding| binding.name == name)
            .map(|binding| binding.value.as_str())
    }
}

/// Strips every non-word character and lowercases, so `"My PM2!"` becomes `mypm2`.
pub fn service_id(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

pub fn write_definition(path: &Path, definition: &ServiceDefinition) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(definition)?;
    fs::write(path, json)
}

pub fn read_definition(path: &Path) -> Result<ServiceDefinition, std::io::Error> {
    let contents = fs::read_to_string(path)?;
    let definition = serde_json::from_str(&contents)?;
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            name: name.map(str::to_string),
            description: Some("pm2 as a service".into()),
            script_path: PathBuf::from("C:\\pm2-service\\pm2-service-host.exe"),
            log_path: PathBuf::from("C:\\pm2\\logs"),
            environment: vec![
                ("PM2_HOME".into(), "C:\\pm2".into()),
                ("PM2_SERVICE_PM2_DIR".into(), "C:\\npm\\node_modules\\pm2".into()),
            ],
        }
    }

    #[test]
    fn unnamed_config_registers_default_name() {
        let definition = ServiceDefinition::from_config(&config(None));
        assert_eq!(definition.name, DEFAULT_SERVICE_NAME);
        assert_eq!(definition.id(), "pm2");
    }

    #[test]
    fn definition_keeps_env_order_and_flags() {
        let definition = ServiceDefinition::from_config(&config(Some("Worker Pool")));
        assert_eq!(definition.name, "Worker Pool");
        assert!(definition.stop_parent_first);
        assert_eq!(
            definition.logging,
            LogMode::RollByTime { pattern: "yyyyMMdd".into() }
        );
        let names: Vec<_> = definition.env.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["PM2_HOME", "PM2_SERVICE_PM2_DIR"]);
        assert_eq!(definition.env_value("PM2_HOME"), Some("C:\\pm2"));
    }

    #[test]
    fn service_id_strips_non_word_characters() {
        assert_eq!(service_id("My PM2!"), "mypm2");
        assert_eq!(service_id("pm2_prod-01"), "pm2_prod01");
    }

    #[test]
    fn definition_file_survives_a_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon").join("pm2.json");
        let definition = ServiceDefinition::from_config(&config(Some("pm2")));

        write_definition(&path, &definition).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"mode\": \"roll-by-time\""));
        assert_eq!(read_definition(&path).unwrap(), definition);
    }
}
