use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};

/// Console logger for the command line tools. `RUST_LOG` overrides the default.
pub fn init_cli_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(buf, "[{} {}] {}", buf.timestamp_seconds(), record.level(), record.args())
        })
        .init();
}

/// Finest unit a `yyyyMMdd`-style pattern names decides how often files roll.
pub fn rotation_for(pattern: &str) -> Rotation {
    if pattern.contains("mm") {
        Rotation::MINUTELY
    } else if pattern.contains("HH") {
        Rotation::HOURLY
    } else {
        Rotation::DAILY
    }
}

/// File logger for the service host, writing `<prefix>.<date>.log` under `dir`.
pub struct DailyLog {
    writer: Mutex<RollingFileAppender>,
}

impl DailyLog {
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, InitError> {
        let writer = RollingFileAppender::builder()
            .rotation(rotation_for(pattern))
            .filename_prefix(prefix.into())
            .filename_suffix("log")
            .build(dir.into())?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn install(self, level: LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for DailyLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "[{}] {:<5} {}", now, record.level(), record.args());
        }

        #[cfg(debug_assertions)]
        println!("[{}] {}", now, record.args());
    }

    fn flush(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
