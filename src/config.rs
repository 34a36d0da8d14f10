use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

const DATABASE_VAR: &str = "LABSTAFF_DATABASE";
const LOG_LEVEL_VAR: &str = "LABSTAFF_LOG_LEVEL";

/// Runtime settings, resolved from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_path = match env::var(DATABASE_VAR) {
            Ok(value) if value.trim().is_empty() => {
                return Err(ConfigError::EmptyValue { var: DATABASE_VAR });
            }
            Ok(value) => PathBuf::from(value),
            Err(_) => default_database_path(),
        };

        let log_level = env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| "warn".to_string());

        Ok(Self {
            database_path,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn default_database_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "labstaff") {
        proj_dirs.data_dir().join("labstaff.db")
    } else {
        PathBuf::from("labstaff.db")
    }
}
