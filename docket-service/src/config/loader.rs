//! Configuration loading from files and environment variables.

use config::{Config, Environment, File};

use crate::error::{ServiceError, ServiceResult};

use super::AppConfig;

/// Load configuration from `config.*` (optional) and `DOCKET__*` env vars
pub fn load_config() -> ServiceResult<AppConfig> {
    let config: AppConfig = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("DOCKET")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("limits.supported_mime_types"),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })?;

    config.validate()?;
    Ok(config)
}
