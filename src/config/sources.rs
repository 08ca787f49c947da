//! Layered config loading: defaults < `.env` file < process environment.
//!
//! The source set here is flat environment variables rather than a TOML
//! file — this system has no per-handler configuration to express in a
//! file.

use super::models::Config;
use super::ConfigError;

const ENV_PREFIX: &str = "JOBMESH";

pub fn load() -> Result<Config, ConfigError> {
    // Best-effort: a missing .env file is normal in production.
    let _ = dotenvy::dotenv();

    let builder = config::Config::builder()
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        )
        // Also accept the bare names (DATABASE_URL, not JOBMESH_DATABASE_URL)
        // since that's the documented contract.
        .add_source(config::Environment::default().try_parsing(true));

    let raw = builder.build()?;
    let config: Config = raw.try_deserialize()?;
    Ok(config)
}
