//! Configuration for the `nestree` binary.
//!
//! Loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `NESTREE_DATA_DIRECTORY`: Directory where tree logs are stored (default: `./data`)
//! - `NESTREE_TREE_NAME`: Name of the tree to open (default: `default`)
//! - `NESTREE_SIMULATION_SEED`: Seed for the simulation workload (default: `0`)
//! - `NESTREE_SIMULATION_STEPS`: Number of operations to run (default: `1000`)
//!
//! # Invariants
//!
//! - `tree_name` passes `validate_tree_name`
//! - `simulation_steps` is at least 1

use std::path::PathBuf;

use crate::registry::validate_tree_name;

/// Binary configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory where tree logs are stored.
    /// Each tree's log is at `{data_directory}/{tree_name}.wal`.
    pub data_directory: PathBuf,
    /// Name of the tree to open.
    pub tree_name: String,
    /// Seed for the simulation workload.
    pub simulation_seed: u64,
    /// Number of operations to run.
    pub simulation_steps: usize,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Default data directory.
    pub const DEFAULT_DATA_DIRECTORY: &'static str = "./data";
    /// Default tree name.
    pub const DEFAULT_TREE_NAME: &'static str = "default";
    /// Default simulation seed.
    pub const DEFAULT_SIMULATION_SEED: u64 = 0;
    /// Default number of simulation steps.
    pub const DEFAULT_SIMULATION_STEPS: usize = 1000;

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `NESTREE_TREE_NAME` is not a valid tree name
    /// - `NESTREE_SIMULATION_SEED` is not a `u64`
    /// - `NESTREE_SIMULATION_STEPS` is not a positive integer
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_directory = lookup("NESTREE_DATA_DIRECTORY")
            .map_or_else(|| PathBuf::from(Self::DEFAULT_DATA_DIRECTORY), PathBuf::from);

        let tree_name = lookup("NESTREE_TREE_NAME")
            .unwrap_or_else(|| Self::DEFAULT_TREE_NAME.to_string());
        validate_tree_name(&tree_name).map_err(|e| ConfigError::InvalidValue {
            name: "NESTREE_TREE_NAME".to_string(),
            message: e.to_string(),
        })?;

        let simulation_seed = match lookup("NESTREE_SIMULATION_SEED") {
            Some(value) => value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                name: "NESTREE_SIMULATION_SEED".to_string(),
                message: format!("'{value}' is not an unsigned 64-bit integer"),
            })?,
            None => Self::DEFAULT_SIMULATION_SEED,
        };

        let simulation_steps = match lookup("NESTREE_SIMULATION_STEPS") {
            Some(value) => match value.parse::<usize>() {
                Ok(steps) if steps > 0 => steps,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "NESTREE_SIMULATION_STEPS".to_string(),
                        message: format!("'{value}' is not a positive integer"),
                    });
                }
            },
            None => Self::DEFAULT_SIMULATION_STEPS,
        };

        Ok(Self {
            data_directory,
            tree_name,
            simulation_seed,
            simulation_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        })
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]).expect("defaults");
        assert_eq!(config.data_directory, PathBuf::from("./data"));
        assert_eq!(config.tree_name, "default");
        assert_eq!(config.simulation_seed, 0);
        assert_eq!(config.simulation_steps, 1000);
    }

    #[test]
    fn test_values_from_lookup() {
        let config = load(&[
            ("NESTREE_DATA_DIRECTORY", "/var/lib/nestree"),
            ("NESTREE_TREE_NAME", "org_chart"),
            ("NESTREE_SIMULATION_SEED", "42"),
            ("NESTREE_SIMULATION_STEPS", "10"),
        ])
        .expect("config");
        assert_eq!(config.data_directory, PathBuf::from("/var/lib/nestree"));
        assert_eq!(config.tree_name, "org_chart");
        assert_eq!(config.simulation_seed, 42);
        assert_eq!(config.simulation_steps, 10);
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [
            ("NESTREE_TREE_NAME", "../up"),
            ("NESTREE_TREE_NAME", ""),
            ("NESTREE_SIMULATION_SEED", "-1"),
            ("NESTREE_SIMULATION_STEPS", "0"),
            ("NESTREE_SIMULATION_STEPS", "many"),
        ] {
            let err = load(&[(name, value)]).expect_err("invalid");
            assert!(
                matches!(&err, ConfigError::InvalidValue { name: n, .. } if n == name),
                "{err}"
            );
        }
    }

    #[test]
    fn test_config_error_display_invalid() {
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
    }
}
