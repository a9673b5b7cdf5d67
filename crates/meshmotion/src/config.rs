//! Run configuration, read from TOML files.
//!
//! Every field is optional; missing ones take the values of [`Config::default`].
//!
//! ```toml
//! mesh = "FredTheFrog.msh"
//! output_dir = "FredTheFrogEat"
//! file_prefix = "FredTheFrog"
//! tau = 0.01
//! steps = 17
//! write_collection = true
//!
//! [policy]
//! kind = "eat"
//! max_velocity = 100.0
//! omega = 50.0
//! max_z = 20.0
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use meshmotion_core::{EatParams, ExplodeParams, RotateParams, TetMesh, VelocityPolicy};
use serde::Deserialize;

/// Error in reading a [`Config`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The config file couldn't be read.
    #[error("Failed to read config file {path}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The config file isn't valid TOML or has fields of the wrong type.
    #[error("Failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// A value is out of its allowed range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parameters of one simulation run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path of the gmsh `.msh` file to animate.
    pub mesh: PathBuf,
    /// Directory the `.vtu` files are written into. Must already exist.
    pub output_dir: PathBuf,
    /// Files are named `<file_prefix>-step-<i>.vtu`.
    pub file_prefix: String,
    /// Timestep length.
    pub tau: f64,
    /// Number of timesteps after the initial snapshot.
    pub steps: usize,
    /// Whether to write a `<file_prefix>.pvd` collection at the end.
    pub write_collection: bool,
    /// The velocity field moving the mesh.
    pub policy: PolicyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mesh: PathBuf::from("FredTheFrog.msh"),
            output_dir: PathBuf::from("FredTheFrogEat"),
            file_prefix: "FredTheFrog".to_string(),
            tau: 0.01,
            steps: 17,
            write_collection: true,
            policy: PolicyConfig::Eat {
                max_velocity: default_max_velocity(),
                omega: default_eat_omega(),
                max_z: Some(EatParams::default().max_z),
            },
        }
    }
}

impl Config {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values make sense for a simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tau.is_finite() && self.tau > 0.) {
            return Err(ConfigError::Invalid(format!(
                "tau must be positive and finite, got {}",
                self.tau
            )));
        }
        if self.steps == 0 {
            return Err(ConfigError::Invalid("steps must be at least 1".into()));
        }
        if self.file_prefix.is_empty() {
            return Err(ConfigError::Invalid("file_prefix must not be empty".into()));
        }
        self.policy.validate()
    }
}

/// The velocity policy as written in a config file,
/// selected by the `kind` key.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PolicyConfig {
    /// See [`VelocityPolicy::Rotate`].
    Rotate {
        /// Angular velocity.
        #[serde(default = "default_rotate_omega")]
        omega: f64,
    },
    /// See [`VelocityPolicy::Eat`].
    Eat {
        /// Pulsation amplitude.
        #[serde(default = "default_max_velocity")]
        max_velocity: f64,
        /// Pulsation angular frequency.
        #[serde(default = "default_eat_omega")]
        omega: f64,
        /// Height where the phase is zero.
        /// If omitted, 90% of the mesh's maximum z is used.
        #[serde(default)]
        max_z: Option<f64>,
    },
    /// See [`VelocityPolicy::Explode`].
    Explode {
        /// Initial speed of every node.
        #[serde(default = "default_explode_velocity")]
        velocity: f64,
    },
}

fn default_rotate_omega() -> f64 {
    RotateParams::default().omega
}
fn default_max_velocity() -> f64 {
    EatParams::default().max_velocity
}
fn default_eat_omega() -> f64 {
    EatParams::default().omega
}
fn default_explode_velocity() -> f64 {
    ExplodeParams::default().velocity
}

impl PolicyConfig {
    /// Build the velocity policy for a specific mesh.
    ///
    /// The mesh is only needed to fill in a missing Eat `max_z`.
    pub fn to_policy(&self, mesh: &TetMesh) -> VelocityPolicy {
        match *self {
            Self::Rotate { omega } => VelocityPolicy::Rotate(RotateParams { omega }),
            Self::Eat {
                max_velocity,
                omega,
                max_z,
            } => VelocityPolicy::Eat(EatParams {
                max_velocity,
                omega,
                max_z: max_z.unwrap_or_else(|| EatParams::fitted(mesh).max_z),
            }),
            Self::Explode { velocity } => VelocityPolicy::Explode(ExplodeParams { velocity }),
        }
    }

    /// Check that every parameter is a finite number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let params: Vec<(&str, Option<f64>)> = match *self {
            Self::Rotate { omega } => vec![("omega", Some(omega))],
            Self::Eat {
                max_velocity,
                omega,
                max_z,
            } => vec![
                ("max_velocity", Some(max_velocity)),
                ("omega", Some(omega)),
                ("max_z", max_z),
            ],
            Self::Explode { velocity } => vec![("velocity", Some(velocity))],
        };
        for (name, value) in params {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "policy {name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}
