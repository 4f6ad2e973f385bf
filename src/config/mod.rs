// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for melodygen.
//!
//! Defaults for the form are read once at startup from a sectioned TOML
//! file. Every key is optional; a missing file or key falls back to the
//! built-in value. Relative paths are resolved to absolute paths before
//! they reach the form.

use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Errors raised while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("cannot determine working directory: {0}")]
    WorkingDir(io::Error),
}

/// Raw configuration file contents, before path resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    /// File and folder locations
    #[serde(default, alias = "Paths")]
    pub paths: PathsConfig,
    /// Default values for the numeric form fields
    #[serde(default, alias = "Defaults")]
    pub defaults: DefaultsConfig,
    /// External generator invocation
    #[serde(default, alias = "Generator")]
    pub generator: GeneratorConfig,
}

impl ConfigFile {
    /// Load a configuration file, falling back to defaults when it is absent
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {:?} not found, using built-in defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve all paths against `base` and produce the effective settings
    pub fn resolve_against(&self, base: &Path) -> Settings {
        Settings {
            checkpoints_folder: resolve_path(&self.paths.checkpoints_folder, base),
            bundle_file: resolve_path(&self.paths.bundle_file, base),
            output_dir: resolve_path(&self.paths.output_dir, base),
            primer_midi: resolve_path(&self.paths.primer_midi, base),
            num_outputs: self.defaults.num_outputs,
            num_steps: self.defaults.num_steps,
            temperature: self.defaults.temperature,
            command: self.generator.command.clone(),
            args: self.generator.args.clone(),
        }
    }
}

/// `[paths]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Folder scanned for `.mag` bundle files
    #[serde(default = "default_checkpoints_folder", alias = "CheckpointsFolder")]
    pub checkpoints_folder: String,
    /// Bundle preselected in the form
    #[serde(default = "default_bundle_file", alias = "BundleFile")]
    pub bundle_file: String,
    /// Folder generated melodies are written to
    #[serde(
        default = "default_output_dir",
        alias = "OutputDir",
        alias = "OutputFolder",
        alias = "DefaultOutputFolder"
    )]
    pub output_dir: String,
    /// Primer melody preselected in the form
    #[serde(default = "default_primer_midi", alias = "PrimerMidi")]
    pub primer_midi: String,
}

fn default_checkpoints_folder() -> String {
    "./checkpoints".to_string()
}
fn default_bundle_file() -> String {
    "./attention_rnn.mag".to_string()
}
fn default_output_dir() -> String {
    "./output".to_string()
}
fn default_primer_midi() -> String {
    "./duke_melody.mid".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            checkpoints_folder: default_checkpoints_folder(),
            bundle_file: default_bundle_file(),
            output_dir: default_output_dir(),
            primer_midi: default_primer_midi(),
        }
    }
}

/// `[defaults]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    /// Number of melodies written per run
    #[serde(default = "default_num_outputs", alias = "NumOutputs")]
    pub num_outputs: usize,
    /// Generated length in steps
    #[serde(default = "default_num_steps", alias = "NumSteps")]
    pub num_steps: usize,
    /// Sampling temperature
    #[serde(default = "default_temperature", alias = "Temperature")]
    pub temperature: f64,
}

fn default_num_outputs() -> usize {
    10
}
fn default_num_steps() -> usize {
    1024
}
fn default_temperature() -> f64 {
    1.0
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            num_outputs: default_num_outputs(),
            num_steps: default_num_steps(),
            temperature: default_temperature(),
        }
    }
}

/// `[generator]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    /// Program run once per generated melody
    #[serde(default = "default_command", alias = "Command")]
    pub command: String,
    /// Extra arguments placed before the generated flags
    #[serde(default, alias = "Args")]
    pub args: Vec<String>,
}

fn default_command() -> String {
    "melody_rnn_generate".to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
        }
    }
}

/// Effective, read-only settings with absolute paths
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub checkpoints_folder: PathBuf,
    pub bundle_file: PathBuf,
    pub output_dir: PathBuf,
    pub primer_midi: PathBuf,
    pub num_outputs: usize,
    pub num_steps: usize,
    pub temperature: f64,
    pub command: String,
    pub args: Vec<String>,
}

impl Settings {
    /// Load settings, resolving relative paths against the working directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let base = env::current_dir().map_err(ConfigError::WorkingDir)?;
        let settings = ConfigFile::load(path)?.resolve_against(&base);
        debug!("Default output folder: {}", settings.output_dir.display());
        debug!("Checkpoints folder: {}", settings.checkpoints_folder.display());
        Ok(settings)
    }

    /// Built-in settings resolved against `base`
    pub fn defaults_in(base: &Path) -> Self {
        ConfigFile::default().resolve_against(base)
    }

    /// Render these settings as a configuration file
    pub fn to_config_file(&self) -> ConfigFile {
        ConfigFile {
            paths: PathsConfig {
                checkpoints_folder: self.checkpoints_folder.display().to_string(),
                bundle_file: self.bundle_file.display().to_string(),
                output_dir: self.output_dir.display().to_string(),
                primer_midi: self.primer_midi.display().to_string(),
            },
            defaults: DefaultsConfig {
                num_outputs: self.num_outputs,
                num_steps: self.num_steps,
                temperature: self.temperature,
            },
            generator: GeneratorConfig {
                command: self.command.clone(),
                args: self.args.clone(),
            },
        }
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self.to_config_file())?)
    }

    /// Save as a TOML configuration file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        fs::write(path.as_ref(), contents).map_err(|source| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

/// Expand `~`, make `raw` absolute against `base` and normalize it lexically.
///
/// The target does not need to exist, so no symlinks are followed.
pub fn resolve_path(raw: &str, base: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(raw.trim());
    let path = Path::new(expanded.as_ref());
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
