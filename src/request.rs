// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Generation requests assembled from form values.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{resolve_path, Settings};

/// Errors raised while reading form values
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("{field} must be a number, got '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("cannot determine working directory: {0}")]
    WorkingDir(String),
}

/// Raw text of the form fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormInput {
    pub bundle_file: String,
    pub primer_midi: String,
    pub output_dir: String,
    pub num_outputs: String,
    pub num_steps: String,
    pub temperature: String,
}

impl FormInput {
    /// Form values pre-filled from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bundle_file: settings.bundle_file.display().to_string(),
            primer_midi: settings.primer_midi.display().to_string(),
            output_dir: settings.output_dir.display().to_string(),
            num_outputs: settings.num_outputs.to_string(),
            num_steps: settings.num_steps.to_string(),
            temperature: settings.temperature.to_string(),
        }
    }
}

/// One generation run's parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model bundle to load
    pub bundle_file: PathBuf,
    /// Seed melody
    pub primer_midi: PathBuf,
    /// Folder receiving `output_<n>.mid`
    pub output_dir: PathBuf,
    /// Number of melodies to write
    pub num_outputs: usize,
    /// Total length in steps
    pub num_steps: usize,
    /// Sampling temperature
    pub temperature: f64,
}

impl GenerationRequest {
    /// Request using only the configured defaults
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bundle_file: settings.bundle_file.clone(),
            primer_midi: settings.primer_midi.clone(),
            output_dir: settings.output_dir.clone(),
            num_outputs: settings.num_outputs,
            num_steps: settings.num_steps,
            temperature: settings.temperature,
        }
    }

    /// Build a request from form text, resolving against the working directory
    pub fn from_form(input: &FormInput, settings: &Settings) -> Result<Self, RequestError> {
        let base = env::current_dir().map_err(|e| RequestError::WorkingDir(e.to_string()))?;
        Self::from_form_in(input, settings, &base)
    }

    /// Build a request from form text.
    ///
    /// Blank fields take the configured default. A bundle given as a bare
    /// file name is looked up in the checkpoints folder; other relative
    /// paths are resolved against `base`.
    pub fn from_form_in(
        input: &FormInput,
        settings: &Settings,
        base: &Path,
    ) -> Result<Self, RequestError> {
        let bundle_file = match input.bundle_file.trim() {
            "" => settings.bundle_file.clone(),
            name if is_bare_file_name(name) => settings.checkpoints_folder.join(name),
            path => resolve_path(path, base),
        };

        Ok(Self {
            bundle_file,
            primer_midi: path_or(&input.primer_midi, &settings.primer_midi, base),
            output_dir: path_or(&input.output_dir, &settings.output_dir, base),
            num_outputs: number_or("Number of Outputs", &input.num_outputs, settings.num_outputs)?,
            num_steps: number_or("Number of Steps", &input.num_steps, settings.num_steps)?,
            temperature: number_or("Temperature", &input.temperature, settings.temperature)?,
        })
    }
}

fn is_bare_file_name(value: &str) -> bool {
    let path = Path::new(value);
    !value.starts_with('~') && path.components().count() == 1 && path.file_name().is_some()
}

fn path_or(value: &str, default: &Path, base: &Path) -> PathBuf {
    if value.trim().is_empty() {
        default.to_path_buf()
    } else {
        resolve_path(value, base)
    }
}

fn number_or<T: std::str::FromStr>(
    field: &'static str,
    value: &str,
    default: T,
) -> Result<T, RequestError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(default);
    }
    value.parse().map_err(|_| RequestError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
