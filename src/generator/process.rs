// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! External process backend.
//!
//! Runs a `melody_rnn_generate`-compatible command once per melody. The
//! primer is handed over as a MIDI file in a scratch directory and the
//! single MIDI file the command writes there is read back. Its bytes are
//! kept as written so nothing but the notes is lost.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, trace};

use super::{GeneratedMelody, GeneratorError, GeneratorOptions, ModelLoader, SequenceGenerator};
use crate::bundle::Bundle;
use crate::sequence::{NoteSequence, SequenceError};

/// Loader producing `ProcessGenerator`s for a fixed command
#[derive(Debug, Clone)]
pub struct ProcessLoader {
    command: String,
    args: Vec<String>,
}

impl ProcessLoader {
    /// Create a loader for `command`, placing `args` before the generated flags
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl ModelLoader for ProcessLoader {
    fn initialize(&self, bundle: &Bundle) -> Result<Box<dyn SequenceGenerator>, GeneratorError> {
        Ok(Box::new(ProcessGenerator {
            command: self.command.clone(),
            args: self.args.clone(),
            config_id: bundle.config_id().to_string(),
            bundle_file: bundle.path().to_path_buf(),
        }))
    }
}

/// Generator that shells out to the external model
#[derive(Debug, Clone)]
pub struct ProcessGenerator {
    command: String,
    args: Vec<String>,
    config_id: String,
    bundle_file: PathBuf,
}

impl ProcessGenerator {
    /// Full argument list for one invocation
    pub fn command_args(
        &self,
        output_dir: &Path,
        primer_midi: &Path,
        options: &GeneratorOptions,
    ) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(format!("--config={}", self.config_id));
        args.push(format!("--bundle_file={}", self.bundle_file.display()));
        args.push(format!("--output_dir={}", output_dir.display()));
        args.push("--num_outputs=1".to_string());
        args.push(format!("--num_steps={}", options.num_steps));
        args.push(format!("--primer_midi={}", primer_midi.display()));
        args.push(format!("--temperature={}", options.temperature));
        args
    }
}

impl SequenceGenerator for ProcessGenerator {
    fn id(&self) -> &str {
        &self.config_id
    }

    fn generate(
        &mut self,
        primer: &NoteSequence,
        options: &GeneratorOptions,
    ) -> Result<GeneratedMelody, GeneratorError> {
        let scratch = tempfile::Builder::new()
            .prefix("melodygen-")
            .tempdir()
            .map_err(GeneratorError::Scratch)?;

        let primer_path = scratch.path().join("primer.mid");
        primer.write_midi_file(&primer_path)?;

        let output_dir = scratch.path().join("generated");
        fs::create_dir(&output_dir).map_err(GeneratorError::Scratch)?;

        let args = self.command_args(&output_dir, &primer_path, options);
        debug!("Running {} {}", self.command, args.join(" "));

        let output = Command::new(&self.command)
            .args(&args)
            .output()
            .map_err(|source| GeneratorError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        trace!("Generator stdout: {}", String::from_utf8_lossy(&output.stdout));
        if !output.status.success() {
            return Err(GeneratorError::Process {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let generated = find_midi_file(&output_dir)?
            .ok_or_else(|| GeneratorError::NoOutput(output_dir.clone()))?;
        let midi = fs::read(&generated).map_err(|source| SequenceError::Read {
            path: generated.clone(),
            source,
        })?;
        Ok(GeneratedMelody::from_midi(midi)?)
    }
}

/// First MIDI file in `dir` by name
fn find_midi_file(dir: &Path) -> Result<Option<PathBuf>, GeneratorError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(GeneratorError::Scratch)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files.into_iter().next())
}
