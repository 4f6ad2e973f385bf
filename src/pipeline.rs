// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The generate operation.
//!
//! Loads the bundle, reads the primer and writes `output_1.mid` through
//! `output_N.mid`. Files written before a failure are left in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::bundle::{Bundle, BundleError};
use crate::generator::{GeneratorError, GeneratorMap, GeneratorOptions};
use crate::request::GenerationRequest;
use crate::sequence::{NoteSequence, SequenceError};

/// Errors raised by a generation run
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Model(GeneratorError),

    #[error("failed to create output folder {}: {source}", .path.display())]
    OutputDir { path: PathBuf, source: io::Error },

    #[error("failed to read primer: {0}")]
    Primer(SequenceError),

    #[error(transparent)]
    Options(GeneratorError),

    #[error("melody {index} of {total} failed: {source}")]
    Generation {
        index: usize,
        total: usize,
        source: GeneratorError,
    },

    #[error(transparent)]
    Write(SequenceError),
}

/// Files written by a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// Folder the melodies were written to
    pub output_dir: PathBuf,
    /// Written files, in order
    pub files: Vec<PathBuf>,
}

impl GenerationReport {
    /// Status line shown after a successful run
    pub fn status_text(&self) -> String {
        format!(
            "{} Melodies Generated in {}",
            self.files.len(),
            self.output_dir.display()
        )
    }
}

/// Name of the `index`-th output file (1-based)
pub fn output_file_name(index: usize) -> String {
    format!("output_{}.mid", index)
}

/// Path of the `index`-th output file in `output_dir`
pub fn output_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(output_file_name(index))
}

/// Run one generation request
pub fn generate_melodies(
    map: &GeneratorMap,
    request: &GenerationRequest,
) -> Result<GenerationReport, GenerateError> {
    info!("Selected bundle file: {}", request.bundle_file.display());
    let bundle = Bundle::open(&request.bundle_file)?;
    let mut generator = map.initialize(&bundle).map_err(GenerateError::Model)?;

    if !request.output_dir.exists() {
        info!("Creating output folder {}", request.output_dir.display());
    }
    fs::create_dir_all(&request.output_dir).map_err(|source| GenerateError::OutputDir {
        path: request.output_dir.clone(),
        source,
    })?;

    let primer = NoteSequence::read_midi_file(&request.primer_midi).map_err(GenerateError::Primer)?;
    let options = GeneratorOptions::for_primer(&primer, request.num_steps, request.temperature)
        .map_err(GenerateError::Options)?;

    // The count is user input; grow as files are written
    let mut files = Vec::new();
    for index in 1..=request.num_outputs {
        let melody = generator
            .generate(&primer, &options)
            .map_err(|source| GenerateError::Generation {
                index,
                total: request.num_outputs,
                source,
            })?;

        let path = output_path(&request.output_dir, index);
        melody.write_midi_file(&path).map_err(GenerateError::Write)?;
        info!("Wrote {} ({} notes)", path.display(), melody.sequence.len());
        files.push(path);
    }

    Ok(GenerationReport {
        output_dir: request.output_dir.clone(),
        files,
    })
}

/// Run a request and render the outcome as status text; never fails
pub fn run_to_status(map: &GeneratorMap, request: &GenerationRequest) -> String {
    match generate_melodies(map, request) {
        Ok(report) => report.status_text(),
        Err(e) => {
            error!("Generation failed: {}", error_chain(&e));
            format!("Error: {}", e)
        }
    }
}

/// Error message followed by each of its causes
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
