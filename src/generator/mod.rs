// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Melody generator abstraction.
//!
//! The model itself is an external collaborator. This module provides the
//! trait seam it plugs into:
//! - `ModelLoader` turns a bundle into a ready `SequenceGenerator`
//! - `SequenceGenerator` continues a primer into a new sequence
//! - `GeneratorMap` picks the loader from the bundle's configuration id

pub mod process;

pub use process::{ProcessGenerator, ProcessLoader};

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bundle::Bundle;
use crate::config::Settings;
use crate::sequence::{NoteSequence, SequenceError};

/// Melody RNN configurations understood by the external generator
pub const MELODY_RNN_CONFIGS: [&str; 4] = ["basic_rnn", "mono_rnn", "lookback_rnn", "attention_rnn"];

/// Errors raised by model loading or generation
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Unknown model configuration '{id}' (known: {})", .known.join(", "))]
    UnknownConfig { id: String, known: Vec<String> },

    #[error(
        "Primer is {primer_seconds:.2}s long but only {requested_seconds:.2}s were requested; increase the number of steps"
    )]
    PrimerTooLong {
        primer_seconds: f64,
        requested_seconds: f64,
    },

    #[error("failed to start generator command '{command}': {source}")]
    Spawn { command: String, source: io::Error },

    #[error("generator command failed ({status}): {stderr}")]
    Process { status: String, stderr: String },

    #[error("generator command wrote no MIDI file to {}", .0.display())]
    NoOutput(PathBuf),

    #[error("scratch directory error: {0}")]
    Scratch(io::Error),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("model error: {0}")]
    Model(String),
}

/// A span of the output timeline, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
}

/// Options passed to every `generate` call
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    /// Sampling temperature (1.0 = model distribution)
    pub temperature: f64,
    /// Requested total length in steps, primer included
    pub num_steps: usize,
    /// Sections of the timeline the model should fill
    pub generate_sections: Vec<TimeRange>,
}

impl GeneratorOptions {
    /// Options continuing `primer` up to `num_steps` total steps
    pub fn for_primer(
        primer: &NoteSequence,
        num_steps: usize,
        temperature: f64,
    ) -> Result<Self, GeneratorError> {
        let start_time = primer.total_time();
        let end_time = primer.steps_to_seconds(num_steps);
        if start_time >= end_time {
            return Err(GeneratorError::PrimerTooLong {
                primer_seconds: start_time,
                requested_seconds: end_time,
            });
        }

        Ok(Self {
            temperature,
            num_steps,
            generate_sections: vec![TimeRange {
                start_time,
                end_time,
            }],
        })
    }
}

/// One generated melody.
///
/// A model that serializes its own output keeps those bytes in `midi`, and
/// they are written out unchanged. Otherwise the notes are encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMelody {
    /// Decoded notes
    pub sequence: NoteSequence,
    /// MIDI file exactly as the model wrote it
    pub midi: Option<Vec<u8>>,
}

impl GeneratedMelody {
    /// Decode a MIDI file produced by the model, keeping its bytes
    pub fn from_midi(midi: Vec<u8>) -> Result<Self, SequenceError> {
        let sequence = NoteSequence::from_midi_bytes(&midi)?;
        Ok(Self {
            sequence,
            midi: Some(midi),
        })
    }

    /// Write the melody as a MIDI file
    pub fn write_midi_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SequenceError> {
        let path = path.as_ref();
        match &self.midi {
            Some(bytes) => fs::write(path, bytes).map_err(|source| SequenceError::Write {
                path: path.to_path_buf(),
                source,
            }),
            None => self.sequence.write_midi_file(path),
        }
    }
}

impl From<NoteSequence> for GeneratedMelody {
    fn from(sequence: NoteSequence) -> Self {
        Self {
            sequence,
            midi: None,
        }
    }
}

/// A model ready to produce sequences
pub trait SequenceGenerator {
    /// Configuration id of the loaded model
    fn id(&self) -> &str;

    /// Generate one sequence continuing `primer`.
    ///
    /// Each call samples independently, so repeated calls with the same
    /// inputs may return different melodies.
    fn generate(
        &mut self,
        primer: &NoteSequence,
        options: &GeneratorOptions,
    ) -> Result<GeneratedMelody, GeneratorError>;
}

/// Builds a generator from serialized model weights
pub trait ModelLoader {
    /// Initialize a generator from `bundle`
    fn initialize(&self, bundle: &Bundle) -> Result<Box<dyn SequenceGenerator>, GeneratorError>;
}

/// Registry of loaders keyed by configuration id
#[derive(Default)]
pub struct GeneratorMap {
    loaders: BTreeMap<String, Box<dyn ModelLoader>>,
}

impl fmt::Debug for GeneratorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorMap")
            .field("ids", &self.ids())
            .finish()
    }
}

impl GeneratorMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every melody RNN configuration to the external command
    pub fn external(command: impl Into<String>, args: Vec<String>) -> Self {
        let loader = ProcessLoader::new(command, args);
        let mut map = Self::new();
        for id in MELODY_RNN_CONFIGS {
            map.register(id, loader.clone());
        }
        map
    }

    /// External generator map configured from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::external(settings.command.clone(), settings.args.clone())
    }

    /// Register a loader, replacing any previous one for `id`
    pub fn register(&mut self, id: impl Into<String>, loader: impl ModelLoader + 'static) {
        self.loaders.insert(id.into(), Box::new(loader));
    }

    /// Whether a loader exists for `id`
    pub fn contains(&self, id: &str) -> bool {
        self.loaders.contains_key(id)
    }

    /// Registered configuration ids, sorted
    pub fn ids(&self) -> Vec<String> {
        self.loaders.keys().cloned().collect()
    }

    /// Initialize the generator matching the bundle's configuration id
    pub fn initialize(&self, bundle: &Bundle) -> Result<Box<dyn SequenceGenerator>, GeneratorError> {
        let loader = self
            .loaders
            .get(bundle.config_id())
            .ok_or_else(|| GeneratorError::UnknownConfig {
                id: bundle.config_id().to_string(),
                known: self.ids(),
            })?;
        loader.initialize(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Note;

    struct EchoLoader;

    struct EchoGenerator {
        id: String,
    }

    impl SequenceGenerator for EchoGenerator {
        fn id(&self) -> &str {
            &self.id
        }

        fn generate(
            &mut self,
            primer: &NoteSequence,
            _options: &GeneratorOptions,
        ) -> Result<GeneratedMelody, GeneratorError> {
            Ok(primer.clone().into())
        }
    }

    impl ModelLoader for EchoLoader {
        fn initialize(&self, bundle: &Bundle) -> Result<Box<dyn SequenceGenerator>, GeneratorError> {
            Ok(Box::new(EchoGenerator {
                id: bundle.config_id().to_string(),
            }))
        }
    }

    fn primer(seconds: f64) -> NoteSequence {
        let mut seq = NoteSequence::new();
        seq.add_note(Note::new(60, 100, 0.0, seconds));
        seq
    }

    #[test]
    fn test_options_for_primer() {
        let options = GeneratorOptions::for_primer(&primer(1.0), 128, 1.1).unwrap();
        assert_eq!(options.temperature, 1.1);
        assert_eq!(options.num_steps, 128);
        assert_eq!(
            options.generate_sections,
            vec![TimeRange {
                start_time: 1.0,
                end_time: 16.0
            }]
        );
    }

    #[test]
    fn test_options_empty_primer_starts_at_zero() {
        let options = GeneratorOptions::for_primer(&NoteSequence::new(), 4, 1.0).unwrap();
        assert_eq!(options.generate_sections[0].start_time, 0.0);
        assert_eq!(options.generate_sections[0].end_time, 0.5);
    }

    #[test]
    fn test_options_primer_too_long() {
        let err = GeneratorOptions::for_primer(&primer(2.0), 16, 1.0).unwrap_err();
        assert!(matches!(err, GeneratorError::PrimerTooLong { .. }));
    }

    #[test]
    fn test_external_map_ids() {
        let map = GeneratorMap::external("melody_rnn_generate", Vec::new());
        assert_eq!(
            map.ids(),
            vec!["attention_rnn", "basic_rnn", "lookback_rnn", "mono_rnn"]
        );
        assert!(map.contains("attention_rnn"));
        assert!(!map.contains("performance_rnn"));
    }

    #[test]
    fn test_initialize_known_config() {
        let mut map = GeneratorMap::new();
        map.register("basic_rnn", EchoLoader);

        let bundle = Bundle::new("/models/basic_rnn.mag", "basic_rnn");
        let mut generator = map.initialize(&bundle).unwrap();
        assert_eq!(generator.id(), "basic_rnn");

        let seed = primer(0.5);
        let options = GeneratorOptions::for_primer(&seed, 16, 1.0).unwrap();
        let melody = generator.generate(&seed, &options).unwrap();
        assert_eq!(melody.sequence, seed);
        assert_eq!(melody.midi, None);
    }

    #[test]
    fn test_initialize_unknown_config() {
        let mut map = GeneratorMap::new();
        map.register("basic_rnn", EchoLoader);

        let bundle = Bundle::new("/models/drums.mag", "drums");
        let err = map.initialize(&bundle).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Unknown model configuration 'drums' (known: basic_rnn)"
        );
    }

    #[test]
    fn test_model_midi_written_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("melody.mid");

        // A tempo change and a sustain pedal event are not part of the notes
        let bytes = crate::sequence::midi::fixtures::pedal_melody();
        let melody = GeneratedMelody::from_midi(bytes.clone()).unwrap();
        assert_eq!(melody.sequence.len(), 1);

        melody.write_midi_file(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_in_process_melody_is_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("melody.mid");

        let melody = GeneratedMelody::from(primer(0.5));
        melody.write_midi_file(&path).unwrap();
        let written = NoteSequence::read_midi_file(&path).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written.notes[0].pitch, 60);
        assert!((written.notes[0].end_time - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_model_midi_must_decode() {
        assert!(GeneratedMelody::from_midi(b"garbage".to_vec()).is_err());
    }
}
