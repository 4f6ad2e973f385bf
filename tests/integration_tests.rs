// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for melodygen
//!
//! These tests drive the public API from a configuration file through to
//! the MIDI files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use melodygen::bundle::{list_bundles, Bundle};
use melodygen::config::ConfigFile;
use melodygen::generator::{
    GeneratedMelody, GeneratorError, GeneratorMap, GeneratorOptions, ModelLoader,
    SequenceGenerator,
};
use melodygen::pipeline::{generate_melodies, output_path, run_to_status};
use melodygen::request::{FormInput, GenerationRequest};
use melodygen::sequence::{Note, NoteSequence};

/// Appends one note after the primer at the start of the generate section
struct AppendLoader;

struct AppendGenerator;

impl ModelLoader for AppendLoader {
    fn initialize(&self, _bundle: &Bundle) -> Result<Box<dyn SequenceGenerator>, GeneratorError> {
        Ok(Box::new(AppendGenerator))
    }
}

impl SequenceGenerator for AppendGenerator {
    fn id(&self) -> &str {
        "attention_rnn"
    }

    fn generate(
        &mut self,
        primer: &NoteSequence,
        options: &GeneratorOptions,
    ) -> Result<GeneratedMelody, GeneratorError> {
        let section = options.generate_sections[0];
        let mut out = primer.clone();
        out.add_note(Note::new(72, 90, section.start_time, section.start_time + 0.25));
        Ok(out.into())
    }
}

fn fake_map() -> GeneratorMap {
    let mut map = GeneratorMap::new();
    map.register("attention_rnn", AppendLoader);
    map
}

/// Project folder with a config file, a bundle and a primer
fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("checkpoints")).unwrap();
    fs::write(dir.path().join("checkpoints/attention_rnn.mag"), b"bundle").unwrap();
    fs::write(dir.path().join("checkpoints/notes.txt"), b"").unwrap();

    let mut primer = NoteSequence::new();
    primer.add_note(Note::new(62, 100, 0.0, 0.5));
    primer.add_note(Note::new(65, 100, 0.5, 1.0));
    primer.write_midi_file(dir.path().join("primer.mid")).unwrap();

    fs::write(
        dir.path().join("config.toml"),
        r#"
[paths]
checkpoints_folder = "./checkpoints"
bundle_file = "checkpoints/attention_rnn.mag"
output_dir = "./songs"
primer_midi = "./primer.mid"

[defaults]
num_outputs = 3
num_steps = 64
"#,
    )
    .unwrap();
    dir
}

#[test]
fn test_config_to_output_files() {
    let dir = project();
    let settings = ConfigFile::load(dir.path().join("config.toml"))
        .unwrap()
        .resolve_against(dir.path());

    assert_eq!(settings.output_dir, dir.path().join("songs"));
    assert_eq!(settings.temperature, 1.0);
    assert_eq!(
        list_bundles(&settings.checkpoints_folder),
        vec![dir.path().join("checkpoints/attention_rnn.mag")]
    );

    let request =
        GenerationRequest::from_form_in(&FormInput::from_settings(&settings), &settings, dir.path())
            .unwrap();
    let report = generate_melodies(&fake_map(), &request).unwrap();

    let expected: Vec<PathBuf> = (1..=3).map(|i| output_path(&settings.output_dir, i)).collect();
    assert_eq!(report.files, expected);

    let mut written: Vec<PathBuf> = fs::read_dir(&settings.output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    written.sort();
    assert_eq!(written, expected);

    let melody = NoteSequence::read_midi_file(&expected[0]).unwrap();
    let pitches: Vec<u8> = melody.notes.iter().map(|n| n.pitch).collect();
    assert_eq!(pitches, vec![62, 65, 72]);
    assert!((melody.notes[2].start_time - 1.0).abs() < 1e-3);
}

#[test]
fn test_form_overrides_with_bare_bundle_name() {
    let dir = project();
    let settings = ConfigFile::load(dir.path().join("config.toml"))
        .unwrap()
        .resolve_against(dir.path());

    let input = FormInput {
        bundle_file: "attention_rnn.mag".to_string(),
        output_dir: "elsewhere/deep".to_string(),
        num_outputs: "2".to_string(),
        ..FormInput::default()
    };
    let request = GenerationRequest::from_form_in(&input, &settings, dir.path()).unwrap();
    assert_eq!(request.bundle_file, dir.path().join("checkpoints/attention_rnn.mag"));

    let status = run_to_status(&fake_map(), &request);
    assert_eq!(
        status,
        format!("2 Melodies Generated in {}", dir.path().join("elsewhere/deep").display())
    );
    assert!(output_path(&request.output_dir, 2).is_file());
    assert!(!output_path(&request.output_dir, 3).exists());
}

#[test]
fn test_missing_bundle_leaves_no_files() {
    let dir = project();
    let settings = ConfigFile::load(dir.path().join("config.toml"))
        .unwrap()
        .resolve_against(dir.path());
    let mut request = GenerationRequest::from_settings(&settings);
    request.bundle_file = dir.path().join("checkpoints/basic_rnn.mag");

    let status = run_to_status(&fake_map(), &request);
    assert!(status.starts_with("Error: Bundle file not found"));
    assert!(!settings.output_dir.exists());
}

#[test]
fn test_unknown_model_configuration() {
    let dir = project();
    fs::write(dir.path().join("checkpoints/drums_rnn.mag"), b"bundle").unwrap();
    let settings = ConfigFile::load(dir.path().join("config.toml"))
        .unwrap()
        .resolve_against(dir.path());
    let mut request = GenerationRequest::from_settings(&settings);
    request.bundle_file = dir.path().join("checkpoints/drums_rnn.mag");

    let status = run_to_status(&fake_map(), &request);
    assert!(status.contains("Unknown model configuration 'drums_rnn'"));
}

#[test]
fn test_primer_longer_than_requested_length() {
    let dir = project();
    let settings = ConfigFile::load(dir.path().join("config.toml"))
        .unwrap()
        .resolve_against(dir.path());
    let mut request = GenerationRequest::from_settings(&settings);
    // 4 steps at 120 qpm is half a second; the primer lasts one second
    request.num_steps = 4;

    assert!(run_to_status(&fake_map(), &request).starts_with("Error:"));
    assert_eq!(fs::read_dir(&settings.output_dir).unwrap().count(), 0);
}

#[cfg(unix)]
mod external {
    use super::*;

    /// Stand-in for melody_rnn_generate: copies the primer and checks the flags
    const FAKE_GENERATE: &str = r#"
for arg in "$@"; do
  case "$arg" in
    --output_dir=*) out="${arg#--output_dir=}" ;;
    --primer_midi=*) primer="${arg#--primer_midi=}" ;;
    --config=*) config="${arg#--config=}" ;;
    --num_outputs=*) count="${arg#--num_outputs=}" ;;
  esac
done
[ "$config" = "attention_rnn" ] || { echo "bad config $config" >&2; exit 2; }
[ "$count" = "1" ] || { echo "bad count $count" >&2; exit 2; }
cp "$primer" "$out/generated.mid"
"#;

    /// Stand-in that ignores the primer and emits a prepared file
    const EMIT_FILE: &str = r#"
for arg in "$@"; do
  case "$arg" in
    --output_dir=*) out="${arg#--output_dir=}" ;;
  esac
done
cp "@SOURCE@" "$out/generated.mid"
"#;

    /// C4 with a sustain pedal press and a second tempo event
    fn pedal_melody() -> Vec<u8> {
        let body: &[u8] = &[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // 120 QPM
            0x00, 0x90, 0x3C, 0x64, // C4 on
            0x00, 0xB0, 0x40, 0x7F, // sustain pedal down
            0x60, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40, // 60 QPM
            0x00, 0x80, 0x3C, 0x00, // C4 off
            0x00, 0xFF, 0x2F, 0x00, // end of track
        ];
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 6, 0, 0, 0, 1, 0x00, 0x60]);
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    fn script(dir: &Path, body: &str) -> GeneratorMap {
        let path = dir.join("fake_generate.sh");
        fs::write(&path, body).unwrap();
        GeneratorMap::external("sh", vec![path.display().to_string()])
    }

    #[test]
    fn test_external_command_end_to_end() {
        let dir = project();
        let settings = ConfigFile::load(dir.path().join("config.toml"))
            .unwrap()
            .resolve_against(dir.path());
        let map = script(dir.path(), FAKE_GENERATE);

        let report = generate_melodies(&map, &GenerationRequest::from_settings(&settings)).unwrap();
        assert_eq!(report.files.len(), 3);

        let melody = NoteSequence::read_midi_file(&report.files[2]).unwrap();
        assert_eq!(melody.len(), 2);
        assert_eq!(melody.notes[0].pitch, 62);
    }

    #[test]
    fn test_external_failure_in_status() {
        let dir = project();
        let settings = ConfigFile::load(dir.path().join("config.toml"))
            .unwrap()
            .resolve_against(dir.path());
        let map = script(dir.path(), "echo 'checkpoint mismatch' >&2\nexit 1\n");

        let status = run_to_status(&map, &GenerationRequest::from_settings(&settings));
        assert!(status.starts_with("Error: melody 1 of 3 failed"));
        assert!(status.contains("checkpoint mismatch"));
    }

    #[test]
    fn test_external_output_copied_verbatim() {
        let dir = project();
        let settings = ConfigFile::load(dir.path().join("config.toml"))
            .unwrap()
            .resolve_against(dir.path());

        let source = dir.path().join("model_output.mid");
        fs::write(&source, pedal_melody()).unwrap();
        let map = script(
            dir.path(),
            &EMIT_FILE.replace("@SOURCE@", &source.display().to_string()),
        );

        let report = generate_melodies(&map, &GenerationRequest::from_settings(&settings)).unwrap();
        for file in &report.files {
            assert_eq!(fs::read(file).unwrap(), pedal_melody());
        }
    }
}
