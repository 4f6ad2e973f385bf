// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Note sequences exchanged with the melody generator.
//!
//! This module provides:
//! - `NoteSequence`, the in-memory form of a primer or generated melody
//! - Standard MIDI file reading and writing (see `midi`)

pub mod midi;

pub use midi::SequenceError;

/// Steps per quarter note used to measure generation length
pub const STEPS_PER_QUARTER: u32 = 4;

/// Tempo assumed when a MIDI file carries no tempo event
pub const DEFAULT_QPM: f64 = 120.0;

/// Resolution used when writing MIDI files
pub const DEFAULT_TICKS_PER_QUARTER: u16 = 220;

/// A single note with times in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// MIDI note number (0-127)
    pub pitch: u8,
    /// Velocity (1-127)
    pub velocity: u8,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Program active on the channel when the note started
    pub program: u8,
}

impl Note {
    /// Create a note on channel 0 with program 0
    pub fn new(pitch: u8, velocity: u8, start_time: f64, end_time: f64) -> Self {
        Self {
            pitch,
            velocity,
            start_time,
            end_time,
            channel: 0,
            program: 0,
        }
    }

    /// Set the channel for this note
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel & 0x0F;
        self
    }

    /// Set the program for this note
    pub fn with_program(mut self, program: u8) -> Self {
        self.program = program & 0x7F;
        self
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

/// A monophonic or polyphonic sequence of notes
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSequence {
    /// Notes ordered by start time
    pub notes: Vec<Note>,
    /// Tempo in quarter notes per minute
    pub tempo_qpm: f64,
    /// MIDI resolution (ticks per quarter note)
    pub ticks_per_quarter: u16,
}

impl Default for NoteSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteSequence {
    /// Create an empty sequence at the default tempo
    pub fn new() -> Self {
        Self {
            notes: Vec::new(),
            tempo_qpm: DEFAULT_QPM,
            ticks_per_quarter: DEFAULT_TICKS_PER_QUARTER,
        }
    }

    /// Set tempo in quarter notes per minute
    pub fn with_tempo(mut self, qpm: f64) -> Self {
        if qpm.is_finite() && qpm > 0.0 {
            self.tempo_qpm = qpm;
        }
        self
    }

    /// Add a note, keeping notes ordered by start time
    pub fn add_note(&mut self, note: Note) {
        let index = self
            .notes
            .partition_point(|n| n.start_time <= note.start_time);
        self.notes.insert(index, note);
    }

    /// Number of notes
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Whether the sequence has no notes
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// End of the last sounding note, in seconds
    pub fn total_time(&self) -> f64 {
        self.notes
            .iter()
            .map(|n| n.end_time)
            .fold(0.0, f64::max)
    }

    /// Length of one step in seconds at this sequence's tempo
    pub fn seconds_per_step(&self) -> f64 {
        60.0 / self.tempo_qpm / STEPS_PER_QUARTER as f64
    }

    /// Convert a step count to seconds at this sequence's tempo
    pub fn steps_to_seconds(&self, steps: usize) -> f64 {
        steps as f64 * self.seconds_per_step()
    }

    /// Order notes by start time, then pitch
    pub fn sort(&mut self) {
        self.notes.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then(a.pitch.cmp(&b.pitch))
        });
    }
}
