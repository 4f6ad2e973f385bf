// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Standard MIDI file import and export for note sequences.
//!
//! Both directions go through `midly`. Export writes a Type 0 file with a
//! tempo event followed by program changes and note on/off pairs.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use thiserror::Error;

use super::{Note, NoteSequence, DEFAULT_QPM, DEFAULT_TICKS_PER_QUARTER};

/// Errors raised while reading or writing MIDI files
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("invalid MIDI data: {0}")]
    Parse(#[from] midly::Error),

    #[error("failed to read MIDI file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write MIDI file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode MIDI data: {0}")]
    Encode(io::Error),

    #[error("event at tick {tick} is too far after the previous event to encode")]
    DeltaOverflow { tick: u64 },
}

impl NoteSequence {
    /// Read a sequence from a MIDI file
    pub fn read_midi_file<P: AsRef<Path>>(path: P) -> Result<Self, SequenceError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| SequenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_midi_bytes(&bytes)
    }

    /// Write this sequence to a MIDI file
    pub fn write_midi_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SequenceError> {
        let path = path.as_ref();
        fs::write(path, self.to_midi_bytes()?).map_err(|source| SequenceError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a sequence from Standard MIDI file bytes.
    ///
    /// Tracks of all formats are overlaid on a single timeline. A note-on
    /// with velocity 0 ends a note; notes never ended close at the last
    /// event in the file.
    pub fn from_midi_bytes(bytes: &[u8]) -> Result<Self, SequenceError> {
        let smf = Smf::parse(bytes)?;

        let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
        let mut events: Vec<RawEvent> = Vec::new();
        let mut last_tick = 0u64;

        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += event.delta.as_int() as u64;
                last_tick = last_tick.max(tick);

                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(us)) => {
                        tempo_changes.push((tick, us.as_int()));
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let channel = channel.as_int();
                        let kind = match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                RawKind::On {
                                    key: key.as_int(),
                                    vel: vel.as_int(),
                                }
                            }
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                RawKind::Off { key: key.as_int() }
                            }
                            MidiMessage::ProgramChange { program } => RawKind::Program {
                                program: program.as_int(),
                            },
                            _ => continue,
                        };
                        events.push(RawEvent { tick, channel, kind });
                    }
                    _ => {}
                }
            }
        }

        tempo_changes.sort_by_key(|(tick, _)| *tick);

        let (ticks_per_quarter, clock) = match smf.header.timing {
            Timing::Metrical(tpq) => {
                let tpq = tpq.as_int().max(1);
                (tpq, TempoMap::metrical(tpq, &tempo_changes))
            }
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = fps.as_f32() as f64 * subframes.max(1) as f64;
                (DEFAULT_TICKS_PER_QUARTER, TempoMap::timecode(ticks_per_second))
            }
        };

        let tempo_qpm = tempo_changes
            .first()
            .map(|(_, us)| 60_000_000.0 / (*us).max(1) as f64)
            .unwrap_or(DEFAULT_QPM);

        // Offs sort before ons at the same tick so back-to-back notes pair correctly
        events.sort_by_key(|e| (e.tick, e.kind.order()));

        let mut programs: HashMap<u8, u8> = HashMap::new();
        let mut open: HashMap<(u8, u8), VecDeque<(u64, u8, u8)>> = HashMap::new();
        let mut notes = Vec::new();

        for event in &events {
            match event.kind {
                RawKind::Program { program } => {
                    programs.insert(event.channel, program);
                }
                RawKind::On { key, vel } => {
                    let program = programs.get(&event.channel).copied().unwrap_or(0);
                    open.entry((event.channel, key))
                        .or_default()
                        .push_back((event.tick, vel, program));
                }
                RawKind::Off { key } => {
                    if let Some((start, vel, program)) = open
                        .get_mut(&(event.channel, key))
                        .and_then(|pending| pending.pop_front())
                    {
                        notes.push(
                            Note::new(key, vel, clock.seconds(start), clock.seconds(event.tick))
                                .with_channel(event.channel)
                                .with_program(program),
                        );
                    }
                }
            }
        }

        for ((channel, key), pending) in open {
            for (start, vel, program) in pending {
                notes.push(
                    Note::new(key, vel, clock.seconds(start), clock.seconds(last_tick))
                        .with_channel(channel)
                        .with_program(program),
                );
            }
        }

        let mut sequence = NoteSequence {
            notes,
            tempo_qpm,
            ticks_per_quarter,
        };
        sequence.sort();
        Ok(sequence)
    }

    /// Encode this sequence as a Type 0 Standard MIDI file
    pub fn to_midi_bytes(&self) -> Result<Vec<u8>, SequenceError> {
        let smf = self.to_smf()?;
        let mut buffer = Vec::new();
        smf.write_std(&mut buffer).map_err(SequenceError::Encode)?;
        Ok(buffer)
    }

    /// Single-track SMF: tempo and time signature, then program changes and notes
    fn to_smf(&self) -> Result<Smf<'static>, SequenceError> {
        let ppqn = self.ticks_per_quarter.clamp(1, MAX_TICKS_PER_QUARTER);
        let qpm = if self.tempo_qpm > 0.0 { self.tempo_qpm } else { DEFAULT_QPM };
        let ticks_per_second = qpm / 60.0 * ppqn as f64;
        let to_tick = |seconds: f64| (seconds.max(0.0) * ticks_per_second).round() as u64;

        let microseconds = ((60_000_000.0 / qpm).round() as u32).clamp(1, MAX_TEMPO);
        let mut events = vec![
            TimedEvent::meta(0, MetaMessage::Tempo(u24::new(microseconds))),
            // 4/4; the denominator is a power of two
            TimedEvent::meta(0, MetaMessage::TimeSignature(4, 2, 24, 8)),
        ];

        let mut notes: Vec<&Note> = self.notes.iter().collect();
        notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        // Channels start on program 0; emit a change wherever a note needs another
        let mut programs: HashMap<u8, u8> = HashMap::new();
        for note in notes {
            let start = to_tick(note.start_time);
            let end = to_tick(note.end_time).max(start);

            let program = programs.entry(note.channel).or_insert(0);
            if *program != note.program {
                *program = note.program;
                events.push(TimedEvent::midi(
                    start,
                    ORDER_PROGRAM,
                    note.channel,
                    MidiMessage::ProgramChange {
                        program: u7::new(note.program),
                    },
                ));
            }

            events.push(TimedEvent::midi(
                start,
                ORDER_NOTE_ON,
                note.channel,
                MidiMessage::NoteOn {
                    key: u7::new(note.pitch),
                    vel: u7::new(note.velocity.max(1)),
                },
            ));
            events.push(TimedEvent::midi(
                end,
                ORDER_NOTE_OFF,
                note.channel,
                MidiMessage::NoteOff {
                    key: u7::new(note.pitch),
                    vel: u7::new(0),
                },
            ));
        }

        events.sort_by_key(|e| (e.tick, e.order));

        let mut track: Track<'static> = Vec::with_capacity(events.len() + 1);
        let mut last_tick = 0u64;
        for event in events {
            let delta = u32::try_from(event.tick - last_tick)
                .ok()
                .and_then(u28::try_from)
                .ok_or(SequenceError::DeltaOverflow { tick: event.tick })?;
            track.push(TrackEvent {
                delta,
                kind: event.kind,
            });
            last_tick = event.tick;
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(ppqn)),
        ));
        smf.tracks.push(track);
        Ok(smf)
    }
}

#[derive(Debug, Clone, Copy)]
enum RawKind {
    On { key: u8, vel: u8 },
    Off { key: u8 },
    Program { program: u8 },
}

impl RawKind {
    fn order(&self) -> u8 {
        match self {
            RawKind::Program { .. } => 0,
            RawKind::Off { .. } => 1,
            RawKind::On { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RawEvent {
    tick: u64,
    channel: u8,
    kind: RawKind,
}

/// Piecewise-linear tick to seconds conversion
struct TempoMap {
    /// (start tick, seconds at start tick, seconds per tick)
    segments: Vec<(u64, f64, f64)>,
}

impl TempoMap {
    fn metrical(ticks_per_quarter: u16, changes: &[(u64, u32)]) -> Self {
        let per_tick = |us: u32| us as f64 / 1_000_000.0 / ticks_per_quarter as f64;
        let mut map = Self {
            segments: vec![(0, 0.0, per_tick(500_000))],
        };

        for &(tick, us) in changes {
            let at = map.seconds(tick);
            match map.segments.last_mut() {
                Some(last) if last.0 == tick => last.2 = per_tick(us),
                _ => map.segments.push((tick, at, per_tick(us))),
            }
        }
        map
    }

    fn timecode(ticks_per_second: f64) -> Self {
        Self {
            segments: vec![(0, 0.0, 1.0 / ticks_per_second.max(1.0))],
        }
    }

    fn seconds(&self, tick: u64) -> f64 {
        let index = self.segments.partition_point(|s| s.0 <= tick).saturating_sub(1);
        let (start, at, per_tick) = self.segments[index];
        at + (tick - start) as f64 * per_tick
    }
}

/// Tie-break at equal ticks: meta, program, note off, note on
const ORDER_META: u8 = 0;
const ORDER_PROGRAM: u8 = 1;
const ORDER_NOTE_OFF: u8 = 2;
const ORDER_NOTE_ON: u8 = 3;

/// Largest metrical resolution an SMF header can carry
const MAX_TICKS_PER_QUARTER: u16 = 0x7FFF;

/// Largest tempo value, in microseconds per quarter
const MAX_TEMPO: u32 = 0xFF_FFFF;

/// A track event at an absolute tick, before delta encoding
struct TimedEvent {
    tick: u64,
    order: u8,
    kind: TrackEventKind<'static>,
}

impl TimedEvent {
    fn meta(tick: u64, message: MetaMessage<'static>) -> Self {
        Self {
            tick,
            order: ORDER_META,
            kind: TrackEventKind::Meta(message),
        }
    }

    fn midi(tick: u64, order: u8, channel: u8, message: MidiMessage) -> Self {
        Self {
            tick,
            order,
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message,
            },
        }
    }
}

/// Hand-built MIDI files for tests
#[cfg(test)]
pub(crate) mod fixtures {
    /// Build a Standard MIDI file from raw track bodies (without end-of-track)
    pub fn smf(format: u16, division: [u8; 2], tracks: &[&[u8]]) -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 6]);
        bytes.extend_from_slice(&format.to_be_bytes());
        bytes.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&division);
        for body in tracks {
            let mut data = body.to_vec();
            data.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
            bytes.extend_from_slice(b"MTrk");
            bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
            bytes.extend_from_slice(&data);
        }
        bytes
    }

    /// One C4 with a sustain pedal press and a mid-note tempo change
    pub fn pedal_melody() -> Vec<u8> {
        let track: &[u8] = &[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // 120 QPM
            0x00, 0x90, 0x3C, 0x64, // C4 on
            0x00, 0xB0, 0x40, 0x7F, // sustain pedal down
            0x60, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40, // 60 QPM
            0x00, 0x80, 0x3C, 0x00, // C4 off
        ];
        smf(0, [0x00, 0x60], &[track])
    }
}
