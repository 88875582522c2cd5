//! Standard MIDI File (SMF) writer.
//!
//! Writes a [`Sequence`] as SMF Format 1 with metrical timing. Events are
//! written in track order; callers sort tracks before writing. Every track is
//! closed with an end-of-track event at its last tick.

use super::{EventKind, Sequence, Track};
use std::io::{self, Write};

/// Writes a variable-length quantity (VLQ) used for delta times and meta lengths.
///
/// VLQ encodes values using 7 bits per byte, with the MSB indicating
/// whether more bytes follow (1 = more bytes, 0 = last byte).
fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    let value = value.min(0x0FFF_FFFF);
    if value == 0 {
        buffer.push(0);
        return;
    }

    let mut temp = value;
    let mut bytes = Vec::with_capacity(4);
    while temp > 0 {
        bytes.push((temp & 0x7F) as u8);
        temp >>= 7;
    }

    for (i, &byte) in bytes.iter().rev().enumerate() {
        if i < bytes.len() - 1 {
            buffer.push(byte | 0x80);
        } else {
            buffer.push(byte);
        }
    }
}

/// Writes a meta event: `FF type len data`.
fn write_meta(meta_type: u8, data: &[u8], buffer: &mut Vec<u8>) {
    buffer.push(0xFF);
    buffer.push(meta_type);
    write_vlq(data.len() as u32, buffer);
    buffer.extend_from_slice(data);
}

/// Writes a single event to the buffer (without delta time).
fn write_event(kind: &EventKind, buffer: &mut Vec<u8>) {
    match kind {
        EventKind::Text(text) => write_meta(0x01, text.as_bytes(), buffer),
        EventKind::Copyright(text) => write_meta(0x02, text.as_bytes(), buffer),
        EventKind::TrackName(text) => write_meta(0x03, text.as_bytes(), buffer),
        EventKind::Lyric(text) => write_meta(0x05, text.as_bytes(), buffer),
        EventKind::Marker(text) => write_meta(0x06, text.as_bytes(), buffer),
        EventKind::CuePoint(text) => write_meta(0x07, text.as_bytes(), buffer),
        EventKind::Tempo(us_per_quarter) => {
            let us = (*us_per_quarter).min(0x00FF_FFFF);
            write_meta(0x51, &us.to_be_bytes()[1..], buffer);
        }
        EventKind::TimeSignature {
            numerator,
            denominator_power,
        } => {
            // 24 MIDI clocks per click, 8 32nd notes per quarter
            write_meta(0x58, &[*numerator, *denominator_power, 24, 8], buffer);
        }
        EventKind::NoteOn {
            channel,
            key,
            velocity,
        } => {
            buffer.push(0x90 | (channel & 0x0F));
            buffer.push(key & 0x7F);
            buffer.push(velocity & 0x7F);
        }
        EventKind::NoteOff {
            channel,
            key,
            velocity,
        } => {
            buffer.push(0x80 | (channel & 0x0F));
            buffer.push(key & 0x7F);
            buffer.push(velocity & 0x7F);
        }
    }
}

/// Builds one track chunk body from already-ordered events.
fn build_track_data(track: &Track) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut last_tick = 0u64;

    for event in &track.events {
        let delta = event.tick.saturating_sub(last_tick);
        write_vlq(u32::try_from(delta).unwrap_or(u32::MAX), &mut buffer);
        write_event(&event.kind, &mut buffer);
        last_tick = last_tick.max(event.tick);
    }

    // End of track: FF 2F 00
    buffer.push(0);
    write_meta(0x2F, &[], &mut buffer);
    buffer
}

fn write_track_chunk<W: Write>(writer: &mut W, track_data: &[u8]) -> io::Result<()> {
    writer.write_all(b"MTrk")?;
    writer.write_all(&(track_data.len() as u32).to_be_bytes())?;
    writer.write_all(track_data)?;
    Ok(())
}

/// Serializes a sequence to SMF bytes.
///
/// # Arguments
///
/// * `sequence` - Tracks in output order, each already sorted
///
/// # Returns
///
/// A Format 1 file with one chunk per track.
pub fn write_smf(sequence: &Sequence) -> Vec<u8> {
    let mut out = Vec::new();
    // Writes into a Vec cannot fail.
    let _ = write_to(&mut out, sequence);
    out
}

fn write_to<W: Write>(writer: &mut W, sequence: &Sequence) -> io::Result<()> {
    writer.write_all(b"MThd")?;
    writer.write_all(&6u32.to_be_bytes())?;
    writer.write_all(&1u16.to_be_bytes())?; // Format 1
    writer.write_all(&(sequence.tracks.len() as u16).to_be_bytes())?;
    writer.write_all(&sequence.ticks_per_quarter.to_be_bytes())?;

    for track in &sequence.tracks {
        write_track_chunk(writer, &build_track_data(track))?;
    }
    writer.flush()
}
