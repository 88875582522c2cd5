//! Queue alignment of lyric and phrase markers onto note starts.

use crate::error::{ChartError, Result};

/// Pairs each marker with the note that starts at the same tick.
///
/// Both inputs are consumed in order as queues, never searched. For each
/// marker, notes starting before it are skipped; a note starting exactly at
/// the marker's tick is consumed and paired. A marker earlier than the next
/// note start, or left over once the notes run out, is orphaned.
///
/// # Arguments
///
/// * `markers` - `(tick, text)` pairs sorted by tick
/// * `note_starts` - Note-on ticks sorted ascending
///
/// # Returns
///
/// For every marker, the index into `note_starts` it was paired with.
///
/// # Errors
///
/// Returns [`ChartError::OrphanedMarker`] for the first unmatched marker.
pub fn align_markers(markers: &[(u64, String)], note_starts: &[u64]) -> Result<Vec<usize>> {
    let mut pairs = Vec::with_capacity(markers.len());
    let mut notes = note_starts.iter().copied().enumerate().peekable();

    for (tick, text) in markers {
        loop {
            match notes.peek() {
                Some(&(index, start)) if start == *tick => {
                    pairs.push(index);
                    notes.next();
                    break;
                }
                Some(&(_, start)) if start < *tick => {
                    notes.next();
                }
                _ => {
                    return Err(ChartError::OrphanedMarker {
                        tick: *tick,
                        text: text.clone(),
                    })
                }
            }
        }
    }

    Ok(pairs)
}
