//! Track assembly and disassembly between charts and interchange sequences.
//!
//! - [`entry_chart_to_sequence`] / [`sequence_to_entry_chart`] for
//!   measure-positioned entry-table charts
//! - [`tick_charts_to_sequence`] / [`sequence_to_tick_chart`] for
//!   real-time tick-table charts, one track per chart
//!
//! Every produced track is sorted with [`Track::sort`](crate::midi::Track::sort)
//! so note-on/note-off pairs always come out complete and ordered.

mod align;
mod entry_export;
mod entry_import;
mod tick_export;
mod tick_import;

pub use align::align_markers;
pub use entry_export::entry_chart_to_sequence;
pub use entry_import::sequence_to_entry_chart;
pub use tick_export::tick_charts_to_sequence;
pub use tick_import::sequence_to_tick_chart;

/// Entry-table note track.
pub const NOTES_TRACK: &str = "NOTES";
/// Entry-table effect track.
pub const EFFECTS_TRACK: &str = "EFFECTS";
/// Tempo track of tick-table exports.
pub const TICK_TEMPO_TRACK: &str = "xmkTempo";
