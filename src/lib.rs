//! chartconv - Converts rhythm-game chart binaries to and from Standard MIDI Files.
//!
//! Two chart layouts are supported: measure-positioned entry tables (`.fsgmub`)
//! and real-time tick tables (`.xmk`). Charts decode into typed models, are
//! assembled into an in-memory MIDI sequence, and are written with the SMF
//! codec in [`midi`].

pub mod assembly;
pub mod chart;
pub mod classify;
pub mod clock;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod midi;
pub mod source;

// Re-export commonly used types
pub use chart::{ChartFormat, DecodeOptions, EncodeOptions, EntryChart, TickChart};
pub use config::{ConvertConfig, ExportOptions};
pub use convert::{
    convert_tick_source, entry_chart_to_midi, midi_to_entry_chart, midi_to_tick_chart,
    tick_charts_to_midi, TickConversion,
};
pub use error::{ChartError, Result};
pub use midi::{read_smf, write_smf, Sequence, Track};
pub use source::{ChartSource, DirectorySource, FileListSource};
