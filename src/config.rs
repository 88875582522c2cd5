//! Conversion settings, loadable from a JSON file.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! { "quantization": "1/32", "remap": true, "strict": false }
//! ```

use crate::chart::{ChartFormat, DecodeOptions, EncodeOptions};
use crate::clock::Quantizer;
use crate::codec::{DecodeMode, Endian};
use crate::error::{ChartError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Options for assembling tick-table charts into a MIDI sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub quantizer: Quantizer,
    /// Remap tracks to rhythm-game authoring conventions.
    pub remap: bool,
}

/// User-facing conversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Measure fraction (`"1/128"`) or decimal, `"0"` disables.
    pub quantization: String,
    /// Remap tick-table tracks when converting to MIDI.
    pub remap: bool,
    /// Fail on dangling text pointers and inconsistent records.
    pub strict: bool,
    /// Byte order override for entry-table charts.
    pub entry_table_endian: Option<Endian>,
    /// Byte order override for tick-table charts.
    pub tick_table_endian: Option<Endian>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            quantization: "1/128".to_string(),
            remap: false,
            strict: true,
            entry_table_endian: None,
            tick_table_endian: None,
        }
    }
}

impl ConvertConfig {
    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::Io`] if the file can't be read and
    /// [`ChartError::Config`] if it is not valid JSON for this struct.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        debug!(path = %path.as_ref().display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ChartError::Config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ChartError::Config(e.to_string()))
    }

    fn endian(&self, format: ChartFormat) -> Option<Endian> {
        match format {
            ChartFormat::EntryTable => self.entry_table_endian,
            ChartFormat::TickTable => self.tick_table_endian,
        }
    }

    pub fn decode_options(&self, format: ChartFormat) -> DecodeOptions {
        DecodeOptions {
            mode: if self.strict {
                DecodeMode::Strict
            } else {
                DecodeMode::Lenient
            },
            endian: self.endian(format),
        }
    }

    pub fn encode_options(&self, format: ChartFormat) -> EncodeOptions {
        EncodeOptions {
            endian: self.endian(format),
        }
    }

    /// # Errors
    ///
    /// Returns [`ChartError::InvalidQuantization`] if `quantization` does not parse.
    pub fn export_options(&self) -> Result<ExportOptions> {
        Ok(ExportOptions {
            quantizer: self.quantization.parse()?,
            remap: self.remap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConvertConfig::default();
        let export = config.export_options().unwrap();
        assert_eq!(export.quantizer.grid(), 15);
        assert!(!export.remap);
        assert_eq!(
            config.decode_options(ChartFormat::TickTable),
            DecodeOptions::default()
        );
    }

    #[test]
    fn test_partial_json() {
        let config = ConvertConfig::from_json(
            r#"{ "quantization": "1/32", "strict": false, "tick_table_endian": "little" }"#,
        )
        .unwrap();
        assert!(!config.remap);
        assert_eq!(config.export_options().unwrap().quantizer.grid(), 60);

        let decode = config.decode_options(ChartFormat::TickTable);
        assert_eq!(decode.mode, DecodeMode::Lenient);
        assert_eq!(decode.endian, Some(Endian::Little));
        assert_eq!(config.decode_options(ChartFormat::EntryTable).endian, None);
    }

    #[test]
    fn test_json_round_trip() {
        let config = ConvertConfig {
            remap: true,
            entry_table_endian: Some(Endian::Big),
            ..ConvertConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(ConvertConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            ConvertConfig::from_json("{ \"remap\": 3 }"),
            Err(ChartError::Config(_))
        ));

        let config = ConvertConfig {
            quantization: "2".to_string(),
            ..ConvertConfig::default()
        };
        assert!(matches!(
            config.export_options(),
            Err(ChartError::InvalidQuantization(_))
        ));
    }
}
